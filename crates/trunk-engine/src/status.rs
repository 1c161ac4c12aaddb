//! Queryable trunk status and counters.

use crate::capabilities::Capabilities;
use crate::policy::AggregationProtocol;
use serde::{Deserialize, Serialize};
use trunk_types::{LinkState, MacAddress};

/// Frame and error counters of one trunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrunkStats {
    /// Frames handed to a member's transmit path.
    pub tx_frames: u64,
    /// Bytes handed to a member's transmit path.
    pub tx_bytes: u64,
    /// Outbound frames that could not be sent.
    pub tx_errors: u64,
    /// Inbound frames accepted into the aggregate.
    pub rx_frames: u64,
    /// Inbound frames rejected by the active policy.
    pub rx_dropped: u64,
    /// Inbound control frames consumed by the active policy.
    pub rx_control: u64,
}

/// Snapshot of one member port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortStatus {
    /// Member interface name.
    pub name: String,
    /// Last pushed link state.
    pub link: LinkState,
    /// Whether this is the primary (first-attached) port.
    pub primary: bool,
    /// Whether the trunk set promiscuous mode on this member.
    pub promiscuous: bool,
    /// Whether the trunk set all-multicast mode on this member.
    pub all_multicast: bool,
}

/// Snapshot of one trunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrunkStatus {
    /// Trunk name.
    pub name: String,
    /// Configured aggregation protocol.
    pub protocol: AggregationProtocol,
    /// Current trunk link-layer address, if adopted or configured.
    pub link_addr: Option<MacAddress>,
    /// Effective capability mask.
    pub capabilities: Capabilities,
    /// Members in attach order.
    pub ports: Vec<PortStatus>,
    /// Counters since creation.
    pub stats: TrunkStats,
}
