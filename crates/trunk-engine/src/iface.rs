//! The physical-interface collaborator boundary.
//!
//! The trunk never owns the underlying interface; it borrows a handle
//! through [`PhysicalInterface`] and restores whatever it changed when a
//! port detaches. Implementations are expected to use interior mutability:
//! the trunk calls every method through a shared reference, usually while
//! holding its own lock.

use crate::capabilities::Capabilities;
use crate::error::TrunkResult;
use crate::frame::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;
use trunk_types::MacAddress;

/// Media/link type of an interface. Only Ethernet-like interfaces can be
/// bound into a trunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Ethernet (aggregatable).
    #[default]
    Ethernet,
    /// Loopback.
    Loopback,
    /// Anything else (tunnels, serial, ...).
    Other,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ethernet => write!(f, "ethernet"),
            Self::Loopback => write!(f, "loopback"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Interface-type marker. A member interface is re-marked while it is
/// aggregated and restored on detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterfaceKind {
    /// A plain Ethernet interface.
    #[default]
    Ethernet,
    /// An interface currently serving as a trunk member.
    AggregateMember,
}

/// The administratively-significant flags a trunk mirrors onto its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceFlag {
    /// Promiscuous mode.
    Promiscuous,
    /// Receive-all-multicast mode.
    AllMulticast,
}

/// Minimal contract the trunking engine requires from an interface driver.
///
/// The trunk uses this to coordinate link-layer addresses, mirror flags,
/// replicate multicast memberships and hand off selected outbound frames.
/// None of these calls may block on I/O.
pub trait PhysicalInterface: Send + Sync {
    /// Stable interface identity (e.g. "eth0").
    fn name(&self) -> &str;

    /// Media/link type.
    fn media(&self) -> MediaType;

    /// True while the interface cannot be bound (in use elsewhere,
    /// mid-reconfiguration, ...).
    fn is_busy(&self) -> bool;

    /// Current link-layer address.
    fn link_addr(&self) -> MacAddress;

    /// Overwrites the link-layer address.
    fn set_link_addr(&self, addr: MacAddress);

    /// Hardware capability bitmask.
    fn capabilities(&self) -> Capabilities;

    /// Current interface-type marker.
    fn kind(&self) -> InterfaceKind;

    /// Updates the interface-type marker.
    fn set_kind(&self, kind: InterfaceKind);

    /// Reads one administrative flag.
    fn flag(&self, flag: InterfaceFlag) -> bool;

    /// Sets or clears one administrative flag.
    fn set_flag(&self, flag: InterfaceFlag, on: bool);

    /// Joins a hardware multicast group.
    fn join_multicast(&self, group: MacAddress);

    /// Leaves a hardware multicast group.
    fn leave_multicast(&self, group: MacAddress);

    /// Hands one frame to the interface's own transmit path.
    fn transmit(&self, frame: &Frame) -> TrunkResult<()>;
}
