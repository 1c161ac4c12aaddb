//! trunk-engine - link aggregation control plane
//!
//! Models aggregate network interfaces (trunks): member-port lifecycle,
//! pluggable aggregation policies (round-robin, failover, flow-hash
//! load-balance, LACP boundary), flow hashing, flag and multicast
//! mirroring, and a system-wide registry with trunk stacking.

mod capabilities;
mod error;
mod flags;
mod frame;
mod hash;
mod iface;
mod policy;
mod port;
mod registry;
mod sim;
mod status;
mod trunk;

pub use capabilities::Capabilities;
pub use error::{TrunkError, TrunkResult};
pub use flags::{flag_transition, FlagAction, FlagOrigin};
pub use frame::{
    build_frame, Frame, ETHERTYPE_IPV4, ETHERTYPE_IPV6, ETHERTYPE_PAE, ETHERTYPE_SLOW,
    ETHERTYPE_VLAN, SLOW_SUBTYPE_LACP, SLOW_SUBTYPE_MARKER,
};
pub use hash::{flow_hash, mix32};
pub use iface::{InterfaceFlag, InterfaceKind, MediaType, PhysicalInterface};
pub use policy::{
    policy_for, AggregationPolicy, AggregationProtocol, FailoverPolicy, LacpEngine,
    LacpPolicy, LoadBalancePolicy, RoundRobinPolicy, RxDisposition, StaticLacpEngine,
};
pub use port::{MemberPort, PortSet, TRUNK_MAX_PORTS, TRUNK_MAX_STACKING};
pub use registry::TrunkRegistry;
pub use sim::SimInterface;
pub use status::{PortStatus, TrunkStats, TrunkStatus};
pub use trunk::{Trunk, TrunkConfig};
