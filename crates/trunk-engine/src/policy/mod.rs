//! Pluggable aggregation policies.
//!
//! Each trunk holds exactly one boxed policy at a time. Switching protocols
//! fully detaches the old policy before the new one attaches, and the new
//! policy's `attach` rebuilds all per-port state from scratch by invoking
//! its own `port_create` for every current member.
//!
//! Every hook runs with the trunk lock held; policies therefore need no
//! locking of their own, and must never call back into trunk-level
//! attach/detach while a hook is executing.

mod failover;
mod lacp;
mod load_balance;
mod round_robin;

pub use failover::FailoverPolicy;
pub use lacp::{LacpEngine, LacpPolicy, StaticLacpEngine};
pub use load_balance::LoadBalancePolicy;
pub use round_robin::RoundRobinPolicy;

use crate::error::{TrunkError, TrunkResult};
use crate::frame::Frame;
use crate::port::PortSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use trunk_types::LinkState;

/// The aggregation protocol configured on a trunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationProtocol {
    /// No aggregation; the trunk carries no traffic.
    #[default]
    None,
    /// Rotate over link-up members per frame.
    RoundRobin,
    /// Primary port with hot-standby backups.
    Failover,
    /// Flow-hash distribution over all members.
    LoadBalance,
    /// Cisco-style static aggregation; same distribution as load-balance.
    EtherChannel,
    /// 802.3ad dynamic aggregation via an external LACP engine.
    Lacp,
}

impl fmt::Display for AggregationProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::RoundRobin => write!(f, "roundrobin"),
            Self::Failover => write!(f, "failover"),
            Self::LoadBalance => write!(f, "loadbalance"),
            Self::EtherChannel => write!(f, "etherchannel"),
            Self::Lacp => write!(f, "lacp"),
        }
    }
}

impl FromStr for AggregationProtocol {
    type Err = TrunkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "roundrobin" | "round-robin" => Ok(Self::RoundRobin),
            "failover" => Ok(Self::Failover),
            "loadbalance" | "load-balance" => Ok(Self::LoadBalance),
            "etherchannel" => Ok(Self::EtherChannel),
            "lacp" => Ok(Self::Lacp),
            _ => Err(TrunkError::UnsupportedProtocol(s.to_string())),
        }
    }
}

/// What the receive path should do with one inbound frame.
#[derive(Debug)]
pub enum RxDisposition {
    /// Accept into the aggregate's inbound stream.
    Accept(Frame),
    /// A control frame the policy consumed (LACPDU, Marker); never
    /// surfaced to the data path.
    Consumed,
    /// Silently drop.
    Drop,
}

/// The contract every aggregation policy implements.
///
/// `port_create`/`port_destroy`/`link_state_changed` default to no-ops for
/// policies that keep no per-port state.
pub trait AggregationPolicy: Send {
    /// Which protocol this policy implements.
    fn protocol(&self) -> AggregationProtocol;

    /// Called when the policy becomes active. Must build all per-port
    /// state by running `port_create` for every current member.
    fn attach(&mut self, ports: &mut PortSet) -> TrunkResult<()>;

    /// Called when the policy is replaced or the trunk is destroyed. Must
    /// leave no dangling per-port state.
    fn detach(&mut self, ports: &mut PortSet) -> TrunkResult<()>;

    /// Called after a port joins the trunk (and from `attach` for every
    /// existing member).
    fn port_create(&mut self, _ports: &mut PortSet, _alias: &str) -> TrunkResult<()> {
        Ok(())
    }

    /// Called before a port's record disappears; policies evict the port
    /// from internal scheduling tables here. The port is still in the set.
    fn port_destroy(&mut self, _ports: &mut PortSet, _alias: &str) {}

    /// Picks the member port to carry one outbound frame.
    fn transmit_select(&mut self, ports: &PortSet, frame: &Frame) -> TrunkResult<String>;

    /// Decides whether one inbound frame belongs to the aggregate.
    fn receive_validate(&mut self, ports: &PortSet, ingress: &str, frame: Frame)
        -> RxDisposition;

    /// Pushed link-state change on a member.
    fn link_state_changed(&mut self, _ports: &PortSet, _alias: &str, _state: LinkState) {}
}

/// Instantiates the policy for a protocol, or `None` for
/// `AggregationProtocol::None`.
pub fn policy_for(proto: AggregationProtocol) -> Option<Box<dyn AggregationPolicy>> {
    match proto {
        AggregationProtocol::None => None,
        AggregationProtocol::RoundRobin => Some(Box::new(RoundRobinPolicy::new())),
        AggregationProtocol::Failover => Some(Box::new(FailoverPolicy::new())),
        AggregationProtocol::LoadBalance => Some(Box::new(LoadBalancePolicy::new())),
        AggregationProtocol::EtherChannel => {
            Some(Box::new(LoadBalancePolicy::new()))
        }
        AggregationProtocol::Lacp => {
            Some(Box::new(LacpPolicy::new(Box::new(StaticLacpEngine::new()))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_protocol_parse() {
        assert_eq!(
            "roundrobin".parse::<AggregationProtocol>().unwrap(),
            AggregationProtocol::RoundRobin
        );
        assert_eq!(
            "load-balance".parse::<AggregationProtocol>().unwrap(),
            AggregationProtocol::LoadBalance
        );
        assert_eq!(
            "LACP".parse::<AggregationProtocol>().unwrap(),
            AggregationProtocol::Lacp
        );
        assert!(matches!(
            "hashbrown".parse::<AggregationProtocol>(),
            Err(TrunkError::UnsupportedProtocol(_))
        ));
    }

    #[test]
    fn test_policy_for() {
        assert!(policy_for(AggregationProtocol::None).is_none());
        for proto in [
            AggregationProtocol::RoundRobin,
            AggregationProtocol::Failover,
            AggregationProtocol::LoadBalance,
            AggregationProtocol::EtherChannel,
            AggregationProtocol::Lacp,
        ] {
            assert!(policy_for(proto).is_some());
        }
        // EtherChannel is served by the load-balance policy.
        let p = policy_for(AggregationProtocol::EtherChannel).unwrap();
        assert_eq!(p.protocol(), AggregationProtocol::LoadBalance);
    }
}
