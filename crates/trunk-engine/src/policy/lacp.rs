//! 802.3ad LACP integration boundary.
//!
//! The real LACP state machine (actor/partner records, periodic and churn
//! timers, marker responder) lives behind [`LacpEngine`]; the policy here
//! only routes control frames into it and gates the data path on its
//! collecting/aggregator answers. [`StaticLacpEngine`] is the in-tree
//! stand-in: every link-up member collects in a single aggregator and
//! distribution is by flow hash.

use super::{AggregationPolicy, AggregationProtocol, RxDisposition};
use crate::error::{TrunkError, TrunkResult};
use crate::frame::{Frame, SLOW_SUBTYPE_LACP, SLOW_SUBTYPE_MARKER};
use crate::hash::flow_hash;
use crate::port::PortSet;
use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, trace};
use trunk_types::LinkState;

/// The external 802.3ad control-protocol engine.
///
/// Every call is made with the owning trunk's lock held; implementations
/// must not call back into trunk-level attach/detach.
pub trait LacpEngine: Send {
    /// The protocol machine becomes active for `ports`.
    fn attach(&mut self, ports: &PortSet) -> TrunkResult<()>;

    /// The protocol machine is being torn down.
    fn detach(&mut self);

    /// A member joined the trunk.
    fn port_create(&mut self, ports: &PortSet, alias: &str) -> TrunkResult<()>;

    /// A member is leaving the trunk.
    fn port_destroy(&mut self, alias: &str);

    /// One received LACPDU.
    fn lacpdu_input(&mut self, alias: &str, frame: &Frame);

    /// One received Marker PDU.
    fn marker_input(&mut self, alias: &str, frame: &Frame);

    /// Pushed link-state change on a member.
    fn link_state_changed(&mut self, alias: &str, state: LinkState);

    /// Picks the distributing port for one outbound frame.
    fn select_tx_port(&mut self, ports: &PortSet, frame: &Frame) -> Option<String>;

    /// Whether the member's collecting flag is set.
    fn is_collecting(&self, alias: &str) -> bool;

    /// Whether the member belongs to the currently-selected active
    /// aggregator.
    fn in_active_aggregator(&self, alias: &str) -> bool;
}

/// LACP aggregation policy: a thin adapter over a [`LacpEngine`].
pub struct LacpPolicy {
    engine: Box<dyn LacpEngine>,
}

impl LacpPolicy {
    /// Wraps an engine.
    pub fn new(engine: Box<dyn LacpEngine>) -> Self {
        LacpPolicy { engine }
    }
}

impl std::fmt::Debug for LacpPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LacpPolicy").finish_non_exhaustive()
    }
}

impl AggregationPolicy for LacpPolicy {
    fn protocol(&self) -> AggregationProtocol {
        AggregationProtocol::Lacp
    }

    fn attach(&mut self, ports: &mut PortSet) -> TrunkResult<()> {
        self.engine.attach(ports)?;
        for alias in ports.aliases() {
            self.port_create(ports, &alias)?;
        }
        Ok(())
    }

    fn detach(&mut self, _ports: &mut PortSet) -> TrunkResult<()> {
        self.engine.detach();
        Ok(())
    }

    fn port_create(&mut self, ports: &mut PortSet, alias: &str) -> TrunkResult<()> {
        self.engine.port_create(ports, alias)
    }

    fn port_destroy(&mut self, _ports: &mut PortSet, alias: &str) {
        self.engine.port_destroy(alias);
    }

    fn transmit_select(&mut self, ports: &PortSet, frame: &Frame) -> TrunkResult<String> {
        self.engine
            .select_tx_port(ports, frame)
            .ok_or_else(|| TrunkError::NoActivePort(ports.trunk_name().to_string()))
    }

    fn receive_validate(
        &mut self,
        _ports: &PortSet,
        ingress: &str,
        frame: Frame,
    ) -> RxDisposition {
        // Control-plane frames are consumed here, never surfaced.
        match frame.slow_subtype() {
            Some(SLOW_SUBTYPE_LACP) => {
                trace!(port = ingress, "LACPDU in");
                self.engine.lacpdu_input(ingress, &frame);
                return RxDisposition::Consumed;
            }
            Some(SLOW_SUBTYPE_MARKER) => {
                trace!(port = ingress, "marker PDU in");
                self.engine.marker_input(ingress, &frame);
                return RxDisposition::Consumed;
            }
            _ => {}
        }

        if self.engine.is_collecting(ingress) && self.engine.in_active_aggregator(ingress)
        {
            RxDisposition::Accept(frame)
        } else {
            RxDisposition::Drop
        }
    }

    fn link_state_changed(&mut self, _ports: &PortSet, alias: &str, state: LinkState) {
        self.engine.link_state_changed(alias, state);
    }
}

/// Static stand-in for a full 802.3ad machine.
///
/// Every link-up member is treated as collecting and distributing inside
/// one aggregator; LACPDUs and markers are counted and otherwise ignored.
#[derive(Debug)]
pub struct StaticLacpEngine {
    seed: u32,
    link: HashMap<String, LinkState>,
    pdus_seen: u64,
}

impl StaticLacpEngine {
    /// Creates the engine with a random distribution seed.
    pub fn new() -> Self {
        Self::with_seed(rand::thread_rng().gen())
    }

    /// Creates the engine with a fixed distribution seed.
    pub fn with_seed(seed: u32) -> Self {
        StaticLacpEngine {
            seed,
            link: HashMap::new(),
            pdus_seen: 0,
        }
    }

    /// Number of control PDUs handed in so far.
    pub fn pdus_seen(&self) -> u64 {
        self.pdus_seen
    }
}

impl Default for StaticLacpEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LacpEngine for StaticLacpEngine {
    fn attach(&mut self, ports: &PortSet) -> TrunkResult<()> {
        self.link = ports
            .iter()
            .map(|p| (p.alias().to_string(), p.link()))
            .collect();
        Ok(())
    }

    fn detach(&mut self) {
        self.link.clear();
    }

    fn port_create(&mut self, ports: &PortSet, alias: &str) -> TrunkResult<()> {
        let state = ports.get(alias).map(|p| p.link()).unwrap_or_default();
        self.link.insert(alias.to_string(), state);
        Ok(())
    }

    fn port_destroy(&mut self, alias: &str) {
        self.link.remove(alias);
    }

    fn lacpdu_input(&mut self, alias: &str, _frame: &Frame) {
        self.pdus_seen += 1;
        debug!(port = alias, "static engine ignoring LACPDU");
    }

    fn marker_input(&mut self, alias: &str, _frame: &Frame) {
        self.pdus_seen += 1;
        debug!(port = alias, "static engine ignoring marker");
    }

    fn link_state_changed(&mut self, alias: &str, state: LinkState) {
        if let Some(entry) = self.link.get_mut(alias) {
            *entry = state;
        }
    }

    fn select_tx_port(&mut self, ports: &PortSet, frame: &Frame) -> Option<String> {
        let candidates: Vec<&str> = ports
            .iter()
            .filter(|p| p.link().is_up())
            .map(|p| p.alias())
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let h = flow_hash(frame, self.seed) as usize;
        Some(candidates[h % candidates.len()].to_string())
    }

    fn is_collecting(&self, alias: &str) -> bool {
        self.link.get(alias).is_some_and(|s| s.is_up())
    }

    fn in_active_aggregator(&self, alias: &str) -> bool {
        self.link.contains_key(alias)
    }
}
