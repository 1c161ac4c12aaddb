//! The trunk itself: member lifecycle, data path and state mirroring.

use crate::capabilities::Capabilities;
use crate::error::{TrunkError, TrunkResult};
use crate::flags::FlagOrigin;
use crate::frame::Frame;
use crate::iface::{InterfaceFlag, InterfaceKind, MediaType, PhysicalInterface};
use crate::policy::{policy_for, AggregationPolicy, AggregationProtocol, RxDisposition};
use crate::port::{MemberPort, PortSet, TRUNK_MAX_PORTS};
use crate::status::{PortStatus, TrunkStats, TrunkStatus};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use trunk_types::{LinkState, MacAddress};

/// Static trunk configuration.
#[derive(Debug, Clone)]
pub struct TrunkConfig {
    /// Capability mask advertised while the trunk has no members.
    pub private_capabilities: Capabilities,
    /// Whether member link-state transitions are logged.
    pub log_state_changes: bool,
}

impl Default for TrunkConfig {
    fn default() -> Self {
        TrunkConfig {
            private_capabilities: Capabilities::FULL_DUPLEX,
            log_state_changes: true,
        }
    }
}

struct TrunkInner {
    ports: PortSet,
    policy: Option<Box<dyn AggregationPolicy>>,
    protocol: AggregationProtocol,
    lladdr: Option<MacAddress>,
    lladdr_explicit: bool,
    kind: InterfaceKind,
    capabilities: Capabilities,
    config: TrunkConfig,
    promiscuous: bool,
    all_multicast: bool,
    multicast_groups: Vec<MacAddress>,
    stats: TrunkStats,
}

impl TrunkInner {
    /// Effective mask: AND over members, or the private mask at zero ports.
    fn recompute_capabilities(&mut self) {
        self.capabilities = if self.ports.is_empty() {
            self.config.private_capabilities
        } else {
            self.ports
                .iter()
                .fold(Capabilities::ALL, |acc, p| acc & p.capabilities())
        };
    }

    /// Pushes the trunk link-layer address onto every member.
    fn propagate_lladdr(&mut self) {
        if let Some(addr) = self.lladdr {
            for port in self.ports.iter() {
                port.iface().set_link_addr(addr);
            }
        }
    }
}

/// One aggregate interface.
///
/// All state lives behind a single non-reentrant mutex; the only work done
/// outside it is the final frame handoff to a member driver.
pub struct Trunk {
    name: String,
    inner: Mutex<TrunkInner>,
}

impl Trunk {
    /// Creates an empty trunk with no protocol configured.
    pub fn new(name: &str, config: TrunkConfig) -> Self {
        let capabilities = config.private_capabilities;
        Trunk {
            name: name.to_string(),
            inner: Mutex::new(TrunkInner {
                ports: PortSet::new(name),
                policy: None,
                protocol: AggregationProtocol::None,
                lladdr: None,
                lladdr_explicit: false,
                kind: InterfaceKind::Ethernet,
                capabilities,
                config,
                promiscuous: false,
                all_multicast: false,
                multicast_groups: Vec::new(),
                stats: TrunkStats::default(),
            }),
        }
    }

    /// Trunk name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, TrunkInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Capacity and busy checks, without mutating anything.
    ///
    /// Precondition order is fixed: port count, then busy, then (in
    /// `attach_port` and the registry) ownership, media, stacking. The
    /// registry runs this first so a multi-violation attach reports the
    /// earliest violated precondition.
    pub(crate) fn check_attach_preconditions(
        &self,
        iface: &dyn PhysicalInterface,
    ) -> TrunkResult<()> {
        if self.lock().ports.len() >= TRUNK_MAX_PORTS {
            return Err(TrunkError::TooManyPorts {
                trunk: self.name.clone(),
                max: TRUNK_MAX_PORTS,
            });
        }
        if iface.is_busy() {
            return Err(TrunkError::PortBusy(iface.name().to_string()));
        }
        Ok(())
    }

    /// Binds an interface as a new member port.
    ///
    /// On any failure the interface is left exactly as it was found.
    pub fn attach_port(&self, iface: Arc<dyn PhysicalInterface>) -> TrunkResult<()> {
        let mut inner = self.lock();

        if inner.ports.len() >= TRUNK_MAX_PORTS {
            return Err(TrunkError::TooManyPorts {
                trunk: self.name.clone(),
                max: TRUNK_MAX_PORTS,
            });
        }
        if iface.is_busy() {
            return Err(TrunkError::PortBusy(iface.name().to_string()));
        }
        if inner.ports.get(iface.name()).is_some() {
            return Err(TrunkError::AlreadyBound {
                iface: iface.name().to_string(),
                trunk: self.name.clone(),
            });
        }
        if iface.media() != MediaType::Ethernet {
            return Err(TrunkError::UnsupportedMediaType {
                iface: iface.name().to_string(),
                media: iface.media(),
            });
        }

        let alias = iface.name().to_string();
        let mut port = MemberPort::new(iface);

        if inner.ports.is_empty() && !inner.lladdr_explicit {
            // First member: the trunk adopts its address.
            inner.lladdr = Some(port.saved_link_addr());
        } else if let Some(addr) = inner.lladdr {
            port.iface().set_link_addr(addr);
        }
        port.iface().set_kind(InterfaceKind::AggregateMember);

        let promiscuous = inner.promiscuous;
        let all_multicast = inner.all_multicast;
        port.apply_flag(InterfaceFlag::Promiscuous, promiscuous);
        port.apply_flag(InterfaceFlag::AllMulticast, all_multicast);
        let groups = inner.multicast_groups.clone();
        for group in groups {
            port.join_group(group);
        }

        inner.ports.push(port);
        inner.recompute_capabilities();

        let TrunkInner { ports, policy, .. } = &mut *inner;
        if let Some(policy) = policy.as_mut() {
            if let Err(e) = policy.port_create(ports, &alias) {
                // Unwind: the member never joined.
                policy.port_destroy(ports, &alias);
                if let Some(mut port) = inner.ports.remove(&alias) {
                    port.restore();
                }
                self.rederive_lladdr(&mut inner);
                inner.recompute_capabilities();
                return Err(e);
            }
        }

        debug!(trunk = %self.name, port = %alias, "port attached");
        Ok(())
    }

    /// Unbinds a member port, restoring everything changed on it.
    pub fn detach_port(&self, alias: &str) -> TrunkResult<()> {
        let mut inner = self.lock();
        self.detach_port_locked(&mut inner, alias)
    }

    fn detach_port_locked(&self, inner: &mut TrunkInner, alias: &str) -> TrunkResult<()> {
        if inner.ports.get(alias).is_none() {
            return Err(TrunkError::PortNotFound {
                trunk: self.name.clone(),
                port: alias.to_string(),
            });
        }

        let TrunkInner { ports, policy, .. } = &mut *inner;
        if let Some(policy) = policy.as_mut() {
            policy.port_destroy(ports, alias);
        }

        let was_primary = inner.ports.index_of(alias) == Some(0);
        if let Some(mut port) = inner.ports.remove(alias) {
            port.restore();
        }
        if was_primary {
            self.rederive_lladdr(inner);
        }
        inner.recompute_capabilities();

        debug!(trunk = %self.name, port = %alias, "port detached");
        Ok(())
    }

    /// Re-adopts the primary member's address after a primary change.
    fn rederive_lladdr(&self, inner: &mut TrunkInner) {
        if inner.lladdr_explicit {
            return;
        }
        inner.lladdr = inner.ports.primary().map(|p| p.saved_link_addr());
        inner.propagate_lladdr();
    }

    /// Switches the aggregation protocol, rebuilding all policy state.
    ///
    /// On attach failure the trunk is left with no protocol configured.
    pub fn set_protocol(&self, proto: AggregationProtocol) -> TrunkResult<()> {
        let mut inner = self.lock();
        let TrunkInner { ports, policy, .. } = &mut *inner;

        if let Some(mut old) = policy.take() {
            if let Err(e) = old.detach(ports) {
                warn!(trunk = %self.name, error = %e, "old policy detach failed");
            }
        }
        inner.protocol = AggregationProtocol::None;

        let Some(mut new_policy) = policy_for(proto) else {
            return Ok(());
        };
        let TrunkInner { ports, policy, .. } = &mut *inner;
        if let Err(e) = new_policy.attach(ports) {
            return Err(TrunkError::PolicyAttachFailed {
                trunk: self.name.clone(),
                reason: e.to_string(),
            });
        }
        *policy = Some(new_policy);
        inner.protocol = proto;
        info!(trunk = %self.name, protocol = %proto, "protocol configured");
        Ok(())
    }

    /// Installs a caller-built policy (e.g. a custom LACP engine wrapper).
    pub fn install_policy(
        &self,
        mut new_policy: Box<dyn AggregationPolicy>,
    ) -> TrunkResult<()> {
        let mut inner = self.lock();
        let TrunkInner { ports, policy, .. } = &mut *inner;
        if let Some(mut old) = policy.take() {
            if let Err(e) = old.detach(ports) {
                warn!(trunk = %self.name, error = %e, "old policy detach failed");
            }
        }
        let proto = new_policy.protocol();
        new_policy.attach(ports).map_err(|e| TrunkError::PolicyAttachFailed {
            trunk: self.name.clone(),
            reason: e.to_string(),
        })?;
        *policy = Some(new_policy);
        inner.protocol = proto;
        Ok(())
    }

    /// Sends one frame out of the aggregate.
    ///
    /// The frame is handed to the driver outside the trunk lock.
    pub fn enqueue_outbound(&self, frame: Frame) -> TrunkResult<()> {
        let iface = {
            let mut inner = self.lock();
            let TrunkInner { ports, policy, stats, .. } = &mut *inner;
            let Some(policy) = policy.as_mut() else {
                stats.tx_errors += 1;
                return Err(TrunkError::NoActivePort(self.name.clone()));
            };
            let alias = match policy.transmit_select(ports, &frame) {
                Ok(alias) => alias,
                Err(e) => {
                    stats.tx_errors += 1;
                    return Err(e);
                }
            };
            match ports.get(&alias) {
                Some(port) => Arc::clone(port.iface()),
                None => {
                    stats.tx_errors += 1;
                    return Err(TrunkError::PortNotFound {
                        trunk: self.name.clone(),
                        port: alias,
                    });
                }
            }
        };

        let result = iface.transmit(&frame);
        let mut inner = self.lock();
        match &result {
            Ok(()) => {
                inner.stats.tx_frames += 1;
                inner.stats.tx_bytes += frame.len() as u64;
            }
            Err(_) => inner.stats.tx_errors += 1,
        }
        result
    }

    /// Runs one frame received on member `ingress` through the active
    /// policy. Returns the frame re-attributed to the aggregate if it was
    /// accepted.
    pub fn inbound_from_port(&self, ingress: &str, frame: Frame) -> Option<Frame> {
        let mut inner = self.lock();
        let TrunkInner { ports, policy, stats, .. } = &mut *inner;

        if ports.get(ingress).is_none() {
            stats.rx_dropped += 1;
            return None;
        }
        let Some(policy) = policy.as_mut() else {
            stats.rx_dropped += 1;
            return None;
        };

        match policy.receive_validate(ports, ingress, frame) {
            RxDisposition::Accept(mut frame) => {
                stats.rx_frames += 1;
                frame.set_ingress(&self.name);
                Some(frame)
            }
            RxDisposition::Consumed => {
                stats.rx_control += 1;
                None
            }
            RxDisposition::Drop => {
                stats.rx_dropped += 1;
                None
            }
        }
    }

    /// Pushes a member link-state change into the trunk.
    pub fn notify_link_state(&self, alias: &str, state: LinkState) {
        let mut inner = self.lock();
        let TrunkInner { ports, policy, config, .. } = &mut *inner;
        let Some(port) = ports.get_mut(alias) else {
            return;
        };
        if port.link() == state {
            return;
        }
        port.set_link(state);
        if config.log_state_changes {
            info!(trunk = %self.name, port = %alias, state = %state, "member link state");
        }
        if let Some(policy) = policy.as_mut() {
            policy.link_state_changed(ports, alias, state);
        }
    }

    /// Sets promiscuous mode on the trunk, mirrored to every member.
    pub fn set_promiscuous(&self, on: bool) {
        let mut inner = self.lock();
        inner.promiscuous = on;
        for port in inner.ports.iter_mut() {
            port.apply_flag(InterfaceFlag::Promiscuous, on);
        }
    }

    /// Sets all-multicast mode on the trunk, mirrored to every member.
    pub fn set_all_multicast(&self, on: bool) {
        let mut inner = self.lock();
        inner.all_multicast = on;
        for port in inner.ports.iter_mut() {
            port.apply_flag(InterfaceFlag::AllMulticast, on);
        }
    }

    /// Joins a multicast group on the trunk and every member.
    pub fn join_multicast_group(&self, group: MacAddress) {
        let mut inner = self.lock();
        if !inner.multicast_groups.contains(&group) {
            inner.multicast_groups.push(group);
        }
        for port in inner.ports.iter_mut() {
            port.join_group(group);
        }
    }

    /// Leaves a multicast group on the trunk and every member.
    pub fn leave_multicast_group(&self, group: MacAddress) {
        let mut inner = self.lock();
        inner.multicast_groups.retain(|g| *g != group);
        for port in inner.ports.iter_mut() {
            port.leave_group(group);
        }
    }

    /// Replaces the full multicast membership set: every trunk-caused
    /// membership is purged from the members and the new set joined.
    pub fn sync_multicast(&self, groups: &[MacAddress]) {
        let mut inner = self.lock();
        for port in inner.ports.iter_mut() {
            port.leave_all_groups();
        }
        inner.multicast_groups = groups.to_vec();
        for port in inner.ports.iter_mut() {
            for group in groups {
                port.join_group(*group);
            }
        }
    }

    /// Pins the trunk link-layer address, overriding member adoption.
    pub fn set_lladdr(&self, addr: MacAddress) {
        let mut inner = self.lock();
        inner.lladdr = Some(addr);
        inner.lladdr_explicit = true;
        inner.propagate_lladdr();
    }

    /// Snapshot of configuration, members and counters.
    pub fn status(&self) -> TrunkStatus {
        let inner = self.lock();
        TrunkStatus {
            name: self.name.clone(),
            protocol: inner.protocol,
            link_addr: inner.lladdr,
            capabilities: inner.capabilities,
            ports: inner
                .ports
                .iter()
                .enumerate()
                .map(|(i, p)| PortStatus {
                    name: p.alias().to_string(),
                    link: p.link(),
                    primary: i == 0,
                    promiscuous: p.flag_origin(InterfaceFlag::Promiscuous)
                        == FlagOrigin::SetByTrunk,
                    all_multicast: p.flag_origin(InterfaceFlag::AllMulticast)
                        == FlagOrigin::SetByTrunk,
                })
                .collect(),
            stats: inner.stats,
        }
    }

    /// Detaches every member and drops the policy. Errors are logged, not
    /// propagated: teardown always completes.
    pub fn teardown(&self) {
        let mut inner = self.lock();
        while let Some(alias) = inner.ports.primary().map(|p| p.alias().to_string()) {
            if let Err(e) = self.detach_port_locked(&mut inner, &alias) {
                warn!(trunk = %self.name, port = %alias, error = %e, "teardown detach failed");
                break;
            }
        }
        let TrunkInner { ports, policy, .. } = &mut *inner;
        if let Some(mut policy) = policy.take() {
            if let Err(e) = policy.detach(ports) {
                warn!(trunk = %self.name, error = %e, "teardown policy detach failed");
            }
        }
        inner.protocol = AggregationProtocol::None;
    }

    /// Shared handle to a member's interface, for control-frame bypass.
    pub(crate) fn port_iface(&self, alias: &str) -> Option<Arc<dyn PhysicalInterface>> {
        let inner = self.lock();
        inner.ports.get(alias).map(|p| Arc::clone(p.iface()))
    }

    /// Member names in attach order.
    pub fn port_names(&self) -> Vec<String> {
        self.lock().ports.aliases()
    }
}

impl std::fmt::Debug for Trunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Trunk")
            .field("name", &self.name)
            .field("protocol", &inner.protocol)
            .field("ports", &inner.ports.aliases())
            .finish_non_exhaustive()
    }
}

/// A trunk is itself an interface, so trunks can stack: binding a trunk
/// into another trunk goes through the same member contract as a physical
/// port. Depth and cycle limits are enforced by the registry before this
/// surface is ever used for stacking.
impl PhysicalInterface for Trunk {
    fn name(&self) -> &str {
        &self.name
    }

    fn media(&self) -> MediaType {
        MediaType::Ethernet
    }

    fn is_busy(&self) -> bool {
        self.lock().kind == InterfaceKind::AggregateMember
    }

    fn link_addr(&self) -> MacAddress {
        self.lock().lladdr.unwrap_or(MacAddress::ZERO)
    }

    fn set_link_addr(&self, addr: MacAddress) {
        self.set_lladdr(addr);
    }

    fn capabilities(&self) -> Capabilities {
        self.lock().capabilities
    }

    fn kind(&self) -> InterfaceKind {
        self.lock().kind
    }

    fn set_kind(&self, kind: InterfaceKind) {
        self.lock().kind = kind;
    }

    fn flag(&self, flag: InterfaceFlag) -> bool {
        let inner = self.lock();
        match flag {
            InterfaceFlag::Promiscuous => inner.promiscuous,
            InterfaceFlag::AllMulticast => inner.all_multicast,
        }
    }

    fn set_flag(&self, flag: InterfaceFlag, on: bool) {
        match flag {
            InterfaceFlag::Promiscuous => self.set_promiscuous(on),
            InterfaceFlag::AllMulticast => self.set_all_multicast(on),
        }
    }

    fn join_multicast(&self, group: MacAddress) {
        self.join_multicast_group(group);
    }

    fn leave_multicast(&self, group: MacAddress) {
        self.leave_multicast_group(group);
    }

    fn transmit(&self, frame: &Frame) -> TrunkResult<()> {
        self.enqueue_outbound(frame.clone())
    }
}
