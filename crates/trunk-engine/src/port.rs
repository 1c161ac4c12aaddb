//! Member-port records and the ordered port set.

use crate::capabilities::Capabilities;
use crate::flags::{flag_transition, FlagAction, FlagOrigin};
use crate::iface::{InterfaceFlag, InterfaceKind, PhysicalInterface};
use std::sync::Arc;
use trunk_types::{LinkState, MacAddress};

/// Maximum number of member ports per trunk.
pub const TRUNK_MAX_PORTS: usize = 32;

/// Maximum trunk-in-trunk stacking depth.
pub const TRUNK_MAX_STACKING: usize = 4;

/// One physical interface bound into a trunk.
///
/// The underlying interface is borrowed, never owned: everything the trunk
/// changes on it (link-layer address, type marker, flags, multicast
/// memberships) is saved here and restored on detach.
pub struct MemberPort {
    alias: String,
    iface: Arc<dyn PhysicalInterface>,
    saved_link_addr: MacAddress,
    saved_capabilities: Capabilities,
    saved_kind: InterfaceKind,
    link: LinkState,
    promiscuous: FlagOrigin,
    all_multicast: FlagOrigin,
    joined_groups: Vec<MacAddress>,
}

impl MemberPort {
    /// Wraps an interface, capturing the originals to restore later.
    pub(crate) fn new(iface: Arc<dyn PhysicalInterface>) -> Self {
        let alias = iface.name().to_string();
        let saved_link_addr = iface.link_addr();
        let saved_capabilities = iface.capabilities();
        let saved_kind = iface.kind();
        MemberPort {
            alias,
            iface,
            saved_link_addr,
            saved_capabilities,
            saved_kind,
            link: LinkState::Down,
            promiscuous: FlagOrigin::NotSetByTrunk,
            all_multicast: FlagOrigin::NotSetByTrunk,
            joined_groups: Vec::new(),
        }
    }

    /// The interface name this port wraps.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Shared handle to the underlying interface.
    pub fn iface(&self) -> &Arc<dyn PhysicalInterface> {
        &self.iface
    }

    /// Last pushed link state.
    pub fn link(&self) -> LinkState {
        self.link
    }

    pub(crate) fn set_link(&mut self, state: LinkState) {
        self.link = state;
    }

    /// Capability mask captured at attach time; never mutated afterwards.
    pub fn capabilities(&self) -> Capabilities {
        self.saved_capabilities
    }

    /// Link-layer address captured at attach time.
    pub fn saved_link_addr(&self) -> MacAddress {
        self.saved_link_addr
    }

    /// Origin marker for one mirrored flag.
    pub fn flag_origin(&self, flag: InterfaceFlag) -> FlagOrigin {
        match flag {
            InterfaceFlag::Promiscuous => self.promiscuous,
            InterfaceFlag::AllMulticast => self.all_multicast,
        }
    }

    /// Drives one mirrored flag toward `desired`, touching the driver at
    /// most once.
    pub(crate) fn apply_flag(&mut self, flag: InterfaceFlag, desired: bool) {
        let origin = self.flag_origin(flag);
        let currently_set = self.iface.flag(flag);
        let (next, action) = flag_transition(origin, currently_set, desired);
        match action {
            Some(FlagAction::Set) => self.iface.set_flag(flag, true),
            Some(FlagAction::Clear) => self.iface.set_flag(flag, false),
            None => {}
        }
        match flag {
            InterfaceFlag::Promiscuous => self.promiscuous = next,
            InterfaceFlag::AllMulticast => self.all_multicast = next,
        }
    }

    /// Joins `group` on the member and records the trunk as the cause.
    pub(crate) fn join_group(&mut self, group: MacAddress) {
        if !self.joined_groups.contains(&group) {
            self.iface.join_multicast(group);
            self.joined_groups.push(group);
        }
    }

    /// Leaves `group` if the trunk caused the membership.
    pub(crate) fn leave_group(&mut self, group: MacAddress) {
        if let Some(pos) = self.joined_groups.iter().position(|g| *g == group) {
            self.joined_groups.remove(pos);
            self.iface.leave_multicast(group);
        }
    }

    /// Leaves every trunk-caused group membership.
    pub(crate) fn leave_all_groups(&mut self) {
        for group in self.joined_groups.drain(..) {
            self.iface.leave_multicast(group);
        }
    }

    /// Restores everything the trunk changed on the interface.
    pub(crate) fn restore(&mut self) {
        self.leave_all_groups();
        self.apply_flag(InterfaceFlag::Promiscuous, false);
        self.apply_flag(InterfaceFlag::AllMulticast, false);
        self.iface.set_kind(self.saved_kind);
        self.iface.set_link_addr(self.saved_link_addr);
    }
}

impl std::fmt::Debug for MemberPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberPort")
            .field("alias", &self.alias)
            .field("link", &self.link)
            .field("saved_link_addr", &self.saved_link_addr)
            .field("saved_capabilities", &self.saved_capabilities)
            .finish()
    }
}

/// The ordered set of member ports of one trunk.
///
/// Order is attach order; the first entry is the primary port. This is the
/// view aggregation policies operate on while the trunk lock is held.
#[derive(Debug)]
pub struct PortSet {
    trunk: String,
    ports: Vec<MemberPort>,
}

impl PortSet {
    pub(crate) fn new(trunk: &str) -> Self {
        PortSet {
            trunk: trunk.to_string(),
            ports: Vec::new(),
        }
    }

    /// Name of the owning trunk.
    pub fn trunk_name(&self) -> &str {
        &self.trunk
    }

    /// Number of member ports.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// True when no ports are attached.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Iterates members in attach order.
    pub fn iter(&self) -> std::slice::Iter<'_, MemberPort> {
        self.ports.iter()
    }

    /// The primary port (first in attach order).
    pub fn primary(&self) -> Option<&MemberPort> {
        self.ports.first()
    }

    /// Looks up a member by interface name.
    pub fn get(&self, alias: &str) -> Option<&MemberPort> {
        self.ports.iter().find(|p| p.alias() == alias)
    }

    pub(crate) fn get_mut(&mut self, alias: &str) -> Option<&mut MemberPort> {
        self.ports.iter_mut().find(|p| p.alias() == alias)
    }

    /// Position of a member in attach order.
    pub fn index_of(&self, alias: &str) -> Option<usize> {
        self.ports.iter().position(|p| p.alias() == alias)
    }

    /// Member at a given position.
    pub fn at(&self, index: usize) -> Option<&MemberPort> {
        self.ports.get(index)
    }

    /// First member reporting link-up.
    pub fn first_link_up(&self) -> Option<&MemberPort> {
        self.ports.iter().find(|p| p.link().is_up())
    }

    /// Member aliases in attach order.
    pub fn aliases(&self) -> Vec<String> {
        self.ports.iter().map(|p| p.alias().to_string()).collect()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, MemberPort> {
        self.ports.iter_mut()
    }

    pub(crate) fn push(&mut self, port: MemberPort) {
        self.ports.push(port);
    }

    pub(crate) fn remove(&mut self, alias: &str) -> Option<MemberPort> {
        let pos = self.index_of(alias)?;
        Some(self.ports.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimInterface;
    use pretty_assertions::assert_eq;

    fn port(name: &str) -> MemberPort {
        let iface = SimInterface::new(name, MacAddress::new([2, 0, 0, 0, 0, 1]));
        MemberPort::new(iface)
    }

    #[test]
    fn test_attach_order_and_primary() {
        let mut set = PortSet::new("trunk0");
        assert!(set.primary().is_none());

        set.push(port("eth0"));
        set.push(port("eth1"));
        assert_eq!(set.primary().map(|p| p.alias().to_string()), Some("eth0".into()));
        assert_eq!(set.aliases(), vec!["eth0".to_string(), "eth1".to_string()]);

        set.remove("eth0");
        assert_eq!(set.primary().map(|p| p.alias().to_string()), Some("eth1".into()));
    }

    #[test]
    fn test_lookup() {
        let mut set = PortSet::new("trunk0");
        set.push(port("eth0"));
        assert!(set.get("eth0").is_some());
        assert!(set.get("eth9").is_none());
        assert_eq!(set.index_of("eth0"), Some(0));
    }

    #[test]
    fn test_group_bookkeeping() {
        let mut p = port("eth0");
        let g = MacAddress::new([0x01, 0x00, 0x5e, 0, 0, 1]);
        p.join_group(g);
        p.join_group(g); // idempotent
        assert_eq!(p.joined_groups.len(), 1);
        p.leave_group(g);
        assert!(p.joined_groups.is_empty());
    }
}
