//! Integration tests for the trunking engine through the registry.
//!
//! These exercise the full administrative and data paths the way a daemon
//! would drive them: create a trunk, bind simulated interfaces, configure
//! a protocol, push link state, and run frames both directions.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use trunk_engine::{
    build_frame, flow_hash, AggregationProtocol, Capabilities, Frame, InterfaceFlag,
    InterfaceKind, LacpPolicy, PhysicalInterface, SimInterface, StaticLacpEngine,
    TrunkConfig, TrunkError, TrunkRegistry, ETHERTYPE_IPV4, ETHERTYPE_SLOW,
    SLOW_SUBTYPE_LACP,
};
use trunk_types::{LinkState, MacAddress};

fn sim(name: &str, last: u8) -> Arc<SimInterface> {
    SimInterface::new(name, MacAddress::new([2, 0, 0, 0, 0, last]))
}

fn ipv4_frame(src_mac: MacAddress, dst_mac: MacAddress, src: [u8; 4], dst: [u8; 4]) -> Frame {
    let mut payload = vec![0u8; 20];
    payload[12..16].copy_from_slice(&src);
    payload[16..20].copy_from_slice(&dst);
    build_frame(dst_mac, src_mac, ETHERTYPE_IPV4, &payload)
}

fn data_frame() -> Frame {
    ipv4_frame(
        MacAddress::new([2, 0, 0, 0, 0, 0xaa]),
        MacAddress::new([2, 0, 0, 0, 0, 0xbb]),
        [10, 0, 0, 1],
        [10, 0, 0, 5],
    )
}

/// Registry with one trunk and `n` link-up members named eth0..ethN.
fn trunk_with_ports(reg: &TrunkRegistry, n: u8) -> Vec<Arc<SimInterface>> {
    reg.create("trunk0", TrunkConfig::default()).unwrap();
    let mut ifaces = Vec::new();
    for i in 0..n {
        let iface = sim(&format!("eth{i}"), i + 1);
        reg.add_port("trunk0", iface.clone()).unwrap();
        reg.notify_link_state(&format!("eth{i}"), LinkState::Up);
        ifaces.push(iface);
    }
    ifaces
}

#[test]
fn test_round_robin_fairness_and_wraparound() {
    let reg = TrunkRegistry::new();
    let ifaces = trunk_with_ports(&reg, 3);
    reg.set_protocol("trunk0", "roundrobin").unwrap();

    let trunk = reg.trunk("trunk0").unwrap();
    for _ in 0..9 {
        trunk.enqueue_outbound(data_frame()).unwrap();
    }
    // Any window of N frames hits every member exactly once.
    for iface in &ifaces {
        assert_eq!(iface.transmitted_count(), 3);
    }
}

#[test]
fn test_round_robin_link_down_and_removal() {
    let reg = TrunkRegistry::new();
    let ifaces = trunk_with_ports(&reg, 3);
    let (a, b, c) = (&ifaces[0], &ifaces[1], &ifaces[2]);
    reg.set_protocol("trunk0", "roundrobin").unwrap();
    let trunk = reg.trunk("trunk0").unwrap();

    for _ in 0..4 {
        trunk.enqueue_outbound(data_frame()).unwrap();
    }
    assert_eq!(
        (a.transmitted_count(), b.transmitted_count(), c.transmitted_count()),
        (2, 1, 1)
    );

    // B goes down with the cursor pointing at it: the next frame skips to C.
    reg.notify_link_state("eth1", LinkState::Down);
    trunk.enqueue_outbound(data_frame()).unwrap();
    assert_eq!(c.transmitted_count(), 2);

    // Remove C: only A remains active.
    reg.remove_port("trunk0", "eth2").unwrap();
    trunk.enqueue_outbound(data_frame()).unwrap();
    assert_eq!(a.transmitted_count(), 3);
    assert_eq!(b.transmitted_count(), 1);
}

#[test]
fn test_failover_exclusivity_through_primary_cycle() {
    let reg = TrunkRegistry::new();
    let ifaces = trunk_with_ports(&reg, 2);
    let (a, b) = (&ifaces[0], &ifaces[1]);
    reg.set_protocol("trunk0", "failover").unwrap();
    let trunk = reg.trunk("trunk0").unwrap();

    // Primary up: everything rides eth0, and only eth0 frames are accepted.
    trunk.enqueue_outbound(data_frame()).unwrap();
    assert_eq!((a.transmitted_count(), b.transmitted_count()), (1, 0));
    assert!(trunk.inbound_from_port("eth0", data_frame()).is_some());
    assert!(trunk.inbound_from_port("eth1", data_frame()).is_none());

    // Primary down: the backup carries traffic both directions. Frames
    // arriving on the primary itself are still accepted.
    reg.notify_link_state("eth0", LinkState::Down);
    trunk.enqueue_outbound(data_frame()).unwrap();
    assert_eq!((a.transmitted_count(), b.transmitted_count()), (1, 1));
    assert!(trunk.inbound_from_port("eth1", data_frame()).is_some());
    assert!(trunk.inbound_from_port("eth0", data_frame()).is_some());

    // Primary back up: traffic snaps back, the backup is silenced again.
    reg.notify_link_state("eth0", LinkState::Up);
    trunk.enqueue_outbound(data_frame()).unwrap();
    assert_eq!((a.transmitted_count(), b.transmitted_count()), (2, 1));
    assert!(trunk.inbound_from_port("eth1", data_frame()).is_none());
}

#[test]
fn test_flow_hash_determinism_and_mac_swap() {
    let a = MacAddress::new([2, 0, 0, 0, 0, 0xaa]);
    let b = MacAddress::new([2, 0, 0, 0, 0, 0xbb]);
    let f1 = ipv4_frame(a, b, [10, 0, 0, 1], [10, 0, 0, 5]);
    let f2 = ipv4_frame(a, b, [10, 0, 0, 1], [10, 0, 0, 5]);
    // Byte-identical headers always hash identically.
    assert_eq!(flow_hash(&f1, 0x1234), flow_hash(&f2, 0x1234));

    // Source is mixed before destination, so swapping the MACs lands in a
    // different bucket for this flow.
    let swapped = ipv4_frame(b, a, [10, 0, 0, 1], [10, 0, 0, 5]);
    assert_ne!(flow_hash(&f1, 0x1234), flow_hash(&swapped, 0x1234));
}

#[test]
fn test_load_balance_flow_stability() {
    let reg = TrunkRegistry::new();
    let ifaces = trunk_with_ports(&reg, 4);
    reg.set_protocol("trunk0", "loadbalance").unwrap();
    let trunk = reg.trunk("trunk0").unwrap();

    trunk.enqueue_outbound(data_frame()).unwrap();
    let first: Vec<usize> = ifaces.iter().map(|i| i.transmitted_count()).collect();
    // The same flow keeps landing on the same member.
    for _ in 0..5 {
        trunk.enqueue_outbound(data_frame()).unwrap();
    }
    let after: Vec<usize> = ifaces.iter().map(|i| i.transmitted_count()).collect();
    for (a, b) in first.iter().zip(&after) {
        assert_eq!(*b, if *a == 1 { 6 } else { 0 });
    }
}

#[test]
fn test_destroy_restores_zero_one_many() {
    for n in [0u8, 1, 3] {
        let reg = TrunkRegistry::new();
        let ifaces = trunk_with_ports(&reg, n);
        reg.set_protocol("trunk0", "loadbalance").unwrap();
        reg.trunk("trunk0").unwrap().set_promiscuous(true);

        reg.destroy("trunk0").unwrap();
        for (i, iface) in ifaces.iter().enumerate() {
            assert_eq!(iface.link_addr(), MacAddress::new([2, 0, 0, 0, 0, i as u8 + 1]));
            assert_eq!(iface.kind(), InterfaceKind::Ethernet);
            assert!(!iface.flag(InterfaceFlag::Promiscuous));
            assert!(iface.joined_groups().is_empty());
        }
    }
}

#[test]
fn test_protocol_switch_rebuilds_from_scratch() {
    let reg = TrunkRegistry::new();
    let ifaces = trunk_with_ports(&reg, 3);
    reg.set_protocol("trunk0", "roundrobin").unwrap();
    let trunk = reg.trunk("trunk0").unwrap();
    trunk.enqueue_outbound(data_frame()).unwrap();

    // Switch mid-rotation: failover starts fresh at the primary.
    reg.set_protocol("trunk0", "failover").unwrap();
    for iface in &ifaces {
        iface.clear_transmitted();
    }
    for _ in 0..3 {
        trunk.enqueue_outbound(data_frame()).unwrap();
    }
    assert_eq!(ifaces[0].transmitted_count(), 3);
    assert_eq!(ifaces[1].transmitted_count(), 0);

    assert!(matches!(
        reg.set_protocol("trunk0", "bundleofjoy"),
        Err(TrunkError::UnsupportedProtocol(_))
    ));
}

#[test]
fn test_lacp_control_interception() {
    let reg = TrunkRegistry::new();
    trunk_with_ports(&reg, 2);
    let trunk = reg.trunk("trunk0").unwrap();
    trunk
        .install_policy(Box::new(LacpPolicy::new(Box::new(
            StaticLacpEngine::with_seed(7),
        ))))
        .unwrap();

    let lacpdu = build_frame(
        MacAddress::SLOW_PROTOCOLS,
        MacAddress::new([2, 0, 0, 0, 0, 9]),
        ETHERTYPE_SLOW,
        &[SLOW_SUBTYPE_LACP, 0x01, 0x14],
    );
    // Control frames are consumed by the engine, never surfaced.
    assert!(trunk.inbound_from_port("eth0", lacpdu).is_none());
    let stats = reg.get_status("trunk0").unwrap().stats;
    assert_eq!(stats.rx_control, 1);
    assert_eq!(stats.rx_dropped, 0);

    // Data frames flow while the member is collecting.
    assert!(trunk.inbound_from_port("eth0", data_frame()).is_some());
    reg.notify_link_state("eth0", LinkState::Down);
    assert!(trunk.inbound_from_port("eth0", data_frame()).is_none());
}

#[test]
fn test_multicast_resync() {
    let reg = TrunkRegistry::new();
    let ifaces = trunk_with_ports(&reg, 2);
    let trunk = reg.trunk("trunk0").unwrap();
    let g1 = MacAddress::new([0x01, 0x00, 0x5e, 0, 0, 1]);
    let g2 = MacAddress::new([0x01, 0x00, 0x5e, 0, 0, 2]);
    let g3 = MacAddress::new([0x01, 0x00, 0x5e, 0, 0, 3]);

    trunk.join_multicast_group(g1);
    trunk.join_multicast_group(g2);
    trunk.sync_multicast(&[g2, g3]);
    for iface in &ifaces {
        assert_eq!(iface.joined_groups(), vec![g2, g3]);
    }

    trunk.leave_multicast_group(g2);
    for iface in &ifaces {
        assert_eq!(iface.joined_groups(), vec![g3]);
    }
}

#[test]
fn test_capability_rederivation_via_registry() {
    let reg = TrunkRegistry::new();
    reg.create("trunk0", TrunkConfig::default()).unwrap();
    let a = sim("eth0", 1)
        .with_capabilities(Capabilities::FULL_DUPLEX | Capabilities::HW_VLAN_TAGGING);
    let b = sim("eth1", 2).with_capabilities(Capabilities::ALL);
    reg.add_port("trunk0", a).unwrap();
    reg.add_port("trunk0", b).unwrap();

    assert_eq!(
        reg.get_status("trunk0").unwrap().capabilities,
        Capabilities::FULL_DUPLEX | Capabilities::HW_VLAN_TAGGING
    );
    reg.remove_port("trunk0", "eth0").unwrap();
    assert_eq!(reg.get_status("trunk0").unwrap().capabilities, Capabilities::ALL);
    reg.remove_port("trunk0", "eth1").unwrap();
    assert_eq!(
        reg.get_status("trunk0").unwrap().capabilities,
        Capabilities::FULL_DUPLEX
    );
}

#[test]
fn test_status_snapshot_shape() {
    let reg = TrunkRegistry::new();
    trunk_with_ports(&reg, 2);
    reg.set_protocol("trunk0", "failover").unwrap();
    let status = reg.get_status("trunk0").unwrap();

    assert_eq!(status.name, "trunk0");
    assert_eq!(status.protocol, AggregationProtocol::Failover);
    assert_eq!(status.link_addr, Some(MacAddress::new([2, 0, 0, 0, 0, 1])));
    assert_eq!(status.ports.len(), 2);
    assert!(status.ports[0].primary);
    assert!(!status.ports[1].primary);

    // Snapshots serialize for the control surface.
    let json = serde_json::to_string(&status).unwrap();
    assert!(json.contains("\"failover\""));
}

#[test]
fn test_stacked_trunk_carries_traffic() {
    let reg = TrunkRegistry::new();
    reg.create("upper", TrunkConfig::default()).unwrap();
    reg.create("lower", TrunkConfig::default()).unwrap();
    let a = sim("eth0", 1);
    reg.add_port("lower", a.clone()).unwrap();
    reg.set_protocol("lower", "roundrobin").unwrap();
    reg.notify_link_state("eth0", LinkState::Up);

    let lower = reg.trunk("lower").unwrap();
    reg.add_port("upper", lower as Arc<dyn PhysicalInterface>)
        .unwrap();
    reg.set_protocol("upper", "failover").unwrap();

    // The lower trunk is a member port of the upper one; frames sent out
    // the upper trunk fall through to the physical interface.
    let upper = reg.trunk("upper").unwrap();
    upper.notify_link_state("lower", LinkState::Up);
    upper.enqueue_outbound(data_frame()).unwrap();
    assert_eq!(a.transmitted_count(), 1);
}
