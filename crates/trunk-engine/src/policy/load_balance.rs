//! Flow-hash load balancing (also serves static EtherChannel mode).

use super::{AggregationPolicy, AggregationProtocol, RxDisposition};
use crate::error::{TrunkError, TrunkResult};
use crate::frame::Frame;
use crate::hash::flow_hash;
use crate::port::PortSet;
use rand::Rng;
use tracing::debug;

/// Distributes flows over members by deterministic flow hash.
///
/// A per-trunk random seed keys the hash; `table` is a flattened lookup of
/// member aliases in attach order, rebuilt on membership change (excluding
/// a port that is currently being destroyed). With identical membership a
/// rebuild reproduces the identical table, so existing flows keep their
/// port.
#[derive(Debug)]
pub struct LoadBalancePolicy {
    seed: u32,
    table: Vec<String>,
}

impl LoadBalancePolicy {
    /// Creates the policy with a freshly drawn random seed.
    pub fn new() -> Self {
        Self::with_seed(rand::thread_rng().gen())
    }

    /// Creates the policy with a fixed seed (deterministic placement).
    pub fn with_seed(seed: u32) -> Self {
        LoadBalancePolicy {
            seed,
            table: Vec::new(),
        }
    }

    /// The seed in use.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    fn rebuild_table(&mut self, ports: &PortSet, exclude: Option<&str>) {
        self.table = ports
            .iter()
            .map(|p| p.alias().to_string())
            .filter(|alias| Some(alias.as_str()) != exclude)
            .collect();
        debug!(
            trunk = ports.trunk_name(),
            entries = self.table.len(),
            "rebuilt load-balance table"
        );
    }
}

impl Default for LoadBalancePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregationPolicy for LoadBalancePolicy {
    fn protocol(&self) -> AggregationProtocol {
        AggregationProtocol::LoadBalance
    }

    fn attach(&mut self, ports: &mut PortSet) -> TrunkResult<()> {
        self.rebuild_table(ports, None);
        for alias in ports.aliases() {
            self.port_create(ports, &alias)?;
        }
        Ok(())
    }

    fn detach(&mut self, _ports: &mut PortSet) -> TrunkResult<()> {
        self.table.clear();
        Ok(())
    }

    fn port_create(&mut self, ports: &mut PortSet, _alias: &str) -> TrunkResult<()> {
        self.rebuild_table(ports, None);
        Ok(())
    }

    fn port_destroy(&mut self, ports: &mut PortSet, alias: &str) {
        // The port is still in the set; exclude it from the new table.
        let exclude = alias.to_string();
        self.rebuild_table(ports, Some(&exclude));
    }

    fn transmit_select(&mut self, ports: &PortSet, frame: &Frame) -> TrunkResult<String> {
        let n = self.table.len();
        if n == 0 {
            return Err(TrunkError::NoActivePort(ports.trunk_name().to_string()));
        }

        let h = flow_hash(frame, self.seed);
        let start = (h as usize) % n;

        // Hash bucket first, then the same link-up fallback round-robin
        // uses: step down the table until a member has link.
        for k in 0..n {
            let alias = &self.table[(start + k) % n];
            if let Some(port) = ports.get(alias) {
                if port.link().is_up() {
                    return Ok(alias.clone());
                }
            }
        }

        Err(TrunkError::NoActivePort(ports.trunk_name().to_string()))
    }

    fn receive_validate(
        &mut self,
        _ports: &PortSet,
        _ingress: &str,
        frame: Frame,
    ) -> RxDisposition {
        // Load-balanced aggregates are symmetric; hashing is deterministic
        // per direction, so no anti-duplication gating is needed.
        RxDisposition::Accept(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{build_frame, ETHERTYPE_IPV4};
    use crate::port::MemberPort;
    use crate::sim::SimInterface;
    use pretty_assertions::assert_eq;
    use trunk_types::{LinkState, MacAddress};

    fn ports(names: &[&str]) -> PortSet {
        let mut set = PortSet::new("trunk0");
        for (i, name) in names.iter().enumerate() {
            let iface =
                SimInterface::new(name, MacAddress::new([2, 0, 0, 0, 0, i as u8 + 1]));
            let mut port = MemberPort::new(iface);
            port.set_link(LinkState::Up);
            set.push(port);
        }
        set
    }

    fn flow(src_last: u8, dst_last: u8) -> Frame {
        let mut ip = vec![0u8; 20];
        ip[12..16].copy_from_slice(&[10, 0, 0, src_last]);
        ip[16..20].copy_from_slice(&[10, 0, 0, dst_last]);
        build_frame(
            MacAddress::new([2, 0, 0, 0, 1, dst_last]),
            MacAddress::new([2, 0, 0, 0, 1, src_last]),
            ETHERTYPE_IPV4,
            &ip,
        )
    }

    #[test]
    fn test_flow_stability() {
        let mut set = ports(&["a", "b", "c"]);
        let mut policy = LoadBalancePolicy::with_seed(0x1234_5678);
        policy.attach(&mut set).unwrap();

        let f = flow(1, 5);
        let first = policy.transmit_select(&set, &f).unwrap();
        for _ in 0..16 {
            assert_eq!(policy.transmit_select(&set, &f).unwrap(), first);
        }
    }

    #[test]
    fn test_rebuild_same_membership_keeps_mapping() {
        let mut set = ports(&["a", "b", "c"]);
        let mut policy = LoadBalancePolicy::with_seed(0x1234_5678);
        policy.attach(&mut set).unwrap();

        let picks: Vec<String> = (0..8)
            .map(|i| policy.transmit_select(&set, &flow(i, 100)).unwrap())
            .collect();

        // A rebuild with identical membership reproduces the mapping.
        policy.port_create(&mut set, "a").unwrap();
        for (i, expected) in picks.iter().enumerate() {
            assert_eq!(
                &policy.transmit_select(&set, &flow(i as u8, 100)).unwrap(),
                expected
            );
        }
    }

    #[test]
    fn test_down_port_fallback() {
        let mut set = ports(&["a", "b"]);
        let mut policy = LoadBalancePolicy::with_seed(7);
        policy.attach(&mut set).unwrap();

        set.get_mut("a").unwrap().set_link(LinkState::Down);
        for i in 0..8 {
            assert_eq!(policy.transmit_select(&set, &flow(i, 1)).unwrap(), "b");
        }
    }

    #[test]
    fn test_destroy_excludes_port() {
        let mut set = ports(&["a", "b"]);
        let mut policy = LoadBalancePolicy::with_seed(7);
        policy.attach(&mut set).unwrap();

        policy.port_destroy(&mut set, "b");
        set.remove("b");
        for i in 0..8 {
            assert_eq!(policy.transmit_select(&set, &flow(i, 1)).unwrap(), "a");
        }
    }

    #[test]
    fn test_empty_table() {
        let set = ports(&[]);
        let mut policy = LoadBalancePolicy::with_seed(7);
        assert!(matches!(
            policy.transmit_select(&set, &flow(1, 1)),
            Err(TrunkError::NoActivePort(_))
        ));
    }
}
