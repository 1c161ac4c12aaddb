//! Round-robin distribution.

use super::{AggregationPolicy, AggregationProtocol, RxDisposition};
use crate::error::{TrunkError, TrunkResult};
use crate::frame::Frame;
use crate::port::PortSet;

/// Rotates outbound frames over the link-up members in attach order.
///
/// The cursor names the next port to try. Selection skips down the
/// circular list to the first link-up member and advances the cursor at
/// selection time, before the driver handoff completes. Selections are
/// serialized under the trunk lock, so a burst against one cursor
/// position stays ordered even when a later handoff fails.
#[derive(Debug, Default)]
pub struct RoundRobinPolicy {
    cursor: Option<String>,
}

impl RoundRobinPolicy {
    /// Creates the policy with an empty cursor.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AggregationPolicy for RoundRobinPolicy {
    fn protocol(&self) -> AggregationProtocol {
        AggregationProtocol::RoundRobin
    }

    fn attach(&mut self, ports: &mut PortSet) -> TrunkResult<()> {
        self.cursor = ports.first_link_up().map(|p| p.alias().to_string());
        for alias in ports.aliases() {
            self.port_create(ports, &alias)?;
        }
        Ok(())
    }

    fn detach(&mut self, _ports: &mut PortSet) -> TrunkResult<()> {
        self.cursor = None;
        Ok(())
    }

    fn port_destroy(&mut self, _ports: &mut PortSet, alias: &str) {
        // Force re-selection if the cursor referenced the departing port.
        if self.cursor.as_deref() == Some(alias) {
            self.cursor = None;
        }
    }

    fn transmit_select(&mut self, ports: &PortSet, _frame: &Frame) -> TrunkResult<String> {
        let n = ports.len();
        if n == 0 {
            return Err(TrunkError::NoActivePort(ports.trunk_name().to_string()));
        }

        let start = self
            .cursor
            .as_deref()
            .and_then(|alias| ports.index_of(alias))
            .unwrap_or(0);

        for k in 0..n {
            let i = (start + k) % n;
            let port = match ports.at(i) {
                Some(p) => p,
                None => continue,
            };
            if !port.link().is_up() {
                continue;
            }
            let selected = port.alias().to_string();

            // Advance to the next link-up member, cyclically, starting
            // after the selected one.
            self.cursor = (1..=n)
                .map(|j| (i + j) % n)
                .filter_map(|idx| ports.at(idx))
                .find(|p| p.link().is_up())
                .map(|p| p.alias().to_string());

            return Ok(selected);
        }

        Err(TrunkError::NoActivePort(ports.trunk_name().to_string()))
    }

    fn receive_validate(
        &mut self,
        _ports: &PortSet,
        _ingress: &str,
        frame: Frame,
    ) -> RxDisposition {
        // Symmetric round-robin peers may deliver on any member; accept
        // everything and let the trunk retag it.
        RxDisposition::Accept(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn frame() -> Frame {
        Frame::new(vec![0u8; 14])
    }

    fn select(policy: &mut RoundRobinPolicy, set: &PortSet) -> String {
        policy.transmit_select(set, &frame()).unwrap()
    }

    #[test]
    fn test_fair_rotation_and_wrap() {
        let mut set = ports(&["a", "b", "c"]);
        let mut policy = RoundRobinPolicy::new();
        policy.attach(&mut set).unwrap();

        assert_eq!(select(&mut policy, &set), "a");
        assert_eq!(select(&mut policy, &set), "b");
        assert_eq!(select(&mut policy, &set), "c");
        assert_eq!(select(&mut policy, &set), "a");
    }

    #[test]
    fn test_skips_link_down_and_survives_removal() {
        let mut set = ports(&["a", "b", "c"]);
        let mut policy = RoundRobinPolicy::new();
        policy.attach(&mut set).unwrap();

        // Spin once around: cursor now points at b again.
        for expected in ["a", "b", "c", "a"] {
            assert_eq!(select(&mut policy, &set), expected);
        }

        set.get_mut("b").unwrap().set_link(LinkState::Down);
        assert_eq!(select(&mut policy, &set), "c");

        policy.port_destroy(&mut set, "c");
        set.remove("c");
        assert_eq!(select(&mut policy, &set), "a");
    }

    #[test]
    fn test_no_active_port() {
        let mut set = ports(&["a"]);
        set.get_mut("a").unwrap().set_link(LinkState::Down);
        let mut policy = RoundRobinPolicy::new();
        policy.attach(&mut set).unwrap();

        assert!(matches!(
            policy.transmit_select(&set, &frame()),
            Err(TrunkError::NoActivePort(_))
        ));
    }
}
