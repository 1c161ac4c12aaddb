//! Active-failover: primary port with hot-standby backups.

use super::{AggregationPolicy, AggregationProtocol, RxDisposition};
use crate::error::{TrunkError, TrunkResult};
use crate::frame::Frame;
use crate::port::{MemberPort, PortSet};

/// Prefers the primary port; falls back to the first link-up backup.
///
/// The receive path reuses the exact transmit-side selection so the two
/// can never disagree on which backup is "the" active port: a backup's
/// traffic is accepted only while the primary is down and that backup is
/// the port transmit would currently pick. This keeps a broadcast
/// reflected by several simultaneously-up backups from being accepted
/// more than once.
#[derive(Debug, Default)]
pub struct FailoverPolicy;

impl FailoverPolicy {
    /// Creates the policy.
    pub fn new() -> Self {
        Self
    }

    /// The port transmit would use right now: the primary if it has link,
    /// else the first link-up backup.
    fn active_port<'a>(&self, ports: &'a PortSet) -> Option<&'a MemberPort> {
        match ports.primary() {
            Some(primary) if primary.link().is_up() => Some(primary),
            _ => ports.iter().find(|p| p.link().is_up()),
        }
    }
}

impl AggregationPolicy for FailoverPolicy {
    fn protocol(&self) -> AggregationProtocol {
        AggregationProtocol::Failover
    }

    fn attach(&mut self, ports: &mut PortSet) -> TrunkResult<()> {
        for alias in ports.aliases() {
            self.port_create(ports, &alias)?;
        }
        Ok(())
    }

    fn detach(&mut self, _ports: &mut PortSet) -> TrunkResult<()> {
        Ok(())
    }

    fn transmit_select(&mut self, ports: &PortSet, _frame: &Frame) -> TrunkResult<String> {
        self.active_port(ports)
            .map(|p| p.alias().to_string())
            .ok_or_else(|| TrunkError::NoActivePort(ports.trunk_name().to_string()))
    }

    fn receive_validate(
        &mut self,
        ports: &PortSet,
        ingress: &str,
        frame: Frame,
    ) -> RxDisposition {
        let Some(primary) = ports.primary() else {
            return RxDisposition::Drop;
        };

        if primary.alias() == ingress {
            return RxDisposition::Accept(frame);
        }

        // Backup traffic counts only while the primary is down and the
        // ingress port is the one transmit would choose.
        if !primary.link().is_up()
            && self.active_port(ports).map(|p| p.alias()) == Some(ingress)
        {
            return RxDisposition::Accept(frame);
        }

        RxDisposition::Drop
    }
}
