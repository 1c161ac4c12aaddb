//! System-wide trunk registry.
//!
//! The registry owns every trunk, tracks which interface is bound into
//! which trunk, enforces the stacking limits, and interposes on the
//! transmit path of bound interfaces.
//!
//! Lock order is registry before trunk, and parent trunk before child
//! trunk. The cycle check below is what makes the latter a total order.

use crate::error::{TrunkError, TrunkResult};
use crate::frame::Frame;
use crate::iface::{MediaType, PhysicalInterface};
use crate::policy::AggregationProtocol;
use crate::port::TRUNK_MAX_STACKING;
use crate::status::TrunkStatus;
use crate::trunk::{Trunk, TrunkConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};
use trunk_types::LinkState;

#[derive(Default)]
struct RegistryInner {
    trunks: HashMap<String, Arc<Trunk>>,
    /// Interface name to the trunk it is bound into.
    members: HashMap<String, String>,
}

impl RegistryInner {
    /// Number of trunk ancestors above `name` in the stacking tree.
    fn depth_up(&self, name: &str) -> usize {
        let mut depth = 0;
        let mut current = name;
        while let Some(parent) = self.members.get(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Height of the stacking subtree rooted at trunk `name`.
    fn height_down(&self, name: &str) -> usize {
        let Some(trunk) = self.trunks.get(name) else {
            return 0;
        };
        1 + trunk
            .port_names()
            .iter()
            .filter(|p| self.trunks.contains_key(p.as_str()))
            .map(|p| self.height_down(p))
            .max()
            .unwrap_or(0)
    }

    /// True if `candidate` is `name` or one of its ancestors.
    fn is_ancestor_or_self(&self, candidate: &str, name: &str) -> bool {
        let mut current = name;
        loop {
            if current == candidate {
                return true;
            }
            match self.members.get(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }
}

/// Owner of all trunks and member bindings.
#[derive(Default)]
pub struct TrunkRegistry {
    inner: Mutex<RegistryInner>,
}

impl TrunkRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a trunk under `name`.
    pub fn create(&self, name: &str, config: TrunkConfig) -> TrunkResult<Arc<Trunk>> {
        let mut inner = self.lock();
        if inner.trunks.contains_key(name) {
            return Err(TrunkError::TrunkExists(name.to_string()));
        }
        let trunk = Arc::new(Trunk::new(name, config));
        inner.trunks.insert(name.to_string(), Arc::clone(&trunk));
        info!(trunk = name, "trunk created");
        Ok(trunk)
    }

    /// Destroys a trunk: it is unbound from any parent, every member is
    /// detached and restored, and all bindings into it are dropped.
    pub fn destroy(&self, name: &str) -> TrunkResult<()> {
        let mut inner = self.lock();
        let trunk = inner
            .trunks
            .remove(name)
            .ok_or_else(|| TrunkError::TrunkNotFound(name.to_string()))?;

        if let Some(parent_name) = inner.members.remove(name) {
            if let Some(parent) = inner.trunks.get(&parent_name) {
                if let Err(e) = parent.detach_port(name) {
                    warn!(trunk = name, parent = %parent_name, error = %e,
                        "unbind from parent failed");
                }
            }
        }

        trunk.teardown();
        inner.members.retain(|_, owner| owner != name);
        info!(trunk = name, "trunk destroyed");
        Ok(())
    }

    /// Binds an interface into a trunk. The interface may itself be a
    /// registered trunk, within the stacking depth limit and without
    /// creating a cycle.
    pub fn add_port(
        &self,
        trunk_name: &str,
        iface: Arc<dyn PhysicalInterface>,
    ) -> TrunkResult<()> {
        let mut inner = self.lock();
        let trunk = inner
            .trunks
            .get(trunk_name)
            .ok_or_else(|| TrunkError::TrunkNotFound(trunk_name.to_string()))?
            .clone();
        let iface_name = iface.name().to_string();

        // Precondition order: port count, busy, ownership, media, stacking.
        trunk.check_attach_preconditions(iface.as_ref())?;
        if let Some(owner) = inner.members.get(&iface_name) {
            return Err(TrunkError::AlreadyBound {
                iface: iface_name,
                trunk: owner.clone(),
            });
        }
        if iface.media() != MediaType::Ethernet {
            return Err(TrunkError::UnsupportedMediaType {
                iface: iface_name,
                media: iface.media(),
            });
        }
        if inner.trunks.contains_key(&iface_name) {
            // Stacking: the new member subtree must not contain an
            // ancestor of the target trunk, and the combined depth must
            // stay within bounds.
            if inner.is_ancestor_or_self(&iface_name, trunk_name) {
                return Err(TrunkError::StackingLoop {
                    iface: iface_name,
                    trunk: trunk_name.to_string(),
                    max: TRUNK_MAX_STACKING,
                });
            }
            let depth = inner.depth_up(trunk_name) + 1 + inner.height_down(&iface_name);
            if depth > TRUNK_MAX_STACKING {
                return Err(TrunkError::StackingLoop {
                    iface: iface_name,
                    trunk: trunk_name.to_string(),
                    max: TRUNK_MAX_STACKING,
                });
            }
        }

        trunk.attach_port(iface)?;
        inner.members.insert(iface_name, trunk_name.to_string());
        Ok(())
    }

    /// Unbinds a member from a trunk.
    pub fn remove_port(&self, trunk_name: &str, alias: &str) -> TrunkResult<()> {
        let mut inner = self.lock();
        let trunk = inner
            .trunks
            .get(trunk_name)
            .ok_or_else(|| TrunkError::TrunkNotFound(trunk_name.to_string()))?
            .clone();
        trunk.detach_port(alias)?;
        inner.members.remove(alias);
        Ok(())
    }

    /// Parses and configures the aggregation protocol of a trunk.
    pub fn set_protocol(&self, trunk_name: &str, protocol: &str) -> TrunkResult<()> {
        let proto: AggregationProtocol = protocol.parse()?;
        let trunk = self
            .trunk(trunk_name)
            .ok_or_else(|| TrunkError::TrunkNotFound(trunk_name.to_string()))?;
        trunk.set_protocol(proto)
    }

    /// Status snapshot of one trunk.
    pub fn get_status(&self, trunk_name: &str) -> TrunkResult<TrunkStatus> {
        self.trunk(trunk_name)
            .map(|t| t.status())
            .ok_or_else(|| TrunkError::TrunkNotFound(trunk_name.to_string()))
    }

    /// Routes a link-state change on an interface to its owning trunk, if
    /// any.
    pub fn notify_link_state(&self, iface_name: &str, state: LinkState) {
        let owner = {
            let inner = self.lock();
            inner
                .members
                .get(iface_name)
                .and_then(|owner| inner.trunks.get(owner))
                .cloned()
        };
        if let Some(trunk) = owner {
            trunk.notify_link_state(iface_name, state);
        }
    }

    /// Forced unbind when an interface disappears from the system. Errors
    /// are logged; the binding goes away regardless.
    pub fn notify_interface_departed(&self, iface_name: &str) {
        let mut inner = self.lock();
        let Some(owner) = inner.members.remove(iface_name) else {
            return;
        };
        if let Some(trunk) = inner.trunks.get(&owner) {
            if let Err(e) = trunk.detach_port(iface_name) {
                warn!(iface = iface_name, trunk = %owner, error = %e,
                    "departed interface detach failed");
            }
        }
    }

    /// Interposed transmit for a bound interface: the frame is redirected
    /// through the owning trunk's policy. Port-access-entity frames
    /// (802.1X, ethertype 0x888e) bypass the aggregate and go straight out
    /// the named member.
    pub fn send_via(&self, iface_name: &str, frame: Frame) -> TrunkResult<()> {
        let inner = self.lock();
        match inner.members.get(iface_name) {
            Some(owner) => {
                let trunk = inner
                    .trunks
                    .get(owner)
                    .ok_or_else(|| TrunkError::TrunkNotFound(owner.clone()))?
                    .clone();
                drop(inner);
                if frame.is_pae() {
                    let iface = trunk.port_iface(iface_name).ok_or_else(|| {
                        TrunkError::PortNotFound {
                            trunk: trunk.name().to_string(),
                            port: iface_name.to_string(),
                        }
                    })?;
                    iface.transmit(&frame)
                } else {
                    trunk.enqueue_outbound(frame)
                }
            }
            None => {
                // Sending via a trunk itself is the ordinary egress path.
                let trunk = inner
                    .trunks
                    .get(iface_name)
                    .ok_or_else(|| TrunkError::TrunkNotFound(iface_name.to_string()))?
                    .clone();
                drop(inner);
                trunk.enqueue_outbound(frame)
            }
        }
    }

    /// Looks up a trunk by name.
    pub fn trunk(&self, name: &str) -> Option<Arc<Trunk>> {
        self.lock().trunks.get(name).cloned()
    }

    /// Names of all registered trunks, sorted.
    pub fn trunk_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().trunks.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for TrunkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrunkRegistry")
            .field("trunks", &self.trunk_names())
            .finish()
    }
}
