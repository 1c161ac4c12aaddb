//! Daemon configuration: declared interfaces and initial trunk layout.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use trunk_engine::{Capabilities, MediaType, SimInterface, TrunkConfig, TrunkRegistry};
use trunk_types::MacAddress;

/// One simulated interface to register at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceConfig {
    /// Interface name, e.g. "eth0".
    pub name: String,
    /// Link-layer address, e.g. "02:00:00:00:00:01".
    pub mac: MacAddress,
    /// Media type; only ethernet interfaces can be aggregated.
    #[serde(default)]
    pub media: MediaType,
    /// Capability names; empty means all capabilities.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// One trunk to create at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct TrunkDef {
    /// Trunk name, e.g. "trunk0".
    pub name: String,
    /// Aggregation protocol name; defaults to no protocol.
    #[serde(default)]
    pub protocol: Option<String>,
    /// Member interfaces in attach order.
    #[serde(default)]
    pub ports: Vec<String>,
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
    #[serde(default)]
    pub trunks: Vec<TrunkDef>,
}

impl DaemonConfig {
    /// Loads the configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))
    }

    /// Materializes the configured interfaces and trunks into `registry`.
    ///
    /// Returns the simulated interfaces by name so the control surface can
    /// drive link state and inspect transmitted frames.
    pub fn apply(
        &self,
        registry: &TrunkRegistry,
    ) -> Result<HashMap<String, Arc<SimInterface>>> {
        let mut ifaces = HashMap::new();
        for icfg in &self.interfaces {
            let iface = SimInterface::new(&icfg.name, icfg.mac);
            let iface = iface.with_media(icfg.media);
            let iface = if icfg.capabilities.is_empty() {
                iface
            } else {
                let mut caps = Capabilities::none();
                for name in &icfg.capabilities {
                    match Capabilities::from_name(name) {
                        Some(c) => caps |= c,
                        None => bail!("unknown capability '{name}' on {}", icfg.name),
                    }
                }
                iface.with_capabilities(caps)
            };
            if ifaces.insert(icfg.name.clone(), iface).is_some() {
                bail!("duplicate interface '{}'", icfg.name);
            }
        }

        for tdef in &self.trunks {
            registry
                .create(&tdef.name, TrunkConfig::default())
                .with_context(|| format!("creating trunk {}", tdef.name))?;
            for port in &tdef.ports {
                let iface = ifaces
                    .get(port)
                    .with_context(|| format!("trunk {} references unknown interface {port}", tdef.name))?;
                registry
                    .add_port(&tdef.name, iface.clone())
                    .with_context(|| format!("binding {port} into {}", tdef.name))?;
            }
            if let Some(protocol) = &tdef.protocol {
                registry
                    .set_protocol(&tdef.name, protocol)
                    .with_context(|| format!("configuring {}", tdef.name))?;
            }
            info!(trunk = %tdef.name, ports = tdef.ports.len(), "trunk configured");
        }
        Ok(ifaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use trunk_engine::AggregationProtocol;

    const SAMPLE: &str = r#"{
        "interfaces": [
            {"name": "eth0", "mac": "02:00:00:00:00:01"},
            {"name": "eth1", "mac": "02:00:00:00:00:02",
             "capabilities": ["full-duplex", "hw-vlan-tagging"]}
        ],
        "trunks": [
            {"name": "trunk0", "protocol": "failover", "ports": ["eth0", "eth1"]}
        ]
    }"#;

    #[test]
    fn test_parse_and_apply() {
        let cfg: DaemonConfig = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.interfaces.len(), 2);
        assert_eq!(cfg.interfaces[1].capabilities.len(), 2);

        let registry = TrunkRegistry::new();
        let ifaces = cfg.apply(&registry).unwrap();
        assert_eq!(ifaces.len(), 2);

        let status = registry.get_status("trunk0").unwrap();
        assert_eq!(status.protocol, AggregationProtocol::Failover);
        assert_eq!(status.ports.len(), 2);
    }

    #[test]
    fn test_unknown_capability_rejected() {
        let cfg: DaemonConfig = serde_json::from_str(
            r#"{"interfaces": [{"name": "eth0", "mac": "02:00:00:00:00:01",
                "capabilities": ["teleportation"]}]}"#,
        )
        .unwrap();
        assert!(cfg.apply(&TrunkRegistry::new()).is_err());
    }

    #[test]
    fn test_unknown_port_rejected() {
        let cfg: DaemonConfig = serde_json::from_str(
            r#"{"trunks": [{"name": "trunk0", "ports": ["ghost0"]}]}"#,
        )
        .unwrap();
        assert!(cfg.apply(&TrunkRegistry::new()).is_err());
    }
}
