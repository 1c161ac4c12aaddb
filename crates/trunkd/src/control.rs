//! Line-oriented control surface.
//!
//! One command per line, shell-style tokens. Every command answers with a
//! single line: `ok`, `ok <json>`, or `error: <message>`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use trunk_engine::{
    build_frame, PhysicalInterface, SimInterface, TrunkConfig, TrunkRegistry,
    ETHERTYPE_IPV4,
};
use trunk_types::{LinkState, MacAddress};

/// Outcome of one control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlResponse {
    /// Command succeeded; optional payload line.
    Ok(Option<String>),
    /// Command failed.
    Error(String),
    /// Session end requested.
    Quit,
}

impl ControlResponse {
    fn ok() -> Self {
        ControlResponse::Ok(None)
    }

    fn with(payload: impl Into<String>) -> Self {
        ControlResponse::Ok(Some(payload.into()))
    }

    fn err(message: impl Into<String>) -> Self {
        ControlResponse::Error(message.into())
    }

    /// The single response line to print.
    pub fn render(&self) -> String {
        match self {
            ControlResponse::Ok(None) => "ok".to_string(),
            ControlResponse::Ok(Some(payload)) => format!("ok {payload}"),
            ControlResponse::Error(message) => format!("error: {message}"),
            ControlResponse::Quit => "bye".to_string(),
        }
    }
}

/// Executes control commands against the registry and the simulated
/// interface table.
pub struct ControlHandler {
    registry: Arc<TrunkRegistry>,
    ifaces: Mutex<HashMap<String, Arc<SimInterface>>>,
}

impl ControlHandler {
    pub fn new(
        registry: Arc<TrunkRegistry>,
        ifaces: HashMap<String, Arc<SimInterface>>,
    ) -> Self {
        ControlHandler {
            registry,
            ifaces: Mutex::new(ifaces),
        }
    }

    /// Parses and runs one command line.
    pub fn handle_line(&self, line: &str) -> ControlResponse {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        debug!(?tokens, "control command");
        match tokens.as_slice() {
            [] | ["#", ..] => ControlResponse::ok(),
            ["quit"] | ["exit"] => ControlResponse::Quit,
            ["help"] => ControlResponse::with(USAGE.trim()),
            ["create", trunk] => self.create(trunk),
            ["destroy", trunk] => self.result(self.registry.destroy(trunk)),
            ["add-port", trunk, iface] => self.add_port(trunk, iface),
            ["remove-port", trunk, iface] => {
                self.result(self.registry.remove_port(trunk, iface))
            }
            ["set-proto", trunk, proto] => {
                self.result(self.registry.set_protocol(trunk, proto))
            }
            ["link", iface, state] => self.link(iface, state),
            ["send", iface] => self.send(iface),
            ["depart", iface] => {
                self.registry.notify_interface_departed(iface);
                self.ifaces().remove(*iface);
                ControlResponse::ok()
            }
            ["status"] => self.list(),
            ["status", trunk] => self.status(trunk),
            ["counters", iface] => self.counters(iface),
            _ => ControlResponse::err(format!("unknown command: {line}")),
        }
    }

    fn ifaces(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<SimInterface>>> {
        self.ifaces.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn result(&self, result: trunk_engine::TrunkResult<()>) -> ControlResponse {
        match result {
            Ok(()) => ControlResponse::ok(),
            Err(e) => ControlResponse::err(e.to_string()),
        }
    }

    fn create(&self, trunk: &str) -> ControlResponse {
        match self.registry.create(trunk, TrunkConfig::default()) {
            Ok(_) => ControlResponse::ok(),
            Err(e) => ControlResponse::err(e.to_string()),
        }
    }

    fn add_port(&self, trunk: &str, iface: &str) -> ControlResponse {
        // A trunk name refers to the trunk itself (stacking); anything
        // else must be a declared interface.
        if let Some(nested) = self.registry.trunk(iface) {
            return self.result(self.registry.add_port(trunk, nested));
        }
        let Some(iface) = self.ifaces().get(iface).cloned() else {
            return ControlResponse::err(format!("no such interface: {iface}"));
        };
        self.result(self.registry.add_port(trunk, iface))
    }

    fn link(&self, iface: &str, state: &str) -> ControlResponse {
        let state = match state.parse::<LinkState>() {
            Ok(state) => state,
            Err(e) => return ControlResponse::err(e.to_string()),
        };
        self.registry.notify_link_state(iface, state);
        ControlResponse::ok()
    }

    fn send(&self, iface: &str) -> ControlResponse {
        let src = self
            .ifaces()
            .get(iface)
            .map(|i| i.link_addr())
            .unwrap_or(MacAddress::ZERO);
        let frame = build_frame(MacAddress::BROADCAST, src, ETHERTYPE_IPV4, &[0u8; 20]);
        self.result(self.registry.send_via(iface, frame))
    }

    fn list(&self) -> ControlResponse {
        match serde_json::to_string(&self.registry.trunk_names()) {
            Ok(json) => ControlResponse::with(json),
            Err(e) => ControlResponse::err(e.to_string()),
        }
    }

    fn status(&self, trunk: &str) -> ControlResponse {
        let status = match self.registry.get_status(trunk) {
            Ok(status) => status,
            Err(e) => return ControlResponse::err(e.to_string()),
        };
        match serde_json::to_string(&status) {
            Ok(json) => ControlResponse::with(json),
            Err(e) => ControlResponse::err(e.to_string()),
        }
    }

    fn counters(&self, iface: &str) -> ControlResponse {
        match self.ifaces().get(iface) {
            Some(iface) => {
                ControlResponse::with(format!("{{\"transmitted\":{}}}", iface.transmitted_count()))
            }
            None => ControlResponse::err(format!("no such interface: {iface}")),
        }
    }
}

const USAGE: &str = "
commands:
  create <trunk> | destroy <trunk>
  add-port <trunk> <iface> | remove-port <trunk> <iface>
  set-proto <trunk> <roundrobin|failover|loadbalance|etherchannel|lacp|none>
  link <iface> <up|down>
  send <iface>
  depart <iface>
  status [trunk] | counters <iface>
  quit
";
