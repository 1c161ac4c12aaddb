//! In-memory interface driver used by tests and the standalone daemon.

use crate::capabilities::Capabilities;
use crate::error::{TrunkError, TrunkResult};
use crate::frame::Frame;
use crate::iface::{InterfaceFlag, InterfaceKind, MediaType, PhysicalInterface};
use std::sync::{Arc, Mutex, PoisonError};
use trunk_types::MacAddress;

#[derive(Debug)]
struct SimState {
    link_addr: MacAddress,
    capabilities: Capabilities,
    kind: InterfaceKind,
    media: MediaType,
    busy: bool,
    fail_transmit: bool,
    promiscuous: bool,
    all_multicast: bool,
    groups: Vec<MacAddress>,
    transmitted: Vec<Frame>,
}

/// A scriptable [`PhysicalInterface`] backed by plain memory.
///
/// Transmitted frames are captured rather than sent, and every mutation
/// the trunk performs (address, type marker, flags, group memberships) is
/// observable afterwards.
#[derive(Debug)]
pub struct SimInterface {
    name: String,
    state: Mutex<SimState>,
}

impl SimInterface {
    /// A new shared interface with full capabilities and Ethernet media.
    pub fn new(name: &str, mac: MacAddress) -> Arc<Self> {
        Arc::new(SimInterface {
            name: name.to_string(),
            state: Mutex::new(SimState {
                link_addr: mac,
                capabilities: Capabilities::ALL,
                kind: InterfaceKind::Ethernet,
                media: MediaType::Ethernet,
                busy: false,
                fail_transmit: false,
                promiscuous: false,
                all_multicast: false,
                groups: Vec::new(),
                transmitted: Vec::new(),
            }),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the advertised capability mask.
    pub fn with_capabilities(self: Arc<Self>, caps: Capabilities) -> Arc<Self> {
        self.state().capabilities = caps;
        self
    }

    /// Replaces the media type.
    pub fn with_media(self: Arc<Self>, media: MediaType) -> Arc<Self> {
        self.state().media = media;
        self
    }

    /// Marks the interface busy or free.
    pub fn set_busy(&self, busy: bool) {
        self.state().busy = busy;
    }

    /// Makes every subsequent transmit fail (or succeed again).
    pub fn set_fail_transmit(&self, fail: bool) {
        self.state().fail_transmit = fail;
    }

    /// Frames handed to this interface so far, oldest first.
    pub fn transmitted(&self) -> Vec<Frame> {
        self.state().transmitted.clone()
    }

    /// Number of frames handed to this interface so far.
    pub fn transmitted_count(&self) -> usize {
        self.state().transmitted.len()
    }

    /// Current hardware multicast memberships.
    pub fn joined_groups(&self) -> Vec<MacAddress> {
        self.state().groups.clone()
    }

    /// Drops captured frames.
    pub fn clear_transmitted(&self) {
        self.state().transmitted.clear();
    }
}

impl PhysicalInterface for SimInterface {
    fn name(&self) -> &str {
        &self.name
    }

    fn media(&self) -> MediaType {
        self.state().media
    }

    fn is_busy(&self) -> bool {
        self.state().busy
    }

    fn link_addr(&self) -> MacAddress {
        self.state().link_addr
    }

    fn set_link_addr(&self, addr: MacAddress) {
        self.state().link_addr = addr;
    }

    fn capabilities(&self) -> Capabilities {
        self.state().capabilities
    }

    fn kind(&self) -> InterfaceKind {
        self.state().kind
    }

    fn set_kind(&self, kind: InterfaceKind) {
        self.state().kind = kind;
    }

    fn flag(&self, flag: InterfaceFlag) -> bool {
        let state = self.state();
        match flag {
            InterfaceFlag::Promiscuous => state.promiscuous,
            InterfaceFlag::AllMulticast => state.all_multicast,
        }
    }

    fn set_flag(&self, flag: InterfaceFlag, on: bool) {
        let mut state = self.state();
        match flag {
            InterfaceFlag::Promiscuous => state.promiscuous = on,
            InterfaceFlag::AllMulticast => state.all_multicast = on,
        }
    }

    fn join_multicast(&self, group: MacAddress) {
        let mut state = self.state();
        if !state.groups.contains(&group) {
            state.groups.push(group);
        }
    }

    fn leave_multicast(&self, group: MacAddress) {
        self.state().groups.retain(|g| *g != group);
    }

    fn transmit(&self, frame: &Frame) -> TrunkResult<()> {
        let mut state = self.state();
        if state.fail_transmit {
            return Err(TrunkError::TransmitFailed(self.name.clone()));
        }
        state.transmitted.push(frame.clone());
        Ok(())
    }
}
