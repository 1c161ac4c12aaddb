//! Common types for the trunking (link aggregation) control plane.
//!
//! This crate provides type-safe representations of the network primitives
//! shared between the trunk engine and the administrative daemon:
//!
//! - [`MacAddress`]: 48-bit Ethernet link-layer addresses
//! - [`LinkState`]: pushed per-port link state (up/down)

mod link;
mod mac;

pub use link::LinkState;
pub use mac::MacAddress;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid link state: {0} (expected 'up' or 'down')")]
    InvalidLinkState(String),
}
