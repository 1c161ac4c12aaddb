//! Error types for trunk operations.
//!
//! Administrative callers get a distinct variant per violated precondition,
//! never a generic "operation failed". Data-path errors (`NoActivePort`) are
//! counted and dropped by the caller; they are an expected operational state,
//! not a bug.

use crate::iface::MediaType;
use thiserror::Error;

/// Result type alias for trunk operations.
pub type TrunkResult<T> = Result<T, TrunkError>;

/// Errors that can occur during trunk operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrunkError {
    /// A trunk with this name already exists in the registry.
    #[error("trunk '{0}' already exists")]
    TrunkExists(String),

    /// Registry lookup of an unknown trunk.
    #[error("trunk '{0}' not found")]
    TrunkNotFound(String),

    /// The trunk already carries the maximum number of member ports.
    #[error("trunk '{trunk}' already has the maximum of {max} ports")]
    TooManyPorts {
        /// The trunk that is full.
        trunk: String,
        /// The compile-time port limit.
        max: usize,
    },

    /// The interface is administratively or operationally busy.
    #[error("interface '{0}' is busy")]
    PortBusy(String),

    /// The interface is already bound to a trunk (possibly this one).
    #[error("interface '{iface}' is already bound to trunk '{trunk}'")]
    AlreadyBound {
        /// The interface that was offered.
        iface: String,
        /// The trunk that already owns it.
        trunk: String,
    },

    /// Only Ethernet-like interfaces can be aggregated.
    #[error("interface '{iface}' has unsupported media type '{media}'")]
    UnsupportedMediaType {
        /// The interface that was offered.
        iface: String,
        /// Its media type.
        media: MediaType,
    },

    /// Attaching would create a trunk-in-trunk cycle or exceed the
    /// stacking depth cap.
    #[error(
        "attaching '{iface}' to trunk '{trunk}' would loop or exceed stacking depth {max}"
    )]
    StackingLoop {
        /// The interface (itself a trunk) that was offered.
        iface: String,
        /// The trunk it was offered to.
        trunk: String,
        /// The stacking depth cap.
        max: usize,
    },

    /// Unrecognized aggregation protocol name.
    #[error("unsupported aggregation protocol: {0}")]
    UnsupportedProtocol(String),

    /// No member port can currently carry traffic (transmit-time).
    #[error("no active port on trunk '{0}'")]
    NoActivePort(String),

    /// Lookup of a port that is not a member of this trunk.
    #[error("port '{port}' is not a member of trunk '{trunk}'")]
    PortNotFound {
        /// The trunk that was searched.
        trunk: String,
        /// The missing port.
        port: String,
    },

    /// The policy's attach hook failed; the protocol switch was unwound.
    #[error("policy attach failed on trunk '{trunk}': {reason}")]
    PolicyAttachFailed {
        /// The trunk whose protocol switch failed.
        trunk: String,
        /// What the policy reported.
        reason: String,
    },

    /// The member driver rejected an outbound frame.
    #[error("transmit failed on interface '{0}'")]
    TransmitFailed(String),
}
