//! Error types for broker probing
//!
//! Only failures that abort a phase are errors. A probe that gets no answer,
//! the wrong answer, or an I/O error is a negative finding, never a
//! `ProbeError`.

use crate::protocol::{ConnackFailure, ProtocolVersion};
use std::time::Duration;
use thiserror::Error;

/// Main error type for probing operations
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("TCP connection to {target} failed: {source}")]
    Dial {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TCP connection to {target} timed out after {timeout:?}")]
    DialTimeout { target: String, timeout: Duration },

    #[error("{version} CONNACK read failed: {reason}")]
    ConnackRead {
        version: ProtocolVersion,
        reason: String,
    },

    #[error("{version} CONNACK too short ({len} bytes)")]
    ConnackTooShort { version: ProtocolVersion, len: usize },

    #[error("{version} connection request rejected (code {code:#04x})")]
    ConnectionRejected { version: ProtocolVersion, code: u8 },

    #[error("{version} {failure}")]
    ConnackFatal {
        version: ProtocolVersion,
        failure: ConnackFailure,
    },

    #[error("Broker does not respond to PINGREQ over {version}")]
    NoPingResponse { version: ProtocolVersion },
}

impl ProbeError {
    /// Create a CONNACK read error from any displayable cause
    pub fn connack_read<S: ToString>(version: ProtocolVersion, reason: S) -> Self {
        Self::ConnackRead {
            version,
            reason: reason.to_string(),
        }
    }
}

/// Result type for probing operations
pub type ProbeResult<T> = Result<T, ProbeError>;
