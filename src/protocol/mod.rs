//! MQTT wire subset used by the prober
//!
//! This module implements the packet codec: CONNECT construction, the
//! remaining-length varint, the literal probe catalogue, and CONNACK reason
//! code classification for both protocol versions.

pub mod catalogue;
pub mod codec;
pub mod reason_codes;

pub use catalogue::{Expect, Probe};
pub use codec::{
    decode_connect, decode_length, encode_connect, encode_length, CodecError, ConnectPacket,
    Credentials, CLIENT_ID, KEEP_ALIVE_SECS, MAX_REMAINING_LENGTH,
};
pub use reason_codes::{classify_connack, ConnackFailure, VersionSupport};

use serde::{Deserialize, Serialize};
use std::fmt;

/// MQTT protocol revision spoken on a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[serde(rename = "3.1.1")]
    V3_1_1,
    #[serde(rename = "5.0")]
    V5_0,
}

impl ProtocolVersion {
    /// Both versions in probing order
    pub const ALL: [ProtocolVersion; 2] = [ProtocolVersion::V3_1_1, ProtocolVersion::V5_0];

    /// Protocol level byte carried in CONNECT
    pub fn level(self) -> u8 {
        match self {
            ProtocolVersion::V3_1_1 => 0x04,
            ProtocolVersion::V5_0 => 0x05,
        }
    }

    /// Inverse of [`ProtocolVersion::level`]
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0x04 => Some(ProtocolVersion::V3_1_1),
            0x05 => Some(ProtocolVersion::V5_0),
            _ => None,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::V3_1_1 => write!(f, "MQTT v3.1.1"),
            ProtocolVersion::V5_0 => write!(f, "MQTT v5.0"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trip() {
        for version in ProtocolVersion::ALL {
            assert_eq!(ProtocolVersion::from_level(version.level()), Some(version));
        }
        assert_eq!(ProtocolVersion::from_level(0x03), None);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ProtocolVersion::V3_1_1.to_string(), "MQTT v3.1.1");
        assert_eq!(ProtocolVersion::V5_0.to_string(), "MQTT v5.0");
    }
}
