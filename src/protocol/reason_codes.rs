//! CONNACK reason code policy
//!
//! The support check sends an anonymous CONNECT and classifies the code at
//! CONNACK byte offset 3. The sets of defined codes differ per version, and a
//! v3.1.1-only broker answering a v5.0 CONNECT replies with v3.1.1 codes.

use super::ProtocolVersion;
use std::fmt;

/// A CONNACK code that makes further probing pointless
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnackFailure {
    pub code: u8,
    pub reason: &'static str,
}

impl fmt::Display for ConnackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CONNACK: {} (code {:#04x})", self.reason, self.code)
    }
}

/// Outcome of the support check for one protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSupport {
    /// Broker speaks the version; `anonymous` is true when it accepted a
    /// CONNECT without credentials
    Supported { anonymous: bool },
    /// Broker does not speak the version
    Unsupported,
    /// Broker refused in a way that aborts the run
    Fatal(ConnackFailure),
}

/// Classify a CONNACK reason code received in answer to an anonymous CONNECT
pub fn classify_connack(version: ProtocolVersion, code: u8) -> VersionSupport {
    match version {
        ProtocolVersion::V3_1_1 => classify_v311(code),
        ProtocolVersion::V5_0 => classify_v5(code),
    }
}

fn fatal(code: u8, reason: &'static str) -> VersionSupport {
    VersionSupport::Fatal(ConnackFailure { code, reason })
}

fn classify_v311(code: u8) -> VersionSupport {
    match code {
        0x00 => VersionSupport::Supported { anonymous: true },
        0x01 => fatal(code, "Protocol version not supported"),
        0x02 => fatal(code, "Identifier rejected"),
        0x03 => fatal(code, "Server unavailable"),
        // bad username or password, not authorized
        0x04 | 0x05 => VersionSupport::Supported { anonymous: false },
        _ => VersionSupport::Unsupported,
    }
}

fn classify_v5(code: u8) -> VersionSupport {
    match code {
        0x00 => VersionSupport::Supported { anonymous: true },
        // 0x01 and 0x05 are v3.1.1 refusals from a broker that cannot parse v5.0
        0x01 | 0x05 | 0x84 => VersionSupport::Unsupported,
        0x86 | 0x87 | 0x8c => VersionSupport::Supported { anonymous: false },
        0x80 => fatal(code, "Unspecified error"),
        0x81 => fatal(code, "Malformed packet"),
        0x82 => fatal(code, "Protocol error"),
        0x83 => fatal(code, "Implementation specific error"),
        0x85 => fatal(code, "Client identifier not valid"),
        0x88 => fatal(code, "Server unavailable"),
        0x89 => fatal(code, "Server busy"),
        0x8a => fatal(code, "Banned"),
        0x90 => fatal(code, "Topic name invalid"),
        0x95 => fatal(code, "Packet too large"),
        0x97 => fatal(code, "Quota exceeded"),
        0x9a => fatal(code, "Retain not supported"),
        0x9b => fatal(code, "QoS not supported"),
        0x9c => fatal(code, "Use another server"),
        0x9d => fatal(code, "Server moved"),
        0x9f => fatal(code, "Connection rate exceeded"),
        _ => VersionSupport::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v311_policy() {
        let v = ProtocolVersion::V3_1_1;
        assert_eq!(
            classify_connack(v, 0x00),
            VersionSupport::Supported { anonymous: true }
        );
        for code in [0x01, 0x02, 0x03] {
            assert!(matches!(
                classify_connack(v, code),
                VersionSupport::Fatal(f) if f.code == code
            ));
        }
        for code in [0x04, 0x05] {
            assert_eq!(
                classify_connack(v, code),
                VersionSupport::Supported { anonymous: false }
            );
        }
        for code in [0x06, 0x80, 0x84, 0xff] {
            assert_eq!(classify_connack(v, code), VersionSupport::Unsupported);
        }
    }

    #[test]
    fn test_v5_policy() {
        let v = ProtocolVersion::V5_0;
        assert_eq!(
            classify_connack(v, 0x00),
            VersionSupport::Supported { anonymous: true }
        );
        for code in [0x01, 0x05, 0x84] {
            assert_eq!(classify_connack(v, code), VersionSupport::Unsupported);
        }
        for code in [0x86, 0x87, 0x8c] {
            assert_eq!(
                classify_connack(v, code),
                VersionSupport::Supported { anonymous: false }
            );
        }
        for code in [
            0x80, 0x81, 0x82, 0x83, 0x85, 0x88, 0x89, 0x8a, 0x90, 0x95, 0x97, 0x9a, 0x9b, 0x9c,
            0x9d, 0x9f,
        ] {
            assert!(
                matches!(classify_connack(v, code), VersionSupport::Fatal(_)),
                "code {code:#04x} should be fatal"
            );
        }
        // undefined codes, inside and outside the 0x80-0x9F block
        for code in [0x02, 0x04, 0x8b, 0x8d, 0x9e, 0xa0] {
            assert_eq!(classify_connack(v, code), VersionSupport::Unsupported);
        }
    }

    #[test]
    fn test_failure_display() {
        let VersionSupport::Fatal(failure) = classify_connack(ProtocolVersion::V5_0, 0x8a) else {
            panic!("expected fatal");
        };
        assert_eq!(failure.to_string(), "CONNACK: Banned (code 0x8a)");
    }
}
