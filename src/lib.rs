//! mqttinfo - MQTT broker prober
//!
//! Connects to an MQTT broker over v3.1.1 and v5.0, runs a fixed battery of
//! conformance probes and guesses which broker implementation is running.
//!
//! # Overview
//!
//! - [`protocol`] - byte-exact packet construction and literal response patterns
//! - [`transport`] - connections, CONNECT/CONNACK handshakes, liveness checks
//! - [`probe`] - feature checks, fingerprinting and the full run
//! - [`report`] - the result record
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mqttinfo::{BrokerInspector, ProbeConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let inspector = BrokerInspector::new(ProbeConfig::new("localhost", 1883)).unwrap();
//!     let report = inspector.run().await;
//!
//!     println!("looks like {}", report.type_guessed);
//!     println!("{}", serde_json::to_string(&report).unwrap());
//! }
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod probe;
pub mod protocol;
pub mod report;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, ProbeConfig};
pub use error::{ProbeError, ProbeResult};
pub use probe::{BrokerInspector, FingerprintClassifier, ProbeSequencer};
pub use protocol::{ProtocolVersion, VersionSupport};
pub use report::{BrokerGuess, BrokerReport, Finding, VersionFindings};
pub use transport::{Connection, ConnectionManager, Liveness};
