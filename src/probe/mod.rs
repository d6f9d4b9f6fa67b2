//! Probing engine
//!
//! - [`sequencer`] runs the feature checks for one protocol version
//! - [`fingerprint`] guesses the broker implementation
//! - [`inspector`] ties both together into a full run

pub mod fingerprint;
pub mod inspector;
pub mod sequencer;

pub use fingerprint::{Evidence, FingerprintClassifier, Rule, RULES};
pub use inspector::BrokerInspector;
pub use sequencer::{sys_echo_observed, ProbeSequencer};
