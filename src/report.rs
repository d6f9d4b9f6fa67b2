//! Result record of a probing run
//!
//! A [`BrokerReport`] is created once per run, mutated as probes complete and
//! serialized once at the end. Every finding starts at its conservative
//! value, so a run that aborts halfway still yields a consistent record.

use crate::protocol::ProtocolVersion;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A boolean result produced by one probe of the sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finding {
    QoS1,
    QoS2,
    QoS3Response,
    SubscribeAll,
    InvalidTopics,
    InvalidUtf8Topic,
    PublishSys,
    FilterSys,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Finding::QoS1 => "qos1",
            Finding::QoS2 => "qos2",
            Finding::QoS3Response => "qos3_response",
            Finding::SubscribeAll => "subscribe_all",
            Finding::InvalidTopics => "invalid_topics",
            Finding::InvalidUtf8Topic => "invalid_utf8_topic",
            Finding::PublishSys => "publish_sys",
            Finding::FilterSys => "filter_sys",
        };
        f.write_str(name)
    }
}

/// Everything learned about one protocol version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionFindings {
    pub supported: bool,
    pub anonymous: bool,
    pub qos1: bool,
    pub qos2: bool,
    /// Broker answered a PUBLISH with the reserved QoS 3
    pub qos3_response: bool,
    /// Broker acknowledged a subscription to `#`
    pub subscribe_all: bool,
    /// Broker acknowledged the malformed filter `A+`
    pub invalid_topics: bool,
    /// Broker acknowledged a filter that is not valid UTF-8
    pub invalid_utf8_topic: bool,
    /// Broker acknowledged a client publish into `$SYS`
    pub publish_sys: bool,
    /// Broker kept the client's retained `$SYS` publish away from subscribers
    pub filter_sys: bool,
}

impl Default for VersionFindings {
    fn default() -> Self {
        Self {
            supported: false,
            anonymous: false,
            qos1: false,
            qos2: false,
            qos3_response: false,
            subscribe_all: false,
            invalid_topics: false,
            invalid_utf8_topic: false,
            publish_sys: false,
            filter_sys: true,
        }
    }
}

impl VersionFindings {
    fn slot(&mut self, finding: Finding) -> &mut bool {
        match finding {
            Finding::QoS1 => &mut self.qos1,
            Finding::QoS2 => &mut self.qos2,
            Finding::QoS3Response => &mut self.qos3_response,
            Finding::SubscribeAll => &mut self.subscribe_all,
            Finding::InvalidTopics => &mut self.invalid_topics,
            Finding::InvalidUtf8Topic => &mut self.invalid_utf8_topic,
            Finding::PublishSys => &mut self.publish_sys,
            Finding::FilterSys => &mut self.filter_sys,
        }
    }

    /// Store the observed value of `finding`
    pub fn record(&mut self, finding: Finding, value: bool) {
        *self.slot(finding) = value;
    }

    pub fn get(&self, finding: Finding) -> bool {
        match finding {
            Finding::QoS1 => self.qos1,
            Finding::QoS2 => self.qos2,
            Finding::QoS3Response => self.qos3_response,
            Finding::SubscribeAll => self.subscribe_all,
            Finding::InvalidTopics => self.invalid_topics,
            Finding::InvalidUtf8Topic => self.invalid_utf8_topic,
            Finding::PublishSys => self.publish_sys,
            Finding::FilterSys => self.filter_sys,
        }
    }
}

/// Heuristic guess of the broker implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BrokerGuess {
    #[serde(rename = "HiveMQ")]
    HiveMq,
    #[serde(rename = "VerneMQ")]
    VerneMq,
    #[serde(rename = "mosquitto")]
    Mosquitto,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl fmt::Display for BrokerGuess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BrokerGuess::HiveMq => "HiveMQ",
            BrokerGuess::VerneMq => "VerneMQ",
            BrokerGuess::Mosquitto => "mosquitto",
            BrokerGuess::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Aggregate output of one probing run
///
/// Credentials are deliberately absent: the record is meant to be written to
/// disk and shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerReport {
    pub host: String,
    pub port: u16,
    pub v3_1_1: VersionFindings,
    pub v5_0: VersionFindings,
    pub type_guessed: BrokerGuess,
    pub failed: bool,
    pub error: Option<String>,
}

impl BrokerReport {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            v3_1_1: VersionFindings::default(),
            v5_0: VersionFindings::default(),
            type_guessed: BrokerGuess::Unknown,
            failed: false,
            error: None,
        }
    }

    pub fn findings(&self, version: ProtocolVersion) -> &VersionFindings {
        match version {
            ProtocolVersion::V3_1_1 => &self.v3_1_1,
            ProtocolVersion::V5_0 => &self.v5_0,
        }
    }

    pub fn findings_mut(&mut self, version: ProtocolVersion) -> &mut VersionFindings {
        match version {
            ProtocolVersion::V3_1_1 => &mut self.v3_1_1,
            ProtocolVersion::V5_0 => &mut self.v5_0,
        }
    }

    /// Mark the run as aborted with the display form of `error`
    pub fn fail<E: fmt::Display>(&mut self, error: E) {
        self.failed = true;
        self.error = Some(error.to_string());
    }
}
