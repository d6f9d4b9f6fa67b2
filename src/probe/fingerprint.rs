//! Heuristic broker identification from `$SYS` topic behavior
//!
//! Brokers publish different statistics trees under `$SYS`, or none at all.
//! The classifier walks an ordered rule list; the first rule whose predicate
//! holds decides the guess. Probing rules subscribe on a fresh connection and
//! watch whether anything is delivered within the read window.

use crate::protocol::{Expect, Probe, ProtocolVersion};
use crate::report::BrokerGuess;
use crate::transport::{hex, ConnectionManager};
use std::fmt;
use tracing::{debug, info, warn, Instrument};

/// What one rule observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evidence {
    /// The subscription was granted
    pub acknowledged: bool,
    /// Something arrived after the SUBACK
    pub message_received: bool,
    /// The analysis found that clients may publish to `$SYS`
    pub publish_sys: bool,
}

/// One step of the decision list
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    /// Subscription to send, or `None` for rules decided on prior findings
    pub probe: Option<Probe>,
    pub predicate: fn(&Evidence) -> bool,
    pub verdict: BrokerGuess,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("probe", &self.probe)
            .field("verdict", &self.verdict)
            .finish_non_exhaustive()
    }
}

fn silent_after_ack(e: &Evidence) -> bool {
    e.acknowledged && !e.message_received
}

fn delivers_after_ack(e: &Evidence) -> bool {
    e.acknowledged && e.message_received
}

fn delivers_and_accepts_sys(e: &Evidence) -> bool {
    delivers_after_ack(e) && e.publish_sys
}

fn rejects_sys_publish(e: &Evidence) -> bool {
    !e.publish_sys
}

fn always(_: &Evidence) -> bool {
    true
}

/// Default decision list
pub const RULES: &[Rule] = &[
    // granted but never publishes $SYS
    Rule {
        name: "sys_tree_silent",
        probe: Some(Probe::SubscribeSysAll),
        predicate: silent_after_ack,
        verdict: BrokerGuess::HiveMq,
    },
    Rule {
        name: "router_subscriptions",
        probe: Some(Probe::SubscribeRoutingStats),
        predicate: delivers_after_ack,
        verdict: BrokerGuess::VerneMq,
    },
    Rule {
        name: "load_messages_sent",
        probe: Some(Probe::SubscribeClientCounters),
        predicate: delivers_and_accepts_sys,
        verdict: BrokerGuess::Mosquitto,
    },
    // also reached when the counters topic delivers but $SYS publishing was refused
    Rule {
        name: "sys_publish_rejected",
        probe: None,
        predicate: rejects_sys_publish,
        verdict: BrokerGuess::HiveMq,
    },
    Rule {
        name: "fallback",
        probe: None,
        predicate: always,
        verdict: BrokerGuess::Unknown,
    },
];

/// Runs a rule list against one broker
#[derive(Debug, Clone)]
pub struct FingerprintClassifier {
    manager: ConnectionManager,
    rules: &'static [Rule],
}

impl FingerprintClassifier {
    pub fn new(manager: ConnectionManager) -> Self {
        Self::with_rules(manager, RULES)
    }

    pub fn with_rules(manager: ConnectionManager, rules: &'static [Rule]) -> Self {
        Self { manager, rules }
    }

    /// Guess the implementation over `version`
    ///
    /// `publish_sys` is the PublishSys finding for the same version. Failing
    /// to open a connection ends classification with [`BrokerGuess::Unknown`].
    pub async fn classify(&self, version: ProtocolVersion, publish_sys: bool) -> BrokerGuess {
        for rule in self.rules {
            let span = crate::probe_span!(rule = rule.name, version = %version);
            let evidence = match self
                .gather(rule.probe, version, publish_sys)
                .instrument(span)
                .await
            {
                Some(evidence) => evidence,
                None => return BrokerGuess::Unknown,
            };

            if (rule.predicate)(&evidence) {
                info!(rule = rule.name, guess = %rule.verdict, "broker guessed");
                return rule.verdict;
            }
            debug!(rule = rule.name, ?evidence, "rule did not match");
        }

        BrokerGuess::Unknown
    }

    /// Collect evidence for one rule; `None` when no connection could be opened
    async fn gather(
        &self,
        probe: Option<Probe>,
        version: ProtocolVersion,
        publish_sys: bool,
    ) -> Option<Evidence> {
        let mut evidence = Evidence {
            publish_sys,
            ..Default::default()
        };
        let Some(probe) = probe else {
            return Some(evidence);
        };

        let mut conn = match self.manager.connect(version).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "fingerprinting stopped");
                return None;
            }
        };

        if let Some(first) = conn.send_probe(probe).await {
            if let Some(ack_len) = Expect::SubAckQos0.matched_len(version, &first) {
                evidence.acknowledged = true;
                evidence.message_received = first.len() > ack_len;
            }
        }

        if evidence.acknowledged && !evidence.message_received {
            if let Some(message) = conn.read_response().await {
                debug!(message = %hex(&message), "message after SUBACK");
                evidence.message_received = true;
            }
        }

        conn.close().await;
        Some(evidence)
    }
}
