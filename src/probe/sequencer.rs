//! Ordered feature checks for one protocol version
//!
//! Each check sends one literal probe and compares the answer against
//! literal response prefixes. A check that gets no answer, a wrong answer or
//! an I/O error records the feature as absent. Only failing to (re)open a
//! connection, or a dead connection before the first check, aborts the phase.

use crate::error::{ProbeError, ProbeResult};
use crate::protocol::{Expect, Probe, ProtocolVersion};
use crate::report::{Finding, VersionFindings};
use crate::transport::{Connection, ConnectionManager};
use std::time::Duration;
use tracing::{debug, info, Instrument};

/// Runs the check battery against one broker
#[derive(Debug, Clone)]
pub struct ProbeSequencer {
    manager: ConnectionManager,
    sys_echo_wait: Duration,
}

/// Whether `response` is a QoS 1 SUBACK immediately followed by the broker
/// relaying our retained `$SYS/mqttinfo` publish
pub fn sys_echo_observed(version: ProtocolVersion, response: &[u8]) -> bool {
    match Expect::SubAckQos1.matched_len(version, response) {
        Some(len) => response[len..].starts_with(Probe::PublishSys.packet(version)),
        None => false,
    }
}

fn record(findings: &mut VersionFindings, version: ProtocolVersion, finding: Finding, value: bool) {
    info!(%version, %finding, value, "finding");
    findings.record(finding, value);
}

impl ProbeSequencer {
    pub fn new(manager: ConnectionManager, sys_echo_wait: Duration) -> Self {
        Self {
            manager,
            sys_echo_wait,
        }
    }

    /// Run every check for `version`, writing results into `findings`
    ///
    /// Findings recorded before an abort are kept. The connection is closed
    /// when the phase ends either way.
    pub async fn analyze(
        &self,
        version: ProtocolVersion,
        findings: &mut VersionFindings,
    ) -> ProbeResult<()> {
        let span = crate::phase_span!(version = %version);
        self.run_phase(version, findings).instrument(span).await
    }

    async fn run_phase(
        &self,
        version: ProtocolVersion,
        findings: &mut VersionFindings,
    ) -> ProbeResult<()> {
        let mut conn = self.manager.connect(version).await?;
        if !conn.ping().await {
            conn.close().await;
            return Err(ProbeError::NoPingResponse { version });
        }

        let conn = self.run_checks(conn, findings).await?;
        conn.close().await;
        info!(%version, "analysis complete");
        Ok(())
    }

    async fn ensure_live(&self, conn: Connection) -> ProbeResult<Connection> {
        let liveness = self.manager.reconnect_if_dead(conn).await?;
        if liveness.was_replaced() {
            debug!("continuing on a fresh connection");
        }
        Ok(liveness.into_connection())
    }

    async fn run_checks(
        &self,
        mut conn: Connection,
        findings: &mut VersionFindings,
    ) -> ProbeResult<Connection> {
        let version = conn.version();

        let response = conn.send_probe(Probe::PublishQos1).await;
        let qos1 = matches_expect(Expect::PubAck, version, response.as_deref());
        record(findings, version, Finding::QoS1, qos1);

        let mut conn = self.ensure_live(conn).await?;
        let qos2 = qos2_flow(&mut conn).await;
        record(findings, version, Finding::QoS2, qos2);

        // reserved QoS: any answer at all is a protocol violation
        let mut conn = self.ensure_live(conn).await?;
        let response = conn.send_probe(Probe::PublishQos3).await;
        record(findings, version, Finding::QoS3Response, response.is_some());

        let mut conn = self.ensure_live(conn).await?;
        let response = conn.send_probe(Probe::SubscribeAll).await;
        let subscribe_all = matches_expect(Expect::SubAckQos0, version, response.as_deref());
        record(findings, version, Finding::SubscribeAll, subscribe_all);

        // a wildcard subscription leaves publishes flowing in, start clean
        let mut conn = self.manager.reconnect(conn).await?;
        let response = conn.send_probe(Probe::SubscribeInvalidFilter).await;
        let invalid = matches_expect(Expect::SubAckQos0, version, response.as_deref());
        record(findings, version, Finding::InvalidTopics, invalid);

        let mut conn = self.ensure_live(conn).await?;
        let response = conn.send_probe(Probe::SubscribeInvalidUtf8).await;
        let invalid_utf8 = matches_expect(Expect::SubAckQos0, version, response.as_deref());
        record(findings, version, Finding::InvalidUtf8Topic, invalid_utf8);

        let mut conn = self.ensure_live(conn).await?;
        let response = conn.send_probe(Probe::PublishSys).await;
        let publish_sys = matches_expect(Expect::PubAck, version, response.as_deref());
        record(findings, version, Finding::PublishSys, publish_sys);

        let mut conn = self.manager.reconnect(conn).await?;
        if publish_sys {
            let echoed = self.sys_echo(&mut conn).await;
            record(findings, version, Finding::FilterSys, !echoed);
        }

        Ok(conn)
    }

    /// Subscribe to `$SYS/mqttinfo` and look for our retained publish
    async fn sys_echo(&self, conn: &mut Connection) -> bool {
        let version = conn.version();
        if conn.send(Probe::SubscribeSys.packet(version)).await.is_err() {
            return false;
        }
        tokio::time::sleep(self.sys_echo_wait).await;

        match conn.read_response().await {
            Some(response) => sys_echo_observed(version, &response),
            None => false,
        }
    }
}

fn matches_expect(expect: Expect, version: ProtocolVersion, response: Option<&[u8]>) -> bool {
    response.is_some_and(|r| expect.matches(version, r))
}

/// PUBLISH QoS 2, then PUBREL once PUBREC arrives; true only on PUBCOMP
async fn qos2_flow(conn: &mut Connection) -> bool {
    let version = conn.version();

    let pubrec = conn.send_probe(Probe::PublishQos2).await;
    if !matches_expect(Expect::PubRec, version, pubrec.as_deref()) {
        return false;
    }

    let pubcomp = conn.send_probe(Probe::PubRel).await;
    matches_expect(Expect::PubComp, version, pubcomp.as_deref())
}
