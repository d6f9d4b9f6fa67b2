//! Feature checks against scripted brokers
//!
//! Each test scripts the exact replies a broker gives to the literal probes
//! and checks the findings recorded for that version.

use mqttinfo::protocol::{Expect, Probe};
use mqttinfo::testing::{BrokerBehavior, MockBroker};
use mqttinfo::{
    BrokerInspector, ConnectionManager, Liveness, ProbeError, ProtocolVersion, VersionFindings,
};

async fn analyze(
    behavior: BrokerBehavior,
    version: ProtocolVersion,
) -> (MockBroker, Result<VersionFindings, ProbeError>) {
    let broker = MockBroker::start(behavior).await.unwrap();
    let inspector = BrokerInspector::new(broker.config()).unwrap();
    let mut report = inspector.new_report();

    let result = inspector.analyze(version, &mut report).await;
    let findings = report.findings(version).clone();
    (broker, result.map(|_| findings))
}

#[tokio::test]
async fn test_qos1_only_broker() {
    let behavior = BrokerBehavior::new().reply(
        ProtocolVersion::V3_1_1,
        Probe::PublishQos1,
        b"\x40\x02\x00\x01".to_vec(),
    );
    let (_broker, result) = analyze(behavior, ProtocolVersion::V3_1_1).await;
    let findings = result.unwrap();

    assert!(findings.qos1);
    assert!(!findings.qos2);
    assert!(!findings.qos3_response);
    assert!(!findings.subscribe_all);
    assert!(!findings.invalid_topics);
    assert!(!findings.invalid_utf8_topic);
    assert!(!findings.publish_sys);
    assert!(findings.filter_sys);
}

#[tokio::test]
async fn test_v5_accepts_puback_with_reason() {
    let behavior = BrokerBehavior::new().reply(
        ProtocolVersion::V5_0,
        Probe::PublishQos1,
        b"\x40\x03\x00\x01\x10".to_vec(),
    );
    let (_broker, result) = analyze(behavior, ProtocolVersion::V5_0).await;
    assert!(result.unwrap().qos1);
}

#[tokio::test]
async fn test_silent_ping_aborts_both_versions() {
    let broker = MockBroker::start(BrokerBehavior::compliant().ignore_ping())
        .await
        .unwrap();
    let inspector = BrokerInspector::new(broker.config()).unwrap();
    let mut report = inspector.new_report();

    for version in ProtocolVersion::ALL {
        let err = inspector.analyze(version, &mut report).await.unwrap_err();
        assert!(
            matches!(err, ProbeError::NoPingResponse { version: v } if v == version),
            "{err}"
        );
        assert_eq!(report.findings(version), &VersionFindings::default());
    }

    // nothing beyond the liveness check was sent
    assert!(!broker.received(ProtocolVersion::V3_1_1, Probe::PublishQos1).await);
    assert!(!broker.received(ProtocolVersion::V5_0, Probe::PublishQos1).await);
}

#[tokio::test]
async fn test_silent_ping_fails_full_run() {
    let broker = MockBroker::start(BrokerBehavior::new().ignore_ping())
        .await
        .unwrap();
    let report = BrokerInspector::new(broker.config()).unwrap().run().await;

    assert!(report.failed);
    assert_eq!(
        report.error.as_deref(),
        Some("Broker does not respond to PINGREQ over MQTT v3.1.1")
    );
    assert!(report.v3_1_1.supported);
    assert!(!report.v3_1_1.qos1);
}

#[tokio::test]
async fn test_compliant_broker() {
    for version in ProtocolVersion::ALL {
        let (broker, result) = analyze(BrokerBehavior::compliant(), version).await;
        let findings = result.unwrap();

        assert!(findings.qos1, "{version}");
        assert!(findings.qos2, "{version}");
        assert!(!findings.qos3_response, "{version}");
        assert!(findings.subscribe_all, "{version}");
        assert!(!findings.invalid_topics, "{version}");
        assert!(!findings.invalid_utf8_topic, "{version}");
        assert!(!findings.publish_sys, "{version}");
        assert!(findings.filter_sys, "{version}");

        assert!(broker.received(version, Probe::PubRel).await);
        // the $SYS subscription only follows an accepted $SYS publish
        assert!(!broker.received(version, Probe::SubscribeSys).await);
    }
}

#[tokio::test]
async fn test_reconnects_after_broker_closes() {
    // the compliant script drops the connection on QoS 3
    let (broker, result) = analyze(BrokerBehavior::compliant(), ProtocolVersion::V3_1_1).await;
    let findings = result.unwrap();
    assert!(findings.subscribe_all);

    // initial, after the QoS 3 close, before `A+`, before the $SYS echo
    assert_eq!(broker.connects().await.len(), 4);
}

#[tokio::test]
async fn test_qos2_needs_pubcomp() {
    let version = ProtocolVersion::V3_1_1;
    let behavior = BrokerBehavior::new().acknowledge(version, Probe::PublishQos2, Expect::PubRec);
    let (broker, result) = analyze(behavior, version).await;

    assert!(!result.unwrap().qos2);
    assert!(broker.received(version, Probe::PubRel).await);
}

#[tokio::test]
async fn test_qos2_without_pubrec_skips_pubrel() {
    let version = ProtocolVersion::V5_0;
    let (broker, result) = analyze(BrokerBehavior::new(), version).await;

    assert!(!result.unwrap().qos2);
    assert!(!broker.received(version, Probe::PubRel).await);
}

#[tokio::test]
async fn test_any_answer_to_qos3_counts() {
    let version = ProtocolVersion::V3_1_1;
    let behavior = BrokerBehavior::new().reply(version, Probe::PublishQos3, b"\xe0\x00".to_vec());
    let (_broker, result) = analyze(behavior, version).await;
    assert!(result.unwrap().qos3_response);
}

#[tokio::test]
async fn test_permissive_filters() {
    let version = ProtocolVersion::V5_0;
    let behavior = BrokerBehavior::new()
        .acknowledge(version, Probe::SubscribeInvalidFilter, Expect::SubAckQos0)
        .acknowledge(version, Probe::SubscribeInvalidUtf8, Expect::SubAckQos0);
    let (_broker, result) = analyze(behavior, version).await;
    let findings = result.unwrap();

    assert!(!findings.subscribe_all);
    assert!(findings.invalid_topics);
    assert!(findings.invalid_utf8_topic);
}

fn sys_publishing(version: ProtocolVersion, echo: bool) -> BrokerBehavior {
    let mut suback = Expect::SubAckQos1.primary(version).to_vec();
    if echo {
        suback.extend_from_slice(Probe::PublishSys.packet(version));
    }
    BrokerBehavior::new()
        .acknowledge(version, Probe::PublishSys, Expect::PubAck)
        .reply(version, Probe::SubscribeSys, suback)
}

#[tokio::test]
async fn test_sys_publish_relayed() {
    for version in ProtocolVersion::ALL {
        let (_broker, result) = analyze(sys_publishing(version, true), version).await;
        let findings = result.unwrap();
        assert!(findings.publish_sys, "{version}");
        assert!(!findings.filter_sys, "{version}");
    }
}

#[tokio::test]
async fn test_sys_publish_filtered() {
    let version = ProtocolVersion::V3_1_1;
    let (broker, result) = analyze(sys_publishing(version, false), version).await;
    let findings = result.unwrap();

    assert!(findings.publish_sys);
    assert!(findings.filter_sys);
    assert!(broker.received(version, Probe::SubscribeSys).await);
}

#[tokio::test]
async fn test_liveness_check_replaces_closed_connection() {
    let version = ProtocolVersion::V5_0;
    let broker = MockBroker::start(BrokerBehavior::compliant()).await.unwrap();
    let manager = ConnectionManager::new(&broker.config());

    let mut conn = manager.connect(version).await.unwrap();
    assert_eq!(conn.send_probe(Probe::PublishQos3).await, None);

    let replaced = manager.reconnect_if_dead(conn).await.unwrap();
    assert!(matches!(replaced, Liveness::Replaced(_)));

    let alive = manager
        .reconnect_if_dead(replaced.into_connection())
        .await
        .unwrap();
    assert!(matches!(alive, Liveness::Alive(_)));
    assert_eq!(alive.into_connection().version(), version);

    assert_eq!(broker.connects().await.len(), 2);
}

#[tokio::test]
async fn test_failed_reconnect_keeps_earlier_findings() {
    let version = ProtocolVersion::V3_1_1;
    let behavior = BrokerBehavior::new()
        .acknowledge(version, Probe::PublishQos1, Expect::PubAck)
        .close_on(version, Probe::PublishQos2)
        .refuse_after(1);
    let broker = MockBroker::start(behavior).await.unwrap();
    let inspector = BrokerInspector::new(broker.config()).unwrap();
    let mut report = inspector.new_report();

    let err = inspector.analyze(version, &mut report).await.unwrap_err();
    assert!(
        matches!(err, ProbeError::ConnackRead { version: v, .. } if v == version),
        "{err}"
    );

    assert_eq!(
        report.findings(version),
        &VersionFindings {
            qos1: true,
            ..VersionFindings::default()
        }
    );

    // QoS 2 dropped the connection and the replacement was refused
    assert_eq!(broker.connects().await.len(), 1);
    assert!(!broker.received(version, Probe::PublishQos3).await);
}
