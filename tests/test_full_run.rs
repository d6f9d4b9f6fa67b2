//! End-to-end runs of the inspector

use mqttinfo::protocol::{Expect, Probe};
use mqttinfo::testing::{BrokerBehavior, MockBroker};
use mqttinfo::{BrokerGuess, BrokerInspector, BrokerReport, ProbeConfig, ProtocolVersion};

fn deterministic_broker() -> BrokerBehavior {
    let mut behavior = BrokerBehavior::compliant();
    for version in ProtocolVersion::ALL {
        let mut echo = Expect::SubAckQos1.primary(version).to_vec();
        echo.extend_from_slice(Probe::PublishSys.packet(version));
        behavior = behavior
            .acknowledge(version, Probe::PublishSys, Expect::PubAck)
            .reply(version, Probe::SubscribeSys, echo)
            .acknowledge(version, Probe::SubscribeSysAll, Expect::SubAckQos0);
    }
    behavior
}

#[tokio::test]
async fn test_runs_are_deterministic() {
    let broker = MockBroker::start(deterministic_broker()).await.unwrap();
    let inspector = BrokerInspector::new(broker.config()).unwrap();

    let first = inspector.run().await;
    let second = inspector.run().await;

    assert_eq!(first, second);
    assert!(!first.failed);
    assert_eq!(first.type_guessed, BrokerGuess::HiveMq);
    for version in ProtocolVersion::ALL {
        let findings = first.findings(version);
        assert!(findings.supported && findings.anonymous, "{version}");
        assert!(findings.qos1 && findings.qos2, "{version}");
        assert!(findings.publish_sys, "{version}");
        assert!(!findings.filter_sys, "{version}");
    }
}

#[tokio::test]
async fn test_unreachable_broker_fails_run() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = ProbeConfig::new("127.0.0.1", port);
    config.timeouts.dial_timeout_ms = 1_000;
    let report = BrokerInspector::new(config).unwrap().run().await;

    assert!(report.failed);
    let error = report.error.clone().unwrap();
    assert!(error.contains(&format!("127.0.0.1:{port}")), "{error}");
    assert_eq!(report.type_guessed, BrokerGuess::Unknown);
    assert!(!report.v3_1_1.supported);
}

#[tokio::test]
async fn test_report_json_round_trip_without_credentials() {
    let broker = MockBroker::start(deterministic_broker()).await.unwrap();
    let mut config = broker.config();
    config.credentials.username = Some("probe".to_string());
    config.credentials.password = Some("hunter2".to_string());

    let report = BrokerInspector::new(config).unwrap().run().await;
    let json = serde_json::to_string(&report).unwrap();

    assert!(!json.contains("hunter2"));
    assert!(!json.contains("probe\""));
    let parsed: BrokerReport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, report);
    assert_eq!(parsed.host, "127.0.0.1");
    assert_eq!(parsed.port, broker.port());
}

#[tokio::test]
async fn test_analysis_uses_credentials() {
    let broker = MockBroker::start(BrokerBehavior::compliant()).await.unwrap();
    let mut config = broker.config();
    config.credentials.username = Some("probe".to_string());

    let report = BrokerInspector::new(config).unwrap().run().await;
    assert!(!report.failed, "{:?}", report.error);

    let connects = broker.connects().await;
    // two anonymous support checks, then authenticated connections only
    assert!(connects[..2].iter().all(|c| c.username.is_none()));
    assert!(connects[2..]
        .iter()
        .all(|c| c.username.as_deref() == Some("probe")));
}
