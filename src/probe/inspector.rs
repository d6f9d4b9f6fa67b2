//! One complete probing run against a broker

use super::{FingerprintClassifier, ProbeSequencer};
use crate::config::{ConfigError, ProbeConfig};
use crate::error::{ProbeError, ProbeResult};
use crate::protocol::{ProtocolVersion, VersionSupport};
use crate::report::{BrokerGuess, BrokerReport};
use crate::transport::ConnectionManager;
use tracing::{error, info};

/// Drives support checks, analysis and fingerprinting in order
#[derive(Debug, Clone)]
pub struct BrokerInspector {
    config: ProbeConfig,
    manager: ConnectionManager,
}

impl BrokerInspector {
    /// Validate `config` and prepare a run
    pub fn new(config: ProbeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let manager = ConnectionManager::new(&config);
        Ok(Self { config, manager })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Fresh record for this target
    pub fn new_report(&self) -> BrokerReport {
        BrokerReport::new(self.config.target.host.clone(), self.config.target.port)
    }

    /// Run every phase and return the record, failed or not
    pub async fn run(&self) -> BrokerReport {
        let mut report = self.new_report();
        if let Err(e) = self.run_phases(&mut report).await {
            error!(error = %e, "run aborted");
            report.fail(e);
        }
        report
    }

    async fn run_phases(&self, report: &mut BrokerReport) -> ProbeResult<()> {
        for version in ProtocolVersion::ALL {
            self.check_support(version, report).await?;
        }

        for version in ProtocolVersion::ALL {
            if report.findings(version).supported {
                self.analyze(version, report).await?;
            }
        }

        self.fingerprint(report).await;
        Ok(())
    }

    /// Set the `supported` and `anonymous` flags for `version`
    ///
    /// A fatal CONNACK code is returned as [`ProbeError::ConnackFatal`].
    pub async fn check_support(
        &self,
        version: ProtocolVersion,
        report: &mut BrokerReport,
    ) -> ProbeResult<()> {
        let findings = report.findings_mut(version);
        match self.manager.check_support(version).await? {
            VersionSupport::Supported { anonymous } => {
                findings.supported = true;
                findings.anonymous = anonymous;
            }
            VersionSupport::Unsupported => {
                findings.supported = false;
            }
            VersionSupport::Fatal(failure) => {
                return Err(ProbeError::ConnackFatal { version, failure });
            }
        }
        Ok(())
    }

    /// Run the check battery for `version`
    pub async fn analyze(
        &self,
        version: ProtocolVersion,
        report: &mut BrokerReport,
    ) -> ProbeResult<()> {
        let sequencer = ProbeSequencer::new(
            self.manager.clone(),
            self.config.timeouts.sys_echo_wait(),
        );
        sequencer.analyze(version, report.findings_mut(version)).await
    }

    /// Guess the implementation, preferring v3.1.1 when the broker speaks it
    pub async fn fingerprint(&self, report: &mut BrokerReport) {
        let Some(version) = ProtocolVersion::ALL
            .into_iter()
            .find(|v| report.findings(*v).supported)
        else {
            info!("no supported protocol version, skipping fingerprint");
            report.type_guessed = BrokerGuess::Unknown;
            return;
        };

        let publish_sys = report.findings(version).publish_sys;
        let classifier = FingerprintClassifier::new(self.manager.clone());
        report.type_guessed = classifier.classify(version, publish_sys).await;
    }
}
