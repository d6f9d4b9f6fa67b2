//! mqttinfo - command-line entry point
//!
//! Runs one probing session, prints the findings and optionally appends the
//! record as a JSON line to a file.

use clap::Parser;
use mqttinfo::observability::init_default_logging;
use mqttinfo::{BrokerInspector, BrokerReport, ConfigError, ProbeConfig, ProtocolVersion};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};

const DEFAULT_JSON_FILE: &str = "mqttinfo.json";

/// MQTT broker prober and fingerprinter
#[derive(Parser, Debug)]
#[command(name = "mqttinfo")]
#[command(about = "Probes an MQTT broker for protocol conformance and guesses its implementation")]
#[command(version)]
#[command(disable_help_flag = true)]
struct Cli {
    /// MQTT broker to connect to [default: localhost]
    #[arg(short = 'h', long)]
    host: Option<String>,

    /// Network port to connect to [default: 1883]
    #[arg(short, long)]
    port: Option<u16>,

    /// Username, if authentication is needed
    #[arg(short, long)]
    user: Option<String>,

    /// Password, if authentication is needed
    #[arg(short = 'P', long, env = "MQTTINFO_PASSWORD", hide_env_values = true)]
    pwd: Option<String>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Append the JSON record to mqttinfo.json
    #[arg(short, long)]
    json: bool,

    /// Append the JSON record to this file instead (implies --json)
    #[arg(long, value_name = "PATH")]
    json_file: Option<PathBuf>,

    /// Verbose logging, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    fn json_path(&self) -> Option<PathBuf> {
        match (&self.json_file, self.json) {
            (Some(path), _) => Some(path.clone()),
            (None, true) => Some(PathBuf::from(DEFAULT_JSON_FILE)),
            (None, false) => None,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            process::exit(1);
        }
    };

    let inspector = match BrokerInspector::new(config) {
        Ok(inspector) => inspector,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            process::exit(1);
        }
    };

    println!("mqttinfo {}", env!("CARGO_PKG_VERSION"));
    println!("\nTarget: {}", inspector.config().target());
    info!(broker = %inspector.config().target(), "probing broker");

    let report = inspector.run().await;
    print!("{}", render_report(&report));

    if let Some(path) = cli.json_path() {
        if let Err(e) = append_json(&path, &report) {
            error!(path = %path.display(), error = %e, "could not write JSON record");
            eprintln!("Error writing {}: {e}", path.display());
        }
    }

    if report.failed {
        let _ = std::io::stdout().flush();
        process::exit(1);
    }
}

/// File configuration, then flag overrides
fn load_configuration(cli: &Cli) -> Result<ProbeConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => ProbeConfig::load_from_file(path)?,
        None => ProbeConfig::default(),
    };

    if let Some(host) = &cli.host {
        config.target.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.target.port = port;
    }
    if let Some(user) = &cli.user {
        config.credentials.username = Some(user.clone());
    }
    if let Some(pwd) = &cli.pwd {
        config.credentials.password = Some(pwd.clone());
    }

    Ok(config)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "YES"
    } else {
        "NO"
    }
}

/// Console rendering; YES always marks the conformant behavior
fn render_report(report: &BrokerReport) -> String {
    let mut out = String::new();

    for version in ProtocolVersion::ALL {
        let findings = report.findings(version);
        out.push_str(&format!("\n{version} support\t{}\n", yes_no(findings.supported)));
        if findings.supported {
            out.push_str(&format!("needs authentication\t{}\n", yes_no(!findings.anonymous)));
        }
    }

    for version in ProtocolVersion::ALL {
        let f = report.findings(version);
        if !f.supported {
            continue;
        }
        out.push_str(&format!("\n{version} analysis\n"));
        out.push_str(&format!("supports QoS1\t\t{}\n", yes_no(f.qos1)));
        out.push_str(&format!("supports QoS2\t\t{}\n", yes_no(f.qos2)));
        out.push_str(&format!("rejects QoS3\t\t{}\n", yes_no(!f.qos3_response)));
        out.push_str(&format!("forbids subscribe to #\t{}\n", yes_no(!f.subscribe_all)));
        out.push_str(&format!("rejects invalid topic\t{}\n", yes_no(!f.invalid_topics)));
        out.push_str(&format!("rejects invalid UTF-8\t{}\n", yes_no(!f.invalid_utf8_topic)));
        out.push_str(&format!("rejects $SYS publishs\t{}\n", yes_no(!f.publish_sys)));
        if f.publish_sys {
            out.push_str(&format!("filters $SYS publishs\t{}\n", yes_no(f.filter_sys)));
        }
    }

    match &report.error {
        Some(e) if report.failed => out.push_str(&format!("\nRun failed: {e}\n")),
        _ => out.push_str(&format!("\nlooks like {}\n", report.type_guessed)),
    }
    out
}

/// Append `report` as one JSON line
fn append_json(path: &Path, report: &BrokerReport) -> std::io::Result<()> {
    let line = serde_json::to_string(report)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}
