//! Tests for logging configuration and format parsing
//!
//! Tests the pure functions in the logging module that map environment
//! variables and `-v` counts to subscriber settings.

use mqttinfo::observability::logging::{level_for_verbosity, parse_level, LogFormat};
use tracing::Level;

#[test]
fn test_log_format_parse_json() {
    assert_eq!(LogFormat::parse("json"), LogFormat::Json);
    assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
    assert_eq!(LogFormat::parse("Json"), LogFormat::Json);
}

#[test]
fn test_log_format_parse_pretty() {
    assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
    assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
}

#[test]
fn test_log_format_parse_whitespace_falls_back() {
    // no trimming: anything unrecognised is the terminal default
    assert_eq!(LogFormat::parse("  json  "), LogFormat::Compact);
    assert_eq!(LogFormat::parse("json\n"), LogFormat::Compact);
    assert_eq!(LogFormat::parse("123"), LogFormat::Compact);
}

#[test]
fn test_log_level_env_overrides_verbosity() {
    let from_env = parse_level("debug").unwrap_or_else(|| level_for_verbosity(0));
    assert_eq!(from_env, Level::DEBUG);

    let unparsable = parse_level("loud").unwrap_or_else(|| level_for_verbosity(1));
    assert_eq!(unparsable, Level::INFO);
}

#[test]
fn test_verbosity_increases_detail() {
    let levels: Vec<Level> = (0..4).map(level_for_verbosity).collect();
    assert_eq!(levels, vec![Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE]);
}
