//! Observability for the prober: structured logging and span macros

pub mod logging;

pub use logging::{init_default_logging, init_logging, level_for_verbosity, parse_level, LogFormat};

// Span macros for structured logging
pub use logging::{phase_span, probe_span};
