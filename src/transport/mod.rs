//! Transport layer for broker probing
//!
//! - [`connection`] - one TCP stream bound to a protocol version, with
//!   deadline-bounded reads and literal-pattern exchanges
//! - [`manager`] - dialing, CONNECT/CONNACK handshakes, support checks and
//!   liveness-checked reconnection
//!
//! Exactly one connection is open at any time. Connections are closed
//! explicitly before the next phase starts.

pub mod connection;
pub mod manager;

pub use connection::{hex, Connection, RESPONSE_BUFFER_LEN};
pub use manager::{ConnectionManager, Liveness};
