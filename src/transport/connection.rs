//! A single broker connection bound to one protocol version
//!
//! Reads are single `read` calls into a fixed 100-byte buffer under the
//! configured deadline. Responses are never reassembled or parsed: callers
//! compare the bytes against literal patterns.

use crate::protocol::{Expect, Probe, ProtocolVersion};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Upper bound on the bytes taken from the socket per read
pub const RESPONSE_BUFFER_LEN: usize = 100;

/// Open transport to the broker after a successful or attempted handshake
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    version: ProtocolVersion,
    read_timeout: Duration,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, version: ProtocolVersion, read_timeout: Duration) -> Self {
        Self {
            stream,
            version,
            read_timeout,
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Write raw bytes to the broker
    pub async fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await
    }

    /// Read one chunk of at most [`RESPONSE_BUFFER_LEN`] bytes
    ///
    /// An elapsed deadline is reported as [`io::ErrorKind::TimedOut`]; a clean
    /// close by the broker returns an empty vector.
    pub async fn read_chunk(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; RESPONSE_BUFFER_LEN];
        match tokio::time::timeout(self.read_timeout, self.stream.read(&mut buf)).await {
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(buf)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no data within {:?}", self.read_timeout),
            )),
        }
    }

    /// Read a response, folding errors, timeouts and closes into `None`
    pub async fn read_response(&mut self) -> Option<Vec<u8>> {
        match self.read_chunk().await {
            Ok(data) if !data.is_empty() => Some(data),
            Ok(_) => {
                debug!(version = %self.version, "broker closed the connection");
                None
            }
            Err(e) => {
                debug!(version = %self.version, error = %e, "read failed");
                None
            }
        }
    }

    /// Send `request` and read whatever comes back
    pub async fn exchange(&mut self, request: &[u8]) -> Option<Vec<u8>> {
        if let Err(e) = self.send(request).await {
            debug!(version = %self.version, error = %e, "write failed");
            return None;
        }
        self.read_response().await
    }

    /// Send the catalogue packet for `probe` and read the response
    pub async fn send_probe(&mut self, probe: Probe) -> Option<Vec<u8>> {
        let response = self.exchange(probe.packet(self.version)).await;
        debug!(
            version = %self.version,
            ?probe,
            response = ?response.as_deref().map(hex),
            "probe exchange"
        );
        response
    }

    /// PINGREQ round trip; true only for an exact PINGRESP
    pub async fn ping(&mut self) -> bool {
        match self.exchange(Probe::PingReq.packet(self.version)).await {
            Some(response) => response == Expect::PingResp.primary(self.version),
            None => false,
        }
    }

    /// Release the transport
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!(version = %self.version, error = %e, "shutdown failed");
        }
    }
}

/// Lowercase hex rendering for log fields
pub fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}
