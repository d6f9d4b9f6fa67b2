//! Dialing, CONNECT/CONNACK handshakes and liveness-checked reconnection

use super::connection::{Connection, RESPONSE_BUFFER_LEN};
use crate::config::ProbeConfig;
use crate::error::{ProbeError, ProbeResult};
use crate::protocol::{
    classify_connack, encode_connect, Credentials, ProtocolVersion, VersionSupport,
};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Byte offset of the reason/return code in CONNACK
const CONNACK_CODE_OFFSET: usize = 3;

/// Result of a liveness check
///
/// The fatal case is the `Err` side of [`ConnectionManager::reconnect_if_dead`].
#[derive(Debug)]
pub enum Liveness {
    /// The probed connection answered PINGREQ and is returned unchanged
    Alive(Connection),
    /// The probed connection was dead and has been replaced
    Replaced(Connection),
}

impl Liveness {
    pub fn into_connection(self) -> Connection {
        match self {
            Liveness::Alive(conn) | Liveness::Replaced(conn) => conn,
        }
    }

    pub fn was_replaced(&self) -> bool {
        matches!(self, Liveness::Replaced(_))
    }
}

/// Opens connections to one broker, one at a time
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    target: String,
    credentials: Option<Credentials>,
    dial_timeout: Duration,
    read_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            target: config.target(),
            credentials: config.credentials(),
            dial_timeout: config.timeouts.dial(),
            read_timeout: config.timeouts.read(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    async fn dial(&self) -> ProbeResult<TcpStream> {
        let stream = tokio::time::timeout(self.dial_timeout, TcpStream::connect(&self.target))
            .await
            .map_err(|_| ProbeError::DialTimeout {
                target: self.target.clone(),
                timeout: self.dial_timeout,
            })?
            .map_err(|source| ProbeError::Dial {
                target: self.target.clone(),
                source,
            })?;

        // probes are tiny and latency-bound
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not disable Nagle");
        }
        Ok(stream)
    }

    /// Dial, send CONNECT and return the connection with the CONNACK code
    async fn handshake(
        &self,
        version: ProtocolVersion,
        credentials: Option<&Credentials>,
    ) -> ProbeResult<(Connection, u8)> {
        let stream = self.dial().await?;
        let mut conn = Connection::new(stream, version, self.read_timeout);

        conn.send(&encode_connect(version, credentials))
            .await
            .map_err(|e| ProbeError::connack_read(version, e))?;

        let connack = conn
            .read_chunk()
            .await
            .map_err(|e| ProbeError::connack_read(version, e))?;

        if connack.is_empty() {
            return Err(ProbeError::connack_read(version, "connection closed by broker"));
        }
        if connack.len() <= CONNACK_CODE_OFFSET {
            return Err(ProbeError::ConnackTooShort {
                version,
                len: connack.len(),
            });
        }
        debug_assert!(connack.len() <= RESPONSE_BUFFER_LEN);

        Ok((conn, connack[CONNACK_CODE_OFFSET]))
    }

    /// Determine whether the broker speaks `version`, using an anonymous CONNECT
    ///
    /// Transport and handshake failures are errors; every CONNACK code maps to
    /// a [`VersionSupport`], including the fatal ones.
    pub async fn check_support(&self, version: ProtocolVersion) -> ProbeResult<VersionSupport> {
        let (conn, code) = self.handshake(version, None).await?;
        conn.close().await;

        let support = classify_connack(version, code);
        info!(%version, code, ?support, "support check");
        Ok(support)
    }

    /// Open a usable connection with the configured credentials
    pub async fn connect(&self, version: ProtocolVersion) -> ProbeResult<Connection> {
        let (conn, code) = self.handshake(version, self.credentials.as_ref()).await?;
        if code != 0x00 {
            conn.close().await;
            return Err(ProbeError::ConnectionRejected { version, code });
        }
        debug!(%version, broker = %self.target, "connected");
        Ok(conn)
    }

    /// Ping `conn`; on silence or a wrong answer replace it with a fresh connection
    ///
    /// The handle passed in is consumed: callers must continue with the
    /// connection inside the returned [`Liveness`].
    pub async fn reconnect_if_dead(&self, mut conn: Connection) -> ProbeResult<Liveness> {
        if conn.ping().await {
            return Ok(Liveness::Alive(conn));
        }

        let version = conn.version();
        warn!(%version, "connection did not answer PINGREQ, reconnecting");
        conn.close().await;
        Ok(Liveness::Replaced(self.connect(version).await?))
    }

    /// Close `conn` and open a fresh connection of the same version
    pub async fn reconnect(&self, conn: Connection) -> ProbeResult<Connection> {
        let version = conn.version();
        conn.close().await;
        self.connect(version).await
    }
}
