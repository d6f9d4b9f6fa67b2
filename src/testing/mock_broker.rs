//! Scripted MQTT broker for wire-level tests
//!
//! The mock listens on an ephemeral loopback port and answers each incoming
//! packet from a fixed script: CONNACK bytes per protocol version, whether
//! PINGREQ is answered, literal replies keyed by exact request bytes, and how
//! many connections are accepted before the rest are dropped.
//! Anything without a scripted reply is ignored, which the prober sees as a
//! read timeout.

use crate::config::ProbeConfig;
use crate::protocol::{
    decode_connect, decode_length, CodecError, ConnectPacket, Expect, Probe, ProtocolVersion,
};
use crate::transport::hex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

const PINGREQ: &[u8] = b"\xc0\x00";
const PINGRESP: &[u8] = b"\xd0\x00";

/// What the mock does with a scripted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Write these bytes back
    Send(Vec<u8>),
    /// Drop the connection
    Close,
}

/// Script followed by every connection to a [`MockBroker`]
#[derive(Debug, Clone)]
pub struct BrokerBehavior {
    /// CONNACK per version; `None` closes without answering CONNECT
    connack: HashMap<ProtocolVersion, Option<Vec<u8>>>,
    answer_ping: bool,
    replies: HashMap<(ProtocolVersion, Vec<u8>), Reply>,
    /// Connections served before every later one is dropped on accept
    accept_limit: Option<usize>,
}

fn connack_packet(version: ProtocolVersion, code: u8) -> Vec<u8> {
    match version {
        ProtocolVersion::V3_1_1 => vec![0x20, 0x02, 0x00, code],
        ProtocolVersion::V5_0 => vec![0x20, 0x03, 0x00, code, 0x00],
    }
}

impl Default for BrokerBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerBehavior {
    /// Accepts both versions anonymously, answers PINGREQ, nothing else
    pub fn new() -> Self {
        let connack = ProtocolVersion::ALL
            .into_iter()
            .map(|v| (v, Some(connack_packet(v, 0x00))))
            .collect();
        Self {
            connack,
            answer_ping: true,
            replies: HashMap::new(),
            accept_limit: None,
        }
    }

    /// Acknowledges QoS 1 and 2, grants `#`, drops QoS 3, and silently
    /// refuses invalid filters and `$SYS` publishes, over both versions
    pub fn compliant() -> Self {
        let mut behavior = Self::new();
        for version in ProtocolVersion::ALL {
            behavior = behavior
                .acknowledge(version, Probe::PublishQos1, Expect::PubAck)
                .acknowledge(version, Probe::PublishQos2, Expect::PubRec)
                .acknowledge(version, Probe::PubRel, Expect::PubComp)
                .close_on(version, Probe::PublishQos3)
                .acknowledge(version, Probe::SubscribeAll, Expect::SubAckQos0);
        }
        behavior
    }

    pub fn connack(mut self, version: ProtocolVersion, code: u8) -> Self {
        self.connack.insert(version, Some(connack_packet(version, code)));
        self
    }

    /// Answer CONNECT with `bytes` verbatim
    pub fn raw_connack<B: Into<Vec<u8>>>(mut self, version: ProtocolVersion, bytes: B) -> Self {
        self.connack.insert(version, Some(bytes.into()));
        self
    }

    /// Close the connection instead of sending CONNACK
    pub fn no_connack(mut self, version: ProtocolVersion) -> Self {
        self.connack.insert(version, None);
        self
    }

    pub fn ignore_ping(mut self) -> Self {
        self.answer_ping = false;
        self
    }

    /// Reply to the exact bytes of `probe` with `response`
    pub fn reply<R: Into<Vec<u8>>>(
        mut self,
        version: ProtocolVersion,
        probe: Probe,
        response: R,
    ) -> Self {
        self.replies.insert(
            (version, probe.packet(version).to_vec()),
            Reply::Send(response.into()),
        );
        self
    }

    /// Reply to `probe` with the canonical form of `expect`
    pub fn acknowledge(self, version: ProtocolVersion, probe: Probe, expect: Expect) -> Self {
        self.reply(version, probe, expect.primary(version))
    }

    pub fn close_on(mut self, version: ProtocolVersion, probe: Probe) -> Self {
        self.replies
            .insert((version, probe.packet(version).to_vec()), Reply::Close);
        self
    }

    /// Serve the first `connections` connections, then drop every new one
    /// before reading CONNECT
    pub fn refuse_after(mut self, connections: usize) -> Self {
        self.accept_limit = Some(connections);
        self
    }

    fn connack_for(&self, version: ProtocolVersion) -> Option<&[u8]> {
        self.connack.get(&version)?.as_deref()
    }

    fn accepts(&self, accepted: usize) -> bool {
        self.accept_limit.map_or(true, |limit| accepted < limit)
    }
}

/// Traffic seen by the mock
#[derive(Debug, Default)]
struct Journal {
    connects: Vec<ConnectPacket>,
    requests: Vec<(ProtocolVersion, Vec<u8>)>,
}

/// Loopback broker driven by a [`BrokerBehavior`]
#[derive(Debug)]
pub struct MockBroker {
    addr: SocketAddr,
    journal: Arc<Mutex<Journal>>,
    accept_task: JoinHandle<()>,
}

impl MockBroker {
    pub async fn start(behavior: BrokerBehavior) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let journal = Arc::new(Mutex::new(Journal::default()));
        let behavior = Arc::new(behavior);

        let accept_journal = Arc::clone(&journal);
        let accept_task = tokio::spawn(async move {
            let mut accepted = 0;
            while let Ok((stream, peer)) = listener.accept().await {
                if !behavior.accepts(accepted) {
                    debug!(%peer, "mock dropping connection");
                    drop(stream);
                    continue;
                }
                accepted += 1;

                let behavior = Arc::clone(&behavior);
                let journal = Arc::clone(&accept_journal);
                tokio::spawn(async move {
                    if let Err(e) = serve(stream, &behavior, &journal).await {
                        debug!(error = %e, "mock connection ended");
                    }
                });
            }
        });

        Ok(Self {
            addr,
            journal,
            accept_task,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Probe configuration aimed at this mock with short deadlines
    pub fn config(&self) -> ProbeConfig {
        let mut config = ProbeConfig::new("127.0.0.1", self.port());
        config.timeouts.dial_timeout_ms = 1_000;
        config.timeouts.read_timeout_ms = 150;
        config.timeouts.sys_echo_wait_ms = 20;
        config
    }

    /// Every CONNECT received so far
    pub async fn connects(&self) -> Vec<ConnectPacket> {
        self.journal.lock().await.connects.clone()
    }

    /// Every packet after CONNECT received so far
    pub async fn requests(&self) -> Vec<(ProtocolVersion, Vec<u8>)> {
        self.journal.lock().await.requests.clone()
    }

    /// Whether `probe` was sent over `version`
    pub async fn received(&self, version: ProtocolVersion, probe: Probe) -> bool {
        let packet = probe.packet(version);
        self.journal
            .lock()
            .await
            .requests
            .iter()
            .any(|(v, bytes)| *v == version && bytes == packet)
    }
}

impl Drop for MockBroker {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Length of the first complete packet in `buf`, `None` if more bytes are needed
fn frame_len(buf: &[u8]) -> Result<Option<usize>, CodecError> {
    if buf.len() < 2 {
        return Ok(None);
    }
    match decode_length(&buf[1..]) {
        Ok((remaining, consumed)) => {
            let total = 1 + consumed + remaining;
            Ok((buf.len() >= total).then_some(total))
        }
        Err(CodecError::Truncated) => Ok(None),
        Err(e) => Err(e),
    }
}

async fn serve(
    mut stream: TcpStream,
    behavior: &BrokerBehavior,
    journal: &Mutex<Journal>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let mut version: Option<ProtocolVersion> = None;

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);

        while let Some(len) = frame_len(&buf).map_err(invalid_data)? {
            let packet: Vec<u8> = buf.drain(..len).collect();

            let Some(current) = version else {
                let connect = decode_connect(&packet).map_err(invalid_data)?;
                let negotiated = connect.version;
                journal.lock().await.connects.push(connect);

                match behavior.connack_for(negotiated) {
                    Some(connack) => stream.write_all(connack).await?,
                    None => return Ok(()),
                }
                version = Some(negotiated);
                continue;
            };

            debug!(version = %current, request = %hex(&packet), "mock request");
            journal.lock().await.requests.push((current, packet.clone()));

            if packet == PINGREQ {
                if behavior.answer_ping {
                    stream.write_all(PINGRESP).await?;
                }
                continue;
            }

            match behavior.replies.get(&(current, packet)) {
                Some(Reply::Send(response)) => stream.write_all(response).await?,
                Some(Reply::Close) => return Ok(()),
                None => {}
            }
        }
    }
}

fn invalid_data(e: CodecError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, e)
}
