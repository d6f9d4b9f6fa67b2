//! CONNECT construction and the remaining-length varint
//!
//! Everything here is pure and stateless. Every other probe packet is a
//! literal from [`super::catalogue`]; CONNECT is the only packet built at
//! runtime because it carries the caller's credentials.

use super::ProtocolVersion;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Client identifier announced in every CONNECT
pub const CLIENT_ID: &str = "mqttinfo";

/// Keep-alive announced in every CONNECT
pub const KEEP_ALIVE_SECS: u16 = 60;

/// Largest value a four-byte variable-length integer can carry
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

const CONNECT_HEADER: u8 = 0x10;
const PROTOCOL_NAME: &[u8] = b"MQTT";
const FLAG_CLEAN_SESSION: u8 = 0x02;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_USERNAME: u8 = 0x80;

/// Username/password pair sent in CONNECT
///
/// Each field must be shorter than 65536 bytes; [`crate::config::ProbeConfig::validate`]
/// enforces that before any probing starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Codec failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Remaining length {0} exceeds the MQTT maximum of 268435455")]
    RemainingLengthTooLarge(usize),
    #[error("Malformed remaining length")]
    MalformedRemainingLength,
    #[error("Packet truncated")]
    Truncated,
    #[error("Not a CONNECT packet (first byte {0:#04x})")]
    NotConnect(u8),
    #[error("Unexpected protocol name")]
    InvalidProtocolName,
    #[error("Unsupported protocol level {0:#04x}")]
    UnsupportedLevel(u8),
    #[error("String field is not valid UTF-8")]
    InvalidUtf8,
}

/// Fields recovered from a CONNECT packet by [`decode_connect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPacket {
    pub version: ProtocolVersion,
    pub flags: u8,
    pub keep_alive: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Encode `length` as an MQTT variable-length integer
pub fn encode_length(length: usize) -> Result<Vec<u8>, CodecError> {
    if length > MAX_REMAINING_LENGTH {
        return Err(CodecError::RemainingLengthTooLarge(length));
    }
    let mut buf = BytesMut::with_capacity(4);
    put_length(&mut buf, length);
    Ok(buf.to_vec())
}

/// Decode a variable-length integer from the start of `data`
///
/// Returns the value and the number of bytes it occupied.
pub fn decode_length(data: &[u8]) -> Result<(usize, usize), CodecError> {
    let mut value = 0usize;
    let mut shift = 0;

    for (idx, byte) in data.iter().enumerate() {
        value |= usize::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, idx + 1));
        }
        shift += 7;
        if shift > 21 {
            return Err(CodecError::MalformedRemainingLength);
        }
    }

    Err(CodecError::Truncated)
}

fn put_length(buf: &mut BytesMut, mut length: usize) {
    debug_assert!(length <= MAX_REMAINING_LENGTH);
    loop {
        let mut digit = (length % 128) as u8;
        length /= 128;
        if length > 0 {
            digit |= 0x80;
        }
        buf.put_u8(digit);
        if length == 0 {
            break;
        }
    }
}

fn put_str(buf: &mut BytesMut, value: &[u8]) {
    buf.put_u16(value.len() as u16);
    buf.put_slice(value);
}

/// Build the CONNECT packet for `version`, anonymous when `credentials` is `None`
pub fn encode_connect(version: ProtocolVersion, credentials: Option<&Credentials>) -> Bytes {
    let mut body = BytesMut::with_capacity(64);
    put_str(&mut body, PROTOCOL_NAME);
    body.put_u8(version.level());

    let flags = match credentials {
        Some(_) => FLAG_USERNAME | FLAG_PASSWORD | FLAG_CLEAN_SESSION,
        None => FLAG_CLEAN_SESSION,
    };
    body.put_u8(flags);
    body.put_u16(KEEP_ALIVE_SECS);

    if version == ProtocolVersion::V5_0 {
        // empty property list
        body.put_u8(0x00);
    }

    put_str(&mut body, CLIENT_ID.as_bytes());
    if let Some(credentials) = credentials {
        put_str(&mut body, credentials.username.as_bytes());
        put_str(&mut body, credentials.password.as_bytes());
    }

    let mut packet = BytesMut::with_capacity(body.len() + 5);
    packet.put_u8(CONNECT_HEADER);
    put_length(&mut packet, body.len());
    packet.put_slice(&body);
    packet.freeze()
}

fn take_u8(buf: &mut &[u8]) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::Truncated);
    }
    Ok(buf.get_u8())
}

fn take_u16(buf: &mut &[u8]) -> Result<u16, CodecError> {
    if buf.remaining() < 2 {
        return Err(CodecError::Truncated);
    }
    Ok(buf.get_u16())
}

fn take_bytes<'a>(buf: &mut &'a [u8], len: usize) -> Result<&'a [u8], CodecError> {
    if buf.len() < len {
        return Err(CodecError::Truncated);
    }
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}

fn take_string(buf: &mut &[u8]) -> Result<String, CodecError> {
    let len = usize::from(take_u16(buf)?);
    let raw = take_bytes(buf, len)?;
    String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
}

/// Parse a CONNECT packet produced by [`encode_connect`] or any conformant client
pub fn decode_connect(data: &[u8]) -> Result<ConnectPacket, CodecError> {
    let (&header, rest) = data.split_first().ok_or(CodecError::Truncated)?;
    if header != CONNECT_HEADER {
        return Err(CodecError::NotConnect(header));
    }

    let (remaining, consumed) = decode_length(rest)?;
    let mut body = rest
        .get(consumed..consumed + remaining)
        .ok_or(CodecError::Truncated)?;

    let name_len = usize::from(take_u16(&mut body)?);
    if take_bytes(&mut body, name_len)? != PROTOCOL_NAME {
        return Err(CodecError::InvalidProtocolName);
    }

    let level = take_u8(&mut body)?;
    let version = ProtocolVersion::from_level(level).ok_or(CodecError::UnsupportedLevel(level))?;
    let flags = take_u8(&mut body)?;
    let keep_alive = take_u16(&mut body)?;

    if version == ProtocolVersion::V5_0 {
        let (properties_len, consumed) = decode_length(body)?;
        body.advance(consumed);
        take_bytes(&mut body, properties_len)?;
    }

    let client_id = take_string(&mut body)?;
    let username = if flags & FLAG_USERNAME != 0 {
        Some(take_string(&mut body)?)
    } else {
        None
    };
    let password = if flags & FLAG_PASSWORD != 0 {
        Some(take_string(&mut body)?)
    } else {
        None
    };

    Ok(ConnectPacket {
        version,
        flags,
        keep_alive,
        client_id,
        username,
        password,
    })
}
