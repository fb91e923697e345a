//! LookinServer frame header.
//!
//! A message on the wire is a 16-byte fixed header followed by `payload_size`
//! raw bytes. All header fields are big-endian `u32`. There is no magic byte
//! sequence (unlike e.g. HOOT01's `b"HOOT01"` preamble) because the transport
//! is a dedicated loopback TCP connection, not a shared ZMQ bus — framing
//! only needs to resist short reads, not peer misidentification.
//!
//! ```text
//! Offset  Field         Size
//! 0       version       4   (constant = 1)
//! 4       type          4   (request/response code, see RequestCode)
//! 8       tag           4   (correlation id, monotonic per connection, never 0)
//! 12      payload_size  4
//! 16..    payload       payload_size bytes
//! ```

use bytes::{Buf, BufMut, BytesMut};

use crate::error::Error;

/// Only protocol version this client speaks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 16;

/// A decoded frame header. The payload itself is carried alongside by callers
/// (`Transport` reads header then payload in two steps) rather than being a
/// field here, so a `Header` is Copy and cheap to pass around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub r#type: u32,
    pub tag: u32,
    pub payload_size: u32,
}

impl Header {
    pub fn new(r#type: u32, tag: u32, payload_size: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            r#type,
            tag,
            payload_size,
        }
    }

    /// Encode into exactly `HEADER_LEN` bytes.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = BytesMut::with_capacity(HEADER_LEN);
        buf.put_u32(self.version);
        buf.put_u32(self.r#type);
        buf.put_u32(self.tag);
        buf.put_u32(self.payload_size);
        let mut out = [0u8; HEADER_LEN];
        out.copy_from_slice(&buf);
        out
    }

    /// Decode a header from exactly `HEADER_LEN` bytes. Rejects any
    /// `version != 1` as a protocol error (invariant 6 in spec §8).
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != HEADER_LEN {
            return Err(Error::InvalidFrame(format!(
                "header must be {HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut buf = bytes;
        let version = buf.get_u32();
        if version != PROTOCOL_VERSION {
            return Err(Error::InvalidFrame(format!(
                "unsupported frame version {version}"
            )));
        }
        let r#type = buf.get_u32();
        let tag = buf.get_u32();
        let payload_size = buf.get_u32();
        Ok(Self {
            version,
            r#type,
            tag,
            payload_size,
        })
    }
}

/// A complete frame: header plus payload bytes.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(r#type: u32, tag: u32, payload: Vec<u8>) -> Self {
        Self {
            header: Header::new(r#type, tag, payload.len() as u32),
            payload,
        }
    }

    /// Serialize header + payload as one contiguous buffer, so the transport
    /// can issue a single logical write (spec §4.2 write discipline).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.header.encode());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Request/response codes from spec §6. Only codes this client actually
/// issues are represented; an unrecognized code on a decoded response is not
/// an error here (the manager only inspects `data` shape, not the code it
/// arrived tagged with — it already knows which request it sent).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestCode {
    Ping = 200,
    App = 201,
    Hierarchy = 202,
    InbuiltAttrModification = 204,
    InvokeMethod = 206,
    AllAttrGroups = 210,
    AllSelectorNames = 213,
}

impl RequestCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}
