//! SCTP chunk types and structures
//!
//! SCTP packets contain one or more chunks. Each chunk has a type, flags, length, and payload.
//! This module defines the chunk types used in WebRTC data channels.

use crate::error::DecodeError;

/// SCTP chunk type identifiers (RFC 4960)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SctpChunkType {
    /// Payload data
    Data = 0,
    /// Initiate association
    Init = 1,
    /// Initiate acknowledgment
    InitAck = 2,
    /// Selective acknowledgment
    Sack = 3,
    /// Heartbeat request
    Heartbeat = 4,
    /// Heartbeat acknowledgment
    HeartbeatAck = 5,
    /// Abort association
    Abort = 6,
    /// Shutdown association
    Shutdown = 7,
    /// Shutdown acknowledgment
    ShutdownAck = 8,
    /// Operation error
    Error = 9,
    /// State cookie
    CookieEcho = 10,
    /// Cookie acknowledgment
    CookieAck = 11,
    /// Shutdown complete
    ShutdownComplete = 14,
}

impl SctpChunkType {
    /// Parse chunk type from byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Data),
            1 => Some(Self::Init),
            2 => Some(Self::InitAck),
            3 => Some(Self::Sack),
            4 => Some(Self::Heartbeat),
            5 => Some(Self::HeartbeatAck),
            6 => Some(Self::Abort),
            7 => Some(Self::Shutdown),
            8 => Some(Self::ShutdownAck),
            9 => Some(Self::Error),
            10 => Some(Self::CookieEcho),
            11 => Some(Self::CookieAck),
            14 => Some(Self::ShutdownComplete),
            _ => None,
        }
    }
}

/// Type byte of the distinguished STATE_COOKIE variable-length parameter.
pub const STATE_COOKIE_PARAM_TYPE: u16 = 0x0007;

/// Cause code for a stale cookie, carried in an ERROR chunk parameter.
pub const STALE_COOKIE_CAUSE: u16 = 3;

fn padl(len: usize) -> usize {
    (4 - (len % 4)) % 4
}

/// Encodes a list of `(type, value)` parameters, each padded to a 4-byte
/// boundary. Padding bytes are not counted in a parameter's own length field.
pub fn encode_params(params: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (ptype, value) in params {
        let length = (4 + value.len()) as u16;
        buf.extend_from_slice(&ptype.to_be_bytes());
        buf.extend_from_slice(&length.to_be_bytes());
        buf.extend_from_slice(value);
        buf.extend(std::iter::repeat_n(0u8, padl(value.len())));
    }
    buf
}

/// Decodes a run of variable-length parameters. Stops (without error) as
/// soon as fewer than 4 header bytes remain, mirroring chunk-walk behavior.
pub fn decode_params(data: &[u8]) -> Vec<(u16, Vec<u8>)> {
    let mut params = Vec::new();
    let mut offset = 0;
    while offset + 4 <= data.len() {
        let ptype = u16::from_be_bytes([data[offset], data[offset + 1]]);
        let length = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
        if length < 4 || offset + length > data.len() {
            break;
        }
        let value = data[offset + 4..offset + length].to_vec();
        params.push((ptype, value));
        offset += length + padl(length - 4);
    }
    params
}

/// DATA chunk for transmitting user data
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   Type = 0    | Reserved|U|B|E|         Length                |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                              TSN                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      Stream Identifier        |   Stream Sequence Number      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                  Payload Protocol Identifier                  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// \                                                               \
/// /                           User Data                           /
/// \                                                               \
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunk {
    /// Unordered flag - if true, can be delivered out of order
    pub unordered: bool,
    /// Beginning (FIRST_FRAG) fragment flag
    pub beginning: bool,
    /// Ending (LAST_FRAG) fragment flag
    pub ending: bool,
    /// Transmission Sequence Number
    pub tsn: u32,
    /// Stream identifier
    pub stream_id: u16,
    /// Stream sequence number
    pub stream_seq: u16,
    /// Payload protocol identifier (PPID)
    pub ppid: u32,
    /// User data
    pub data: Vec<u8>,
}

/// Payload Protocol Identifiers for WebRTC
pub mod ppid {
    /// WebRTC DCEP (Data Channel Establishment Protocol)
    pub const DCEP: u32 = 50;
    /// WebRTC String (UTF-8)
    pub const STRING: u32 = 51;
    /// WebRTC Binary
    pub const BINARY: u32 = 53;
    /// WebRTC String Empty
    pub const STRING_EMPTY: u32 = 56;
    /// WebRTC Binary Empty
    pub const BINARY_EMPTY: u32 = 57;
}

impl DataChunk {
    /// Create a new single-fragment DATA chunk
    pub fn new(tsn: u32, stream_id: u16, stream_seq: u16, ppid: u32, data: Vec<u8>) -> Self {
        Self {
            unordered: false,
            beginning: true,
            ending: true,
            tsn,
            stream_id,
            stream_seq,
            ppid,
            data,
        }
    }

    /// Serialize to bytes (unpadded; the caller pads to a 4-byte boundary)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + self.data.len());

        buf.push(SctpChunkType::Data as u8);

        // Flags: reserved(5) | U | B | E
        let flags = (if self.unordered { 0x04 } else { 0 })
            | (if self.beginning { 0x02 } else { 0 })
            | (if self.ending { 0x01 } else { 0 });
        buf.push(flags);

        let length = 16 + self.data.len() as u16;
        buf.extend_from_slice(&length.to_be_bytes());
        buf.extend_from_slice(&self.tsn.to_be_bytes());
        buf.extend_from_slice(&self.stream_id.to_be_bytes());
        buf.extend_from_slice(&self.stream_seq.to_be_bytes());
        buf.extend_from_slice(&self.ppid.to_be_bytes());
        buf.extend_from_slice(&self.data);

        buf
    }

    /// Parse from bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < 16 {
            return Err(DecodeError::TruncatedPacket);
        }

        let flags = data[1];
        let unordered = (flags & 0x04) != 0;
        let beginning = (flags & 0x02) != 0;
        let ending = (flags & 0x01) != 0;

        let declared_length = u16::from_be_bytes([data[2], data[3]]) as usize;
        let tsn = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let stream_id = u16::from_be_bytes([data[8], data[9]]);
        let stream_seq = u16::from_be_bytes([data[10], data[11]]);
        let ppid = u32::from_be_bytes([data[12], data[13], data[14], data[15]]);

        if declared_length > data.len() || declared_length < 16 {
            return Err(DecodeError::TruncatedPacket);
        }
        let user_data = data[16..declared_length].to_vec();

        Ok(Self {
            unordered,
            beginning,
            ending,
            tsn,
            stream_id,
            stream_seq,
            ppid,
            data: user_data,
        })
    }
}

/// INIT / INIT_ACK chunk (shared shape, per RFC 4960 §3.3.2/3.3.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitChunk {
    /// Initiate Tag
    pub initiate_tag: u32,
    /// Advertised Receiver Window Credit
    pub a_rwnd: u32,
    /// Number of outbound streams
    pub num_outbound_streams: u16,
    /// Number of inbound streams
    pub num_inbound_streams: u16,
    /// Initial TSN
    pub initial_tsn: u32,
    /// Variable-length parameters (e.g. STATE_COOKIE on INIT_ACK)
    pub params: Vec<(u16, Vec<u8>)>,
}

impl InitChunk {
    /// Create new INIT chunk with no parameters
    pub fn new(initiate_tag: u32, initial_tsn: u32) -> Self {
        Self {
            initiate_tag,
            a_rwnd: 131072,
            num_outbound_streams: 65535,
            num_inbound_streams: 65535,
            initial_tsn,
            params: Vec::new(),
        }
    }

    /// The STATE_COOKIE parameter value, if present.
    pub fn state_cookie(&self) -> Option<&[u8]> {
        self.params
            .iter()
            .find(|(t, _)| *t == STATE_COOKIE_PARAM_TYPE)
            .map(|(_, v)| v.as_slice())
    }

    fn body_bytes(&self, chunk_type: SctpChunkType) -> Vec<u8> {
        let encoded_params = encode_params(&self.params);
        let length = 20 + encoded_params.len() as u16;

        let mut buf = Vec::with_capacity(length as usize);
        buf.push(chunk_type as u8);
        buf.push(0); // Flags
        buf.extend_from_slice(&length.to_be_bytes());

        buf.extend_from_slice(&self.initiate_tag.to_be_bytes());
        buf.extend_from_slice(&self.a_rwnd.to_be_bytes());
        buf.extend_from_slice(&self.num_outbound_streams.to_be_bytes());
        buf.extend_from_slice(&self.num_inbound_streams.to_be_bytes());
        buf.extend_from_slice(&self.initial_tsn.to_be_bytes());
        buf.extend_from_slice(&encoded_params);
        buf
    }

    /// Serialize as an INIT chunk
    pub fn to_bytes(&self) -> Vec<u8> {
        self.body_bytes(SctpChunkType::Init)
    }

    /// Parse from bytes (the common fixed fields plus trailing parameters)
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < 20 {
            return Err(DecodeError::TruncatedPacket);
        }

        let declared_length = u16::from_be_bytes([data[2], data[3]]) as usize;
        let end = declared_length.min(data.len()).max(20);

        Ok(Self {
            initiate_tag: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            a_rwnd: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            num_outbound_streams: u16::from_be_bytes([data[12], data[13]]),
            num_inbound_streams: u16::from_be_bytes([data[14], data[15]]),
            initial_tsn: u32::from_be_bytes([data[16], data[17], data[18], data[19]]),
            params: decode_params(&data[20..end]),
        })
    }
}

/// SACK chunk for selective acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SackChunk {
    /// Cumulative TSN Ack
    pub cumulative_tsn: u32,
    /// Advertised Receiver Window Credit
    pub a_rwnd: u32,
    /// Gap Ack Blocks (never populated by this implementation's send path)
    pub gap_ack_blocks: Vec<(u16, u16)>,
    /// Duplicate TSNs observed since the last SACK
    pub duplicate_tsns: Vec<u32>,
}

impl SackChunk {
    /// Create new SACK chunk with empty gap/duplicate lists
    pub fn new(cumulative_tsn: u32, a_rwnd: u32) -> Self {
        Self {
            cumulative_tsn,
            a_rwnd,
            gap_ack_blocks: Vec::new(),
            duplicate_tsns: Vec::new(),
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let num_gap_blocks = self.gap_ack_blocks.len() as u16;
        let num_dup_tsns = self.duplicate_tsns.len() as u16;
        let length = 16 + (num_gap_blocks * 4) + (num_dup_tsns * 4);

        let mut buf = Vec::with_capacity(length as usize);

        buf.push(SctpChunkType::Sack as u8);
        buf.push(0);
        buf.extend_from_slice(&length.to_be_bytes());

        buf.extend_from_slice(&self.cumulative_tsn.to_be_bytes());
        buf.extend_from_slice(&self.a_rwnd.to_be_bytes());
        buf.extend_from_slice(&num_gap_blocks.to_be_bytes());
        buf.extend_from_slice(&num_dup_tsns.to_be_bytes());

        for (start, end) in &self.gap_ack_blocks {
            buf.extend_from_slice(&start.to_be_bytes());
            buf.extend_from_slice(&end.to_be_bytes());
        }
        for tsn in &self.duplicate_tsns {
            buf.extend_from_slice(&tsn.to_be_bytes());
        }

        buf
    }

    /// Parse from bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < 16 {
            return Err(DecodeError::TruncatedPacket);
        }

        let cumulative_tsn = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let a_rwnd = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        let num_gap_blocks = u16::from_be_bytes([data[12], data[13]]) as usize;
        let num_dup_tsns = u16::from_be_bytes([data[14], data[15]]) as usize;

        let mut gap_ack_blocks = Vec::with_capacity(num_gap_blocks);
        let mut offset = 16;
        for _ in 0..num_gap_blocks {
            if offset + 4 > data.len() {
                break;
            }
            let start = u16::from_be_bytes([data[offset], data[offset + 1]]);
            let end = u16::from_be_bytes([data[offset + 2], data[offset + 3]]);
            gap_ack_blocks.push((start, end));
            offset += 4;
        }

        let mut duplicate_tsns = Vec::with_capacity(num_dup_tsns);
        for _ in 0..num_dup_tsns {
            if offset + 4 > data.len() {
                break;
            }
            let tsn = u32::from_be_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]);
            duplicate_tsns.push(tsn);
            offset += 4;
        }

        Ok(Self {
            cumulative_tsn,
            a_rwnd,
            gap_ack_blocks,
            duplicate_tsns,
        })
    }
}

/// A chunk variant whose body is solely a list of variable-length
/// parameters: ABORT, ERROR, HEARTBEAT, HEARTBEAT_ACK.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParamChunk {
    pub params: Vec<(u16, Vec<u8>)>,
}

impl ParamChunk {
    pub fn new(params: Vec<(u16, Vec<u8>)>) -> Self {
        Self { params }
    }

    fn body_bytes(&self, chunk_type: SctpChunkType) -> Vec<u8> {
        let encoded = encode_params(&self.params);
        let length = (4 + encoded.len()) as u16;
        let mut buf = Vec::with_capacity(length as usize);
        buf.push(chunk_type as u8);
        buf.push(0);
        buf.extend_from_slice(&length.to_be_bytes());
        buf.extend_from_slice(&encoded);
        buf
    }

    fn from_body(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < 4 {
            return Err(DecodeError::TruncatedPacket);
        }
        let declared_length = u16::from_be_bytes([data[2], data[3]]) as usize;
        let end = declared_length.min(data.len()).max(4);
        Ok(Self {
            params: decode_params(&data[4..end]),
        })
    }
}

/// Generic SCTP chunk wrapper
#[derive(Debug, Clone)]
pub enum SctpChunk {
    Data(DataChunk),
    Init(InitChunk),
    /// Init-Ack chunk (same wire shape as Init)
    InitAck(InitChunk),
    Sack(SackChunk),
    Heartbeat(ParamChunk),
    HeartbeatAck(ParamChunk),
    Abort(ParamChunk),
    Error(ParamChunk),
    /// Cookie Echo (opaque data, echoed verbatim from INIT_ACK's STATE_COOKIE)
    CookieEcho(Vec<u8>),
    CookieAck,
    Shutdown { cumulative_tsn: u32 },
    ShutdownAck,
    ShutdownComplete,
    /// Any chunk type not recognized above, preserved verbatim.
    Unknown { chunk_type: u8, data: Vec<u8> },
}

impl SctpChunk {
    /// Parse chunk from bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < 4 {
            return Err(DecodeError::TruncatedPacket);
        }

        let chunk_type = data[0];
        let declared_length = u16::from_be_bytes([data[2], data[3]]) as usize;

        match SctpChunkType::from_u8(chunk_type) {
            Some(SctpChunkType::Data) => Ok(SctpChunk::Data(DataChunk::from_bytes(data)?)),
            Some(SctpChunkType::Init) => Ok(SctpChunk::Init(InitChunk::from_bytes(data)?)),
            Some(SctpChunkType::InitAck) => Ok(SctpChunk::InitAck(InitChunk::from_bytes(data)?)),
            Some(SctpChunkType::Sack) => Ok(SctpChunk::Sack(SackChunk::from_bytes(data)?)),
            Some(SctpChunkType::Heartbeat) => {
                Ok(SctpChunk::Heartbeat(ParamChunk::from_body(data)?))
            }
            Some(SctpChunkType::HeartbeatAck) => {
                Ok(SctpChunk::HeartbeatAck(ParamChunk::from_body(data)?))
            }
            Some(SctpChunkType::Abort) => Ok(SctpChunk::Abort(ParamChunk::from_body(data)?)),
            Some(SctpChunkType::Error) => Ok(SctpChunk::Error(ParamChunk::from_body(data)?)),
            Some(SctpChunkType::CookieEcho) => {
                let cookie_len = declared_length.min(data.len()).max(4);
                Ok(SctpChunk::CookieEcho(data[4..cookie_len].to_vec()))
            }
            Some(SctpChunkType::CookieAck) => Ok(SctpChunk::CookieAck),
            Some(SctpChunkType::Shutdown) => {
                if data.len() < 8 {
                    return Err(DecodeError::TruncatedPacket);
                }
                let cumulative_tsn = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
                Ok(SctpChunk::Shutdown { cumulative_tsn })
            }
            Some(SctpChunkType::ShutdownAck) => Ok(SctpChunk::ShutdownAck),
            Some(SctpChunkType::ShutdownComplete) => Ok(SctpChunk::ShutdownComplete),
            None => {
                let chunk_len = declared_length.min(data.len()).max(4);
                Ok(SctpChunk::Unknown {
                    chunk_type,
                    data: data[4..chunk_len].to_vec(),
                })
            }
        }
    }

    /// Serialize chunk to bytes (unpadded)
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            SctpChunk::Data(chunk) => chunk.to_bytes(),
            SctpChunk::Init(chunk) => chunk.to_bytes(),
            SctpChunk::InitAck(chunk) => chunk.body_bytes(SctpChunkType::InitAck),
            SctpChunk::Sack(chunk) => chunk.to_bytes(),
            SctpChunk::Heartbeat(chunk) => chunk.body_bytes(SctpChunkType::Heartbeat),
            SctpChunk::HeartbeatAck(chunk) => chunk.body_bytes(SctpChunkType::HeartbeatAck),
            SctpChunk::Abort(chunk) => chunk.body_bytes(SctpChunkType::Abort),
            SctpChunk::Error(chunk) => chunk.body_bytes(SctpChunkType::Error),
            SctpChunk::CookieEcho(cookie) => {
                let length = 4 + cookie.len() as u16;
                let mut buf = Vec::with_capacity(length as usize);
                buf.push(SctpChunkType::CookieEcho as u8);
                buf.push(0);
                buf.extend_from_slice(&length.to_be_bytes());
                buf.extend_from_slice(cookie);
                buf
            }
            SctpChunk::CookieAck => vec![SctpChunkType::CookieAck as u8, 0, 0, 4],
            SctpChunk::Shutdown { cumulative_tsn } => {
                let mut buf = vec![SctpChunkType::Shutdown as u8, 0, 0, 8];
                buf.extend_from_slice(&cumulative_tsn.to_be_bytes());
                buf
            }
            SctpChunk::ShutdownAck => vec![SctpChunkType::ShutdownAck as u8, 0, 0, 4],
            SctpChunk::ShutdownComplete => vec![SctpChunkType::ShutdownComplete as u8, 0, 0, 4],
            SctpChunk::Unknown { chunk_type, data } => {
                let length = 4 + data.len() as u16;
                let mut buf = Vec::with_capacity(length as usize);
                buf.push(*chunk_type);
                buf.push(0);
                buf.extend_from_slice(&length.to_be_bytes());
                buf.extend_from_slice(data);
                buf
            }
        }
    }

    /// Padded length (for packet serialization): the next multiple of 4
    /// at or above the unpadded wire length.
    pub fn padded_len(&self) -> usize {
        let len = self.to_bytes().len();
        (len + 3) & !3
    }
}
