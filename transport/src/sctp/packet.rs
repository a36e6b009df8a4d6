//! SCTP packet structure
//!
//! An SCTP packet consists of a common header followed by one or more chunks.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Source Port Number        |     Destination Port Number   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      Verification Tag                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                   Checksum (byte-swapped CRC32c)              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! /                            Chunks                             /
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use super::chunk::SctpChunk;
use crate::error::DecodeError;

/// SCTP common header size in bytes
pub const SCTP_HEADER_SIZE: usize = 12;

/// SCTP packet containing header and chunks
#[derive(Debug, Clone)]
pub struct SctpPacket {
    pub source_port: u16,
    pub destination_port: u16,
    pub verification_tag: u32,
    pub chunks: Vec<SctpChunk>,
}

impl SctpPacket {
    /// Create a new SCTP packet
    pub fn new(source_port: u16, destination_port: u16, verification_tag: u32) -> Self {
        Self {
            source_port,
            destination_port,
            verification_tag,
            chunks: Vec::new(),
        }
    }

    /// Add a chunk to the packet
    pub fn add_chunk(&mut self, chunk: SctpChunk) {
        self.chunks.push(chunk);
    }

    /// Serialize packet to bytes, computing the CRC32c checksum over the
    /// whole buffer with the checksum field zeroed, then storing it
    /// byte-swapped (written little-endian, which reads big-endian-reversed
    /// relative to the rest of the header).
    pub fn to_bytes(&self) -> Vec<u8> {
        let chunks_size: usize = self.chunks.iter().map(|c| c.padded_len()).sum();
        let mut buf = Vec::with_capacity(SCTP_HEADER_SIZE + chunks_size);

        buf.extend_from_slice(&self.source_port.to_be_bytes());
        buf.extend_from_slice(&self.destination_port.to_be_bytes());
        buf.extend_from_slice(&self.verification_tag.to_be_bytes());
        buf.extend_from_slice(&[0u8; 4]);

        for chunk in &self.chunks {
            let chunk_bytes = chunk.to_bytes();
            buf.extend_from_slice(&chunk_bytes);
            let padding = (4 - (chunk_bytes.len() % 4)) % 4;
            buf.extend(std::iter::repeat_n(0u8, padding));
        }

        let checksum = crc32c(&buf);
        buf[8..12].copy_from_slice(&checksum.to_le_bytes());

        buf
    }

    /// Parse and validate a packet. Rejects packets under the 12-byte
    /// header, and rejects a checksum mismatch, before walking chunks.
    /// Chunk types not recognized by [`SctpChunk`] are preserved as
    /// `Unknown` rather than causing the whole packet to be rejected; a
    /// chunk that fails to parse at all stops the walk early (the chunks
    /// parsed so far are still returned).
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < SCTP_HEADER_SIZE {
            return Err(DecodeError::TruncatedPacket);
        }
        if !Self::verify_checksum(data) {
            return Err(DecodeError::InvalidChecksum);
        }

        let source_port = u16::from_be_bytes([data[0], data[1]]);
        let destination_port = u16::from_be_bytes([data[2], data[3]]);
        let verification_tag = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);

        let mut chunks = Vec::new();
        let mut offset = SCTP_HEADER_SIZE;

        while offset + 4 <= data.len() {
            let declared_length =
                u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            if declared_length < 4 {
                break;
            }

            let chunk_length = if offset + declared_length > data.len() {
                data.len() - offset
            } else {
                declared_length
            };

            match SctpChunk::from_bytes(&data[offset..offset + chunk_length]) {
                Ok(chunk) => chunks.push(chunk),
                Err(_) => break,
            }

            offset += (chunk_length + 3) & !3;
        }

        Ok(Self {
            source_port,
            destination_port,
            verification_tag,
            chunks,
        })
    }

    /// Verify the CRC32c checksum embedded in an encoded packet's bytes
    /// without fully parsing it.
    pub fn verify_checksum(data: &[u8]) -> bool {
        if data.len() < SCTP_HEADER_SIZE {
            return false;
        }

        let received_checksum = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);

        let mut verify_data = data.to_vec();
        verify_data[8..12].copy_from_slice(&[0u8; 4]);

        received_checksum == crc32c(&verify_data)
    }
}

/// Calculate CRC32c checksum (RFC 3309)
fn crc32c(data: &[u8]) -> u32 {
    const CRC32C_TABLE: [u32; 256] = generate_crc32c_table();

    let mut crc: u32 = 0xFFFFFFFF;
    for byte in data {
        let index = ((crc ^ (*byte as u32)) & 0xFF) as usize;
        crc = CRC32C_TABLE[index] ^ (crc >> 8);
    }
    !crc
}

/// Generate CRC32c lookup table at compile time
const fn generate_crc32c_table() -> [u32; 256] {
    const POLYNOMIAL: u32 = 0x82F63B78; // Reflected polynomial
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}
