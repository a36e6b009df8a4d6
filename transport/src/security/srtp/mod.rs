//! SRTP (Secure RTP) implementation.
//!
//! Encrypts and authenticates RTP/RTCP packets once DTLS-SRTP keying
//! material has been exported. Operates on raw wire bytes rather than a
//! parsed packet type: everything above this layer (RTP/RTCP codecs,
//! jitter buffers) is a peer connection concern outside this crate.

mod encryption;
mod replay;

use crate::error::{Result, TransportError};
use crate::security::dtls::SrtpKeys;
use replay::ReplayWindow;
use std::collections::HashMap;

const AUTH_TAG_LEN: usize = 10;
const RTP_HEADER_LEN: usize = 12;
const RTCP_HEADER_LEN: usize = 8;

/// SRTP context for one DTLS-SRTP session: separate key/salt pairs for the
/// direction we encrypt (local) and the direction we decrypt (remote), per
/// RFC 5764 §4.2.
pub struct SrtpContext {
    local_key: [u8; 16],
    local_salt: [u8; 14],
    remote_key: [u8; 16],
    remote_salt: [u8; 14],
    replay_windows: HashMap<u32, ReplayWindow>,
}

impl SrtpContext {
    /// Build a context from the keying material partitioned out of the
    /// completed DTLS handshake.
    pub fn new(keys: SrtpKeys) -> Self {
        Self {
            local_key: keys.local_master_key,
            local_salt: keys.local_master_salt,
            remote_key: keys.remote_master_key,
            remote_salt: keys.remote_master_salt,
            replay_windows: HashMap::new(),
        }
    }

    /// Encrypt and authenticate a raw RTP packet (header + payload).
    pub fn protect(&mut self, rtp_bytes: &[u8]) -> Result<Vec<u8>> {
        self.protect_with_header_len(rtp_bytes, RTP_HEADER_LEN, 8)
    }

    /// Decrypt and verify a raw SRTP packet, returning the plaintext RTP
    /// packet (header + payload, auth tag stripped).
    pub fn unprotect(&mut self, srtp_bytes: &[u8]) -> Result<Vec<u8>> {
        self.unprotect_with_header_len(srtp_bytes, RTP_HEADER_LEN, 8, true)
    }

    /// Encrypt and authenticate a raw RTCP packet. RTCP has no sequence
    /// number field, so the label byte used for key derivation is distinct
    /// from RTP's (0x02 for encryption per RFC 3711 §4.1.1) and replay
    /// protection keys off the packet's own SSRC at offset 4.
    pub fn protect_rtcp(&mut self, rtcp_bytes: &[u8]) -> Result<Vec<u8>> {
        self.protect_with_header_len(rtcp_bytes, RTCP_HEADER_LEN, 4)
    }

    /// Decrypt and verify a raw SRTCP packet.
    pub fn unprotect_rtcp(&mut self, srtcp_bytes: &[u8]) -> Result<Vec<u8>> {
        self.unprotect_with_header_len(srtcp_bytes, RTCP_HEADER_LEN, 4, false)
    }

    fn protect_with_header_len(
        &self,
        bytes: &[u8],
        header_len: usize,
        ssrc_offset: usize,
    ) -> Result<Vec<u8>> {
        if bytes.len() < header_len {
            return Err(packet_too_short());
        }

        let ssrc = parse_u32_be(bytes, ssrc_offset);
        let seq_for_iv = if header_len == RTP_HEADER_LEN {
            parse_u16_be(bytes, 2)
        } else {
            0
        };

        let mut out = bytes.to_vec();
        let session_key = encryption::derive_session_key(&self.local_key, ssrc, 0x00);
        let session_salt = encryption::derive_session_salt(&self.local_salt, ssrc);
        let iv = encryption::build_iv(&session_salt, ssrc, seq_for_iv);

        if out.len() > header_len {
            encryption::encrypt_payload(&mut out[header_len..], &session_key, &iv);
        }

        let auth_key = encryption::derive_auth_key(&self.local_key, ssrc);
        let tag = encryption::compute_auth_tag(&auth_key, &out)?;
        out.extend_from_slice(&tag);
        Ok(out)
    }

    fn unprotect_with_header_len(
        &mut self,
        bytes: &[u8],
        header_len: usize,
        ssrc_offset: usize,
        replay_protected: bool,
    ) -> Result<Vec<u8>> {
        if bytes.len() < header_len + AUTH_TAG_LEN {
            return Err(packet_too_short());
        }

        let body_len = bytes.len() - AUTH_TAG_LEN;
        let body = &bytes[..body_len];
        let received_tag = &bytes[body_len..];

        let ssrc = parse_u32_be(body, ssrc_offset);
        let seq_for_iv = if header_len == RTP_HEADER_LEN {
            parse_u16_be(body, 2)
        } else {
            0
        };

        if replay_protected {
            let window = self
                .replay_windows
                .entry(ssrc)
                .or_insert_with(|| ReplayWindow::new(64));
            if !window.check_and_update(seq_for_iv as u64) {
                return Err(replay_detected());
            }
        }

        let auth_key = encryption::derive_auth_key(&self.remote_key, ssrc);
        let computed_tag = encryption::compute_auth_tag(&auth_key, body)?;
        if received_tag != &computed_tag[..] {
            return Err(auth_failed());
        }

        let session_key = encryption::derive_session_key(&self.remote_key, ssrc, 0x00);
        let session_salt = encryption::derive_session_salt(&self.remote_salt, ssrc);
        let iv = encryption::build_iv(&session_salt, ssrc, seq_for_iv);

        let mut plaintext = body.to_vec();
        if plaintext.len() > header_len {
            encryption::encrypt_payload(&mut plaintext[header_len..], &session_key, &iv);
        }
        Ok(plaintext)
    }

    /// Reset replay protection windows for all SSRCs. Call when the remote
    /// peer's stream restarts (e.g. camera toggled off/on).
    pub fn reset_replay_protection(&mut self) {
        self.replay_windows.clear();
    }

    /// Reset replay protection for a specific SSRC.
    pub fn reset_replay_protection_for_ssrc(&mut self, ssrc: u32) {
        self.replay_windows.remove(&ssrc);
    }
}

fn parse_u32_be(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn parse_u16_be(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn packet_too_short() -> TransportError {
    TransportError::from(crate::error::DecodeError::TruncatedPacket)
}

fn replay_detected() -> TransportError {
    TransportError::from(crate::error::AuthError::SrtpReplay)
}

fn auth_failed() -> TransportError {
    TransportError::from(crate::error::AuthError::SrtpAuthTagMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keys() -> SrtpKeys {
        SrtpKeys {
            local_master_key: [
                0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C,
                0x0D, 0x0E, 0x0F,
            ],
            local_master_salt: [
                0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D,
            ],
            remote_master_key: [
                0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C,
                0x0D, 0x0E, 0x0F,
            ],
            remote_master_salt: [
                0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D,
            ],
        }
    }

    fn sample_rtp(seq: u16) -> Vec<u8> {
        let mut packet = vec![0x80, 96, 0, 0, 0, 0, 0x51, 0x60, 0, 0, 0x30, 0x39];
        packet[2..4].copy_from_slice(&seq.to_be_bytes());
        packet.extend_from_slice(b"Hello, SRTP!");
        packet
    }

    #[test]
    fn test_srtp_protect_unprotect_round_trip() {
        let mut tx = SrtpContext::new(test_keys());
        let mut rx = SrtpContext::new(test_keys());

        let original = sample_rtp(100);
        let protected = tx.protect(&original).unwrap();

        assert_ne!(&protected[12..protected.len() - 10], &original[12..]);

        let recovered = rx.unprotect(&protected).unwrap();
        assert_eq!(recovered, original);
    }

    #[test]
    fn test_replay_protection_rejects_duplicate() {
        let mut tx = SrtpContext::new(test_keys());
        let mut rx = SrtpContext::new(test_keys());

        let protected = tx.protect(&sample_rtp(200)).unwrap();

        assert!(rx.unprotect(&protected).is_ok());
        assert!(rx.unprotect(&protected).is_err());
    }

    #[test]
    fn test_unprotect_rejects_short_packet() {
        let mut rx = SrtpContext::new(test_keys());
        assert!(rx.unprotect(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_rtcp_protect_unprotect_round_trip() {
        let mut tx = SrtpContext::new(test_keys());
        let mut rx = SrtpContext::new(test_keys());

        let mut original = vec![0x80, 200, 0, 1, 0, 0, 0x30, 0x39];
        original.extend_from_slice(b"report");

        let protected = tx.protect_rtcp(&original).unwrap();
        let recovered = rx.unprotect_rtcp(&protected).unwrap();
        assert_eq!(recovered, original);
    }

    #[test]
    fn test_reset_replay_protection_allows_resend() {
        let mut tx = SrtpContext::new(test_keys());
        let mut rx = SrtpContext::new(test_keys());

        let protected = tx.protect(&sample_rtp(50)).unwrap();
        assert!(rx.unprotect(&protected).is_ok());

        rx.reset_replay_protection();
        assert!(rx.unprotect(&protected).is_ok());
    }
}
