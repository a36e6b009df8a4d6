//! dimpl DTLS wrapper
//!
//! Wraps the sans-IO `dimpl` DTLS engine so the session layer only has to
//! push bytes in and drain bytes out; all ClientHello/ServerHello/Finished
//! bookkeeping lives inside `dimpl`.

use super::SrtpKeys;
use dimpl::{Config, Dtls, DtlsCertificate, KeyingMaterial, Output, SrtpProfile};
use std::sync::Arc;
use std::time::Instant;

/// DTLS engine state wrapping dimpl.
pub struct DtlsEngine {
    dtls: Dtls,
    cert: DtlsCertificate,
    srtp_keys: Option<SrtpKeys>,
    connected: bool,
    pending_packets: Vec<Vec<u8>>,
    is_server: bool,
    incoming_application_data: Vec<Vec<u8>>,
    peer_cert_der: Option<Vec<u8>>,
}

impl DtlsEngine {
    /// Create a new engine using a certificate that must match the
    /// fingerprint advertised out-of-band (SDP).
    pub fn new(is_server: bool, cert: DtlsCertificate) -> Result<Self, String> {
        let config = Arc::new(Config::default());
        let mut dtls = Dtls::new(config, cert.clone());
        dtls.set_active(!is_server);

        let mut engine = DtlsEngine {
            dtls,
            cert,
            srtp_keys: None,
            connected: false,
            pending_packets: Vec::new(),
            is_server,
            incoming_application_data: Vec::new(),
            peer_cert_der: None,
        };

        // dimpl requires a timeout tick before the first poll_output; for
        // the client this is what produces the initial ClientHello.
        engine
            .dtls
            .handle_timeout(Instant::now())
            .map_err(|e| format!("failed to initialize DTLS timeout: {e:?}"))?;
        engine.process_output()?;

        Ok(engine)
    }

    /// SHA-256 fingerprint of the local certificate, colon-separated hex.
    pub fn get_fingerprint(&self) -> String {
        fingerprint_of(&self.cert.certificate)
    }

    /// SHA-256 fingerprint of the peer certificate presented during the
    /// handshake, colon-separated hex. `None` until the handshake has
    /// delivered `Output::PeerCert`.
    pub fn get_peer_fingerprint(&self) -> Option<String> {
        self.peer_cert_der.as_deref().map(fingerprint_of)
    }

    /// Feed one inbound DTLS record into the engine.
    pub fn handle_packet(&mut self, packet: &[u8]) -> Result<(), String> {
        self.dtls
            .handle_packet(packet)
            .map_err(|e| format!("DTLS packet handling failed: {e:?}"))?;
        self.process_output()
    }

    /// Drive retransmission timers.
    pub fn handle_timeout(&mut self, now: Instant) -> Result<(), String> {
        self.dtls
            .handle_timeout(now)
            .map_err(|e| format!("DTLS timeout handling failed: {e:?}"))?;
        self.process_output()
    }

    fn process_output(&mut self) -> Result<(), String> {
        let mut out_buf = vec![0u8; 2048];

        loop {
            match self.dtls.poll_output(&mut out_buf) {
                Output::Packet(packet) => self.pending_packets.push(packet.to_vec()),
                Output::Timeout(_instant) => break,
                Output::Connected => self.connected = true,
                Output::PeerCert(der) => {
                    self.peer_cert_der = Some(der.to_vec());
                }
                Output::KeyingMaterial(km, profile) => {
                    self.srtp_keys = Some(extract_srtp_keys(&km, &profile, self.is_server)?);
                }
                Output::ApplicationData(data) => {
                    self.incoming_application_data.push(data.to_vec());
                }
            }
        }

        Ok(())
    }

    /// Drain packets the engine wants written to the transport.
    pub fn take_pending_packets(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending_packets)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn get_srtp_keys(&self) -> Option<&SrtpKeys> {
        self.srtp_keys.as_ref()
    }

    /// Encrypt and queue application data (SCTP bytes) for transport.
    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), String> {
        self.dtls
            .send_application_data(data)
            .map_err(|e| format!("failed to send application data: {e:?}"))?;
        self.process_output()
    }

    /// Drain plaintext application data the engine has decrypted.
    pub fn take_incoming_application_data(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.incoming_application_data)
    }
}

/// SHA-256 of a DER-encoded certificate, formatted as colon-separated
/// uppercase hex pairs.
fn fingerprint_of(der: &[u8]) -> String {
    use openssl::sha::sha256;
    let digest = sha256(der);
    digest
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Partition dimpl's exported keying material into the four SRTP secrets,
/// assigning local/remote by role (RFC 5764 §4.2).
fn extract_srtp_keys(
    km: &KeyingMaterial,
    profile: &SrtpProfile,
    is_server: bool,
) -> Result<SrtpKeys, String> {
    match profile {
        SrtpProfile::Aes128CmSha1_80 => extract_keys_with_params(km, 16, 14, is_server),
        SrtpProfile::AeadAes128Gcm => extract_keys_with_params(km, 16, 12, is_server),
        SrtpProfile::AeadAes256Gcm => extract_keys_with_params(km, 32, 12, is_server),
    }
}

fn extract_keys_with_params(
    km: &KeyingMaterial,
    key_len: usize,
    salt_len: usize,
    is_server: bool,
) -> Result<SrtpKeys, String> {
    let expected_len = key_len * 2 + salt_len * 2;
    if km.len() != expected_len {
        return Err(format!(
            "invalid keying material length: {} (expected {expected_len} for key={key_len}, salt={salt_len})",
            km.len(),
        ));
    }

    // Layout: client_write_key | server_write_key | client_write_salt | server_write_salt
    let actual_key_len = key_len.min(16);
    let actual_salt_len = salt_len.min(14);

    let client_key_offset = 0;
    let server_key_offset = key_len;
    let client_salt_offset = key_len * 2;
    let server_salt_offset = key_len * 2 + salt_len;

    let mut client_key = [0u8; 16];
    let mut server_key = [0u8; 16];
    let mut client_salt = [0u8; 14];
    let mut server_salt = [0u8; 14];

    client_key[..actual_key_len]
        .copy_from_slice(&km[client_key_offset..client_key_offset + actual_key_len]);
    server_key[..actual_key_len]
        .copy_from_slice(&km[server_key_offset..server_key_offset + actual_key_len]);
    client_salt[..actual_salt_len]
        .copy_from_slice(&km[client_salt_offset..client_salt_offset + actual_salt_len]);
    server_salt[..actual_salt_len]
        .copy_from_slice(&km[server_salt_offset..server_salt_offset + actual_salt_len]);

    let (local_master_key, local_master_salt, remote_master_key, remote_master_salt) = if is_server
    {
        (server_key, server_salt, client_key, client_salt)
    } else {
        (client_key, client_salt, server_key, server_salt)
    };

    Ok(SrtpKeys {
        local_master_key,
        local_master_salt,
        remote_master_key,
        remote_master_salt,
    })
}
