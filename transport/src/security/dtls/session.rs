//! DTLS session: handshake driver, RFC 7983 demultiplexer, and the SRTP
//! context handed to callers once the handshake completes.

use super::dimpl_wrapper::DtlsEngine;
use super::{DtlsContext, SrtpKeys};
use crate::error::{AuthError, HandshakeError, Result, TransportError};
use crate::net::UdpTransport;
use crate::security::srtp::SrtpContext;
use logging::Logger;
use std::time::{Duration, Instant};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const TIMER_TICK: Duration = Duration::from_millis(100);
const POLL_SLEEP: Duration = Duration::from_millis(10);

/// Lifecycle of a session, mirroring the RFCs' own terms rather than the
/// SCTP association states layered on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    New,
    Handshaking,
    Connected,
    Closed,
}

/// The first byte of a UDP datagram classifies which protocol it carries,
/// per RFC 7983 §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PacketKind {
    Dtls,
    Stun,
    Rtcp,
    Rtp,
    Unknown,
}

fn classify(first_byte: u8) -> PacketKind {
    match first_byte {
        0 | 1 => PacketKind::Stun,
        20..=63 => PacketKind::Dtls,
        128..=191 => {
            // RTCP payload types occupy 200-204 in the second byte's low
            // bits; anything else in the RTP/RTCP range is treated as RTP.
            PacketKind::Rtp
        }
        _ => PacketKind::Unknown,
    }
}

fn classify_packet(data: &[u8]) -> PacketKind {
    if data.is_empty() {
        return PacketKind::Unknown;
    }
    match classify(data[0]) {
        PacketKind::Rtp if data.len() >= 2 && (200..=204).contains(&data[1]) => PacketKind::Rtcp,
        kind => kind,
    }
}

/// A DTLS-secured UDP session carrying an SCTP association (as SRTP-less
/// application data) alongside SRTP-protected RTP/RTCP, demultiplexed on a
/// single socket the way a WebRTC peer connection shares one 5-tuple for
/// everything per RFC 7983.
pub struct DtlsSession {
    engine: DtlsEngine,
    transport: UdpTransport,
    state: SessionState,
    pub remote_fingerprint: Option<String>,
    srtp: Option<SrtpContext>,
    logger: Logger,
    is_server: bool,
    incoming_sctp: Vec<Vec<u8>>,
    incoming_rtp: Vec<Vec<u8>>,
    incoming_rtcp: Vec<Vec<u8>>,
}

impl DtlsSession {
    /// Build a session. `is_server` picks the DTLS role; the certificate
    /// comes from a `DtlsContext` built once per peer connection and
    /// advertised via SDP fingerprint beforehand.
    pub fn new(
        context: &DtlsContext,
        is_server: bool,
        transport: UdpTransport,
        logger: Logger,
    ) -> Result<Self> {
        let engine = DtlsEngine::new(is_server, context.get_dimpl_certificate().clone())
            .map_err(|e| TransportError::from(HandshakeError(e)))?;

        Ok(DtlsSession {
            engine,
            transport,
            state: SessionState::New,
            remote_fingerprint: None,
            srtp: None,
            logger,
            is_server,
            incoming_sctp: Vec::new(),
            incoming_rtp: Vec::new(),
            incoming_rtcp: Vec::new(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The DTLS role this session was constructed with, which also
    /// determines SCTP stream-ID parity allocation for the transport layered
    /// on top (RFC 8832 §6: DTLS server seeds even IDs, client seeds odd).
    pub fn is_server(&self) -> bool {
        self.is_server
    }

    /// Drive the handshake to completion, blocking the calling thread.
    /// Only DTLS-classified datagrams are fed to the engine; STUN/RTP/RTCP
    /// bytes arriving early are dropped rather than buffered, matching the
    /// expectation that ICE connectivity checks have already completed.
    pub fn connect(&mut self) -> Result<()> {
        self.state = SessionState::Handshaking;
        let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
        let mut last_tick = Instant::now();

        loop {
            for packet in self.engine.take_pending_packets() {
                self.transport.send(&packet)?;
            }

            if self.engine.is_connected() {
                break;
            }

            if Instant::now() >= deadline {
                return Err(TransportError::from(HandshakeError(
                    "handshake timed out".to_string(),
                )));
            }

            if let Some((data, _addr)) = self.transport.receive()? {
                if classify_packet(&data) == PacketKind::Dtls {
                    self.engine
                        .handle_packet(&data)
                        .map_err(|e| TransportError::from(HandshakeError(e)))?;
                } else {
                    self.logger.debug("dropping non-DTLS packet during handshake");
                }
            }

            if last_tick.elapsed() >= TIMER_TICK {
                self.engine
                    .handle_timeout(Instant::now())
                    .map_err(|e| TransportError::from(HandshakeError(e)))?;
                last_tick = Instant::now();
            }

            std::thread::sleep(POLL_SLEEP);
        }

        for packet in self.engine.take_pending_packets() {
            self.transport.send(&packet)?;
        }

        if let Some(expected) = &self.remote_fingerprint {
            // Self-signed WebRTC certs carry no CA chain to validate; the
            // fingerprint exchanged out-of-band over SDP is the only
            // authentication of the peer, so it must be checked here.
            let actual = self.engine.get_peer_fingerprint().ok_or_else(|| {
                TransportError::from(HandshakeError(
                    "handshake completed without a peer certificate".to_string(),
                ))
            })?;
            if expected.is_empty() || !expected.eq_ignore_ascii_case(&actual) {
                return Err(TransportError::from(AuthError::FingerprintMismatch {
                    expected: expected.clone(),
                    actual,
                }));
            }
        }

        let keys = self.engine.get_srtp_keys().ok_or_else(|| {
            TransportError::from(HandshakeError(
                "handshake completed without exporting SRTP keying material".to_string(),
            ))
        })?;
        self.srtp = Some(SrtpContext::new(keys.clone()));
        self.state = SessionState::Connected;
        self.logger.info("DTLS handshake complete");
        Ok(())
    }

    /// Feed one datagram received from the socket into the session, sorting
    /// it into the SCTP/RTP/RTCP queue it belongs to.
    pub fn handle_incoming(&mut self, data: &[u8]) -> Result<()> {
        match classify_packet(data) {
            PacketKind::Dtls => {
                self.engine
                    .handle_packet(data)
                    .map_err(|e| TransportError::from(HandshakeError(e)))?;
                self.incoming_sctp
                    .extend(self.engine.take_incoming_application_data());
            }
            PacketKind::Rtp => self.incoming_rtp.push(data.to_vec()),
            PacketKind::Rtcp => self.incoming_rtcp.push(data.to_vec()),
            PacketKind::Stun | PacketKind::Unknown => {
                self.logger.debug("dropping unrecognized packet");
            }
        }
        Ok(())
    }

    /// Poll the socket once and route whatever arrived.
    pub fn poll(&mut self) -> Result<()> {
        if let Some((data, _addr)) = self.transport.receive()? {
            self.handle_incoming(&data)?;
        }
        for packet in self.engine.take_pending_packets() {
            self.transport.send(&packet)?;
        }
        Ok(())
    }

    /// Encrypt and send SCTP bytes as DTLS application data.
    pub fn send_data(&mut self, data: &[u8]) -> Result<()> {
        self.engine
            .send_application_data(data)
            .map_err(|e| TransportError::from(HandshakeError(e)))?;
        for packet in self.engine.take_pending_packets() {
            self.transport.send(&packet)?;
        }
        Ok(())
    }

    /// Drain decrypted SCTP bytes delivered since the last call.
    pub fn recv_data(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.incoming_sctp)
    }

    /// Protect and send one RTP packet.
    pub fn send_rtp(&mut self, packet: &[u8]) -> Result<()> {
        let srtp = self.srtp_mut()?;
        let protected = srtp.protect(packet)?;
        self.transport.send(&protected)?;
        Ok(())
    }

    /// Protect and send one RTCP packet.
    pub fn send_rtcp(&mut self, packet: &[u8]) -> Result<()> {
        let srtp = self.srtp_mut()?;
        let protected = srtp.protect_rtcp(packet)?;
        self.transport.send(&protected)?;
        Ok(())
    }

    /// Drain and unprotect RTP packets delivered since the last call.
    pub fn recv_rtp(&mut self) -> Result<Vec<Vec<u8>>> {
        let packets = std::mem::take(&mut self.incoming_rtp);
        let srtp = self.srtp_mut()?;
        packets.iter().map(|p| srtp.unprotect(p)).collect()
    }

    /// Drain and unprotect RTCP packets delivered since the last call.
    pub fn recv_rtcp(&mut self) -> Result<Vec<Vec<u8>>> {
        let packets = std::mem::take(&mut self.incoming_rtcp);
        let srtp = self.srtp_mut()?;
        packets.iter().map(|p| srtp.unprotect_rtcp(p)).collect()
    }

    pub fn srtp_keys(&self) -> Option<&SrtpKeys> {
        self.engine.get_srtp_keys()
    }

    fn srtp_mut(&mut self) -> Result<&mut SrtpContext> {
        self.srtp.as_mut().ok_or_else(|| {
            TransportError::from(crate::error::StateError(
                "session is not connected".to_string(),
            ))
        })
    }

    /// Idempotent close: a second call is a no-op rather than an error.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        self.logger.info("DTLS session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_dtls_range() {
        assert_eq!(classify_packet(&[20, 0, 0]), PacketKind::Dtls);
        assert_eq!(classify_packet(&[63, 0, 0]), PacketKind::Dtls);
    }

    #[test]
    fn test_classify_stun() {
        assert_eq!(classify_packet(&[0, 1, 2]), PacketKind::Stun);
        assert_eq!(classify_packet(&[1, 1, 2]), PacketKind::Stun);
    }

    #[test]
    fn test_classify_rtcp_by_payload_type() {
        assert_eq!(classify_packet(&[128, 200, 0, 0]), PacketKind::Rtcp);
        assert_eq!(classify_packet(&[128, 204, 0, 0]), PacketKind::Rtcp);
    }

    #[test]
    fn test_classify_rtp() {
        assert_eq!(classify_packet(&[128, 96, 0, 0]), PacketKind::Rtp);
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify_packet(&[255, 0]), PacketKind::Unknown);
        assert_eq!(classify_packet(&[]), PacketKind::Unknown);
    }
}
