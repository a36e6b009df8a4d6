//! SCTP association state machine
//!
//! An SCTP association represents a connection between two endpoints. This
//! implements the subset of RFC 4960 needed for a WebRTC data channel: the
//! cookie-authenticated four-way handshake, ordered per-stream reassembly,
//! and the shutdown sequence. No congestion control, path MTU discovery, or
//! retransmission exists.

use super::chunk::{
    DataChunk, InitChunk, ParamChunk, STALE_COOKIE_CAUSE, STATE_COOKIE_PARAM_TYPE, SackChunk,
    SctpChunk,
};
use super::packet::SctpPacket;
use super::reassembler::Reassembler;
use crate::error::{Result, StateError};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::{HashMap, VecDeque};

type HmacSha1 = Hmac<Sha1>;

/// SCTP association states (RFC 4960 §4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    Closed,
    CookieWait,
    CookieEchoed,
    Established,
    ShutdownPending,
    ShutdownSent,
    ShutdownReceived,
    ShutdownAckSent,
}

/// Configuration for an SCTP association
#[derive(Debug, Clone)]
pub struct AssociationConfig {
    pub local_port: u16,
    pub remote_port: u16,
    /// True if this endpoint is the DTLS/SCTP server (ICE non-controlling).
    pub is_server: bool,
    pub max_outbound_streams: u16,
    pub max_inbound_streams: u16,
    pub advertised_rwnd: u32,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            local_port: 5000,
            remote_port: 5000,
            is_server: false,
            max_outbound_streams: 65535,
            max_inbound_streams: 65535,
            advertised_rwnd: 131072,
        }
    }
}

/// Source of the current time, injectable so the stale-cookie rejection path
/// can be exercised deterministically in tests.
pub trait Clock: std::fmt::Debug {
    fn now_unix(&self) -> u64;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs()
    }
}

/// An SCTP association (one per DTLS session).
#[derive(Debug)]
pub struct SctpAssociation {
    state: AssociationState,
    config: AssociationConfig,
    clock: Box<dyn Clock + Send>,

    local_tag: u32,
    remote_tag: u32,
    local_tsn: u32,
    last_received_tsn: u32,
    hmac_key: [u8; 16],

    num_outbound_streams: u16,
    num_inbound_streams: u16,

    reassemblers: HashMap<u16, Reassembler>,
    outbound_stream_seq: HashMap<u16, u16>,

    sack_duplicates: Vec<u32>,
    sack_needed: bool,

    send_queue: VecDeque<SctpPacket>,
    deliver_queue: VecDeque<(u16, u32, Vec<u8>)>,
}

impl SctpAssociation {
    pub fn new(config: AssociationConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock))
    }

    pub fn with_clock(config: AssociationConfig, clock: Box<dyn Clock + Send>) -> Self {
        let local_tag: u32 = loop {
            let tag = rand::random::<u32>();
            if tag != 0 {
                break tag;
            }
        };
        let local_tsn: u32 = rand::random();
        let mut hmac_key = [0u8; 16];
        for byte in hmac_key.iter_mut() {
            *byte = rand::random();
        }

        Self {
            state: AssociationState::Closed,
            config,
            clock,
            local_tag,
            remote_tag: 0,
            local_tsn,
            last_received_tsn: 0,
            hmac_key,
            num_outbound_streams: 0,
            num_inbound_streams: 0,
            reassemblers: HashMap::new(),
            outbound_stream_seq: HashMap::new(),
            sack_duplicates: Vec::new(),
            sack_needed: false,
            send_queue: VecDeque::new(),
            deliver_queue: VecDeque::new(),
        }
    }

    pub fn state(&self) -> AssociationState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.state == AssociationState::Established
    }

    fn new_packet(&self) -> SctpPacket {
        SctpPacket::new(self.config.local_port, self.config.remote_port, self.remote_tag)
    }

    /// Client start: send INIT, transition to COOKIE_WAIT.
    pub fn create_init(&mut self) -> SctpPacket {
        self.state = AssociationState::CookieWait;
        let init = InitChunk::new(self.local_tag, self.local_tsn);
        let mut packet = SctpPacket::new(self.config.local_port, self.config.remote_port, 0);
        packet.add_chunk(SctpChunk::Init(init));
        packet
    }

    /// Validate the packet-level verification tag rule: a packet carrying
    /// an INIT must carry nothing else and must have tag 0; otherwise the
    /// tag must equal our local tag.
    fn tag_is_valid(&self, packet: &SctpPacket) -> bool {
        let init_count = packet
            .chunks
            .iter()
            .filter(|c| matches!(c, SctpChunk::Init(_)))
            .count();

        if init_count > 0 {
            return init_count == 1 && packet.chunks.len() == 1 && packet.verification_tag == 0;
        }

        packet.verification_tag == self.local_tag
    }

    /// Process an inbound packet, returning any reply packets to send.
    pub fn process_packet(&mut self, packet: &SctpPacket) -> Vec<SctpPacket> {
        if !self.tag_is_valid(packet) {
            return Vec::new();
        }

        let mut responses = Vec::new();
        for chunk in &packet.chunks {
            if let Some(response) = self.process_chunk(chunk) {
                responses.push(response);
            }
        }

        if self.sack_needed {
            responses.push(self.build_sack());
            self.sack_needed = false;
            self.sack_duplicates.clear();
        }

        responses
    }

    fn process_chunk(&mut self, chunk: &SctpChunk) -> Option<SctpPacket> {
        match chunk {
            SctpChunk::Init(init) if self.config.is_server => self.handle_init(init),
            SctpChunk::InitAck(init_ack) if !self.config.is_server => {
                self.handle_init_ack(init_ack)
            }
            SctpChunk::CookieEcho(cookie) if self.config.is_server => {
                self.handle_cookie_echo(cookie)
            }
            SctpChunk::CookieAck if !self.config.is_server => self.handle_cookie_ack(),
            SctpChunk::Error(_) if !self.config.is_server => self.handle_error(),
            SctpChunk::Data(data) => self.handle_data(data),
            SctpChunk::Sack(sack) => self.handle_sack(sack),
            SctpChunk::Heartbeat(hb) => self.handle_heartbeat(hb),
            SctpChunk::Abort(_) => self.handle_abort(),
            SctpChunk::Shutdown { cumulative_tsn } => self.handle_shutdown(*cumulative_tsn),
            SctpChunk::ShutdownAck => self.handle_shutdown_ack(),
            SctpChunk::ShutdownComplete => self.handle_shutdown_complete(),
            _ => None,
        }
    }

    /// INIT (server only): stateless, no retained per-peer state — the
    /// cookie itself carries everything needed to validate COOKIE_ECHO.
    fn handle_init(&mut self, init: &InitChunk) -> Option<SctpPacket> {
        self.remote_tag = init.initiate_tag;
        self.last_received_tsn = init.initial_tsn.wrapping_sub(1);
        self.num_outbound_streams = init
            .num_inbound_streams
            .min(self.config.max_outbound_streams);
        self.num_inbound_streams = init
            .num_outbound_streams
            .min(self.config.max_inbound_streams);

        let cookie = self.mint_cookie();

        let init_ack = InitChunk {
            initiate_tag: self.local_tag,
            a_rwnd: self.config.advertised_rwnd,
            num_outbound_streams: self.num_outbound_streams,
            num_inbound_streams: self.num_inbound_streams,
            initial_tsn: self.local_tsn,
            params: vec![(STATE_COOKIE_PARAM_TYPE, cookie)],
        };

        let mut packet = self.new_packet();
        packet.add_chunk(SctpChunk::InitAck(init_ack));
        Some(packet)
    }

    fn mint_cookie(&self) -> Vec<u8> {
        let timestamp = self.clock.now_unix() as u32;
        let ts_bytes = timestamp.to_be_bytes();
        let mut mac = HmacSha1::new_from_slice(&self.hmac_key).expect("hmac accepts any key length");
        mac.update(&ts_bytes);
        let tag = mac.finalize().into_bytes();

        let mut cookie = Vec::with_capacity(24);
        cookie.extend_from_slice(&ts_bytes);
        cookie.extend_from_slice(&tag);
        cookie
    }

    /// INIT_ACK (client only).
    fn handle_init_ack(&mut self, init_ack: &InitChunk) -> Option<SctpPacket> {
        if self.state != AssociationState::CookieWait {
            return None;
        }

        self.remote_tag = init_ack.initiate_tag;
        self.last_received_tsn = init_ack.initial_tsn.wrapping_sub(1);
        self.num_outbound_streams = init_ack
            .num_inbound_streams
            .min(self.config.max_outbound_streams);
        self.num_inbound_streams = init_ack
            .num_outbound_streams
            .min(self.config.max_inbound_streams);

        let cookie = init_ack.state_cookie()?.to_vec();
        self.state = AssociationState::CookieEchoed;

        let mut packet = self.new_packet();
        packet.add_chunk(SctpChunk::CookieEcho(cookie));
        Some(packet)
    }

    /// COOKIE_ECHO (server only): validate HMAC and staleness window.
    fn handle_cookie_echo(&mut self, cookie: &[u8]) -> Option<SctpPacket> {
        if cookie.len() != 24 {
            return None;
        }
        let timestamp_bytes = &cookie[0..4];
        let received_mac = &cookie[4..24];

        let mut mac = HmacSha1::new_from_slice(&self.hmac_key).expect("hmac accepts any key length");
        mac.update(timestamp_bytes);
        if mac.verify_slice(received_mac).is_err() {
            // AuthError::CookieMacMismatch — dropped silently, no reply.
            return None;
        }

        let timestamp = u32::from_be_bytes(timestamp_bytes.try_into().unwrap()) as u64;
        let now = self.clock.now_unix();
        if timestamp > now || timestamp < now.saturating_sub(60) {
            let error = ParamChunk::new(vec![(STALE_COOKIE_CAUSE, vec![0u8; 8])]);
            let mut packet = self.new_packet();
            packet.add_chunk(SctpChunk::Error(error));
            return Some(packet);
        }

        self.state = AssociationState::Established;
        let mut packet = self.new_packet();
        packet.add_chunk(SctpChunk::CookieAck);
        Some(packet)
    }

    fn handle_cookie_ack(&mut self) -> Option<SctpPacket> {
        if self.state == AssociationState::CookieEchoed {
            self.state = AssociationState::Established;
        }
        None
    }

    fn handle_error(&mut self) -> Option<SctpPacket> {
        if matches!(
            self.state,
            AssociationState::CookieWait | AssociationState::CookieEchoed
        ) {
            self.state = AssociationState::Closed;
        }
        None
    }

    fn handle_data(&mut self, data: &DataChunk) -> Option<SctpPacket> {
        if self.state != AssociationState::Established {
            return None;
        }

        if !tsn_gt(data.tsn, self.last_received_tsn) {
            self.sack_duplicates.push(data.tsn);
            self.sack_needed = true;
            return None;
        }

        if data.tsn != self.last_received_tsn.wrapping_add(1) {
            self.sack_needed = true;
            return None;
        }

        self.last_received_tsn = data.tsn;
        self.sack_needed = true;

        let reassembler = self.reassemblers.entry(data.stream_id).or_default();
        reassembler.insert(data.clone());
        for (ppid, bytes) in reassembler.drain() {
            self.deliver_queue.push_back((data.stream_id, ppid, bytes));
        }

        None
    }

    fn handle_sack(&mut self, _sack: &SackChunk) -> Option<SctpPacket> {
        None
    }

    fn handle_heartbeat(&mut self, hb: &ParamChunk) -> Option<SctpPacket> {
        let mut packet = self.new_packet();
        packet.add_chunk(SctpChunk::HeartbeatAck(hb.clone()));
        Some(packet)
    }

    fn handle_abort(&mut self) -> Option<SctpPacket> {
        self.state = AssociationState::Closed;
        None
    }

    fn handle_shutdown(&mut self, _cumulative_tsn: u32) -> Option<SctpPacket> {
        self.state = AssociationState::ShutdownReceived;
        let mut packet = self.new_packet();
        packet.add_chunk(SctpChunk::ShutdownAck);
        self.state = AssociationState::ShutdownAckSent;
        Some(packet)
    }

    fn handle_shutdown_ack(&mut self) -> Option<SctpPacket> {
        let mut packet = self.new_packet();
        packet.add_chunk(SctpChunk::ShutdownComplete);
        self.state = AssociationState::Closed;
        Some(packet)
    }

    fn handle_shutdown_complete(&mut self) -> Option<SctpPacket> {
        self.state = AssociationState::Closed;
        None
    }

    fn build_sack(&self) -> SctpPacket {
        let mut sack = SackChunk::new(self.last_received_tsn, self.config.advertised_rwnd);
        sack.duplicate_tsns = self.sack_duplicates.clone();
        let mut packet = self.new_packet();
        packet.add_chunk(SctpChunk::Sack(sack));
        packet
    }

    /// Fragment `data` into 1200-byte DATA chunks and queue them for send.
    pub fn send(&mut self, stream_id: u16, ppid: u32, data: Vec<u8>) -> Result<()> {
        if self.state != AssociationState::Established {
            return Err(StateError("association not established".into()).into());
        }

        const FRAGMENT_SIZE: usize = 1200;
        let stream_seq = *self.outbound_stream_seq.entry(stream_id).or_insert(0);
        self.outbound_stream_seq
            .insert(stream_id, stream_seq.wrapping_add(1));

        let pieces: Vec<&[u8]> = if data.is_empty() {
            vec![&data[..]]
        } else {
            data.chunks(FRAGMENT_SIZE).collect()
        };
        let last_index = pieces.len() - 1;

        for (i, piece) in pieces.into_iter().enumerate() {
            let tsn = self.local_tsn;
            self.local_tsn = self.local_tsn.wrapping_add(1);

            let chunk = DataChunk {
                unordered: false,
                beginning: i == 0,
                ending: i == last_index,
                tsn,
                stream_id,
                stream_seq,
                ppid,
                data: piece.to_vec(),
            };

            let mut packet = self.new_packet();
            packet.add_chunk(SctpChunk::Data(chunk));
            self.send_queue.push_back(packet);
        }

        Ok(())
    }

    /// Next outbound packet, if any is queued.
    pub fn poll_send(&mut self) -> Option<SctpPacket> {
        self.send_queue.pop_front()
    }

    /// Next delivered user message, if any.
    pub fn recv(&mut self) -> Option<(u16, u32, Vec<u8>)> {
        self.deliver_queue.pop_front()
    }

    /// Locally-initiated shutdown. Idempotent once CLOSED.
    pub fn shutdown(&mut self) -> Option<SctpPacket> {
        if self.state == AssociationState::Closed {
            return None;
        }
        if self.state != AssociationState::Established {
            return None;
        }

        let mut packet = self.new_packet();
        packet.add_chunk(SctpChunk::Shutdown {
            cumulative_tsn: self.last_received_tsn,
        });
        self.state = AssociationState::ShutdownSent;
        Some(packet)
    }

    /// Local abort: send ABORT and transition CLOSED directly.
    pub fn abort(&mut self) -> Option<SctpPacket> {
        let mut packet = self.new_packet();
        packet.add_chunk(SctpChunk::Abort(ParamChunk::new(Vec::new())));
        self.state = AssociationState::Closed;
        Some(packet)
    }
}

/// Compare TSNs (or SSNs) accounting for wraparound (RFC 1982 serial
/// arithmetic): `a > b` iff `(a - b) mod 2^32` lies in `(0, 2^31)`.
pub(crate) fn tsn_gt(a: u32, b: u32) -> bool {
    let diff = a.wrapping_sub(b);
    diff != 0 && diff < 0x8000_0000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    struct ManualClock(Cell<u64>);

    impl Clock for ManualClock {
        fn now_unix(&self) -> u64 {
            self.0.get()
        }
    }

    fn server_config() -> AssociationConfig {
        AssociationConfig {
            is_server: true,
            ..AssociationConfig::default()
        }
    }

    fn client_config() -> AssociationConfig {
        AssociationConfig {
            is_server: false,
            ..AssociationConfig::default()
        }
    }

    #[test]
    fn test_association_creation() {
        let assoc = SctpAssociation::new(client_config());
        assert_eq!(assoc.state(), AssociationState::Closed);
    }

    #[test]
    fn test_init_creates_packet() {
        let mut assoc = SctpAssociation::new(client_config());
        let packet = assoc.create_init();

        assert_eq!(packet.chunks.len(), 1);
        assert_eq!(packet.verification_tag, 0);
        assert_eq!(assoc.state(), AssociationState::CookieWait);
    }

    #[test]
    fn test_tsn_comparison() {
        assert!(tsn_gt(2, 1));
        assert!(!tsn_gt(1, 2));
        assert!(!tsn_gt(1, 1));
        assert!(tsn_gt(0, u32::MAX));
        assert!(!tsn_gt(u32::MAX, 0));
        assert!(!tsn_gt(0x8000_0000, 0));
        assert!(!tsn_gt(0x8000_0001, 0));
    }

    #[test]
    fn test_full_handshake_reaches_established() {
        let mut client = SctpAssociation::new(client_config());
        let mut server = SctpAssociation::new(server_config());

        let init = client.create_init();
        let init_ack_responses = server.process_packet(&init);
        assert_eq!(init_ack_responses.len(), 1);

        let cookie_echo_responses = client.process_packet(&init_ack_responses[0]);
        assert_eq!(client.state(), AssociationState::CookieEchoed);
        assert_eq!(cookie_echo_responses.len(), 1);

        let cookie_ack_responses = server.process_packet(&cookie_echo_responses[0]);
        assert_eq!(server.state(), AssociationState::Established);
        assert_eq!(cookie_ack_responses.len(), 1);

        client.process_packet(&cookie_ack_responses[0]);
        assert_eq!(client.state(), AssociationState::Established);
    }

    #[test]
    fn test_bad_verification_tag_is_dropped() {
        let mut server = SctpAssociation::new(server_config());

        let mut bogus_init = SctpPacket::new(5000, 5000, 0xDEADBEEF);
        bogus_init.add_chunk(SctpChunk::Init(InitChunk::new(1, 1)));

        let responses = server.process_packet(&bogus_init);
        assert!(responses.is_empty());
        assert_eq!(server.state(), AssociationState::Closed);
    }

    #[test]
    fn test_stale_cookie_is_rejected() {
        let mut client = SctpAssociation::new(client_config());
        let init = client.create_init();

        // Mint the cookie at t=0.
        let mut server =
            SctpAssociation::with_clock(server_config(), Box::new(ManualClock(Cell::new(0))));
        let init_ack = server.process_packet(&init);
        assert_eq!(init_ack.len(), 1);

        let cookie_echo = client.process_packet(&init_ack[0]);
        assert_eq!(cookie_echo.len(), 1);

        // Verify the echoed cookie 61 seconds later: past the 60s window.
        server.clock = Box::new(ManualClock(Cell::new(61)));
        let error_responses = server.process_packet(&cookie_echo[0]);

        assert_eq!(error_responses.len(), 1);
        match &error_responses[0].chunks[0] {
            SctpChunk::Error(p) => assert_eq!(p.params[0].0, STALE_COOKIE_CAUSE),
            other => panic!("expected Error chunk, got {other:?}"),
        }
        assert_eq!(server.state(), AssociationState::Closed);
    }

    #[test]
    fn test_data_send_fragments_over_1200_bytes() {
        let mut assoc = SctpAssociation::new(client_config());
        force_established(&mut assoc);

        let payload = vec![7u8; 2500];
        assoc.send(1, 53, payload.clone()).unwrap();

        let mut fragments = Vec::new();
        while let Some(packet) = assoc.poll_send() {
            fragments.push(packet);
        }
        assert_eq!(fragments.len(), 3);

        match &fragments[0].chunks[0] {
            SctpChunk::Data(d) => {
                assert!(d.beginning);
                assert!(!d.ending);
            }
            other => panic!("expected Data, got {other:?}"),
        }
        match &fragments[2].chunks[0] {
            SctpChunk::Data(d) => {
                assert!(!d.beginning);
                assert!(d.ending);
            }
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_data_is_tracked_not_stored() {
        let mut server = SctpAssociation::new(server_config());
        force_established(&mut server);
        server.last_received_tsn = 10;

        let dup = DataChunk::new(10, 1, 0, 53, vec![1, 2, 3]);
        let mut packet = SctpPacket::new(5000, 5000, server.local_tag);
        packet.add_chunk(SctpChunk::Data(dup));

        let responses = server.process_packet(&packet);
        assert_eq!(responses.len(), 1);
        match &responses[0].chunks[0] {
            SctpChunk::Sack(s) => assert_eq!(s.duplicate_tsns, vec![10]),
            other => panic!("expected Sack, got {other:?}"),
        }
        assert!(server.recv().is_none());
    }

    #[test]
    fn test_shutdown_sequence() {
        let mut assoc = SctpAssociation::new(client_config());
        force_established(&mut assoc);

        let shutdown_packet = assoc.shutdown().unwrap();
        assert_eq!(assoc.state(), AssociationState::ShutdownSent);
        match shutdown_packet.chunks[0] {
            SctpChunk::Shutdown { .. } => {}
            ref other => panic!("expected Shutdown, got {other:?}"),
        }
    }

    fn force_established(assoc: &mut SctpAssociation) {
        assoc.state = AssociationState::Established;
    }
}
