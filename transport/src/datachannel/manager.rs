//! Data channel manager
//!
//! Manages multiple data channels over a single SCTP association.

use super::channel::{DataChannel, DataChannelConfig};
use crate::error::{ProtocolError, Result, StateError};
use crate::sctp::{
    ChannelType, DataChannelAck, DataChannelOpen, SctpAssociation, SctpPacket, ppid,
};
use std::collections::HashMap;

/// A message delivered on a data channel, tagged by the PPID it arrived
/// with so callers don't have to guess whether bytes are text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataChannelMessage {
    Text(String),
    Binary(Vec<u8>),
}

/// Which of the four user-data PPIDs a received message arrived with,
/// before EMPTY variants are collapsed to an actually-empty payload.
enum DataKind {
    Text,
    Binary,
}

/// Events emitted by the data channel manager
#[derive(Debug, Clone)]
pub enum DataChannelEvent {
    /// A new channel was opened by the remote peer
    ChannelOpened { id: u16, label: String },
    /// A channel was closed
    ChannelClosed { id: u16 },
    /// Data received on a channel
    DataReceived { id: u16, message: DataChannelMessage },
    /// Error occurred
    Error { message: String },
}

/// Manages multiple data channels
#[derive(Debug)]
pub struct DataChannelManager {
    /// SCTP association
    association: SctpAssociation,
    /// Active data channels (by stream ID)
    channels: HashMap<u16, DataChannel>,
    /// Next stream ID to allocate
    next_stream_id: u16,
    /// Parity of streams we are allowed to allocate (0 = even, 1 = odd).
    /// A remote-opened channel must use the opposite parity.
    local_parity: u16,
    /// Pending events
    events: Vec<DataChannelEvent>,
    /// Channels created before the association reached ESTABLISHED; their
    /// DATA_CHANNEL_OPEN is queued here and flushed in one shot once the
    /// handshake completes (spec §4.6/§4.7).
    pending_opens: Vec<(u16, DataChannelConfig)>,
}

impl DataChannelManager {
    /// Create a new data channel manager. The server seeds stream IDs at 0
    /// (even), the client at 1 (odd) — RFC 8832's DTLS-role-based split.
    pub fn new(association: SctpAssociation, is_client: bool) -> Self {
        let next_stream_id = if is_client { 1 } else { 0 };

        Self {
            association,
            channels: HashMap::new(),
            next_stream_id,
            local_parity: next_stream_id % 2,
            events: Vec::new(),
            pending_opens: Vec::new(),
        }
    }

    /// Check if the association is established
    pub fn is_established(&self) -> bool {
        self.association.is_established()
    }

    /// Initialize SCTP association (send INIT packet)
    ///
    /// Call this after DTLS handshake to start SCTP association
    /// Returns the INIT packet bytes to send
    pub fn init_association(&mut self) -> Vec<u8> {
        self.association.create_init().to_bytes()
    }

    /// Same as [`Self::init_association`] but returns the packet before
    /// serialization, so callers can override header fields (e.g. the
    /// destination port) before sending it.
    pub fn init_association_packet(&mut self) -> SctpPacket {
        self.association.create_init()
    }

    /// Create a new data channel. If the association hasn't reached
    /// ESTABLISHED yet, the DATA_CHANNEL_OPEN is queued rather than
    /// rejected — the channel itself is allocated and tracked immediately,
    /// matching peers that open channels before the SCTP handshake
    /// finishes. The queue drains as soon as `process_packet` observes the
    /// association become established (spec §4.6/§4.7).
    pub fn create_channel(&mut self, config: DataChannelConfig) -> Result<u16> {
        let stream_id = self.allocate_stream_id();
        let channel = DataChannel::new(stream_id, config.clone());
        self.channels.insert(stream_id, channel);

        if self.association.is_established() {
            self.send_open(stream_id, config)?;
        } else {
            self.pending_opens.push((stream_id, config));
        }

        Ok(stream_id)
    }

    /// Encode and send a DATA_CHANNEL_OPEN for a channel we initiated.
    fn send_open(&mut self, stream_id: u16, config: DataChannelConfig) -> Result<()> {
        let open_msg = DataChannelOpen {
            channel_type: if config.ordered {
                ChannelType::Reliable
            } else {
                ChannelType::ReliableUnordered
            },
            priority: 0,
            reliability_param: 0,
            label: config.label,
            protocol: config.protocol,
        };

        self.association
            .send(stream_id, ppid::DCEP, open_msg.to_bytes())?;
        Ok(())
    }

    /// Flush any DATA_CHANNEL_OPEN messages queued while the association
    /// was not yet established. A no-op unless both the queue is non-empty
    /// and the association has since reached ESTABLISHED.
    fn flush_pending_opens(&mut self) {
        if self.pending_opens.is_empty() || !self.association.is_established() {
            return;
        }

        for (stream_id, config) in std::mem::take(&mut self.pending_opens) {
            if let Err(err) = self.send_open(stream_id, config) {
                self.events.push(DataChannelEvent::Error {
                    message: format!("failed to flush queued open for stream {stream_id}: {err}"),
                });
            }
        }
    }

    /// Send data on a channel
    pub fn send(&mut self, channel_id: u16, data: &[u8]) -> Result<()> {
        let channel = self
            .channels
            .get_mut(&channel_id)
            .ok_or_else(|| StateError(format!("channel {channel_id} not found")))?;

        if !channel.is_open() {
            return Err(StateError(format!("channel {channel_id} not open")).into());
        }

        // RFC 8831 forbids zero-length SCTP user messages: the EMPTY ppids
        // carry a single placeholder byte instead of an actually-empty chunk.
        let (ppid_value, bytes) = if data.is_empty() {
            (ppid::BINARY_EMPTY, vec![0])
        } else {
            (ppid::BINARY, data.to_vec())
        };

        self.association.send(channel_id, ppid_value, bytes)?;
        Ok(())
    }

    /// Send string data on a channel
    pub fn send_string(&mut self, channel_id: u16, data: &str) -> Result<()> {
        let channel = self
            .channels
            .get_mut(&channel_id)
            .ok_or_else(|| StateError(format!("channel {channel_id} not found")))?;

        if !channel.is_open() {
            return Err(StateError(format!("channel {channel_id} not open")).into());
        }

        let (ppid_value, bytes) = if data.is_empty() {
            (ppid::STRING_EMPTY, vec![0])
        } else {
            (ppid::STRING, data.as_bytes().to_vec())
        };

        self.association.send(channel_id, ppid_value, bytes)?;
        Ok(())
    }

    /// Process incoming SCTP packet
    pub fn process_packet(&mut self, packet: &SctpPacket) -> Vec<SctpPacket> {
        let responses = self.association.process_packet(packet);

        self.flush_pending_opens();

        while let Some((stream_id, ppid_value, data)) = self.association.recv() {
            self.handle_received_data(stream_id, ppid_value, data);
        }

        responses
    }

    /// Handle received data
    fn handle_received_data(&mut self, stream_id: u16, ppid_value: u32, data: Vec<u8>) {
        match ppid_value {
            ppid::DCEP => self.handle_dcep_message(stream_id, &data),
            ppid::STRING => self.handle_user_data(stream_id, data, DataKind::Text),
            ppid::STRING_EMPTY => self.handle_user_data(stream_id, Vec::new(), DataKind::Text),
            ppid::BINARY => self.handle_user_data(stream_id, data, DataKind::Binary),
            ppid::BINARY_EMPTY => self.handle_user_data(stream_id, Vec::new(), DataKind::Binary),
            _ => {
                self.events.push(DataChannelEvent::Error {
                    message: format!("unknown PPID: {ppid_value}"),
                });
            }
        }
    }

    /// Handle DCEP message
    fn handle_dcep_message(&mut self, stream_id: u16, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        match data[0] {
            0x03 => {
                if let Ok(open) = DataChannelOpen::from_bytes(data) {
                    self.handle_channel_open(stream_id, open);
                }
            }
            0x02 => {
                self.handle_channel_ack(stream_id);
            }
            _ => {}
        }
    }

    /// Handle DATA_CHANNEL_OPEN from remote. A remote-opened stream must use
    /// the parity we did NOT seed ourselves with, else it collides with our
    /// own allocator's future IDs.
    fn handle_channel_open(&mut self, stream_id: u16, open: DataChannelOpen) {
        if stream_id % 2 == self.local_parity {
            self.events.push(DataChannelEvent::Error {
                message: ProtocolError::WrongParity(stream_id).to_string(),
            });
            return;
        }

        let config = DataChannelConfig {
            label: open.label.clone(),
            ordered: open.channel_type.is_ordered(),
            max_retransmits: None,
            max_packet_lifetime: None,
            negotiated: false,
            id: Some(stream_id),
            protocol: open.protocol,
        };

        let mut channel = DataChannel::new(stream_id, config);
        channel.on_open();

        self.channels.insert(stream_id, channel);

        let ack = DataChannelAck;
        let _ = self.association.send(stream_id, ppid::DCEP, ack.to_bytes());

        self.events.push(DataChannelEvent::ChannelOpened {
            id: stream_id,
            label: open.label,
        });
    }

    /// Handle DATA_CHANNEL_ACK from remote. This only marks a locally
    /// initiated channel open; the `datachannel` event fires for
    /// remote-initiated opens only, not on our own ACK receipt.
    fn handle_channel_ack(&mut self, stream_id: u16) {
        if let Some(channel) = self.channels.get_mut(&stream_id) {
            channel.on_open();
        }
    }

    /// Handle user data. `data` has already had the single placeholder byte
    /// of an EMPTY ppid stripped by the caller.
    fn handle_user_data(&mut self, stream_id: u16, data: Vec<u8>, kind: DataKind) {
        if let Some(channel) = self.channels.get_mut(&stream_id) {
            channel.on_data(data.clone());

            let message = match kind {
                DataKind::Text => {
                    DataChannelMessage::Text(String::from_utf8_lossy(&data).into_owned())
                }
                DataKind::Binary => DataChannelMessage::Binary(data),
            };

            self.events.push(DataChannelEvent::DataReceived {
                id: stream_id,
                message,
            });
        }
    }

    /// Poll for events
    pub fn poll_event(&mut self) -> Option<DataChannelEvent> {
        if self.events.is_empty() {
            None
        } else {
            Some(self.events.remove(0))
        }
    }

    /// Get all pending events
    pub fn drain_events(&mut self) -> Vec<DataChannelEvent> {
        std::mem::take(&mut self.events)
    }

    /// Get channel by ID
    pub fn get_channel(&self, id: u16) -> Option<&DataChannel> {
        self.channels.get(&id)
    }

    /// Get mutable channel by ID
    pub fn get_channel_mut(&mut self, id: u16) -> Option<&mut DataChannel> {
        self.channels.get_mut(&id)
    }

    /// Get packet to send (if any)
    pub fn poll_send(&mut self) -> Option<SctpPacket> {
        self.association.poll_send()
    }

    /// Current association state.
    pub fn association_state(&self) -> crate::sctp::AssociationState {
        self.association.state()
    }

    /// Begin a graceful SHUTDOWN; returns the SHUTDOWN chunk to send.
    pub fn shutdown_association(&mut self) -> Option<SctpPacket> {
        self.association.shutdown()
    }

    /// Abort the association immediately; returns the ABORT chunk to send.
    pub fn abort_association(&mut self) -> Option<SctpPacket> {
        self.association.abort()
    }

    /// Close a channel
    pub fn close_channel(&mut self, channel_id: u16) -> Result<()> {
        if let Some(channel) = self.channels.get_mut(&channel_id) {
            channel.close();
            self.events
                .push(DataChannelEvent::ChannelClosed { id: channel_id });
            Ok(())
        } else {
            Err(StateError(format!("channel {channel_id} not found")).into())
        }
    }

    /// Allocate next stream ID
    fn allocate_stream_id(&mut self) -> u16 {
        let id = self.next_stream_id;
        self.next_stream_id += 2;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sctp::AssociationConfig;

    #[test]
    fn test_manager_creation() {
        let config = AssociationConfig::default();
        let assoc = SctpAssociation::new(config);
        let manager = DataChannelManager::new(assoc, true);

        assert!(!manager.is_established());
    }

    #[test]
    fn test_stream_id_allocation_client() {
        let config = AssociationConfig::default();
        let assoc = SctpAssociation::new(config);
        let mut manager = DataChannelManager::new(assoc, true);

        // Client seeds odd IDs.
        assert_eq!(manager.allocate_stream_id(), 1);
        assert_eq!(manager.allocate_stream_id(), 3);
        assert_eq!(manager.allocate_stream_id(), 5);
    }

    #[test]
    fn test_stream_id_allocation_server() {
        let config = AssociationConfig {
            is_server: true,
            ..AssociationConfig::default()
        };
        let assoc = SctpAssociation::new(config);
        let mut manager = DataChannelManager::new(assoc, false);

        // Server seeds even IDs.
        assert_eq!(manager.allocate_stream_id(), 0);
        assert_eq!(manager.allocate_stream_id(), 2);
    }

    #[test]
    fn test_remote_open_with_matching_parity_is_rejected() {
        let config = AssociationConfig::default();
        let assoc = SctpAssociation::new(config);
        let mut manager = DataChannelManager::new(assoc, true); // local_parity = 1 (odd)

        let open = DataChannelOpen {
            channel_type: ChannelType::Reliable,
            priority: 0,
            reliability_param: 0,
            label: "bad".to_string(),
            protocol: String::new(),
        };
        // Stream 3 is odd, same as our own allocator's parity — must be rejected.
        manager.handle_channel_open(3, open);

        assert!(manager.get_channel(3).is_none());
        let events = manager.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DataChannelEvent::Error { .. }));
    }

    #[test]
    fn test_remote_open_with_opposite_parity_is_accepted() {
        let config = AssociationConfig::default();
        let assoc = SctpAssociation::new(config);
        let mut manager = DataChannelManager::new(assoc, true); // local_parity = 1 (odd)

        let open = DataChannelOpen {
            channel_type: ChannelType::Reliable,
            priority: 0,
            reliability_param: 0,
            label: "remote".to_string(),
            protocol: String::new(),
        };
        // Stream 0 is even, opposite of our own allocator's parity.
        manager.handle_channel_open(0, open);

        assert!(manager.get_channel(0).unwrap().is_open());
        let events = manager.drain_events();
        assert!(
            events
                .iter()
                .any(|e| matches!(e, DataChannelEvent::ChannelOpened { id: 0, .. }))
        );
    }

    #[test]
    fn test_handle_received_data_distinguishes_text_and_binary() {
        let config = AssociationConfig::default();
        let assoc = SctpAssociation::new(config);
        let mut manager = DataChannelManager::new(assoc, true);
        manager
            .channels
            .insert(1, DataChannel::new(1, DataChannelConfig::reliable("chat")));
        manager.channels.get_mut(&1).unwrap().on_open();

        manager.handle_received_data(1, ppid::STRING, b"hi".to_vec());
        manager.handle_received_data(1, ppid::BINARY, vec![1, 2, 3]);

        let events = manager.drain_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            DataChannelEvent::DataReceived { message: DataChannelMessage::Text(s), .. }
                if s == "hi"
        ));
        assert!(matches!(
            &events[1],
            DataChannelEvent::DataReceived { message: DataChannelMessage::Binary(b), .. }
                if b == &[1, 2, 3]
        ));
    }

    #[test]
    fn test_create_channel_before_established_queues_and_flushes_open() {
        use crate::sctp::SctpChunk;

        let client_assoc = SctpAssociation::new(AssociationConfig {
            is_server: false,
            ..AssociationConfig::default()
        });
        let server_assoc = SctpAssociation::new(AssociationConfig {
            is_server: true,
            ..AssociationConfig::default()
        });
        let mut client = DataChannelManager::new(client_assoc, true);
        let mut server = DataChannelManager::new(server_assoc, false);

        // Opened before the SCTP handshake even starts: must not error, and
        // must not have anything to send yet.
        let stream_id = client
            .create_channel(DataChannelConfig::reliable("chat"))
            .unwrap();
        assert!(client.get_channel(stream_id).is_some());
        assert!(client.poll_send().is_none());

        let init = client.init_association_packet();
        let init_ack_responses = server.process_packet(&init);
        let cookie_echo_responses = client.process_packet(&init_ack_responses[0]);
        let cookie_ack_responses = server.process_packet(&cookie_echo_responses[0]);
        client.process_packet(&cookie_ack_responses[0]);

        assert!(client.is_established());

        let flushed = client
            .poll_send()
            .expect("queued open must flush once established");
        match &flushed.chunks[0] {
            SctpChunk::Data(data) => {
                assert_eq!(data.stream_id, stream_id);
                assert_eq!(data.ppid, ppid::DCEP);
            }
            other => panic!("expected a DCEP Data chunk, got {other:?}"),
        }
    }

    #[test]
    fn test_handle_received_data_empty_variants_strip_placeholder() {
        let config = AssociationConfig::default();
        let assoc = SctpAssociation::new(config);
        let mut manager = DataChannelManager::new(assoc, true);
        manager
            .channels
            .insert(1, DataChannel::new(1, DataChannelConfig::reliable("chat")));
        manager.channels.get_mut(&1).unwrap().on_open();

        // Empty variants still arrive with a single placeholder byte.
        manager.handle_received_data(1, ppid::STRING_EMPTY, vec![0]);
        manager.handle_received_data(1, ppid::BINARY_EMPTY, vec![0]);

        let events = manager.drain_events();
        assert!(matches!(
            &events[0],
            DataChannelEvent::DataReceived { message: DataChannelMessage::Text(s), .. }
                if s.is_empty()
        ));
        assert!(matches!(
            &events[1],
            DataChannelEvent::DataReceived { message: DataChannelMessage::Binary(b), .. }
                if b.is_empty()
        ));
    }
}
