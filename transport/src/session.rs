//! Top-level glue binding an established [`DtlsSession`] to an
//! [`SctpAssociation`]/[`DataChannelManager`] pair, driving SCTP bytes
//! through the DTLS application-data channel and surfacing data-channel
//! lifecycle events to the caller.

use crate::datachannel::{DataChannelConfig, DataChannelEvent, DataChannelManager};
use crate::error::Result;
use crate::sctp::{AssociationConfig, AssociationState, SctpAssociation, SctpPacket};
use crate::security::DtlsSession;

/// Drives one SCTP association, and the data channels multiplexed over it,
/// across an already-connected DTLS session.
pub struct SctpTransport {
    session: DtlsSession,
    manager: DataChannelManager,
}

impl SctpTransport {
    /// `session` must already be past `connect()`. `local_port` is the SCTP
    /// port this endpoint advertises in outgoing packets; it carries no
    /// socket meaning of its own since everything travels inside one DTLS
    /// session.
    pub fn new(session: DtlsSession, local_port: u16) -> Self {
        let is_client = !session.is_server();
        let config = AssociationConfig {
            local_port,
            is_server: session.is_server(),
            ..AssociationConfig::default()
        };
        let association = SctpAssociation::new(config);
        let manager = DataChannelManager::new(association, is_client);

        SctpTransport { session, manager }
    }

    /// Send the SCTP INIT that begins the four-way handshake.
    pub fn start(&mut self, remote_port: u16) -> Result<()> {
        let mut packet = self.manager.init_association_packet();
        packet.destination_port = remote_port;
        self.session.send_data(&packet.to_bytes())
    }

    /// Begin a graceful shutdown and flush the SHUTDOWN chunk.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(packet) = self.manager.shutdown_association() {
            self.session.send_data(&packet.to_bytes())?;
        }
        Ok(())
    }

    /// Abort the association immediately and flush the ABORT chunk.
    pub fn abort(&mut self) -> Result<()> {
        if let Some(packet) = self.manager.abort_association() {
            self.session.send_data(&packet.to_bytes())?;
        }
        Ok(())
    }

    pub fn state(&self) -> AssociationState {
        self.manager.association_state()
    }

    /// Open a new outbound data channel, returning its stream ID.
    pub fn open_channel(&mut self, config: DataChannelConfig) -> Result<u16> {
        let id = self.manager.create_channel(config)?;
        self.flush_outbound()?;
        Ok(id)
    }

    /// Send binary application data on an open channel.
    pub fn send(&mut self, stream_id: u16, data: &[u8]) -> Result<()> {
        self.manager.send(stream_id, data)?;
        self.flush_outbound()
    }

    /// Send text application data on an open channel.
    pub fn send_string(&mut self, stream_id: u16, data: &str) -> Result<()> {
        self.manager.send_string(stream_id, data)?;
        self.flush_outbound()
    }

    /// Pump one round: pull decrypted SCTP bytes out of the DTLS session,
    /// feed them through the association, flush whatever that produces, and
    /// return any lifecycle/data events accumulated along the way.
    pub fn poll(&mut self) -> Result<Vec<DataChannelEvent>> {
        self.session.poll()?;

        for bytes in self.session.recv_data() {
            let Ok(packet) = SctpPacket::from_bytes(&bytes) else {
                continue;
            };
            let responses = self.manager.process_packet(&packet);
            for response in responses {
                self.session.send_data(&response.to_bytes())?;
            }
        }

        self.flush_outbound()?;
        Ok(self.manager.drain_events())
    }

    fn flush_outbound(&mut self) -> Result<()> {
        while let Some(packet) = self.manager.poll_send() {
            self.session.send_data(&packet.to_bytes())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sctp::SctpAssociation;

    #[test]
    fn test_start_sets_destination_port() {
        // init_association_packet alone is exercised through DataChannelManager
        // tests; here we only check the destination-port override plumbing.
        let config = AssociationConfig::default();
        let assoc = SctpAssociation::new(config);
        let mut manager = DataChannelManager::new(assoc, true);
        let mut packet = manager.init_association_packet();
        packet.destination_port = 4242;
        assert_eq!(packet.destination_port, 4242);
    }
}
