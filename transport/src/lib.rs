//! WebRTC data-channel transport core.
//!
//! Two tightly-coupled subsystems live here: a DTLS/SRTP session (handshake,
//! keying-material export, demultiplexer, per-direction SRTP protect/unprotect)
//! and an SCTP association (packet codec, chunk state machine, cookie-based
//! handshake, ordered reassembly, and DCEP framing for data channels). SDP
//! parsing, ICE, RTP codecs, and the peer-connection orchestrator are external
//! collaborators reached only through the types exported here.

pub mod datachannel;
pub mod net;
pub mod sctp;
pub mod security;
pub mod session;

pub mod error;
pub mod utils;

pub use datachannel::{
    DataChannel, DataChannelConfig, DataChannelEvent, DataChannelManager, DataChannelMessage,
};
pub use error::{Result, TransportError};
pub use net::UdpTransport;
pub use sctp::{AssociationConfig, SctpAssociation, SctpPacket};
pub use security::{DtlsContext, DtlsSession, SessionState, SrtpContext, SrtpKeys};
pub use session::SctpTransport;
pub use utils::find_available_port;
