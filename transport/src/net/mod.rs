//! Transport module - UDP socket plumbing
//!
//! Everything above this module (DTLS demux, SCTP) treats the network as an
//! opaque datagram source; this is the one place that touches a real socket.

pub mod udp;

pub use udp::UdpTransport;
