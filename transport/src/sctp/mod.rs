//! SCTP (Stream Control Transmission Protocol) implementation for WebRTC data channels
//!
//! This module provides a minimal SCTP implementation suitable for WebRTC data channels.
//! SCTP runs over DTLS and provides reliable, ordered delivery with multiplexing.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────┐
//! │     DataChannel API         │
//! ├─────────────────────────────┤
//! │     SCTP Association        │  ← This module
//! ├─────────────────────────────┤
//! │     DTLS Transport          │
//! └─────────────────────────────┘
//! ```
//!
//! ## Implemented Features
//!
//! - INIT/INIT-ACK/COOKIE-ECHO/COOKIE-ACK handshake with stateless cookies
//! - DATA chunks with fragmentation and per-stream reassembly
//! - SACK (duplicates only, no gap-block tracking or retransmission)
//! - DCEP (Data Channel Establishment Protocol)
//! - SHUTDOWN sequence, HEARTBEAT echo, ABORT
//!
//! ## Not Implemented
//!
//! - Multi-homing
//! - Path MTU discovery
//! - Partial reliability extensions
//! - Retransmission / congestion control

pub mod association;
pub mod chunk;
pub mod dcep;
pub mod packet;
pub mod reassembler;

pub use association::{AssociationConfig, AssociationState, Clock, SctpAssociation, SystemClock};
pub use chunk::{DataChunk, SctpChunk, SctpChunkType, ppid};
pub use dcep::{ChannelType, DataChannelAck, DataChannelOpen};
pub use packet::SctpPacket;
pub use reassembler::Reassembler;
