//! Security module for WebRTC
//!
//! Provides DTLS and SRTP functionality for secure media transmission

pub mod dtls;
pub mod srtp;

pub use dtls::{DtlsContext, DtlsSession, SessionState, SrtpKeys};
pub use srtp::SrtpContext;
