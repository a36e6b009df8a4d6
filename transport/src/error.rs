//! Error taxonomy for the transport module.
//!
//! `TransportError` aggregates the sub-kinds from every layer (codec,
//! association, DTLS session) the way the rest of this crate's errors are
//! meant to be handled: consumed locally at the ingress stage, or surfaced
//! as a terminal state transition.

use std::fmt;

pub type Result<T> = std::result::Result<T, TransportError>;

/// Malformed wire data. Dropped silently at the network edge; surfaced to
/// codec unit tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    TruncatedPacket,
    InvalidChecksum,
    BadParameterLength,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::TruncatedPacket => write!(f, "truncated packet"),
            DecodeError::InvalidChecksum => write!(f, "invalid checksum"),
            DecodeError::BadParameterLength => write!(f, "bad parameter length"),
        }
    }
}

/// Structurally valid but semantically wrong: tag mismatch, INIT mixed with
/// other chunks, DCEP OPEN on an already-registered or wrong-parity stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    VerificationTagMismatch,
    InitNotAlone,
    ChannelAlreadyRegistered(u16),
    WrongParity(u16),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::VerificationTagMismatch => write!(f, "verification tag mismatch"),
            ProtocolError::InitNotAlone => write!(f, "INIT chunk not alone in packet"),
            ProtocolError::ChannelAlreadyRegistered(id) => {
                write!(f, "stream {id} already has a data channel")
            }
            ProtocolError::WrongParity(id) => {
                write!(f, "stream {id} has the wrong parity for a remote-opened channel")
            }
        }
    }
}

/// Cookie, fingerprint, or SRTP authentication failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    CookieMacMismatch,
    CookieStale,
    FingerprintMismatch { expected: String, actual: String },
    SrtpAuthTagMismatch,
    SrtpReplay,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::CookieMacMismatch => write!(f, "cookie HMAC mismatch"),
            AuthError::CookieStale => write!(f, "stale cookie"),
            AuthError::FingerprintMismatch { expected, actual } => write!(
                f,
                "peer fingerprint mismatch: expected {expected}, got {actual}"
            ),
            AuthError::SrtpAuthTagMismatch => write!(f, "SRTP authentication tag mismatch"),
            AuthError::SrtpReplay => write!(f, "SRTP replayed packet rejected"),
        }
    }
}

/// Any DTLS engine error other than WANT_READ encountered during handshake.
#[derive(Debug)]
pub struct HandshakeError(pub String);

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DTLS handshake failed: {}", self.0)
    }
}

/// Construction against a session already in CLOSED state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateError(pub String);

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid state: {}", self.0)
    }
}

/// Top-level error type for the transport crate.
#[derive(Debug)]
pub enum TransportError {
    Decode(DecodeError),
    Protocol(ProtocolError),
    Auth(AuthError),
    Handshake(HandshakeError),
    /// Distinguished sentinel raised by receive primitives when the
    /// session's `closed` signal fires. Unwinds the run loop into CLOSED.
    ConnectionClosed,
    State(StateError),
    Io(std::io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Decode(e) => write!(f, "decode error: {e}"),
            TransportError::Protocol(e) => write!(f, "protocol error: {e}"),
            TransportError::Auth(e) => write!(f, "auth error: {e}"),
            TransportError::Handshake(e) => write!(f, "{e}"),
            TransportError::ConnectionClosed => write!(f, "connection closed"),
            TransportError::State(e) => write!(f, "{e}"),
            TransportError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<DecodeError> for TransportError {
    fn from(e: DecodeError) -> Self {
        TransportError::Decode(e)
    }
}

impl From<ProtocolError> for TransportError {
    fn from(e: ProtocolError) -> Self {
        TransportError::Protocol(e)
    }
}

impl From<AuthError> for TransportError {
    fn from(e: AuthError) -> Self {
        TransportError::Auth(e)
    }
}

impl From<HandshakeError> for TransportError {
    fn from(e: HandshakeError) -> Self {
        TransportError::Handshake(e)
    }
}

impl From<StateError> for TransportError {
    fn from(e: StateError) -> Self {
        TransportError::State(e)
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_decode() {
        let err = TransportError::Decode(DecodeError::InvalidChecksum);
        assert_eq!(err.to_string(), "decode error: invalid checksum");
    }

    #[test]
    fn test_error_display_auth() {
        let err = TransportError::Auth(AuthError::CookieStale);
        assert_eq!(err.to_string(), "auth error: stale cookie");
    }

    #[test]
    fn test_error_display_protocol() {
        let err = TransportError::Protocol(ProtocolError::WrongParity(4));
        assert!(err.to_string().contains("wrong parity"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::WouldBlock, "would block");
        let err: TransportError = io_err.into();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[test]
    fn test_error_is_error_trait() {
        let err = TransportError::ConnectionClosed;
        let _: &dyn std::error::Error = &err;
    }
}
