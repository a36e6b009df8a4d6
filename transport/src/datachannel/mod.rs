//! Data Channel abstraction over SCTP
//!
//! Provides a high-level API for WebRTC data channels, built on top of SCTP.
//!
//! ## Usage
//!
//! ```ignore
//! let mut manager = DataChannelManager::new(sctp_association, is_client);
//! let channel_id = manager.create_channel(DataChannelConfig::reliable("chat"))?;
//! manager.send(channel_id, &data)?;
//! ```

mod channel;
mod manager;

pub use channel::{DataChannel, DataChannelConfig, DataChannelState};
pub use manager::{DataChannelEvent, DataChannelManager, DataChannelMessage};
