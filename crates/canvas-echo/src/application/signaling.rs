//! The transport port: how the session talks to the echo-test plugin.
//!
//! The wire protocol behind this trait is not this crate's concern.  What the
//! session needs is small: send a message body, negotiate once with the
//! outbound stream, forward the remote session description, read link
//! statistics and tear everything down.  Whatever the transport observes
//! comes back asynchronously as [`canvas_core::TransportEvent`]s on a channel
//! created alongside it.

use async_trait::async_trait;
use canvas_core::{Jsep, PluginRequest, Resolution};
use thiserror::Error;

use super::compositor::OutboundStream;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to send message: {0}")]
    Send(String),
    #[error("negotiation failed: {0}")]
    Negotiation(String),
    #[error("transport is closed")]
    Closed,
}

/// Link statistics of one remote track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStats {
    /// Current receive bitrate in bits per second.
    pub bitrate_bps: u64,
    /// Frame size of the remote video; zero until the first frame.
    pub resolution: Resolution,
}

impl LinkStats {
    /// Bitrate the way the stats display shows it, e.g. `"512 kbits/sec"`.
    pub fn bitrate_text(&self) -> String {
        format!("{} kbits/sec", self.bitrate_bps / 1000)
    }
}

/// Session transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a message body without a session description.
    async fn send(&self, body: PluginRequest) -> Result<(), TransportError>;

    /// Creates an offer for the outbound stream's audio and video tracks,
    /// both send-receive.
    async fn create_offer(&self, stream: &OutboundStream) -> Result<Jsep, TransportError>;

    /// Sends a message body together with a local session description.
    async fn send_with_jsep(&self, body: PluginRequest, jsep: Jsep) -> Result<(), TransportError>;

    /// Applies a session description received from the remote side.
    async fn handle_remote_jsep(&self, jsep: Jsep) -> Result<(), TransportError>;

    /// Link statistics for the remote track `mid`, `None` when unknown.
    async fn stats(&self, mid: &str) -> Option<LinkStats>;

    /// Tears the session down.  A `Cleanup` event follows.
    async fn destroy(&self) -> Result<(), TransportError>;
}
