//! Recording transport for unit testing.
//!
//! Records every call so that tests can assert on what the session sent,
//! without a peer connection or an echo server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use canvas_core::{Jsep, PluginRequest, TransportEvent};
use tokio::sync::mpsc::UnboundedSender;

use crate::application::compositor::OutboundStream;
use crate::application::signaling::{LinkStats, Transport, TransportError};

/// A [`Transport`] that records calls and can be told to fail.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<PluginRequest>>,
    sent_with_jsep: Mutex<Vec<(PluginRequest, Jsep)>>,
    remote_jseps: Mutex<Vec<Jsep>>,
    offers: AtomicUsize,
    destroyed: AtomicBool,
    stats: Mutex<Option<LinkStats>>,
    should_fail: bool,
    events: Option<UnboundedSender<TransportEvent>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every operation fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// A transport that reports `Cleanup` on `events` when destroyed.
    pub fn with_events(events: UnboundedSender<TransportEvent>) -> Self {
        Self {
            events: Some(events),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<PluginRequest> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn sent_with_jsep(&self) -> Vec<(PluginRequest, Jsep)> {
        self.sent_with_jsep
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn remote_jseps(&self) -> Vec<Jsep> {
        self.remote_jseps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn offers_created(&self) -> usize {
        self.offers.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Sets what [`Transport::stats`] returns.
    pub fn set_stats(&self, stats: Option<LinkStats>) {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = stats;
    }

    fn check(&self) -> Result<(), TransportError> {
        if self.should_fail {
            Err(TransportError::Send("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, body: PluginRequest) -> Result<(), TransportError> {
        self.check()?;
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(body);
        Ok(())
    }

    async fn create_offer(&self, _stream: &OutboundStream) -> Result<Jsep, TransportError> {
        if self.should_fail {
            return Err(TransportError::Negotiation("injected failure".to_string()));
        }
        let n = self.offers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Jsep::offer(format!("v=0 recording-offer-{n}")))
    }

    async fn send_with_jsep(&self, body: PluginRequest, jsep: Jsep) -> Result<(), TransportError> {
        self.check()?;
        self.sent_with_jsep
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((body, jsep));
        Ok(())
    }

    async fn handle_remote_jsep(&self, jsep: Jsep) -> Result<(), TransportError> {
        self.check()?;
        self.remote_jseps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(jsep);
        Ok(())
    }

    async fn stats(&self, _mid: &str) -> Option<LinkStats> {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        self.destroyed.store(true, Ordering::SeqCst);
        if let Some(events) = &self.events {
            let _ = events.send(TransportEvent::Cleanup);
        }
        Ok(())
    }
}
