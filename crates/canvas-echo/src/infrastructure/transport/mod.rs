//! Transport implementations.
//!
//! - [`echo::EchoTransport`] – an in-process echo-test server.  It answers
//!   the offer, loops the outbound media back as remote tracks and confirms
//!   layer switches, so the whole publisher runs without a media server.
//! - [`mock::RecordingTransport`] – records every call for tests.

pub mod echo;
pub mod mock;
