//! View implementations.
//!
//! - [`console::ConsoleView`] – presents the session as structured log lines.
//! - [`recording::RecordingView`] – keeps every call for assertions in tests.

pub mod console;
pub mod recording;

pub use console::ConsoleView;
pub use recording::{RecordingView, ViewCall};
