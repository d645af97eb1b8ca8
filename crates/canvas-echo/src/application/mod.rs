//! Application layer for the canvas echo publisher.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure state and painting rules in `canvas_core`) and the infrastructure
//! (camera, files, transport, terminal).
//!
//! Code in this layer:
//!
//! - **Orchestrates** domain objects to fulfil a goal (e.g., "paint a frame
//!   every 66 ms until the camera stops").
//! - **Depends on abstractions** (the [`signaling::Transport`] and
//!   [`view::SessionView`] traits, the capture traits) rather than concrete
//!   implementations, so every piece can be driven from a test.
//!
//! # Sub-modules
//!
//! - **`frame_timer`** – A relative repeating timer: the next deadline is
//!   always one period after the previous tick finished.
//!
//! - **`compositor`** – The fixed-cadence draw loop that turns the camera
//!   frame, the watermark and the caption into the outbound video.
//!
//! - **`layer_coordinator`** – Issues layer switch requests and reconciles
//!   the layer controls with the confirmations the remote side sends.
//!
//! - **`session`** – The single event loop that owns all of the above and
//!   consumes transport events and user commands one at a time.
//!
//! - **`signaling`** / **`view`** – The outbound ports: the transport that
//!   carries the session, and the surface that shows it to the user.

pub mod compositor;
pub mod frame_timer;
pub mod layer_coordinator;
pub mod session;
pub mod signaling;
pub mod view;
