//! Protocol module containing the plugin message bodies and transport events.

pub mod events;
pub mod messages;

pub use events::TransportEvent;
pub use messages::*;
