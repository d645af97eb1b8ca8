//! Infrastructure layer for the canvas echo publisher.
//!
//! Contains the adapters behind the application ports: capture devices,
//! overlay asset loading, the loopback echo transport, console output and
//! input, and TOML configuration storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `canvas_core`, but MUST NOT be imported by the domain layer.

pub mod assets;
pub mod capture;
pub mod console;
pub mod storage;
pub mod transport;
pub mod view;
