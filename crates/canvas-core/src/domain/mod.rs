//! Domain entities for the canvas echo publisher.
//!
//! This module contains pure state and painting logic with no infrastructure
//! dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code:
//!
//! - Contains the core rules of the application.
//! - Has **no** imports from camera APIs, network libraries, async runtimes or
//!   UI frameworks.
//! - Can be compiled and tested on any platform without any external setup.
//!
//! Here that means: how a caption is validated, where the watermark lands,
//! what a composited frame looks like, which layer the viewer is *really*
//! watching, and how many remote video tracks are present.

/// Caption state and the CSS color / font parsing it relies on.
pub mod caption;

/// Layer switch buttons and their pending/active styling.
pub mod controls;

/// Spatial/temporal layer selection state machine.
pub mod layers;

/// Media handles shared by every layer: frames, tracks, streams, geometry.
pub mod media;

/// Watermark placement and the pre-scaled overlay asset.
pub mod overlay;

/// The composited surface the draw loop paints on.
pub mod surface;

/// Caption rasterisation with the bundled font.
pub mod text;

/// Registry of tracks received back from the remote side.
pub mod tracks;
