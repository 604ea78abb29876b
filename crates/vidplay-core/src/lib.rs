//! Vidplay Core - Adaptive-Quality Playback Library
//!
//! This crate provides the core functionality for on-demand video playback:
//! - Rendition resolution against the video registry
//! - Default rendition selection
//! - Mid-playback quality switching that preserves position and play state
//! - Video registry client (list, details, upload, delete)
//! - Playback event emission
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Vidplay Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  Rendition   │  │   Delivery   │  │    Media     │           │
//! │  │  Resolver    │  │    Origin    │  │   Element    │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │  Playback   │                              │
//! │                    │ Controller  │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │  Video API   │  │    State    │  │   Playback   │            │
//! │  │   Client     │  │   (watch)   │  │    Events    │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod controller;
pub mod delivery;
pub mod error;
pub mod events;
pub mod format;
pub mod media;
pub mod resolver;
pub mod types;

pub use api::VideoApiClient;
pub use config::{ClientConfig, ControllerConfig};
pub use controller::PlaybackController;
pub use delivery::DeliveryOrigin;
pub use error::{Error, Result};
pub use events::{PlaybackEvent, PlaybackEventRecord};
pub use media::{HeadlessMediaElement, MediaElement};
pub use resolver::RenditionResolver;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the playback library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Vidplay Core initialized");
}
