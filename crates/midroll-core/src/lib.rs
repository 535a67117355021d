//! Midroll Core - Dual-Player Playback Coordination
//!
//! This crate provides the core functionality for ad-interleaved playback:
//! - Mode arbitration between primary content and ad breaks
//! - Ad pod progress tracking with skip gating
//! - Single-writer session state with snapshot broadcasting
//! - Event intake adapters for the two player collaborators
//! - Simulated collaborators for tests and headless runs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Midroll Core                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐                          ┌──────────────┐     │
//! │  │   Content    │                          │  Ad Engine   │     │
//! │  │   Player     │                          │  + Break     │     │
//! │  └──────┬───────┘                          └──────┬───────┘     │
//! │         │ events / commands        events / commands │          │
//! │         └──────────────┐          ┌──────────────────┘          │
//! │                 ┌──────┴──────────┴──────┐                      │
//! │                 │  Playback Coordinator  │                      │
//! │                 │  (mode state machine)  │                      │
//! │                 └───────────┬────────────┘                      │
//! │                             │                                   │
//! │                  ┌──────────┴──────────┐                        │
//! │                  │  PlaybackSnapshot   │                        │
//! │                  │  (watch broadcast)  │                        │
//! │                  └─────────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The two players are independently owned resources with a single arbiter:
//! exactly one of `Idle`, `Content`, or `Advertisement` is the active mode at
//! any time, and every legal transition between them runs through the
//! coordinator.

pub mod ads;
pub mod coordinator;
pub mod error;
pub mod player;
pub mod sim;
pub mod types;

pub use ads::{AdBreakManager, AdEngine, AdEvent};
pub use coordinator::{EventSink, PlaybackCoordinator, SessionEvent};
pub use error::{Error, PlaybackFault, Result};
pub use player::{ContentEvent, ContentPlayer};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the coordinator library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Midroll Core initialized");
}
