//! Content player collaborator interface
//!
//! The primary content engine is an external resource behind this trait. The
//! coordinator owns exactly one instance per session, issues fire-and-forget
//! commands against it, and observes outcomes through the tagged
//! [`ContentEvent`] stream delivered via an [`EventSink`].

use crate::{coordinator::EventSink, types::ContentSource, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Abstract handle to the content playback engine.
///
/// Commands must not block: failures surface later as [`ContentEvent::Failed`]
/// rather than as return values. `prepare` is the exception, since the session
/// cannot initialize without the content asset.
#[async_trait]
pub trait ContentPlayer: Send + Sync {
    /// Load the content asset and begin background buffering. Does not
    /// auto-play. Lifecycle events flow through `events` from here on.
    async fn prepare(&self, source: &ContentSource, events: EventSink) -> Result<()>;

    /// Resume or start playback
    async fn play(&self);

    /// Pause playback
    async fn pause(&self);

    /// Move the playhead to `position` seconds
    async fn seek(&self, position: f64);

    /// Apply the session-wide mute flag
    async fn set_muted(&self, muted: bool);

    /// Stop playback and release the underlying engine
    async fn stop(&self);
}

/// Lifecycle events emitted by the content playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ContentEvent {
    /// The asset is prepared and can start playing
    Ready { duration: Option<f64> },

    /// Playback is running
    Playing,

    /// Playback is paused
    Paused,

    /// Playback stalled waiting for data
    Buffering,

    /// The asset played to its end
    Completed,

    /// The engine gave up on the asset
    Failed { message: String },

    /// Periodic playhead sample
    TimeUpdate {
        position: f64,
        duration: Option<f64>,
    },
}
