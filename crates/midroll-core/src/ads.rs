//! Ad engine collaborator interface
//!
//! The ad-decisioning service and the ad playback engine sit behind two
//! traits: [`AdEngine`] resolves an [`AdRequest`](crate::types::AdRequest)
//! into a loaded break, and [`AdBreakManager`] controls playback of that
//! break. Everything the engine reports back arrives as a tagged [`AdEvent`]
//! through the session's [`EventSink`](crate::coordinator::EventSink),
//! including the pause/resume notifications the engine uses to tell the
//! coordinator when it wants the screen.

use crate::{
    coordinator::EventSink,
    types::{AdMetadata, AdRequest},
    Result,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Abstract handle to the ad-decision service
#[async_trait]
pub trait AdEngine: Send + Sync {
    /// Resolve `request` into a playable ad break.
    ///
    /// Returns [`Error::AdRequestFailed`](crate::Error::AdRequestFailed) when
    /// the service has no fill; the coordinator treats that as a signal to
    /// fall back to content, never as a session failure. Events for the
    /// returned break flow through `events`.
    async fn request_ads(
        &self,
        request: &AdRequest,
        events: EventSink,
    ) -> Result<Box<dyn AdBreakManager>>;
}

/// Control surface over one loaded ad break.
///
/// All commands are fire-and-forget; outcomes arrive as [`AdEvent`]s. The
/// coordinator never changes mode on a command directly, it waits for the
/// engine event the command provokes.
#[async_trait]
pub trait AdBreakManager: Send + Sync {
    /// Begin playing the break
    async fn start(&self);

    /// Pause the current ad
    async fn pause(&self);

    /// Resume the current ad
    async fn resume(&self);

    /// Ask the engine to skip the current ad
    async fn skip(&self);

    /// Set the break volume, 0.0 (muted) to 1.0
    async fn set_volume(&self, volume: f64);

    /// Release all engine resources held by this break
    async fn release(&self);
}

/// Events emitted by the ad engine for a loaded break
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AdEvent {
    /// The break finished loading and can start
    Loaded,

    /// An individual ad began playing
    Started { ad: AdMetadata },

    /// The current ad paused
    Paused,

    /// The current ad resumed
    Resumed,

    /// The current ad played to its end; more ads may follow in the pod
    Completed,

    /// Every ad in the pod has finished
    PodCompleted,

    /// The current ad was skipped; the break is over
    Skipped,

    /// Periodic playhead sample for the current ad
    TimeUpdate { position: f64, duration: f64 },

    /// The engine gave up on the break
    Error { message: String },

    /// The engine wants the screen: pause content now
    ContentPauseRequested,

    /// The engine is done with the screen: resume content now
    ContentResumeRequested,
}
