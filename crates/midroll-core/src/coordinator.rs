//! Playback Coordinator - single authority for what is on screen
//!
//! Coordinates:
//! - Two independently owned players (content and ads)
//! - Mode arbitration between content playback and ad breaks
//! - Ad pod progress tracking
//! - Snapshot publication for the presentation layer
//!
//! The coordinator never shares a player reference across modes: the content
//! player belongs to `Content` mode, the ad break manager to `Advertisement`
//! mode, and every mode change goes through one arbiter. Collaborator events
//! may originate on arbitrary threads; they are marshaled through an
//! [`EventSink`] onto a single intake task, so all state mutation is
//! single-writer.

use crate::{
    ads::{AdBreakManager, AdEngine, AdEvent},
    error::{Error, PlaybackFault, Result},
    player::{ContentEvent, ContentPlayer},
    types::*,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, instrument, warn};

/// Tagged union of every collaborator event that can reach the intake task
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Content(ContentEvent),
    Ad(AdEvent),
}

/// Handle collaborators use to deliver events into a session.
///
/// Cloneable and callable from any thread. Delivery is non-blocking; events
/// are drained by the session's intake task, the only writer of session
/// state.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    /// Deliver a content player lifecycle event
    pub fn content(&self, event: ContentEvent) {
        if self.tx.send(SessionEvent::Content(event)).is_err() {
            debug!("content event dropped, session intake is gone");
        }
    }

    /// Deliver an ad engine event
    pub fn ad(&self, event: AdEvent) {
        if self.tx.send(SessionEvent::Ad(event)).is_err() {
            debug!("ad event dropped, session intake is gone");
        }
    }
}

/// Session interior. Guarded by one lock; every mutation republishes the
/// snapshot before the lock is released.
struct SessionInner {
    mode: PlaybackMode,
    content_state: PlayerState,
    ad_state: PlayerState,
    ad_progress: Option<AdProgress>,
    /// Content playhead, retained while an ad break owns the screen
    content_position: f64,
    content_duration: Option<f64>,
    muted: bool,
    last_error: Option<PlaybackFault>,
    initialization: InitializationState,
    /// Loaded ad break, exclusively owned by `Advertisement` mode
    manager: Option<Box<dyn AdBreakManager>>,
    was_playing_on_suspend: bool,
    /// Playhead value at the last snapshot publication, for time throttling
    last_published_time: f64,
    torn_down: bool,
}

impl SessionInner {
    fn new(muted: bool) -> Self {
        Self {
            mode: PlaybackMode::Idle,
            content_state: PlayerState::Idle,
            ad_state: PlayerState::Idle,
            ad_progress: None,
            content_position: 0.0,
            content_duration: None,
            muted,
            last_error: None,
            initialization: InitializationState::NotStarted,
            manager: None,
            was_playing_on_suspend: false,
            last_published_time: 0.0,
            torn_down: false,
        }
    }

    /// Playhead and duration of whichever player owns the current mode
    fn active_timeline(&self) -> (f64, Option<f64>) {
        match self.mode {
            PlaybackMode::Advertisement => (
                self.ad_progress.as_ref().map_or(0.0, |p| p.elapsed),
                self.ad_progress.as_ref().map(|p| p.duration),
            ),
            _ => (self.content_position, self.content_duration),
        }
    }

    fn snapshot(&self) -> PlaybackSnapshot {
        let (current_time, duration) = self.active_timeline();
        PlaybackSnapshot {
            mode: self.mode,
            content_state: self.content_state.clone(),
            ad_state: self.ad_state.clone(),
            ad_progress: self.ad_progress.clone(),
            current_time,
            duration,
            muted: self.muted,
            last_error: self.last_error.clone(),
            initialization: self.initialization,
        }
    }
}

/// Playback coordinator managing a single ad-interleaved session.
///
/// Created per playback session (one video), initialized with a content
/// source and an ad-request descriptor via [`load`](Self::load), torn down
/// with [`teardown`](Self::teardown) when the session ends.
pub struct PlaybackCoordinator {
    /// Unique session ID
    id: SessionId,
    /// Session configuration
    config: CoordinatorConfig,
    /// Content player, exclusively owned by `Content` mode
    content: Arc<dyn ContentPlayer>,
    /// Ad-decision service
    ads: Arc<dyn AdEngine>,
    /// Single-writer session state
    inner: RwLock<SessionInner>,
    /// Snapshot broadcaster
    snapshot_tx: watch::Sender<PlaybackSnapshot>,
    /// Kept so publication never races receiver churn
    snapshot_rx: watch::Receiver<PlaybackSnapshot>,
    /// Intake channel collaborators feed through their sinks
    events_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl PlaybackCoordinator {
    /// Create a new coordinator over the two collaborators.
    ///
    /// Spawns the intake task that marshals collaborator events onto a
    /// single execution context. The task exits when the coordinator is
    /// dropped and every sink clone is gone.
    pub fn new(
        content: Arc<dyn ContentPlayer>,
        ads: Arc<dyn AdEngine>,
        config: CoordinatorConfig,
    ) -> Arc<Self> {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) =
            watch::channel(PlaybackSnapshot::initial(config.start_muted));

        let coordinator = Arc::new(Self {
            id: SessionId::new(),
            inner: RwLock::new(SessionInner::new(config.start_muted)),
            config,
            content,
            ads,
            snapshot_tx,
            snapshot_rx,
            events_tx,
        });

        let weak = Arc::downgrade(&coordinator);
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                let Some(session) = weak.upgrade() else { break };
                session.dispatch(event).await;
            }
        });

        coordinator
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Read the current snapshot
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Subscribe to snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot_tx.subscribe()
    }

    fn sink(&self) -> EventSink {
        EventSink {
            tx: self.events_tx.clone(),
        }
    }

    /// Rebuild and broadcast the snapshot. Called before every lock release
    /// that followed a mutation, so observers never see stale state.
    fn publish(&self, inner: &mut SessionInner) {
        let snapshot = inner.snapshot();
        inner.last_published_time = snapshot.current_time;
        let _ = self.snapshot_tx.send(snapshot);
    }

    /// Publish for a periodic time sample, honoring the configured throttle
    fn publish_time(&self, inner: &mut SessionInner) {
        let (current_time, _) = inner.active_timeline();
        if (current_time - inner.last_published_time).abs() >= self.config.time_update_min_interval
        {
            self.publish(inner);
        }
    }

    /// Initialize the session: prepare content and request the ad break.
    ///
    /// Content is prepared (without auto-play) concurrently with the ad
    /// request. An ad-decision failure is not a session failure: the session
    /// falls back to content playback and still reports `Ready`. A content
    /// preparation failure fails initialization as a whole.
    ///
    /// Returns [`Error::SessionBusy`] if a load is already in flight.
    #[instrument(skip(self, source, ads), fields(session_id = %self.id))]
    pub async fn load(&self, source: ContentSource, ads: AdRequest) -> Result<()> {
        let old_break = {
            let mut guard = self.inner.write().await;
            let inner = &mut *guard;
            if inner.torn_down {
                return Err(Error::SessionClosed);
            }
            if inner.initialization == InitializationState::Loading {
                return Err(Error::SessionBusy);
            }

            inner.initialization = InitializationState::Loading;
            inner.last_error = None;
            inner.mode = PlaybackMode::Idle;
            inner.content_state = PlayerState::Loading;
            inner.ad_state = PlayerState::Idle;
            inner.ad_progress = None;
            inner.content_position = source.start_position.max(0.0);
            inner.content_duration = None;
            self.publish(inner);
            inner.manager.take()
        };
        if let Some(old_break) = old_break {
            old_break.release().await;
        }

        info!(url = %source.url, ad_tag = %ads.tag_url, "Loading session");

        // The busy flag above guards re-entry, so the lock is not held across
        // the collaborator calls and commands stay responsive during a load.
        let (content_result, ad_result) = tokio::join!(
            self.content.prepare(&source, self.sink()),
            self.ads.request_ads(&ads, self.sink()),
        );

        if let Err(cause) = content_result {
            let error = match cause {
                error @ Error::ContentPrepareFailed(_) => error,
                other => Error::ContentPrepareFailed(other.to_string()),
            };
            let mut guard = self.inner.write().await;
            let inner = &mut *guard;
            inner.initialization = InitializationState::Failed;
            inner.content_state = PlayerState::Failed(error.to_string());
            inner.last_error = Some(PlaybackFault::from(&error));
            self.publish(inner);
            warn!(error = %error, "Session initialization failed");
            if let Ok(unused_break) = ad_result {
                unused_break.release().await;
            }
            return Err(error);
        }

        {
            let mut guard = self.inner.write().await;
            let inner = &mut *guard;
            if inner.content_state == PlayerState::Loading {
                inner.content_state = PlayerState::Ready;
            }
            self.content.set_muted(inner.muted).await;

            match ad_result {
                Ok(ad_break) => {
                    ad_break
                        .set_volume(if inner.muted { 0.0 } else { 1.0 })
                        .await;
                    inner.manager = Some(ad_break);
                    self.enter_advertisement(inner).await;
                    if let Some(manager) = &inner.manager {
                        manager.start().await;
                    }
                }
                Err(cause) => {
                    // Deliberate policy: ads are optional, content is not.
                    let error = match cause {
                        error @ Error::AdRequestFailed(_) => error,
                        other => Error::AdRequestFailed(other.to_string()),
                    };
                    warn!(error = %error, "Ad request failed, falling back to content");
                    inner.last_error = Some(PlaybackFault::from(&error));
                    self.enter_content(inner).await;
                }
            }

            inner.initialization = InitializationState::Ready;
            self.publish(inner);
        }

        info!("Session initialized");
        Ok(())
    }

    /// Resume whichever player is active for the current mode.
    ///
    /// A consistent no-op in `Idle` mode; the snapshot is republished either
    /// way.
    #[instrument(skip(self))]
    pub async fn play(&self) {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if inner.torn_down {
            return;
        }
        match inner.mode {
            PlaybackMode::Content => {
                self.content.play().await;
                inner.content_state = PlayerState::Playing;
            }
            PlaybackMode::Advertisement => {
                if let Some(manager) = &inner.manager {
                    manager.resume().await;
                }
                if inner.manager.is_some() {
                    inner.ad_state = PlayerState::Playing;
                }
            }
            PlaybackMode::Idle => {
                debug!("play ignored, no active mode");
            }
        }
        self.publish(inner);
    }

    /// Pause whichever player is active for the current mode
    #[instrument(skip(self))]
    pub async fn pause(&self) {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if inner.torn_down {
            return;
        }
        match inner.mode {
            PlaybackMode::Content => {
                self.content.pause().await;
                if inner.content_state.is_playing() {
                    inner.content_state = PlayerState::Paused;
                }
            }
            PlaybackMode::Advertisement => {
                if let Some(manager) = &inner.manager {
                    manager.pause().await;
                }
                if inner.ad_state.is_playing() {
                    inner.ad_state = PlayerState::Paused;
                }
            }
            PlaybackMode::Idle => {}
        }
        self.publish(inner);
    }

    /// Flip the session-wide mute flag.
    ///
    /// Fans out to both players inside one critical section, so a later mode
    /// switch can never resurface sound unexpectedly.
    #[instrument(skip(self))]
    pub async fn toggle_mute(&self) -> bool {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if inner.torn_down {
            return inner.muted;
        }
        inner.muted = !inner.muted;
        self.content.set_muted(inner.muted).await;
        if let Some(manager) = &inner.manager {
            manager
                .set_volume(if inner.muted { 0.0 } else { 1.0 })
                .await;
        }
        debug!(muted = inner.muted, "Mute toggled");
        self.publish(inner);
        inner.muted
    }

    /// Seek the content player to `position` seconds.
    ///
    /// Only legal while content owns the screen; the position is clamped to
    /// `[0, duration]`. Returns false (leaving the playhead untouched) in any
    /// other mode.
    #[instrument(skip(self))]
    pub async fn seek(&self, position: f64) -> bool {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if inner.torn_down || inner.mode != PlaybackMode::Content {
            debug!(position, mode = %inner.mode, "Seek rejected");
            return false;
        }
        let clamped = match inner.content_duration {
            Some(duration) => position.clamp(0.0, duration),
            None => position.max(0.0),
        };
        self.content.seek(clamped).await;
        inner.content_position = clamped;
        self.publish(inner);
        true
    }

    /// Ask the ad engine to skip the current ad.
    ///
    /// Returns false unless a skippable ad owns the screen. The coordinator
    /// does not switch mode here; it waits for the engine's `Skipped` event
    /// to drive the transition.
    #[instrument(skip(self))]
    pub async fn skip_ad(&self) -> bool {
        let guard = self.inner.read().await;
        let skippable = !guard.torn_down
            && guard.mode == PlaybackMode::Advertisement
            && guard
                .ad_progress
                .as_ref()
                .is_some_and(|progress| progress.skippable);
        if !skippable {
            debug!("Skip rejected");
            return false;
        }
        if let Some(manager) = &guard.manager {
            manager.skip().await;
            info!("Skip requested");
            return true;
        }
        false
    }

    /// Application moved to the background: pause if playing and remember
    /// that it was.
    #[instrument(skip(self))]
    pub async fn suspend(&self) {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if inner.torn_down {
            return;
        }
        let was_playing = inner.snapshot().is_playing();
        inner.was_playing_on_suspend = was_playing;
        if was_playing {
            match inner.mode {
                PlaybackMode::Content => {
                    self.content.pause().await;
                    inner.content_state = PlayerState::Paused;
                }
                PlaybackMode::Advertisement => {
                    if let Some(manager) = &inner.manager {
                        manager.pause().await;
                    }
                    inner.ad_state = PlayerState::Paused;
                }
                PlaybackMode::Idle => {}
            }
        }
        info!(was_playing, "Session suspended");
        self.publish(inner);
    }

    /// Application returned to the foreground.
    ///
    /// Playback stays paused until the user explicitly presses play; the
    /// policy is intentional, not a technical constraint.
    #[instrument(skip(self))]
    pub async fn resume(&self) {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if inner.torn_down {
            return;
        }
        info!(
            was_playing = inner.was_playing_on_suspend,
            "Session resumed, staying paused until explicit play"
        );
        inner.was_playing_on_suspend = false;
        self.publish(inner);
    }

    /// End the session: stop both players and release ad-engine resources.
    ///
    /// Safe to call multiple times. Commands after teardown are consistent
    /// no-ops.
    #[instrument(skip(self))]
    pub async fn teardown(&self) {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if inner.torn_down {
            return;
        }
        inner.torn_down = true;

        self.content.stop().await;
        if let Some(manager) = inner.manager.take() {
            manager.release().await;
        }

        inner.mode = PlaybackMode::Idle;
        inner.content_state = PlayerState::Idle;
        inner.ad_state = PlayerState::Idle;
        inner.ad_progress = None;
        inner.was_playing_on_suspend = false;
        self.publish(inner);
        info!("Session torn down");
    }

    async fn dispatch(&self, event: SessionEvent) {
        match event {
            SessionEvent::Content(event) => self.handle_content_event(event).await,
            SessionEvent::Ad(event) => self.handle_ad_event(event).await,
        }
    }

    /// Single intake point for content player events.
    ///
    /// Normally fed by the intake task; public so embedders and tests can
    /// drive the session deterministically.
    pub async fn handle_content_event(&self, event: ContentEvent) {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if inner.torn_down {
            return;
        }
        debug!(event = ?event, "Content event");

        match event {
            ContentEvent::Ready { duration } => {
                if duration.is_some() {
                    inner.content_duration = duration;
                }
                // A late ready notice must not demote a player we already
                // commanded to play.
                if !inner.content_state.is_playing() {
                    inner.content_state = PlayerState::Ready;
                }
                self.publish(inner);
            }
            ContentEvent::Playing => {
                if inner.mode == PlaybackMode::Advertisement {
                    // Stray start while an ad owns the screen: re-assert the
                    // pause instead of letting two players run.
                    warn!("Content reported playing during an ad break, re-pausing");
                    self.content.pause().await;
                } else {
                    inner.content_state = PlayerState::Playing;
                }
                self.publish(inner);
            }
            ContentEvent::Paused => {
                inner.content_state = PlayerState::Paused;
                self.publish(inner);
            }
            ContentEvent::Buffering => {
                inner.content_state = PlayerState::Buffering;
                self.publish(inner);
            }
            ContentEvent::Completed => {
                inner.content_state = PlayerState::Completed;
                if let Some(duration) = inner.content_duration {
                    inner.content_position = duration;
                }
                self.publish(inner);
            }
            ContentEvent::Failed { message } => {
                inner.content_state = PlayerState::Failed(message.clone());
                if inner.mode == PlaybackMode::Content {
                    // Surfaced to the caller; retry is an explicit re-load.
                    let error = Error::ContentPlaybackFailed(message);
                    inner.last_error = Some(PlaybackFault::from(&error));
                    warn!(error = %error, "Content playback failed");
                }
                self.publish(inner);
            }
            ContentEvent::TimeUpdate { position, duration } => {
                // Samples from a backgrounded player are ignored so a
                // transition window never exposes stale numbers.
                if inner.mode == PlaybackMode::Content {
                    if duration.is_some() {
                        inner.content_duration = duration;
                    }
                    let clamped = match inner.content_duration {
                        Some(duration) => position.clamp(0.0, duration),
                        None => position.max(0.0),
                    };
                    inner.content_position = clamped;
                    self.publish_time(inner);
                }
            }
        }
    }

    /// Single intake point for ad engine events.
    ///
    /// Normally fed by the intake task; public so embedders and tests can
    /// drive the session deterministically.
    pub async fn handle_ad_event(&self, event: AdEvent) {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if inner.torn_down {
            return;
        }
        debug!(event = ?event, "Ad event");

        match event {
            AdEvent::Loaded => {
                inner.ad_state = PlayerState::Ready;
                self.publish(inner);
            }
            AdEvent::Started { ad } => {
                if inner.mode != PlaybackMode::Advertisement {
                    warn!(ad_id = %ad.ad_id, mode = %inner.mode, "Stray ad start ignored");
                    return;
                }
                info!(
                    ad_id = %ad.ad_id,
                    position = ad.pod_position,
                    pod_size = ad.pod_size,
                    "Ad started"
                );
                inner.ad_progress = Some(AdProgress::from_metadata(&ad));
                inner.ad_state = PlayerState::Playing;
                self.publish(inner);
            }
            AdEvent::Paused => {
                if inner.ad_state.is_playing() {
                    inner.ad_state = PlayerState::Paused;
                }
                self.publish(inner);
            }
            AdEvent::Resumed => {
                if inner.mode == PlaybackMode::Advertisement {
                    inner.ad_state = PlayerState::Playing;
                } else {
                    warn!("Stray ad resume ignored");
                }
                self.publish(inner);
            }
            AdEvent::Completed => {
                // One ad down; the pod may have more. Mode is kept.
                inner.ad_progress = None;
                inner.ad_state = PlayerState::Ready;
                self.publish(inner);
            }
            AdEvent::PodCompleted => {
                info!("Ad pod completed");
                self.enter_content(inner).await;
                self.publish(inner);
            }
            AdEvent::Skipped => {
                info!("Ad skipped");
                self.enter_content(inner).await;
                self.publish(inner);
            }
            AdEvent::TimeUpdate { position, duration } => {
                if inner.mode == PlaybackMode::Advertisement {
                    if let Some(progress) = &mut inner.ad_progress {
                        if duration > 0.0 {
                            progress.duration = duration;
                        }
                        progress.advance_to(position);
                    }
                    self.publish_time(inner);
                }
            }
            AdEvent::Error { message } => {
                // Same fallback policy as initialization: ads never block
                // the primary content.
                let error = Error::AdPlaybackFailed(message);
                warn!(error = %error, "Ad break failed, falling back to content");
                inner.last_error = Some(PlaybackFault::from(&error));
                inner.ad_state = PlayerState::Failed(error.to_string());
                self.enter_content(inner).await;
                self.publish(inner);
            }
            AdEvent::ContentPauseRequested => {
                self.enter_advertisement(inner).await;
                self.publish(inner);
            }
            AdEvent::ContentResumeRequested => {
                self.enter_content(inner).await;
                self.publish(inner);
            }
        }
    }

    /// Hand the screen to the ad break. Guarded no-op when already there.
    async fn enter_advertisement(&self, inner: &mut SessionInner) {
        if inner.mode == PlaybackMode::Advertisement {
            return;
        }
        let from = inner.mode;
        // Content is paused first so both players never run at once; it
        // keeps buffering in the background.
        self.content.pause().await;
        if inner.content_state.is_playing() {
            inner.content_state = PlayerState::Paused;
        }
        inner.mode = PlaybackMode::Advertisement;
        inner.ad_state = PlayerState::Playing;
        info!(from = %from, to = %PlaybackMode::Advertisement, "Mode transition");
    }

    /// Hand the screen back to content. Guarded no-op when already there.
    async fn enter_content(&self, inner: &mut SessionInner) {
        if inner.mode == PlaybackMode::Content {
            return;
        }
        let from = inner.mode;
        inner.ad_progress = None;
        inner.ad_state = PlayerState::Idle;
        inner.mode = PlaybackMode::Content;

        if inner.content_state == PlayerState::Completed {
            debug!("Content already completed, not restarting after ad break");
            return;
        }
        self.content.play().await;
        inner.content_state = PlayerState::Playing;
        info!(from = %from, to = %PlaybackMode::Content, "Mode transition");
    }
}
