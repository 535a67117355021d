//! Core types for Midroll

use crate::error::PlaybackFault;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mutually exclusive playback mode: what is on screen right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// No playback has started
    Idle,
    /// Primary content owns the screen
    Content,
    /// An ad break owns the screen; content keeps buffering in the background
    Advertisement,
}

impl std::fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackMode::Idle => write!(f, "idle"),
            PlaybackMode::Content => write!(f, "content"),
            PlaybackMode::Advertisement => write!(f, "advertisement"),
        }
    }
}

/// Lifecycle state of a single player instance.
///
/// Two independent instances exist, one for content and one for ads. Each is
/// mutated only by its own event source or by coordinator-issued commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Buffering,
    Completed,
    Failed(String),
}

impl PlayerState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlayerState::Playing)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PlayerState::Failed(_))
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Idle => write!(f, "idle"),
            PlayerState::Loading => write!(f, "loading"),
            PlayerState::Ready => write!(f, "ready"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Paused => write!(f, "paused"),
            PlayerState::Buffering => write!(f, "buffering"),
            PlayerState::Completed => write!(f, "completed"),
            PlayerState::Failed(message) => write!(f, "failed({message})"),
        }
    }
}

/// Initialization phase of the session as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializationState {
    NotStarted,
    Loading,
    Ready,
    Failed,
}

impl std::fmt::Display for InitializationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitializationState::NotStarted => write!(f, "not_started"),
            InitializationState::Loading => write!(f, "loading"),
            InitializationState::Ready => write!(f, "ready"),
            InitializationState::Failed => write!(f, "failed"),
        }
    }
}

/// Location of the primary content asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSource {
    /// URL of the content stream
    pub url: Url,
    /// Human-readable title
    pub title: Option<String>,
    /// Position to start playback from, in seconds
    pub start_position: f64,
}

impl ContentSource {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            title: None,
            start_position: 0.0,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Descriptor handed to the ad-decision service for one ad break
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdRequest {
    /// Ad tag URL the decision service resolves
    pub tag_url: Url,
    /// Cap on the number of ads accepted for the pod
    pub max_pod_size: Option<u32>,
}

impl AdRequest {
    pub fn new(tag_url: Url) -> Self {
        Self {
            tag_url,
            max_pod_size: None,
        }
    }
}

/// Metadata the ad engine reports when an individual ad starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdMetadata {
    /// Creative identifier
    pub ad_id: String,
    /// Human-readable title
    pub title: Option<String>,
    /// 1-based position of this ad within its pod
    pub pod_position: u32,
    /// Total number of ads in the pod
    pub pod_size: u32,
    /// Creative duration in seconds
    pub duration: f64,
    /// Whether this creative can be skipped at all
    pub skippable: bool,
    /// Seconds of playback before the skip control unlocks
    pub skip_offset: Option<f64>,
}

/// Progress through the current ad break.
///
/// Present on the snapshot only while the mode is `Advertisement`. Rebuilt on
/// every ad start, cleared on pod completion or mode exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdProgress {
    /// 1-based index of the ad currently playing
    pub ad_index: u32,
    /// Total ads in the pod
    pub total_ads: u32,
    /// Seconds of the current ad already played, clamped to `duration`
    pub elapsed: f64,
    /// Duration of the current ad in seconds
    pub duration: f64,
    /// Whether the current ad can be skipped
    pub skippable: bool,
    /// Seconds of playback before the skip control unlocks
    pub skip_offset: Option<f64>,
    /// Seconds until skip unlocks; `None` once unlocked or never skippable
    pub skip_unlock_remaining: Option<f64>,
}

impl AdProgress {
    /// Build progress for a freshly started ad, clamping metadata into range
    pub fn from_metadata(ad: &AdMetadata) -> Self {
        let ad_index = ad.pod_position.max(1);
        let total_ads = ad.pod_size.max(ad_index);
        let duration = ad.duration.max(0.0);
        let skip_offset = ad.skip_offset.map(|offset| offset.clamp(0.0, duration));

        let skip_unlock_remaining = if ad.skippable {
            skip_offset.filter(|offset| *offset > 0.0)
        } else {
            None
        };

        Self {
            ad_index,
            total_ads,
            elapsed: 0.0,
            duration,
            skippable: ad.skippable,
            skip_offset,
            skip_unlock_remaining,
        }
    }

    /// Move the playhead to `position`, clamped into `[0, duration]`
    pub fn advance_to(&mut self, position: f64) {
        self.elapsed = position.clamp(0.0, self.duration);
        self.skip_unlock_remaining = match (self.skippable, self.skip_offset) {
            (true, Some(offset)) => {
                let remaining = offset - self.elapsed;
                (remaining > 0.0).then_some(remaining)
            }
            _ => None,
        };
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Start the session muted
    pub start_muted: bool,
    /// Minimum seconds of movement before a periodic time update republishes
    /// the snapshot (0.0 publishes every sample)
    pub time_update_min_interval: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            start_muted: false,
            time_update_min_interval: 0.0,
        }
    }
}

/// The single externally observable state of a playback session.
///
/// Recomputed and republished on every transition, never left stale. The
/// presentation layer renders exclusively from this value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    /// Current playback mode
    pub mode: PlaybackMode,
    /// Content player lifecycle state
    pub content_state: PlayerState,
    /// Ad player lifecycle state
    pub ad_state: PlayerState,
    /// Ad break progress, present only during `Advertisement` mode
    pub ad_progress: Option<AdProgress>,
    /// Playhead of whichever player is active for the current mode
    pub current_time: f64,
    /// Duration of whichever asset is active for the current mode
    pub duration: Option<f64>,
    /// Session-wide mute flag, applied to both players
    pub muted: bool,
    /// Most recent fault, ad faults included for observability
    pub last_error: Option<PlaybackFault>,
    /// Initialization phase of the session
    pub initialization: InitializationState,
}

impl PlaybackSnapshot {
    /// Initial snapshot before `load` is called
    pub fn initial(muted: bool) -> Self {
        Self {
            mode: PlaybackMode::Idle,
            content_state: PlayerState::Idle,
            ad_state: PlayerState::Idle,
            ad_progress: None,
            current_time: 0.0,
            duration: None,
            muted,
            last_error: None,
            initialization: InitializationState::NotStarted,
        }
    }

    /// True while the active player for the current mode is playing
    pub fn is_playing(&self) -> bool {
        match self.mode {
            PlaybackMode::Idle => false,
            PlaybackMode::Content => self.content_state.is_playing(),
            PlaybackMode::Advertisement => self.ad_state.is_playing(),
        }
    }

    /// Seeking is only legal over primary content
    pub fn can_seek(&self) -> bool {
        self.mode == PlaybackMode::Content
    }

    /// Skipping is only legal while a skippable ad is on screen
    pub fn can_skip(&self) -> bool {
        self.mode == PlaybackMode::Advertisement
            && self
                .ad_progress
                .as_ref()
                .is_some_and(|progress| progress.skippable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skippable_ad() -> AdMetadata {
        AdMetadata {
            ad_id: "ad-1".to_string(),
            title: Some("Preroll".to_string()),
            pod_position: 1,
            pod_size: 2,
            duration: 15.0,
            skippable: true,
            skip_offset: Some(5.0),
        }
    }

    #[test]
    fn test_ad_progress_clamps_metadata() {
        let ad = AdMetadata {
            ad_id: "ad-x".to_string(),
            title: None,
            pod_position: 0,
            pod_size: 0,
            duration: -3.0,
            skippable: false,
            skip_offset: Some(10.0),
        };

        let progress = AdProgress::from_metadata(&ad);
        assert_eq!(progress.ad_index, 1);
        assert_eq!(progress.total_ads, 1);
        assert_eq!(progress.duration, 0.0);
        assert_eq!(progress.skip_unlock_remaining, None);
    }

    #[test]
    fn test_ad_progress_elapsed_clamped_to_duration() {
        let mut progress = AdProgress::from_metadata(&skippable_ad());

        progress.advance_to(99.0);
        assert_eq!(progress.elapsed, 15.0);

        progress.advance_to(-1.0);
        assert_eq!(progress.elapsed, 0.0);
    }

    #[test]
    fn test_skip_unlock_counts_down_then_unlocks() {
        let mut progress = AdProgress::from_metadata(&skippable_ad());
        assert_eq!(progress.skip_unlock_remaining, Some(5.0));

        progress.advance_to(3.0);
        assert_eq!(progress.skip_unlock_remaining, Some(2.0));

        progress.advance_to(5.0);
        assert_eq!(progress.skip_unlock_remaining, None);
    }

    #[test]
    fn test_snapshot_capabilities_follow_mode() {
        let mut snapshot = PlaybackSnapshot::initial(false);
        assert!(!snapshot.can_seek());
        assert!(!snapshot.can_skip());

        snapshot.mode = PlaybackMode::Content;
        assert!(snapshot.can_seek());
        assert!(!snapshot.can_skip());

        snapshot.mode = PlaybackMode::Advertisement;
        snapshot.ad_progress = Some(AdProgress::from_metadata(&skippable_ad()));
        assert!(!snapshot.can_seek());
        assert!(snapshot.can_skip());
    }

    #[test]
    fn test_snapshot_is_playing_tracks_active_player_only() {
        let mut snapshot = PlaybackSnapshot::initial(false);
        snapshot.mode = PlaybackMode::Advertisement;
        snapshot.ad_state = PlayerState::Playing;
        snapshot.content_state = PlayerState::Paused;
        assert!(snapshot.is_playing());

        snapshot.ad_state = PlayerState::Paused;
        assert!(!snapshot.is_playing());
    }

    #[test]
    fn test_snapshot_serializes_for_presentation() {
        let snapshot = PlaybackSnapshot::initial(true);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"mode\":\"idle\""));
        assert!(json.contains("\"initialization\":\"not_started\""));

        let roundtrip: PlaybackSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(roundtrip, snapshot);
    }
}
