//! Integration tests for Midroll Core
//!
//! Drives full sessions against the simulated collaborators, feeding
//! collaborator events through the public intake methods so sequencing is
//! deterministic.

use midroll_core::sim::{ad_pod, AdCommand, PlayerCommand, SimAdEngine, SimContentPlayer};
use midroll_core::{
    AdEvent, AdRequest, ContentEvent, ContentSource, CoordinatorConfig, InitializationState,
    PlaybackCoordinator, PlaybackMode, PlaybackSnapshot, PlayerState,
};
use std::sync::Arc;
use std::time::Duration;

fn content_source() -> ContentSource {
    ContentSource::new("https://cdn.example.com/feature.m3u8".parse().unwrap())
        .with_title("Feature")
}

fn ad_request() -> AdRequest {
    AdRequest::new("https://ads.example.com/tag?pod=preroll".parse().unwrap())
}

fn session_with(
    player: &Arc<SimContentPlayer>,
    engine: &Arc<SimAdEngine>,
) -> Arc<PlaybackCoordinator> {
    PlaybackCoordinator::new(player.clone(), engine.clone(), CoordinatorConfig::default())
}

/// Let the intake task drain any queued collaborator events
async fn drain() {
    tokio::time::sleep(Duration::from_millis(25)).await;
}

fn assert_exclusive(snapshot: &PlaybackSnapshot) {
    assert!(
        !(snapshot.content_state.is_playing() && snapshot.ad_state.is_playing()),
        "both players playing at once: {snapshot:?}"
    );
}

// =============================================================================
// Initialization
// =============================================================================

#[tokio::test]
async fn test_ad_request_failure_falls_back_to_content() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::failing("no fill"));
    let session = session_with(&player, &engine);

    let result = session.load(content_source(), ad_request()).await;
    assert!(result.is_ok(), "ad failures must never fail the load");
    drain().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.mode, PlaybackMode::Content);
    assert_eq!(snapshot.content_state, PlayerState::Playing);
    assert_eq!(snapshot.initialization, InitializationState::Ready);

    // Recorded for observability, not fatal
    let fault = snapshot.last_error.expect("fault should be recorded");
    assert_eq!(fault.code, "AD_REQUEST");
    assert!(!fault.fatal);
}

#[tokio::test]
async fn test_content_prepare_failure_fails_initialization() {
    let player = Arc::new(SimContentPlayer::failing("404 from origin"));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(1, 10.0, false)));
    let session = session_with(&player, &engine);

    let result = session.load(content_source(), ad_request()).await;
    assert!(result.is_err(), "content is the irreplaceable asset");

    let snapshot = session.snapshot();
    assert_eq!(snapshot.initialization, InitializationState::Failed);
    assert_eq!(snapshot.mode, PlaybackMode::Idle);
    assert!(snapshot.last_error.is_some_and(|fault| fault.fatal));

    // The unused ad break must not leak engine resources
    let ad_break = engine.last_break().expect("break was created");
    assert!(ad_break.commands().contains(&AdCommand::Release));
}

#[tokio::test]
async fn test_successful_load_enters_advertisement_with_content_prebuffering() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(2, 10.0, true)));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.mode, PlaybackMode::Advertisement);
    assert_eq!(snapshot.initialization, InitializationState::Ready);
    assert_eq!(snapshot.ad_state, PlayerState::Playing);
    assert_ne!(snapshot.content_state, PlayerState::Playing);

    let progress = snapshot.ad_progress.expect("first ad should be on screen");
    assert_eq!(progress.ad_index, 1);
    assert_eq!(progress.total_ads, 2);
}

#[tokio::test]
async fn test_load_reentry_rejected_while_loading() {
    let player = Arc::new(
        SimContentPlayer::new(60.0).with_prepare_delay(Duration::from_millis(100)),
    );
    let engine = Arc::new(SimAdEngine::scripted());
    let session = session_with(&player, &engine);

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.load(content_source(), ad_request()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = session.load(content_source(), ad_request()).await;
    assert!(matches!(second, Err(midroll_core::Error::SessionBusy)));

    assert!(first.await.unwrap().is_ok());
    assert_eq!(
        session.snapshot().initialization,
        InitializationState::Ready
    );
}

// =============================================================================
// Mode transitions
// =============================================================================

#[tokio::test]
async fn test_two_ad_pod_ends_in_content_mode() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(2, 10.0, false)));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;

    // First ad plays out; the pod keeps the screen
    session.handle_ad_event(AdEvent::Completed).await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.mode, PlaybackMode::Advertisement);
    assert_eq!(snapshot.ad_progress, None);

    let pod = ad_pod(2, 10.0, false);
    session
        .handle_ad_event(AdEvent::Started { ad: pod[1].clone() })
        .await;
    let snapshot = session.snapshot();
    assert_eq!(
        snapshot.ad_progress.as_ref().map(|progress| progress.ad_index),
        Some(2)
    );

    session.handle_ad_event(AdEvent::PodCompleted).await;
    drain().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.mode, PlaybackMode::Content);
    assert_eq!(snapshot.ad_progress, None);
    assert_eq!(snapshot.content_state, PlayerState::Playing);
}

#[tokio::test]
async fn test_ad_error_falls_back_to_content() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(1, 10.0, false)));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;
    assert_eq!(session.snapshot().mode, PlaybackMode::Advertisement);

    session
        .handle_ad_event(AdEvent::Error {
            message: "VAST parse error".to_string(),
        })
        .await;
    drain().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.mode, PlaybackMode::Content);
    assert_eq!(snapshot.content_state, PlayerState::Playing);
    let fault = snapshot.last_error.expect("fault should be recorded");
    assert_eq!(fault.code, "AD_PLAYBACK");
    assert!(!fault.fatal);
}

#[tokio::test]
async fn test_engine_pause_resume_requests_drive_mode() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::failing("no preroll"));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;
    assert_eq!(session.snapshot().mode, PlaybackMode::Content);

    // A midroll break: the engine asks for the screen, then gives it back
    session
        .handle_ad_event(AdEvent::ContentPauseRequested)
        .await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.mode, PlaybackMode::Advertisement);
    assert_ne!(snapshot.content_state, PlayerState::Playing);

    session
        .handle_ad_event(AdEvent::ContentResumeRequested)
        .await;
    drain().await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.mode, PlaybackMode::Content);
    assert_eq!(snapshot.content_state, PlayerState::Playing);
}

#[tokio::test]
async fn test_players_never_play_simultaneously() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(2, 10.0, true)));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;
    assert_exclusive(&session.snapshot());

    let pod = ad_pod(2, 10.0, true);
    let gauntlet = [
        AdEvent::TimeUpdate {
            position: 3.0,
            duration: 10.0,
        },
        AdEvent::Paused,
        AdEvent::Resumed,
        AdEvent::Completed,
        AdEvent::Started { ad: pod[1].clone() },
        AdEvent::TimeUpdate {
            position: 9.0,
            duration: 10.0,
        },
        AdEvent::PodCompleted,
        AdEvent::ContentPauseRequested,
        AdEvent::Skipped,
    ];
    for event in gauntlet {
        session.handle_ad_event(event).await;
        assert_exclusive(&session.snapshot());
    }

    // A stray "playing" report from the backgrounded content player while an
    // ad owns the screen must not surface two active players.
    session
        .handle_ad_event(AdEvent::ContentPauseRequested)
        .await;
    session.handle_content_event(ContentEvent::Playing).await;
    let snapshot = session.snapshot();
    assert_exclusive(&snapshot);
    assert_eq!(snapshot.mode, PlaybackMode::Advertisement);
}

// =============================================================================
// Command surface
// =============================================================================

#[tokio::test]
async fn test_seek_clamps_into_range() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::failing("no fill"));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;

    assert!(session.seek(600.0).await);
    assert_eq!(session.snapshot().current_time, 60.0);

    assert!(session.seek(-5.0).await);
    assert_eq!(session.snapshot().current_time, 0.0);

    assert!(session.seek(30.0).await);
    assert_eq!(session.snapshot().current_time, 30.0);
}

#[tokio::test]
async fn test_seek_rejected_during_advertisement() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(1, 10.0, false)));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;
    session
        .handle_ad_event(AdEvent::TimeUpdate {
            position: 4.0,
            duration: 10.0,
        })
        .await;

    let before = session.snapshot();
    assert!(!session.seek(30.0).await);
    let after = session.snapshot();

    assert_eq!(after.current_time, before.current_time);
    assert!(!player
        .commands()
        .iter()
        .any(|command| matches!(command, PlayerCommand::Seek(_))));
}

#[tokio::test]
async fn test_capability_flags_follow_mode() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(1, 10.0, true)));
    let session = session_with(&player, &engine);

    let snapshot = session.snapshot();
    assert!(!snapshot.can_seek());
    assert!(!snapshot.can_skip());

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.mode, PlaybackMode::Advertisement);
    assert!(!snapshot.can_seek());
    assert!(snapshot.can_skip());

    session.handle_ad_event(AdEvent::PodCompleted).await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.mode, PlaybackMode::Content);
    assert!(snapshot.can_seek());
    assert!(!snapshot.can_skip());
}

#[tokio::test]
async fn test_skip_refused_when_not_skippable() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(1, 10.0, false)));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;

    let before = session.snapshot();
    assert!(!session.skip_ad().await);
    drain().await;
    let after = session.snapshot();

    assert_eq!(after, before, "a refused skip must not change state");
    let ad_break = engine.last_break().unwrap();
    assert!(!ad_break.commands().contains(&AdCommand::Skip));
}

#[tokio::test]
async fn test_skip_transitions_via_engine_event() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(1, 15.0, true)));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;

    assert!(session.skip_ad().await);
    // The coordinator waits for the engine's Skipped event; the sim break
    // emits it, and the intake task completes the transition.
    drain().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.mode, PlaybackMode::Content);
    assert_eq!(snapshot.ad_progress, None);
    assert!(engine
        .last_break()
        .unwrap()
        .commands()
        .contains(&AdCommand::Skip));
}

#[tokio::test]
async fn test_mute_fans_out_and_persists_across_transition() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(1, 10.0, true)));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;

    assert!(session.toggle_mute().await);
    assert!(player.commands().contains(&PlayerCommand::SetMuted(true)));
    assert!(engine
        .last_break()
        .unwrap()
        .commands()
        .contains(&AdCommand::SetVolume(0.0)));

    let commands_before_switch = player.commands().len();
    session.handle_ad_event(AdEvent::PodCompleted).await;
    drain().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.mode, PlaybackMode::Content);
    assert!(snapshot.muted, "mute must survive the mode switch");
    let commands = player.commands();
    assert!(!commands[commands_before_switch..].contains(&PlayerCommand::SetMuted(false)));
}

#[tokio::test]
async fn test_pause_and_play_follow_active_mode() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(1, 10.0, false)));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;

    session.pause().await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.ad_state, PlayerState::Paused);
    assert!(!snapshot.is_playing());

    session.play().await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.ad_state, PlayerState::Playing);
    assert!(snapshot.is_playing());

    let ad_break = engine.last_break().unwrap();
    assert!(ad_break.commands().contains(&AdCommand::Pause));
    assert!(ad_break.commands().contains(&AdCommand::Resume));
}

// =============================================================================
// Time updates
// =============================================================================

#[tokio::test]
async fn test_stale_time_updates_from_backgrounded_player_ignored() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(1, 10.0, false)));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;
    assert_eq!(session.snapshot().mode, PlaybackMode::Advertisement);

    // A buffered-ahead content sample must not leak into the ad timeline
    session
        .handle_content_event(ContentEvent::TimeUpdate {
            position: 42.0,
            duration: Some(60.0),
        })
        .await;
    assert_eq!(session.snapshot().current_time, 0.0);

    session
        .handle_ad_event(AdEvent::TimeUpdate {
            position: 3.0,
            duration: 10.0,
        })
        .await;
    assert_eq!(session.snapshot().current_time, 3.0);

    // Back in content mode the retained content position is shown, not the
    // stale sample swallowed during the break
    session.handle_ad_event(AdEvent::PodCompleted).await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.mode, PlaybackMode::Content);
    assert_eq!(snapshot.current_time, 0.0);

    // And stale ad samples are ignored symmetrically
    session
        .handle_ad_event(AdEvent::TimeUpdate {
            position: 9.0,
            duration: 10.0,
        })
        .await;
    assert_eq!(session.snapshot().current_time, 0.0);
}

#[tokio::test]
async fn test_ad_time_updates_advance_skip_unlock() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(1, 15.0, true)));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;

    let progress = session.snapshot().ad_progress.unwrap();
    assert_eq!(progress.skip_unlock_remaining, Some(5.0));

    session
        .handle_ad_event(AdEvent::TimeUpdate {
            position: 2.0,
            duration: 15.0,
        })
        .await;
    let progress = session.snapshot().ad_progress.unwrap();
    assert_eq!(progress.elapsed, 2.0);
    assert_eq!(progress.skip_unlock_remaining, Some(3.0));

    session
        .handle_ad_event(AdEvent::TimeUpdate {
            position: 7.0,
            duration: 15.0,
        })
        .await;
    let progress = session.snapshot().ad_progress.unwrap();
    assert_eq!(progress.skip_unlock_remaining, None);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_suspend_pauses_and_resume_stays_paused() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::failing("no fill"));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;
    assert!(session.snapshot().is_playing());

    session.suspend().await;
    let snapshot = session.snapshot();
    assert!(!snapshot.is_playing());
    assert_eq!(snapshot.content_state, PlayerState::Paused);

    let plays_before = player
        .commands()
        .iter()
        .filter(|command| **command == PlayerCommand::Play)
        .count();

    // Deliberate policy: returning to the foreground never auto-resumes
    session.resume().await;
    drain().await;
    assert!(!session.snapshot().is_playing());
    let plays_after = player
        .commands()
        .iter()
        .filter(|command| **command == PlayerCommand::Play)
        .count();
    assert_eq!(plays_before, plays_after);
}

#[tokio::test]
async fn test_content_failure_during_playback_surfaces_on_snapshot() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::failing("no fill"));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;

    session
        .handle_content_event(ContentEvent::Failed {
            message: "segment fetch timed out".to_string(),
        })
        .await;

    let snapshot = session.snapshot();
    assert!(snapshot.content_state.is_failed());
    let fault = snapshot.last_error.expect("fault should surface");
    assert_eq!(fault.code, "CONTENT_PLAYBACK");
    assert!(fault.fatal);
    // Not auto-retried: still in content mode, caller decides on re-load
    assert_eq!(snapshot.mode, PlaybackMode::Content);
}

#[tokio::test]
async fn test_teardown_stops_both_players_and_quiesces_commands() {
    let player = Arc::new(SimContentPlayer::new(60.0));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(1, 10.0, true)));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();
    drain().await;

    session.teardown().await;
    session.teardown().await;

    let stops = player
        .commands()
        .iter()
        .filter(|command| **command == PlayerCommand::Stop)
        .count();
    assert_eq!(stops, 1);
    let releases = engine
        .last_break()
        .unwrap()
        .commands()
        .iter()
        .filter(|command| **command == AdCommand::Release)
        .count();
    assert_eq!(releases, 1);

    // Commands after teardown are consistent no-ops
    let muted_before = session.snapshot().muted;
    session.play().await;
    assert!(!session.seek(10.0).await);
    assert!(!session.skip_ad().await);
    assert_eq!(session.toggle_mute().await, muted_before);
    session
        .handle_ad_event(AdEvent::ContentPauseRequested)
        .await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.mode, PlaybackMode::Idle);
    assert!(!snapshot.is_playing());

    let result = session.load(content_source(), ad_request()).await;
    assert!(matches!(result, Err(midroll_core::Error::SessionClosed)));
}

#[tokio::test]
async fn test_driven_session_plays_pod_then_content_to_completion() {
    let player = Arc::new(SimContentPlayer::new(3.0));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(2, 1.0, false)));
    let session = session_with(&player, &engine);

    session.load(content_source(), ad_request()).await.unwrap();

    // Real-time drivers, heavily accelerated
    let tick = Duration::from_millis(10);
    let ad_break = engine.last_break().unwrap();
    let ad_driver = tokio::spawn({
        let ad_break = ad_break.clone();
        async move { ad_break.drive(tick, 50.0).await }
    });
    let content_driver = tokio::spawn({
        let player = player.clone();
        async move { player.drive(tick, 50.0).await }
    });

    ad_driver.await.unwrap();
    drain().await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.mode, PlaybackMode::Content);

    content_driver.await.unwrap();
    drain().await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.content_state, PlayerState::Completed);
    assert_eq!(snapshot.current_time, 3.0);

    session.teardown().await;
}
