//! Basic session example
//!
//! Runs a complete simulated session: a two-ad preroll pod, then the
//! feature, printing every snapshot transition along the way.
//!
//! Run with: cargo run -p midroll-core --example basic_session

use midroll_core::sim::{ad_pod, SimAdEngine, SimContentPlayer};
use midroll_core::{
    AdRequest, ContentSource, CoordinatorConfig, PlaybackCoordinator, PlaybackMode, PlayerState,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    println!("Midroll Core - Basic Session Example");
    println!("====================================\n");

    let player = Arc::new(SimContentPlayer::new(12.0));
    let engine = Arc::new(SimAdEngine::with_pod(ad_pod(2, 6.0, true)));
    let session = PlaybackCoordinator::new(
        player.clone(),
        engine.clone(),
        CoordinatorConfig::default(),
    );

    // Print every snapshot the coordinator publishes
    let mut updates = session.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow().clone();
            let timeline = match snapshot.duration {
                Some(duration) => format!("{:.1}s / {:.1}s", snapshot.current_time, duration),
                None => format!("{:.1}s", snapshot.current_time),
            };
            let ad = snapshot
                .ad_progress
                .as_ref()
                .map(|progress| format!(" [ad {}/{}]", progress.ad_index, progress.total_ads))
                .unwrap_or_default();
            println!(
                "  {:<13} {:<9} content={} ad={}{}",
                snapshot.mode.to_string(),
                timeline,
                snapshot.content_state,
                snapshot.ad_state,
                ad
            );
        }
    });

    println!("Loading session (pod of 2, then a 12s feature):\n");
    session
        .load(
            ContentSource::new("https://cdn.example.com/feature.m3u8".parse().unwrap())
                .with_title("Feature presentation"),
            AdRequest::new("https://ads.example.com/tag?pod=preroll".parse().unwrap()),
        )
        .await
        .expect("load should succeed");

    // Drive both simulated players, heavily accelerated: every 50ms of wall
    // time plays one second of media.
    let tick = Duration::from_millis(50);
    let ad_break = engine.last_break().expect("break was created");
    let ad_driver = tokio::spawn(async move { ad_break.drive(tick, 20.0).await });
    let content_driver = tokio::spawn({
        let player = player.clone();
        async move { player.drive(tick, 20.0).await }
    });

    ad_driver.await.unwrap();
    println!("\nAd pod finished, feature rolling...\n");
    content_driver.await.unwrap();

    // Give the intake task a beat to drain the final events
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = session.snapshot();
    println!("\nFinal state:");
    println!("  mode:     {}", snapshot.mode);
    println!("  content:  {}", snapshot.content_state);
    println!("  playing:  {}", snapshot.is_playing());
    assert_eq!(snapshot.mode, PlaybackMode::Content);
    assert_eq!(snapshot.content_state, PlayerState::Completed);

    session.teardown().await;
    printer.abort();

    println!("\nExample complete!");
}
