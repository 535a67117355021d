//! CLI command implementations

use crate::output::{self, OutputFormat};
use anyhow::Context;
use midroll_core::sim::{ad_pod, SimAdEngine, SimContentPlayer};
use midroll_core::{
    AdEvent, AdRequest, ContentEvent, ContentSource, CoordinatorConfig, PlaybackCoordinator,
    PlaybackMode, PlaybackSnapshot,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Options for a simulated session run
pub struct RunOptions {
    pub content_duration: f64,
    pub ads: u32,
    pub ad_duration: f64,
    pub unskippable: bool,
    pub no_ads: bool,
    pub ad_error: bool,
    pub speed: f64,
    pub muted: bool,
}

/// Run a simulated session end to end
pub async fn run(options: RunOptions, format: &str) -> anyhow::Result<()> {
    let format = OutputFormat::from(format);

    let pod_label = if options.no_ads {
        "none (no fill)".to_string()
    } else {
        format!("{} x {:.0}s", options.ads, options.ad_duration)
    };
    println!(
        "Simulated session starting at {}",
        chrono::Local::now().format("%H:%M:%S")
    );
    println!(
        "  content: {:.0}s, pod: {}, speed: {:.0}x\n",
        options.content_duration, pod_label, options.speed
    );

    let player = Arc::new(SimContentPlayer::new(options.content_duration));
    let engine = if options.no_ads {
        Arc::new(SimAdEngine::failing("no fill"))
    } else {
        Arc::new(SimAdEngine::with_pod(ad_pod(
            options.ads,
            options.ad_duration,
            !options.unskippable,
        )))
    };
    let session = PlaybackCoordinator::new(
        player.clone(),
        engine.clone(),
        CoordinatorConfig {
            start_muted: options.muted,
            ..Default::default()
        },
    );

    // Print every snapshot the coordinator publishes
    let mut updates = session.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow().clone();
            output::print_snapshot(&snapshot, &format);
        }
    });

    session
        .load(
            ContentSource::new("https://cdn.example.com/feature.m3u8".parse()?)
                .with_title("Simulated feature"),
            AdRequest::new("https://ads.example.com/tag?pod=preroll".parse()?),
        )
        .await
        .context("session failed to initialize")?;

    let tick = Duration::from_millis(50);
    let rate = options.speed;
    let ad_driver = engine.last_break().map(|ad_break| {
        tokio::spawn(async move { ad_break.drive(tick, rate).await })
    });
    let content_driver = tokio::spawn({
        let player = player.clone();
        async move { player.drive(tick, rate).await }
    });

    if options.ad_error {
        let session = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            session
                .handle_ad_event(AdEvent::Error {
                    message: "creative failed to decode".to_string(),
                })
                .await;
        });
    }

    // The content driver returns once the feature plays out; budget the wait
    // for the whole timeline plus a margin.
    let media_seconds = options.content_duration + options.ads as f64 * options.ad_duration;
    let budget = Duration::from_secs_f64((media_seconds / rate).max(1.0) + 5.0);
    tokio::time::timeout(budget, content_driver)
        .await
        .context("session did not complete in time")??;

    if let Some(driver) = ad_driver {
        driver.abort();
    }
    // Let the intake task drain the final events
    tokio::time::sleep(Duration::from_millis(50)).await;

    session.teardown().await;
    printer.abort();

    let snapshot = session.snapshot();
    println!("\nSession summary:");
    println!("  player commands:   {}", player.commands().len());
    if let Some(ad_break) = engine.last_break() {
        println!("  ad break commands: {}", ad_break.commands().len());
    }
    match snapshot.last_error {
        Some(fault) => println!(
            "  last fault:        {} ({})",
            fault.code,
            if fault.fatal { "fatal" } else { "recovered" }
        ),
        None => println!("  last fault:        none"),
    }

    println!("\nRun complete!");
    Ok(())
}

/// One entry in a replay script
#[derive(Debug, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum ScriptStep {
    /// Feed a content player event
    Content { event: ContentEvent },
    /// Feed an ad engine event
    Ad { event: AdEvent },
    /// Assert on the current snapshot
    Expect(Expectation),
}

/// Partial snapshot assertion; only the present fields are checked
#[derive(Debug, Default, Deserialize)]
struct Expectation {
    mode: Option<PlaybackMode>,
    playing: Option<bool>,
    can_seek: Option<bool>,
    can_skip: Option<bool>,
    ad_index: Option<u32>,
}

fn check(expectation: &Expectation, snapshot: &PlaybackSnapshot, index: usize) -> anyhow::Result<()> {
    if let Some(mode) = expectation.mode {
        if snapshot.mode != mode {
            anyhow::bail!("step {index}: expected mode {mode}, got {}", snapshot.mode);
        }
    }
    if let Some(playing) = expectation.playing {
        if snapshot.is_playing() != playing {
            anyhow::bail!(
                "step {index}: expected playing={playing}, got {}",
                snapshot.is_playing()
            );
        }
    }
    if let Some(can_seek) = expectation.can_seek {
        if snapshot.can_seek() != can_seek {
            anyhow::bail!(
                "step {index}: expected can_seek={can_seek}, got {}",
                snapshot.can_seek()
            );
        }
    }
    if let Some(can_skip) = expectation.can_skip {
        if snapshot.can_skip() != can_skip {
            anyhow::bail!(
                "step {index}: expected can_skip={can_skip}, got {}",
                snapshot.can_skip()
            );
        }
    }
    if let Some(ad_index) = expectation.ad_index {
        let actual = snapshot
            .ad_progress
            .as_ref()
            .map(|progress| progress.ad_index);
        if actual != Some(ad_index) {
            anyhow::bail!("step {index}: expected ad_index={ad_index}, got {actual:?}");
        }
    }
    Ok(())
}

/// Replay a JSON event script against a fresh session
pub async fn replay(
    script: &Path,
    content_duration: f64,
    no_ads: bool,
    format: &str,
) -> anyhow::Result<()> {
    let format = OutputFormat::from(format);
    let raw = std::fs::read_to_string(script)
        .with_context(|| format!("reading {}", script.display()))?;
    let steps: Vec<ScriptStep> = serde_json::from_str(&raw).context("parsing event script")?;
    tracing::debug!(steps = steps.len(), script = %script.display(), "Event script parsed");

    // A silent player and a scripted break: every event comes from the
    // script, nothing is echoed.
    let player = Arc::new(SimContentPlayer::silent(content_duration));
    let engine = if no_ads {
        Arc::new(SimAdEngine::failing("no fill"))
    } else {
        Arc::new(SimAdEngine::scripted())
    };
    let session = PlaybackCoordinator::new(player, engine, CoordinatorConfig::default());

    session
        .load(
            ContentSource::new("https://cdn.example.com/feature.m3u8".parse()?),
            AdRequest::new("https://ads.example.com/tag?pod=scripted".parse()?),
        )
        .await
        .context("session failed to initialize")?;

    println!("Loaded; replaying {} steps\n", steps.len());
    output::print_snapshot(&session.snapshot(), &format);

    for (index, step) in steps.into_iter().enumerate() {
        match step {
            ScriptStep::Content { event } => {
                session.handle_content_event(event).await;
                output::print_snapshot(&session.snapshot(), &format);
            }
            ScriptStep::Ad { event } => {
                session.handle_ad_event(event).await;
                output::print_snapshot(&session.snapshot(), &format);
            }
            ScriptStep::Expect(expectation) => {
                check(&expectation, &session.snapshot(), index)?;
            }
        }
    }

    session.teardown().await;
    println!("\nReplay complete!");
    Ok(())
}
