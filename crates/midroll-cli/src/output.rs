//! Output formatting for CLI

use console::style;
use midroll_core::{PlaybackMode, PlaybackSnapshot};

/// Output format options
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Print one snapshot in the selected format
pub fn print_snapshot(snapshot: &PlaybackSnapshot, format: &OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Text => println!("{}", describe(snapshot)),
    }
}

fn describe(snapshot: &PlaybackSnapshot) -> String {
    let mode = match snapshot.mode {
        PlaybackMode::Idle => style("idle").dim().to_string(),
        PlaybackMode::Content => style("content").green().to_string(),
        PlaybackMode::Advertisement => style("advertisement").yellow().to_string(),
    };

    let timeline = match snapshot.duration {
        Some(duration) => format!("{:5.1}s /{:6.1}s", snapshot.current_time, duration),
        None => format!("{:5.1}s", snapshot.current_time),
    };

    let ad = snapshot
        .ad_progress
        .as_ref()
        .map(|progress| {
            let skip = match progress.skip_unlock_remaining {
                Some(remaining) => format!(", skip in {remaining:.1}s"),
                None if progress.skippable => ", skippable".to_string(),
                None => String::new(),
            };
            format!(" | ad {}/{}{}", progress.ad_index, progress.total_ads, skip)
        })
        .unwrap_or_default();

    let fault = snapshot
        .last_error
        .as_ref()
        .map(|fault| format!(" | {}", style(&fault.code).red()))
        .unwrap_or_default();
    let muted = if snapshot.muted { " | muted" } else { "" };

    format!(
        "[{mode}] {timeline} | content={} ad={}{ad}{fault}{muted}",
        snapshot.content_state, snapshot.ad_state
    )
}
