//! Text frame rendering for the monitor

use chrono::{DateTime, Local};
use std::time::Duration;

use crate::constants::monitor::BAR_WIDTH;

/// One observation of a pipeline's progress
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub processed: usize,
    pub total: usize,
    pub eta: Option<Duration>,
    pub updated: DateTime<Local>,
}

impl Snapshot {
    /// Fraction done in `0.0..=1.0`
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.processed as f64 / self.total as f64).min(1.0)
    }

    pub fn percent(&self) -> u32 {
        (self.progress() * 100.0).round() as u32
    }

    pub fn is_finished(&self) -> bool {
        self.total > 0 && self.processed >= self.total
    }
}

/// Render a full-screen frame
pub fn render_frame(pipeline: &str, interval: Duration, snapshot: &Snapshot) -> String {
    let rule = "-".repeat(BAR_WIDTH + 2);
    let mut out = String::new();

    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!(" '{}' progress\n", pipeline));
    out.push_str(&spread(
        &format!(" update interval: {}", format_duration(interval.as_secs())),
        &format!("last update: {}", snapshot.updated.format("%a %b %e %H:%M:%S %Y")),
    ));
    out.push_str(&rule);
    out.push_str("\n\n");

    out.push_str(&spread(
        &format!(" {} / {}", snapshot.processed, snapshot.total),
        &format!("{}% ", snapshot.percent()),
    ));
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!(
        " {}\n",
        render_progress_bar(snapshot.processed, snapshot.total, BAR_WIDTH - 2)
    ));
    out.push_str(&rule);
    out.push('\n');

    let eta = match snapshot.eta {
        Some(eta) => format!(" ETA: {}", format_duration(eta.as_secs())),
        None => " ETA: estimating...".to_string(),
    };
    out.push_str(&spread(&eta, "press Ctrl+C to exit "));
    out
}

/// Left and right text on one line of the frame width
fn spread(left: &str, right: &str) -> String {
    let width = BAR_WIDTH + 2;
    let used = left.chars().count() + right.chars().count();
    format!("{}{}{}\n", left, " ".repeat(width.saturating_sub(used).max(1)), right)
}

/// Render a simple progress bar
pub fn render_progress_bar(completed: usize, total: usize, width: usize) -> String {
    if total == 0 {
        return format!("[{}]", " ".repeat(width));
    }

    let progress = (completed as f32 / total as f32).min(1.0);
    let filled = (progress * width as f32) as usize;
    let empty = width.saturating_sub(filled);

    format!("[{}{}]", "#".repeat(filled), " ".repeat(empty))
}

/// Format duration as human-readable string
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86_400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86_400, (secs % 86_400) / 3600)
    }
}
