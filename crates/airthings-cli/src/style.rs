//! Visual styling utilities for the CLI.
//!
//! Spinners for long-running radio operations, severity colors and the
//! shared table style.

use std::time::Duration;

use airthings_types::Severity;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

/// Standard spinner tick characters (Braille dots animation)
const SPINNER_TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Standard spinner tick interval
const SPINNER_TICK_MS: u64 = 80;

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .map(|s| s.tick_chars(SPINNER_TICK_CHARS))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

/// Create a spinner for scanning operations.
pub fn scanning_spinner(timeout: Duration) -> ProgressBar {
    spinner(format!(
        "Scanning for Airthings devices... ({:.0}s per scan)",
        timeout.as_secs_f64()
    ))
}

/// Create a spinner for reading from devices.
pub fn reading_spinner(count: usize) -> ProgressBar {
    let message = match count {
        0 => "Discovering and reading devices...".to_string(),
        1 => "Reading device...".to_string(),
        n => format!("Reading {} devices...", n),
    };
    spinner(message)
}

/// Create a spinner for device information reads.
pub fn info_spinner(device: &str) -> ProgressBar {
    spinner(format!("Reading revisions from {}...", device))
}

/// Render a severity label in its color.
pub fn format_severity(severity: Severity, no_color: bool) -> String {
    let label = severity.label();
    if no_color {
        return label.to_string();
    }
    match severity {
        Severity::High => format!("{}", label.red().bold()),
        Severity::Medium => format!("{}", label.yellow()),
        Severity::Caution => format!("{}", label.bright_yellow()),
        Severity::Low => format!("{}", label.blue()),
        Severity::None => format!("{}", label.green()),
        Severity::Unknown => format!("{}", label.dimmed()),
    }
}

/// Color a value according to the severity of its reading.
pub fn color_by_severity(text: &str, severity: Option<Severity>, no_color: bool) -> String {
    if no_color {
        return text.to_string();
    }
    match severity {
        Some(Severity::High) => format!("{}", text.red().bold()),
        Some(Severity::Medium) | Some(Severity::Caution) => format!("{}", text.yellow()),
        Some(Severity::Low) => format!("{}", text.blue()),
        Some(Severity::None) => format!("{}", text.green()),
        Some(Severity::Unknown) | None => text.to_string(),
    }
}

/// Apply the shared table style.
pub fn apply_table_style(table: &mut tabled::Table, no_color: bool) {
    use tabled::settings::Style;
    if no_color {
        table.with(Style::ascii());
    } else {
        table.with(Style::rounded());
    }
}
