//! Output formatting for CLI

use airstream_core::host::{Notification, NotificationKind};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "text" => OutputFormat::Text,
            _ => OutputFormat::Table,
        }
    }
}

/// Print rows in the selected format
pub fn print_rows<T: Tabled + Serialize>(rows: &[T], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{}", table);
        }
        OutputFormat::Text => {
            for row in rows {
                let fields: Vec<String> = T::headers()
                    .iter()
                    .zip(row.fields())
                    .map(|(header, value)| format!("{}={}", header, value))
                    .collect();
                println!("{}", fields.join("  "));
            }
        }
    }
    Ok(())
}

/// Print a single value (JSON mode) or a line of text
pub fn print_value<T: Serialize>(value: &T, text: &str, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text | OutputFormat::Table => println!("{}", text),
    }
    Ok(())
}

/// Render a one-shot notification
pub fn print_notification(notification: &Notification) {
    match notification.kind {
        NotificationKind::Success => eprintln!("{} {}", style("✔").green().bold(), notification.message),
        NotificationKind::Error => eprintln!("{} {}", style("✖").red().bold(), notification.message),
    }
}

/// Spinner for a network call
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Play head bar; length and position are in milliseconds of media time
pub fn playback_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.red/white}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─"),
    );
    bar
}

/// Styled heading line
pub fn heading(text: &str) -> String {
    style(text).bold().to_string()
}

/// Dimmed secondary text
pub fn dim(text: &str) -> String {
    style(text).dim().to_string()
}
