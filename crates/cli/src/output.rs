//! Output formatting utilities

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Currency suffix used for displayed prices
const CURRENCY: &str = "DT";

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Print a rounded table, or a note when there is nothing to show
pub fn print_table<T: Tabled>(items: &[T]) {
    if items.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(items).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a section heading
pub fn print_heading(title: &str) {
    println!("{}", title.bold());
    println!("{}", "=".repeat(50));
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a price with two decimals and the currency suffix
pub fn format_price(amount: f64) -> String {
    format!("{:.2} {}", amount, CURRENCY)
}

/// Format a unix timestamp as UTC
pub fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

/// Color a prediction source or model origin label
pub fn color_label(label: &str) -> String {
    match label {
        "model" | "loaded" | "trained" => label.green().to_string(),
        "anchor_fallback" | "bootstrapped" => label.yellow().to_string(),
        "unavailable" => label.red().to_string(),
        _ => label.to_string(),
    }
}

/// Write the Prometheus text exposition of all registered metrics to stderr
pub fn dump_metrics() -> Result<()> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    eprint!("{}", String::from_utf8_lossy(&buffer));
    Ok(())
}
