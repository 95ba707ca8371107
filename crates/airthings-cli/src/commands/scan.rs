//! Scan command implementation.

use std::path::PathBuf;

use airthings_core::{AcquisitionConfig, DiscoveryFilter};
use anyhow::{Context, Result};

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_scan_csv, format_scan_json, format_scan_text};
use crate::style;
use crate::util::{ble_acquirer, write_output};

pub async fn cmd_scan(
    config: AcquisitionConfig,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    // Show spinner for text output (unless quiet)
    let spinner = if !quiet && matches!(format, OutputFormat::Text) {
        Some(style::scanning_spinner(config.scan_timeout))
    } else {
        None
    };

    let acquirer = ble_acquirer(config).await?;
    let devices = acquirer
        .discover(&DiscoveryFilter::All)
        .await
        .context("Failed to scan for devices");

    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    let devices = devices?;

    let content = match format {
        OutputFormat::Json => format_scan_json(&devices, opts)?,
        OutputFormat::Text => format_scan_text(&devices, opts),
        OutputFormat::Csv => format_scan_csv(&devices, opts),
    };

    write_output(output, &content)?;
    Ok(())
}
