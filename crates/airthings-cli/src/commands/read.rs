//! Read command implementation.

use std::path::PathBuf;

use airthings_core::{AcquisitionConfig, Acquirer, DeviceOutcome, FailurePolicy, Transport};
use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_read_csv, format_read_json, format_read_text};
use crate::style;
use crate::util::{ble_acquirer, write_output};

/// Acquire readings from the selected devices.
///
/// Serial numbers take precedence over addresses; with neither, every
/// nearby device is read.
pub async fn read_devices<T: Transport>(
    acquirer: &Acquirer<T>,
    addresses: &[String],
    serials: &[String],
) -> Result<Vec<DeviceOutcome>> {
    let outcomes = if !serials.is_empty() {
        acquirer.fetch_from_serial_numbers(serials).await
    } else if !addresses.is_empty() {
        acquirer.fetch_from_addresses(addresses).await
    } else {
        acquirer.fetch_all().await
    };
    outcomes.context("Failed to read devices")
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_read(
    addresses: Vec<String>,
    serials: Vec<String>,
    config: AcquisitionConfig,
    policy: FailurePolicy,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let spinner = if !quiet && matches!(format, OutputFormat::Text) {
        Some(style::reading_spinner(addresses.len().max(serials.len())))
    } else {
        None
    };

    let acquirer = ble_acquirer(config).await?.with_failure_policy(policy);
    let outcomes = read_devices(&acquirer, &addresses, &serials).await;

    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    let outcomes = outcomes?;

    let content = match format {
        OutputFormat::Json => format_read_json(&outcomes, opts)?,
        OutputFormat::Text => format_read_text(&outcomes, opts),
        OutputFormat::Csv => format_read_csv(&outcomes, opts),
    };
    write_output(output, &content)?;

    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    info!(total = outcomes.len(), failed, "Read finished");
    if failed > 0 {
        bail!("{} of {} device(s) failed", failed, outcomes.len());
    }
    Ok(())
}
