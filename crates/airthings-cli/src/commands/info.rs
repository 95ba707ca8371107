//! Info command implementation.

use std::path::PathBuf;

use airthings_core::{AcquisitionConfig, Acquirer, DiscoveryFilter, Error, Transport};
use anyhow::{Context, Result};
use tracing::warn;

use crate::cli::OutputFormat;
use crate::format::{DeviceInfo, FormatOptions, format_info_csv, format_info_json, format_info_text};
use crate::style;
use crate::util::{ble_acquirer, write_output};

/// Find the selected devices and read their revision strings.
///
/// A failed read is kept with its device; only cancellation aborts.
pub async fn collect_info<T: Transport>(
    acquirer: &Acquirer<T>,
    addresses: &[String],
    serials: &[String],
) -> Result<Vec<DeviceInfo>> {
    let devices = if !serials.is_empty() {
        acquirer
            .discover(&DiscoveryFilter::SerialNumbers(serials.to_vec()))
            .await
            .context("Failed to discover devices")?
    } else if !addresses.is_empty() {
        let mut devices = Vec::with_capacity(addresses.len());
        for address in addresses {
            let device = acquirer
                .identify(address)
                .await
                .with_context(|| format!("Failed to identify {}", address))?;
            devices.push(device);
        }
        devices
    } else {
        acquirer
            .discover(&DiscoveryFilter::All)
            .await
            .context("Failed to discover devices")?
    };

    let mut infos = Vec::with_capacity(devices.len());
    for mut device in devices {
        let info = acquirer.read_debug_info(&mut device).await;
        match &info {
            Err(Error::Cancelled) => return Err(Error::Cancelled.into()),
            Err(e) => warn!(device = %device, error = %e, "Failed to read device revisions"),
            Ok(_) => {}
        }
        infos.push(DeviceInfo { device, info });
    }
    Ok(infos)
}

pub async fn cmd_info(
    addresses: Vec<String>,
    serials: Vec<String>,
    config: AcquisitionConfig,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let target = addresses
        .first()
        .or(serials.first())
        .map_or("nearby devices", String::as_str);
    let spinner = if !quiet && matches!(format, OutputFormat::Text) {
        Some(style::info_spinner(target))
    } else {
        None
    };

    let acquirer = ble_acquirer(config).await?;
    let infos = collect_info(&acquirer, &addresses, &serials).await;

    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    let infos = infos?;

    let content = match format {
        OutputFormat::Json => format_info_json(&infos, opts)?,
        OutputFormat::Text => format_info_text(&infos, opts),
        OutputFormat::Csv => format_info_csv(&infos, opts),
    };

    write_output(output, &content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use airthings_core::{MockPeripheral, MockTransport, SerialNumber, uuids};

    const GEN2: &str = "AA:00:00:00:00:02";

    fn acquirer() -> Acquirer<MockTransport> {
        let peripheral = MockPeripheral::new(GEN2, SerialNumber::parse("2950000001").unwrap())
            .with_characteristic(uuids::FIRMWARE_REVISION, b"G-BLE-1.6.0\0".to_vec());
        let transport = MockTransport::builder().peripheral(peripheral).build();
        Acquirer::new(transport, AcquisitionConfig::quick()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_info_for_address() {
        let infos = collect_info(&acquirer(), &[GEN2.to_string()], &[])
            .await
            .unwrap();

        assert_eq!(infos.len(), 1);
        let info = infos[0].info.as_ref().unwrap();
        assert_eq!(info.firmware_revision, "G-BLE-1.6.0");
        assert_eq!(info.hardware_revision, "REV A");
    }

    #[tokio::test(start_paused = true)]
    async fn test_info_for_nearby_devices() {
        let infos = collect_info(&acquirer(), &[], &[]).await.unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].device.spec().model_number, "2950");
    }

    #[tokio::test(start_paused = true)]
    async fn test_info_unknown_address_fails() {
        let result = collect_info(&acquirer(), &["AA:00:00:00:00:09".to_string()], &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_info_cancelled() {
        let acquirer = acquirer();
        acquirer.cancellation_token().cancel();
        let result = collect_info(&acquirer, &[GEN2.to_string()], &[]).await;
        assert!(result.is_err());
    }
}
