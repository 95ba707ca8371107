//! Utility functions for CLI operations.

use std::io::{self, Write};
use std::path::PathBuf;

use airthings_core::{AcquisitionConfig, Acquirer, BleTransport, Transport};
use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

/// Create an acquirer on the first Bluetooth adapter.
pub async fn ble_acquirer(config: AcquisitionConfig) -> Result<Acquirer<BleTransport>> {
    let transport = BleTransport::new()
        .await
        .context("Failed to open Bluetooth adapter")?;
    acquirer_with_interrupt(transport, config)
}

/// Create an acquirer that is cancelled when the user presses Ctrl-C.
pub fn acquirer_with_interrupt<T: Transport>(
    transport: T,
    config: AcquisitionConfig,
) -> Result<Acquirer<T>> {
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nInterrupted, stopping...");
                watcher.cancel();
            }
            _ = watcher.cancelled() => {}
        }
    });

    let acquirer = Acquirer::new(transport, config)
        .context("Invalid acquisition settings")?
        .with_cancellation(cancel);
    Ok(acquirer)
}

/// Write output to file or stdout.
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}
