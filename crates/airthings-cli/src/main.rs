use std::io;

use airthings_cli::cli::{Cli, Commands, OutputFormat};
use airthings_cli::commands::{cmd_config, cmd_info, cmd_read, cmd_scan};
use airthings_cli::config::{Config, resolve_devices};
use airthings_cli::format::FormatOptions;
use airthings_core::FailurePolicy;
use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "airthings", &mut io::stdout());
        return Ok(());
    }

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = Config::load();
    let format = cli
        .requested_format()
        .or_else(|| config.output_format())
        .unwrap_or_default();
    let opts = FormatOptions::new(cli.no_color || config.no_color)
        .with_no_header(cli.no_header)
        .with_compact(cli.compact)
        .with_alarms(config.show_alarms);
    let output = cli.output.as_ref();

    match cli.command {
        Commands::Scan { tuning } => {
            let acquisition = config.acquisition_config(&tuning)?;
            cmd_scan(acquisition, format, output, cli.quiet, &opts).await?;
        }
        Commands::Read {
            devices,
            tuning,
            isolate,
            no_alarms,
        } => {
            let acquisition = config.acquisition_config(&tuning)?;
            let policy = if isolate {
                FailurePolicy::Isolate
            } else {
                FailurePolicy::StopOnFirst
            };
            let opts = if no_alarms { opts.with_alarms(false) } else { opts };
            let addresses = if devices.serial.is_empty() {
                resolve_devices(devices.device, &config)
            } else {
                Vec::new()
            };
            cmd_read(
                addresses,
                devices.serial,
                acquisition,
                policy,
                format,
                output,
                cli.quiet,
                &opts,
            )
            .await?;
        }
        Commands::Info { devices, tuning } => {
            let acquisition = config.acquisition_config(&tuning)?;
            let addresses = if devices.serial.is_empty() {
                resolve_devices(devices.device, &config)
            } else {
                Vec::new()
            };
            cmd_info(
                addresses,
                devices.serial,
                acquisition,
                format,
                output,
                cli.quiet,
                &opts,
            )
            .await?;
        }
        Commands::Config { action } => {
            cmd_config(action, cli.quiet)?;
        }
        Commands::Completions { .. } => {
            // Already handled above
            unreachable!()
        }
    }

    if format == OutputFormat::Text
        && let Some(path) = output
        && !cli.quiet
    {
        eprintln!("Output written to {}", path.display());
    }

    Ok(())
}
