//! Output formatting utilities for text, JSON, and CSV output.

use airthings_core::{DebugInfo, Device, DeviceOutcome};
use airthings_types::{Measurement, SensorKind, SensorValue, Severity};
use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::style;

/// Formatting options for output.
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Omit header row in CSV output.
    pub no_header: bool,
    /// Use compact JSON output (no pretty-printing).
    pub compact: bool,
    /// Show alarm severities next to readings.
    pub show_alarms: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            no_color: false,
            no_header: false,
            compact: false,
            show_alarms: true,
        }
    }
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self {
            no_color,
            ..Self::default()
        }
    }

    /// Create with no_header option for CSV output.
    #[must_use]
    pub fn with_no_header(mut self, no_header: bool) -> Self {
        self.no_header = no_header;
        self
    }

    /// Create with compact JSON option.
    #[must_use]
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Create with alarm display option.
    #[must_use]
    pub fn with_alarms(mut self, show_alarms: bool) -> Self {
        self.show_alarms = show_alarms;
        self
    }

    /// Serialize value to JSON string, respecting compact option.
    pub fn as_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }
}

/// Escape a value for a CSV field.
pub fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Format a reading's number with the precision its sensor reports.
#[must_use]
pub fn format_value(kind: SensorKind, value: SensorValue) -> String {
    match value {
        SensorValue::Unavailable => "N/A".to_string(),
        SensorValue::Number(v) => match kind {
            SensorKind::Humidity | SensorKind::AtmosphericPressure => format!("{:.1}", v),
            SensorKind::Temperature => format!("{:.2}", v),
            SensorKind::RadonShortTermAvg
            | SensorKind::RadonLongTermAvg
            | SensorKind::Co2
            | SensorKind::Voc => format!("{:.0}", v),
        },
    }
}

fn severity_of(measurement: &Measurement) -> Option<Severity> {
    measurement.alarm.map(|a| a.severity)
}

// ============================================================================
// Scan
// ============================================================================

#[derive(Debug, Serialize)]
struct DeviceJson<'a> {
    address: &'a str,
    serial_number: &'a str,
    identifier: &'a str,
    model: &'static str,
    model_number: &'static str,
}

impl<'a> DeviceJson<'a> {
    fn new(device: &'a Device) -> Self {
        Self {
            address: device.address(),
            serial_number: device.serial_number().as_str(),
            identifier: device.identifier(),
            model: device.spec().key,
            model_number: device.spec().model_number,
        }
    }
}

pub fn format_scan_json(devices: &[Device], opts: &FormatOptions) -> Result<String> {
    let rows: Vec<DeviceJson<'_>> = devices.iter().map(DeviceJson::new).collect();
    opts.as_json(&serde_json::json!({
        "count": rows.len(),
        "devices": rows,
    }))
}

#[must_use]
pub fn format_scan_text(devices: &[Device], opts: &FormatOptions) -> String {
    use tabled::{Table, Tabled};

    if devices.is_empty() {
        return "No Airthings devices found.\n".to_string();
    }

    #[derive(Tabled)]
    struct DeviceRow {
        #[tabled(rename = "Model")]
        model: String,
        #[tabled(rename = "Serial")]
        serial: String,
        #[tabled(rename = "Address")]
        address: String,
    }

    let rows: Vec<DeviceRow> = devices
        .iter()
        .map(|d| DeviceRow {
            model: if opts.no_color {
                d.spec().label.to_string()
            } else {
                format!("{}", d.spec().label.cyan())
            },
            serial: d.serial_number().to_string(),
            address: d.address().to_string(),
        })
        .collect();

    let count = if opts.no_color {
        devices.len().to_string()
    } else {
        format!("{}", devices.len().to_string().green().bold())
    };

    let mut table = Table::new(rows);
    style::apply_table_style(&mut table, opts.no_color);
    format!("Found {} Airthings device(s)\n\n{}\n", count, table)
}

#[must_use]
pub fn format_scan_csv(devices: &[Device], opts: &FormatOptions) -> String {
    let mut output = if opts.no_header {
        String::new()
    } else {
        "address,serial_number,identifier,model,model_number\n".to_string()
    };
    for d in devices {
        output.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_escape(d.address()),
            d.serial_number(),
            d.identifier(),
            d.spec().key,
            d.spec().model_number
        ));
    }
    output
}

// ============================================================================
// Read
// ============================================================================

#[derive(Debug, Serialize)]
struct MeasurementJson {
    value: Option<f64>,
    unit: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    severity: Option<Severity>,
}

#[derive(Debug, Serialize)]
struct ReadingJson<'a> {
    #[serde(flatten)]
    device: Option<DeviceJson<'a>>,
    /// Set only when the device could not be identified.
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<&'a str>,
    state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    measurements: Option<std::collections::BTreeMap<&'static str, MeasurementJson>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn format_read_json(outcomes: &[DeviceOutcome], opts: &FormatOptions) -> Result<String> {
    let readings: Vec<ReadingJson<'_>> = outcomes
        .iter()
        .map(|outcome| ReadingJson {
            device: outcome.device.as_ref().map(DeviceJson::new),
            address: outcome
                .device
                .is_none()
                .then_some(outcome.address.as_str()),
            state: outcome.state().to_string(),
            measurements: outcome.measurements().map(|set| {
                set.iter()
                    .map(|(kind, m)| {
                        let json = MeasurementJson {
                            value: m.value.as_f64(),
                            unit: m.unit,
                            severity: severity_of(m).filter(|_| opts.show_alarms),
                        };
                        (kind.key(), json)
                    })
                    .collect()
            }),
            error: outcome.result.as_ref().err().map(ToString::to_string),
        })
        .collect();
    opts.as_json(&readings)
}

#[must_use]
pub fn format_read_text(outcomes: &[DeviceOutcome], opts: &FormatOptions) -> String {
    if outcomes.is_empty() {
        return "No Airthings devices found.\n".to_string();
    }

    let mut output = String::new();
    for (i, outcome) in outcomes.iter().enumerate() {
        if i > 0 {
            output.push('\n');
        }
        match &outcome.device {
            Some(device) => output.push_str(&format_device_heading(device, opts)),
            None => output.push_str(&format_unidentified_heading(&outcome.address, opts)),
        }

        if let Err(e) = &outcome.result {
            let line = format!("Failed: {}", e);
            if opts.no_color {
                output.push_str(&format!("  {}\n", line));
            } else {
                output.push_str(&format!("  {}\n", line.red()));
            }
            continue;
        }

        let Some(set) = outcome.measurements() else {
            output.push_str("  No readings\n");
            continue;
        };

        let width = set.iter().map(|(k, _)| k.label().len()).max().unwrap_or(0);
        for (kind, m) in set.iter() {
            let value = match m.value {
                SensorValue::Number(_) => format!("{} {}", format_value(kind, m.value), m.unit),
                SensorValue::Unavailable => format_value(kind, m.value),
            };
            let severity = severity_of(m);
            let value = style::color_by_severity(&value, severity, opts.no_color);
            output.push_str(&format!("  {:<width$}  {}", kind.label(), value, width = width));
            if opts.show_alarms
                && let Some(severity) = severity
            {
                output.push_str(&format!(
                    "  [{}]",
                    style::format_severity(severity, opts.no_color)
                ));
            }
            output.push('\n');
        }
    }
    output
}

#[must_use]
pub fn format_read_csv(outcomes: &[DeviceOutcome], opts: &FormatOptions) -> String {
    let mut output = if opts.no_header {
        String::new()
    } else {
        "address,serial_number,model,sensor,value,unit,severity\n".to_string()
    };
    for outcome in outcomes {
        let (Some(device), Some(set)) = (&outcome.device, outcome.measurements()) else {
            continue;
        };
        for (kind, m) in set.iter() {
            let value = m.value.as_f64().map(|v| v.to_string()).unwrap_or_default();
            let severity = severity_of(m)
                .filter(|_| opts.show_alarms)
                .map(|s| s.label().to_lowercase())
                .unwrap_or_default();
            output.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                csv_escape(device.address()),
                device.serial_number(),
                device.spec().key,
                kind.key(),
                value,
                csv_escape(m.unit),
                severity
            ));
        }
    }
    output
}

fn format_device_heading(device: &Device, opts: &FormatOptions) -> String {
    if opts.no_color {
        format!("{}\n", device)
    } else {
        format!(
            "{} {} ({})\n",
            device.spec().label.bold(),
            device.serial_number(),
            device.address().dimmed()
        )
    }
}

fn format_unidentified_heading(address: &str, opts: &FormatOptions) -> String {
    if opts.no_color {
        format!("Unidentified device ({})\n", address)
    } else {
        format!("{} ({})\n", "Unidentified device".bold(), address.dimmed())
    }
}

// ============================================================================
// Info
// ============================================================================

#[derive(Debug, Serialize)]
struct InfoJson<'a> {
    #[serde(flatten)]
    device: DeviceJson<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    firmware_revision: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hardware_revision: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// One device with the result of its revision read.
pub struct DeviceInfo {
    pub device: Device,
    pub info: airthings_core::Result<DebugInfo>,
}

pub fn format_info_json(infos: &[DeviceInfo], opts: &FormatOptions) -> Result<String> {
    let rows: Vec<InfoJson<'_>> = infos
        .iter()
        .map(|entry| {
            let info = entry.info.as_ref().ok();
            InfoJson {
                device: DeviceJson::new(&entry.device),
                firmware_revision: info.map(|i| i.firmware_revision.as_str()),
                hardware_revision: info.map(|i| i.hardware_revision.as_str()),
                error: entry.info.as_ref().err().map(ToString::to_string),
            }
        })
        .collect();
    opts.as_json(&rows)
}

#[must_use]
pub fn format_info_text(infos: &[DeviceInfo], opts: &FormatOptions) -> String {
    if infos.is_empty() {
        return "No Airthings devices found.\n".to_string();
    }

    let mut output = String::new();
    for (i, entry) in infos.iter().enumerate() {
        if i > 0 {
            output.push('\n');
        }
        output.push_str(&format_device_heading(&entry.device, opts));
        output.push_str(&format!("  Model number:  {}\n", entry.device.spec().model_number));
        match &entry.info {
            Ok(info) => {
                output.push_str(&format!("  Firmware:      {}\n", info.firmware_revision));
                output.push_str(&format!("  Hardware:      {}\n", info.hardware_revision));
            }
            Err(e) => {
                let line = format!("Failed: {}", e);
                if opts.no_color {
                    output.push_str(&format!("  {}\n", line));
                } else {
                    output.push_str(&format!("  {}\n", line.red()));
                }
            }
        }
    }
    output
}

#[must_use]
pub fn format_info_csv(infos: &[DeviceInfo], opts: &FormatOptions) -> String {
    let mut output = if opts.no_header {
        String::new()
    } else {
        "address,serial_number,model,firmware_revision,hardware_revision\n".to_string()
    };
    for entry in infos {
        let Ok(info) = &entry.info else {
            continue;
        };
        output.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_escape(entry.device.address()),
            entry.device.serial_number(),
            entry.device.spec().key,
            csv_escape(&info.firmware_revision),
            csv_escape(&info.hardware_revision)
        ));
    }
    output
}
