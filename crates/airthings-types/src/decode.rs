//! Per-model decoding of raw current-value payloads.
//!
//! A payload is a fixed-size record of little-endian unsigned fields,
//! described by the model's [`PayloadLayout`]. Decoding first splits the
//! record into raw field values and then applies the model's scaling.

use bytes::{Buf, BufMut};
use tracing::warn;

use crate::error::{ParseError, ParseResult};
use crate::measurement::{Measurement, MeasurementSet, SensorKind, SensorValue};
use crate::model::{DeviceModel, DeviceModelSpec, FieldType, PayloadLayout, SensorCapabilities};

/// Largest raw radon value that is a real reading. Anything above signals
/// that the device has not accumulated enough measurement time.
pub const RADON_MAX_VALID: u32 = 16383;

/// Sensor version byte that Wave Plus and Wave Gen 2 are expected to report.
pub const EXPECTED_SENSOR_VERSION: u32 = 1;

/// Decode a raw payload for the given model.
///
/// ```
/// use airthings_types::{DeviceModel, decode, encode_raw};
///
/// let spec = DeviceModel::WaveGen2.spec();
/// let raw = encode_raw(&spec.layout, &[1, 90, 0, 0, 42, 38, 2150, 0, 0, 0, 0, 0]);
/// let set = decode(spec, &raw).unwrap();
/// assert_eq!(set.humidity().unwrap().value.as_f64(), Some(45.0));
/// assert!(set.co2().is_none());
/// ```
pub fn decode(spec: &DeviceModelSpec, raw: &[u8]) -> ParseResult<MeasurementSet> {
    let f = read_fields(spec, raw)?;
    let mut set = Readings::new(spec.capabilities);

    match spec.model {
        DeviceModel::WaveGen1 => {
            set.number(SensorKind::Humidity, f[6] as f64 / 100.0);
            set.number(SensorKind::Temperature, f[7] as f64 / 100.0);
            set.radon(SensorKind::RadonShortTermAvg, f[8]);
            set.radon(SensorKind::RadonLongTermAvg, f[9]);
        }
        DeviceModel::WaveMiniGen1 => {
            set.number(SensorKind::Temperature, kelvin_centi_to_celsius(f[1]));
            set.number(SensorKind::Humidity, f[3] as f64 / 100.0);
            set.number(SensorKind::Voc, f[4] as f64);
        }
        DeviceModel::WavePlusGen1 => {
            check_sensor_version(spec, f[0]);
            set.number(SensorKind::Humidity, f[1] as f64 / 2.0);
            set.radon(SensorKind::RadonShortTermAvg, f[4]);
            set.radon(SensorKind::RadonLongTermAvg, f[5]);
            set.number(SensorKind::Temperature, f[6] as f64 / 100.0);
            set.number(SensorKind::AtmosphericPressure, f[7] as f64 / 50.0);
            set.number(SensorKind::Co2, f[8] as f64);
            set.number(SensorKind::Voc, f[9] as f64);
        }
        DeviceModel::WaveGen2 => {
            check_sensor_version(spec, f[0]);
            set.number(SensorKind::Humidity, f[1] as f64 / 2.0);
            set.radon(SensorKind::RadonShortTermAvg, f[4]);
            set.radon(SensorKind::RadonLongTermAvg, f[5]);
            set.number(SensorKind::Temperature, f[6] as f64 / 100.0);
        }
    }

    Ok(set.finish())
}

/// Split a raw payload into its field values, in layout order.
pub fn read_fields(spec: &DeviceModelSpec, raw: &[u8]) -> ParseResult<Vec<u32>> {
    let expected = spec.layout.size();
    if raw.len() != expected {
        return Err(ParseError::MalformedPayload {
            model: spec.label,
            expected,
            actual: raw.len(),
        });
    }

    let mut buf = raw;
    let fields = spec
        .layout
        .fields()
        .iter()
        .map(|field| match field {
            FieldType::U8 => buf.get_u8() as u32,
            FieldType::U16 => buf.get_u16_le() as u32,
            FieldType::U32 => buf.get_u32_le(),
        })
        .collect();
    Ok(fields)
}

/// Encode raw field values into a payload with the given layout.
///
/// Values wider than their field are truncated. Missing trailing values are
/// written as zero.
pub fn encode_raw(layout: &PayloadLayout, values: &[u32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(layout.size());
    for (i, field) in layout.fields().iter().enumerate() {
        let value = values.get(i).copied().unwrap_or(0);
        match field {
            FieldType::U8 => buf.put_u8(value as u8),
            FieldType::U16 => buf.put_u16_le(value as u16),
            FieldType::U32 => buf.put_u32_le(value),
        }
    }
    buf
}

fn radon_value(raw: u32) -> SensorValue {
    if raw <= RADON_MAX_VALID {
        SensorValue::Number(raw as f64)
    } else {
        SensorValue::Unavailable
    }
}

fn kelvin_centi_to_celsius(raw: u32) -> f64 {
    ((raw as f64 / 100.0 - 273.15) * 100.0).round() / 100.0
}

fn check_sensor_version(spec: &DeviceModelSpec, version: u32) {
    if version != EXPECTED_SENSOR_VERSION {
        warn!(
            model = spec.label,
            version, "Unexpected sensor version; decoding anyway"
        );
    }
}

/// Builder that drops kinds the model does not support.
struct Readings {
    capabilities: SensorCapabilities,
    set: MeasurementSet,
}

impl Readings {
    fn new(capabilities: SensorCapabilities) -> Self {
        Self {
            capabilities,
            set: MeasurementSet::new(),
        }
    }

    fn insert(&mut self, kind: SensorKind, value: SensorValue) {
        if self.capabilities.supports(kind) {
            self.set.insert(kind, Measurement::new(kind, value));
        }
    }

    fn number(&mut self, kind: SensorKind, value: f64) {
        self.insert(kind, SensorValue::Number(value));
    }

    fn radon(&mut self, kind: SensorKind, raw: u32) {
        self.insert(kind, radon_value(raw));
    }

    fn finish(self) -> MeasurementSet {
        self.set
    }
}
