//! Sensor kinds, measurements and measurement sets.

use core::fmt;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::alarm::AlarmState;

/// A kind of sensor reading an Airthings device can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SensorKind {
    /// Relative humidity.
    Humidity,
    /// Radon, 24 hour average.
    RadonShortTermAvg,
    /// Radon, long term average.
    RadonLongTermAvg,
    /// Temperature.
    Temperature,
    /// Atmospheric pressure.
    AtmosphericPressure,
    /// Carbon dioxide concentration.
    Co2,
    /// Total volatile organic compounds.
    Voc,
}

impl SensorKind {
    /// Every sensor kind, in display order.
    pub const ALL: [SensorKind; 7] = [
        SensorKind::Humidity,
        SensorKind::RadonShortTermAvg,
        SensorKind::RadonLongTermAvg,
        SensorKind::Temperature,
        SensorKind::AtmosphericPressure,
        SensorKind::Co2,
        SensorKind::Voc,
    ];

    /// Stable machine-readable key.
    pub fn key(&self) -> &'static str {
        match self {
            SensorKind::Humidity => "humidity",
            SensorKind::RadonShortTermAvg => "radon_short_term_avg",
            SensorKind::RadonLongTermAvg => "radon_long_term_avg",
            SensorKind::Temperature => "temperature",
            SensorKind::AtmosphericPressure => "atmospheric_pressure",
            SensorKind::Co2 => "co2",
            SensorKind::Voc => "voc",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            SensorKind::Humidity => "Humidity",
            SensorKind::RadonShortTermAvg => "Radon Short Term Average",
            SensorKind::RadonLongTermAvg => "Radon Long Term Average",
            SensorKind::Temperature => "Temperature",
            SensorKind::AtmosphericPressure => "Atmospheric pressure",
            SensorKind::Co2 => "CO2",
            SensorKind::Voc => "VOC",
        }
    }

    /// Physical unit of the decoded value.
    pub fn unit(&self) -> &'static str {
        match self {
            SensorKind::Humidity => "%rH",
            SensorKind::RadonShortTermAvg | SensorKind::RadonLongTermAvg => "Bq/m3",
            SensorKind::Temperature => "°C",
            SensorKind::AtmosphericPressure => "hPa",
            SensorKind::Co2 => "ppm",
            SensorKind::Voc => "ppb",
        }
    }

    /// Look up a kind by its [`key`](Self::key).
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A decoded sensor value.
///
/// Radon sensors report a sentinel until they have accumulated enough data;
/// that reading is [`SensorValue::Unavailable`] rather than a number.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case", tag = "status", content = "value"))]
pub enum SensorValue {
    /// A numeric reading in the kind's unit.
    Number(f64),
    /// The device has not accumulated enough data yet.
    Unavailable,
}

impl SensorValue {
    /// The numeric value, if available.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SensorValue::Number(v) => Some(*v),
            SensorValue::Unavailable => None,
        }
    }

    /// Whether the value is available.
    pub fn is_available(&self) -> bool {
        matches!(self, SensorValue::Number(_))
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Number(v) => write!(f, "{v}"),
            SensorValue::Unavailable => f.write_str("N/A"),
        }
    }
}

impl From<f64> for SensorValue {
    fn from(value: f64) -> Self {
        SensorValue::Number(value)
    }
}

/// One sensor reading with its unit and, once evaluated, its alarm state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Measurement {
    /// The decoded value.
    pub value: SensorValue,
    /// Unit of `value`.
    pub unit: &'static str,
    /// Alarm state; `None` until evaluated, and for sensors without rules.
    pub alarm: Option<AlarmState>,
}

impl Measurement {
    /// Create an unevaluated measurement for a sensor kind.
    pub fn new(kind: SensorKind, value: SensorValue) -> Self {
        Self {
            value,
            unit: kind.unit(),
            alarm: None,
        }
    }

    /// Whether the measurement currently triggers an alarm.
    pub fn has_alarm(&self) -> bool {
        self.alarm.as_ref().is_some_and(AlarmState::is_important)
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            SensorValue::Number(_) => write!(f, "{} {}", self.value, self.unit),
            SensorValue::Unavailable => write!(f, "{}", self.value),
        }
    }
}

/// The readings decoded from one payload, keyed by sensor kind.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MeasurementSet {
    readings: BTreeMap<SensorKind, Measurement>,
}

impl MeasurementSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the measurement for a kind.
    pub fn insert(&mut self, kind: SensorKind, measurement: Measurement) {
        self.readings.insert(kind, measurement);
    }

    /// Get the measurement for a kind.
    pub fn get(&self, kind: SensorKind) -> Option<&Measurement> {
        self.readings.get(&kind)
    }

    /// Get a mutable reference to the measurement for a kind.
    pub fn get_mut(&mut self, kind: SensorKind) -> Option<&mut Measurement> {
        self.readings.get_mut(&kind)
    }

    /// Whether the set has a measurement for a kind.
    pub fn contains(&self, kind: SensorKind) -> bool {
        self.readings.contains_key(&kind)
    }

    /// Number of measurements.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Iterate over measurements in [`SensorKind`] order.
    pub fn iter(&self) -> impl Iterator<Item = (SensorKind, &Measurement)> {
        self.readings.iter().map(|(kind, m)| (*kind, m))
    }

    /// Iterate mutably over measurements.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SensorKind, &mut Measurement)> {
        self.readings.iter_mut().map(|(kind, m)| (*kind, m))
    }

    /// Measurements that currently trigger an alarm.
    pub fn alarms(&self) -> impl Iterator<Item = (SensorKind, &Measurement)> {
        self.iter().filter(|(_, m)| m.has_alarm())
    }

    pub fn humidity(&self) -> Option<&Measurement> {
        self.get(SensorKind::Humidity)
    }

    pub fn radon_short_term_avg(&self) -> Option<&Measurement> {
        self.get(SensorKind::RadonShortTermAvg)
    }

    pub fn radon_long_term_avg(&self) -> Option<&Measurement> {
        self.get(SensorKind::RadonLongTermAvg)
    }

    pub fn temperature(&self) -> Option<&Measurement> {
        self.get(SensorKind::Temperature)
    }

    pub fn atmospheric_pressure(&self) -> Option<&Measurement> {
        self.get(SensorKind::AtmosphericPressure)
    }

    pub fn co2(&self) -> Option<&Measurement> {
        self.get(SensorKind::Co2)
    }

    pub fn voc(&self) -> Option<&Measurement> {
        self.get(SensorKind::Voc)
    }
}
