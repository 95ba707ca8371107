//! Model registry: one immutable descriptor per supported hardware variant.
//!
//! The registry is a static ordered table. Resolution is an exact match on
//! the 4-digit model number and the first match wins.

use core::fmt;

use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};
use crate::identity::SerialNumber;
use crate::measurement::SensorKind;
use crate::uuid as ids;

/// Supported Airthings hardware variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum DeviceModel {
    /// Wave (first generation), model 2900.
    WaveGen1,
    /// Wave Mini (first generation), model 2920.
    WaveMiniGen1,
    /// Wave Plus (first generation), model 2930.
    WavePlusGen1,
    /// Wave (second generation), model 2950.
    WaveGen2,
}

impl DeviceModel {
    /// The registry descriptor for this model.
    pub fn spec(&self) -> &'static DeviceModelSpec {
        match self {
            DeviceModel::WaveGen1 => &REGISTRY[0],
            DeviceModel::WaveGen2 => &REGISTRY[1],
            DeviceModel::WaveMiniGen1 => &REGISTRY[2],
            DeviceModel::WavePlusGen1 => &REGISTRY[3],
        }
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().label)
    }
}

/// Width of one little-endian unsigned field in a raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    U8,
    U16,
    U32,
}

impl FieldType {
    /// Size of the field in bytes.
    pub const fn size(self) -> usize {
        match self {
            FieldType::U8 => 1,
            FieldType::U16 => 2,
            FieldType::U32 => 4,
        }
    }
}

/// Ordered list of typed fields making up a fixed-size raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLayout {
    fields: &'static [FieldType],
}

impl PayloadLayout {
    /// Create a layout from an ordered field list.
    pub const fn new(fields: &'static [FieldType]) -> Self {
        Self { fields }
    }

    /// The fields in payload order.
    pub fn fields(&self) -> &'static [FieldType] {
        self.fields
    }

    /// Total payload size in bytes.
    pub const fn size(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < self.fields.len() {
            total += self.fields[i].size();
            i += 1;
        }
        total
    }
}

/// Where the raw payload for a model is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    /// A single data characteristic holding the whole record.
    Single(Uuid),
    /// Several characteristics read in order and concatenated.
    Concatenated(&'static [Uuid]),
}

impl PayloadSource {
    /// The characteristics to read, in order.
    pub fn characteristics(&self) -> &[Uuid] {
        match self {
            PayloadSource::Single(id) => core::slice::from_ref(id),
            PayloadSource::Concatenated(ids) => ids,
        }
    }
}

/// Which sensor kinds a model reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorCapabilities {
    pub humidity: bool,
    pub radon_short_term_avg: bool,
    pub radon_long_term_avg: bool,
    pub temperature: bool,
    pub atmospheric_pressure: bool,
    pub co2: bool,
    pub voc: bool,
}

impl SensorCapabilities {
    /// Whether the model reports the given kind.
    pub fn supports(&self, kind: SensorKind) -> bool {
        match kind {
            SensorKind::Humidity => self.humidity,
            SensorKind::RadonShortTermAvg => self.radon_short_term_avg,
            SensorKind::RadonLongTermAvg => self.radon_long_term_avg,
            SensorKind::Temperature => self.temperature,
            SensorKind::AtmosphericPressure => self.atmospheric_pressure,
            SensorKind::Co2 => self.co2,
            SensorKind::Voc => self.voc,
        }
    }

    /// Iterate over the supported kinds.
    pub fn kinds(&self) -> impl Iterator<Item = SensorKind> + '_ {
        SensorKind::ALL.into_iter().filter(|kind| self.supports(*kind))
    }
}

/// Immutable descriptor of one hardware variant.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceModelSpec {
    pub model: DeviceModel,
    /// 4-digit model number, the first four characters of the serial.
    pub model_number: &'static str,
    /// Stable machine-readable key.
    pub key: &'static str,
    /// Human-readable name.
    pub label: &'static str,
    pub layout: PayloadLayout,
    pub capabilities: SensorCapabilities,
    pub source: PayloadSource,
}

const RADON_AND_CLIMATE: SensorCapabilities = SensorCapabilities {
    humidity: true,
    radon_short_term_avg: true,
    radon_long_term_avg: true,
    temperature: true,
    atmospheric_pressure: false,
    co2: false,
    voc: false,
};

/// All supported models, in resolution order.
pub static REGISTRY: [DeviceModelSpec; 4] = [
    DeviceModelSpec {
        model: DeviceModel::WaveGen1,
        model_number: "2900",
        key: "wave_gen_1",
        label: "Wave Gen 1",
        layout: PayloadLayout::new(&[
            FieldType::U16,
            FieldType::U8,
            FieldType::U8,
            FieldType::U8,
            FieldType::U8,
            FieldType::U8,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
        ]),
        capabilities: RADON_AND_CLIMATE,
        source: PayloadSource::Concatenated(&[
            ids::DATE_TIME,
            ids::HUMIDITY,
            ids::TEMPERATURE,
            ids::RADON_SHORT_TERM_AVG,
            ids::RADON_LONG_TERM_AVG,
        ]),
    },
    DeviceModelSpec {
        model: DeviceModel::WaveGen2,
        model_number: "2950",
        key: "wave_gen_2",
        label: "Wave Gen 2",
        layout: PayloadLayout::new(&[
            FieldType::U8,
            FieldType::U8,
            FieldType::U8,
            FieldType::U8,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
        ]),
        capabilities: RADON_AND_CLIMATE,
        source: PayloadSource::Single(ids::WAVE_GEN2_CURRENT_VALUES),
    },
    DeviceModelSpec {
        model: DeviceModel::WaveMiniGen1,
        model_number: "2920",
        key: "wave_mini_gen_1",
        label: "Wave Mini Gen 1",
        layout: PayloadLayout::new(&[
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
            FieldType::U32,
            FieldType::U32,
        ]),
        capabilities: SensorCapabilities {
            humidity: true,
            radon_short_term_avg: false,
            radon_long_term_avg: false,
            temperature: true,
            atmospheric_pressure: false,
            co2: false,
            voc: true,
        },
        source: PayloadSource::Single(ids::WAVE_MINI_CURRENT_VALUES),
    },
    DeviceModelSpec {
        model: DeviceModel::WavePlusGen1,
        model_number: "2930",
        key: "wave_plus_gen_1",
        label: "Wave Plus Gen 1",
        layout: PayloadLayout::new(&[
            FieldType::U8,
            FieldType::U8,
            FieldType::U8,
            FieldType::U8,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
            FieldType::U16,
        ]),
        capabilities: SensorCapabilities {
            humidity: true,
            radon_short_term_avg: true,
            radon_long_term_avg: true,
            temperature: true,
            atmospheric_pressure: true,
            co2: true,
            voc: true,
        },
        source: PayloadSource::Single(ids::WAVE_PLUS_CURRENT_VALUES),
    },
];

/// Resolve a 4-digit model number to its registry descriptor.
///
/// ```
/// use airthings_types::{DeviceModel, resolve};
///
/// assert_eq!(resolve("2930").unwrap().model, DeviceModel::WavePlusGen1);
/// assert!(resolve("9999").is_err());
/// ```
pub fn resolve(model_number: &str) -> ParseResult<&'static DeviceModelSpec> {
    REGISTRY
        .iter()
        .find(|spec| spec.model_number == model_number)
        .ok_or_else(|| ParseError::UnknownModel(model_number.to_string()))
}

/// Resolve the model of a device from its serial number.
pub fn resolve_serial(serial: &SerialNumber) -> ParseResult<&'static DeviceModelSpec> {
    resolve(serial.model_number())
}
