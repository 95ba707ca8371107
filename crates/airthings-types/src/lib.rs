//! Platform-agnostic types for Airthings Wave environmental sensors.
//!
//! This crate holds everything about Airthings devices that does not need a
//! radio: it is shared by the acquisition pipeline in `airthings-core` and
//! the command line tool.
//!
//! # Features
//!
//! - Serial number and advertisement identity decoding
//! - The registry of supported models and their payload layouts
//! - Per-model decoding of raw current-value payloads
//! - Threshold-based alarm classification
//! - UUID constants for BLE characteristics
//!
//! # Example
//!
//! ```
//! use airthings_types::{AlarmRules, Severity, decode, decode_identity, encode_raw, resolve_serial};
//!
//! let serial = decode_identity(&[0x34, 0x03, 0x40, 0x26, 0xa5, 0xae, 0x09, 0x00]).unwrap();
//! let spec = resolve_serial(&serial).unwrap();
//!
//! let raw = encode_raw(&spec.layout, &[1, 90, 0, 0, 40, 42, 2150, 50_000, 1200, 100]);
//! let mut readings = decode(spec, &raw).unwrap();
//! AlarmRules::default().annotate(&mut readings);
//!
//! assert_eq!(readings.co2().unwrap().alarm.unwrap().severity, Severity::High);
//! ```

pub mod alarm;
pub mod decode;
pub mod error;
pub mod identity;
pub mod measurement;
pub mod model;
pub mod uuid;

pub use alarm::{AlarmRuleSet, AlarmRules, AlarmState, Comparator, Condition, Severity, classify};
pub use decode::{decode, encode_raw, read_fields};
pub use error::{ParseError, ParseResult};
pub use identity::{
    AIRTHINGS_COMPANY_ID, DeviceIdentity, SerialNumber, decode_identity, encode_identity,
};
pub use measurement::{Measurement, MeasurementSet, SensorKind, SensorValue};
pub use model::{
    DeviceModel, DeviceModelSpec, FieldType, PayloadLayout, PayloadSource, REGISTRY,
    SensorCapabilities, resolve, resolve_serial,
};
pub use uuid as uuids;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advertisement_to_alarms() {
        // Wave Gen 2, serial 2950012345
        let serial = SerialNumber::parse("2950012345").unwrap();
        let record = encode_identity(&serial).unwrap();
        let decoded = decode_identity(&record).unwrap();
        let spec = resolve_serial(&decoded).unwrap();
        assert_eq!(spec.model, DeviceModel::WaveGen2);

        let raw = encode_raw(&spec.layout, &[1, 150, 0, 0, 160, 90, 2300]);
        let mut readings = decode(spec, &raw).unwrap();
        AlarmRules::default().annotate(&mut readings);

        let humidity = readings.humidity().unwrap();
        assert_eq!(humidity.value, SensorValue::Number(75.0));
        assert_eq!(humidity.alarm.unwrap().severity, Severity::High);

        let sta = readings.radon_short_term_avg().unwrap();
        assert_eq!(sta.alarm.unwrap().severity, Severity::High);
        let lta = readings.radon_long_term_avg().unwrap();
        assert_eq!(lta.alarm.unwrap().severity, Severity::None);

        assert_eq!(readings.alarms().count(), 2);
    }

    #[test]
    fn test_unknown_model_error_names_model() {
        let serial = SerialNumber::parse("3100000001").unwrap();
        let err = resolve_serial(&serial).unwrap_err();
        assert_eq!(err.to_string(), "Airthings model number 3100 is not implemented");
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::MalformedPayload {
            model: "Wave Mini Gen 1",
            expected: 20,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "Malformed Wave Mini Gen 1 payload: expected 20 bytes, got 4"
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_annotated_set_serialization() {
        let spec = DeviceModel::WaveMiniGen1.spec();
        let raw = encode_raw(&spec.layout, &[0, 29415, 0, 5000, 300]);
        let mut readings = decode(spec, &raw).unwrap();
        AlarmRules::default().annotate(&mut readings);

        let json = serde_json::to_value(&readings).unwrap();
        assert_eq!(json["voc"]["value"]["status"], "number");
        assert_eq!(json["voc"]["value"]["value"], 300.0);
        assert_eq!(json["voc"]["alarm"]["severity"], "medium");
        assert_eq!(json["humidity"]["unit"], "%rH");
    }
}
