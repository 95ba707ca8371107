//! Device identity: serial numbers and manufacturer advertisement decoding.
//!
//! An Airthings serial number is 10 ASCII digits. The first four digits are
//! the model number, the remaining six are the per-device identifier. The
//! serial number reaches us by one of two paths:
//!
//! - the manufacturer-specific data of a BLE advertisement, see
//!   [`decode_identity`]
//! - the Device Information model number and serial number characteristics,
//!   see [`SerialNumber::from_parts`]
//!
//! Both paths produce the same [`SerialNumber`].

use core::fmt;

use bytes::Buf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// Company / message index carried by every Airthings advertisement record.
pub const AIRTHINGS_COMPANY_ID: u16 = 0x0334;

/// Size of the manufacturer record: `u16` index, `u32` serial, `u16` reserved.
pub const MANUFACTURER_RECORD_LEN: usize = 8;

/// Number of characters of the serial number that form the model number.
pub const MODEL_NUMBER_LEN: usize = 4;

/// Number of characters of a serial number.
pub const SERIAL_NUMBER_LEN: usize = 10;

/// A validated 10-digit Airthings serial number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct SerialNumber(String);

impl SerialNumber {
    /// Parse a serial number, requiring exactly 10 ASCII digits.
    ///
    /// ```
    /// use airthings_types::SerialNumber;
    ///
    /// let serial = SerialNumber::parse("2930123456").unwrap();
    /// assert_eq!(serial.model_number(), "2930");
    /// assert_eq!(serial.identifier(), "123456");
    /// assert!(SerialNumber::parse("29301").is_err());
    /// ```
    pub fn parse(value: &str) -> ParseResult<Self> {
        if value.len() == SERIAL_NUMBER_LEN && value.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(value.to_string()))
        } else {
            Err(ParseError::InvalidSerialNumber(value.to_string()))
        }
    }

    /// Build a serial number from the two identity characteristic strings.
    ///
    /// The model number string and the identifier string are concatenated in
    /// that order. Devices pad characteristic strings inconsistently, so
    /// trailing NUL bytes and surrounding whitespace are stripped first.
    pub fn from_parts(model_number: &str, identifier: &str) -> ParseResult<Self> {
        let model_number = clean_characteristic_string(model_number);
        let identifier = clean_characteristic_string(identifier);
        Self::parse(&format!("{model_number}{identifier}"))
    }

    /// Build a serial number from the integer carried in an advertisement,
    /// zero-padded to 10 digits.
    pub fn from_advertised(value: u32) -> Self {
        // u32::MAX has exactly 10 digits, so the padded form is always valid.
        Self(format!("{value:010}"))
    }

    /// The 4-digit model number.
    pub fn model_number(&self) -> &str {
        &self.0[..MODEL_NUMBER_LEN]
    }

    /// The 6-digit per-device identifier.
    pub fn identifier(&self) -> &str {
        &self.0[MODEL_NUMBER_LEN..]
    }

    /// The full serial number.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SerialNumber {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SerialNumber> for String {
    fn from(serial: SerialNumber) -> Self {
        serial.0
    }
}

impl core::str::FromStr for SerialNumber {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Identity of a physical device: link-layer address plus serial number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceIdentity {
    /// Link-layer address (MAC address on Linux/Windows, peripheral UUID on macOS).
    pub mac_address: String,
    /// The 10-digit serial number.
    pub serial_number: SerialNumber,
}

impl DeviceIdentity {
    /// Create an identity from an address and serial number.
    pub fn new(mac_address: impl Into<String>, serial_number: SerialNumber) -> Self {
        Self {
            mac_address: mac_address.into(),
            serial_number,
        }
    }

    /// The 4-digit model number.
    pub fn model_number(&self) -> &str {
        self.serial_number.model_number()
    }

    /// The 6-digit per-device identifier.
    pub fn identifier(&self) -> &str {
        self.serial_number.identifier()
    }
}

/// Decode the serial number from a manufacturer-specific advertisement record.
///
/// The record is exactly 8 little-endian bytes: `u16` company index, `u32`
/// encoded serial number, `u16` reserved. Returns `None` when the record has
/// any other length or the index is not [`AIRTHINGS_COMPANY_ID`]; such
/// advertisements simply belong to some other device.
///
/// ```
/// use airthings_types::decode_identity;
///
/// let record = [0x34, 0x03, 0x40, 0x26, 0xa5, 0xae, 0x09, 0x00];
/// assert_eq!(decode_identity(&record).unwrap().as_str(), "2930058816");
///
/// assert!(decode_identity(&[0x99, 0x04, 0, 0, 0, 0, 0, 0]).is_none());
/// assert!(decode_identity(&[0x34, 0x03]).is_none());
/// ```
pub fn decode_identity(record: &[u8]) -> Option<SerialNumber> {
    if record.len() != MANUFACTURER_RECORD_LEN {
        return None;
    }

    let mut buf = record;
    let index = buf.get_u16_le();
    let serial = buf.get_u32_le();
    let _reserved = buf.get_u16_le();

    (index == AIRTHINGS_COMPANY_ID).then(|| SerialNumber::from_advertised(serial))
}

/// Encode a manufacturer record the way a device advertises it.
///
/// Serial numbers whose integer value exceeds `u32::MAX` cannot be advertised
/// and yield `None`.
pub fn encode_identity(serial: &SerialNumber) -> Option<[u8; MANUFACTURER_RECORD_LEN]> {
    let value: u32 = serial.as_str().parse().ok()?;
    let mut record = [0u8; MANUFACTURER_RECORD_LEN];
    record[..2].copy_from_slice(&AIRTHINGS_COMPANY_ID.to_le_bytes());
    record[2..6].copy_from_slice(&value.to_le_bytes());
    Some(record)
}

fn clean_characteristic_string(value: &str) -> &str {
    value.trim_end_matches('\0').trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_serial_number_split() {
        let serial = SerialNumber::parse("2950012345").unwrap();
        assert_eq!(serial.model_number(), "2950");
        assert_eq!(serial.identifier(), "012345");
        assert_eq!(serial.to_string(), "2950012345");
    }

    #[test]
    fn test_serial_number_rejects_bad_input() {
        assert!(SerialNumber::parse("").is_err());
        assert!(SerialNumber::parse("295001234").is_err());
        assert!(SerialNumber::parse("29500123456").is_err());
        assert!(SerialNumber::parse("29500A2345").is_err());
        assert_eq!(
            SerialNumber::parse("abc"),
            Err(ParseError::InvalidSerialNumber("abc".to_string()))
        );
    }

    #[test]
    fn test_from_parts_concatenates_model_and_identifier() {
        let serial = SerialNumber::from_parts("2930", "001122").unwrap();
        assert_eq!(serial.as_str(), "2930001122");
    }

    #[test]
    fn test_from_parts_strips_padding() {
        let serial = SerialNumber::from_parts("2920\0", " 123456\0\0").unwrap();
        assert_eq!(serial.as_str(), "2920123456");
    }

    #[test]
    fn test_from_parts_rejects_short_identifier() {
        assert!(SerialNumber::from_parts("2920", "1234").is_err());
    }

    #[test]
    fn test_advertised_serial_is_zero_padded() {
        assert_eq!(SerialNumber::from_advertised(42).as_str(), "0000000042");
        assert_eq!(SerialNumber::from_advertised(u32::MAX).as_str(), "4294967295");
    }

    #[test]
    fn test_decode_identity_wave_plus() {
        // 2930058816 = 0xAEA52640
        let record = [0x34, 0x03, 0x40, 0x26, 0xA5, 0xAE, 0x09, 0x00];
        let serial = decode_identity(&record).unwrap();
        assert_eq!(serial.model_number(), "2930");
        assert_eq!(serial.identifier(), "058816");
    }

    #[test]
    fn test_decode_identity_wrong_index() {
        let record = [0x35, 0x03, 0x40, 0x26, 0xA5, 0xAE, 0x09, 0x00];
        assert!(decode_identity(&record).is_none());
    }

    #[test]
    fn test_decode_identity_wrong_length() {
        assert!(decode_identity(&[]).is_none());
        assert!(decode_identity(&[0x34, 0x03, 0x40, 0x26, 0xA5, 0xAE, 0x09]).is_none());
        assert!(
            decode_identity(&[0x34, 0x03, 0x40, 0x26, 0xA5, 0xAE, 0x09, 0x00, 0x00]).is_none()
        );
    }

    #[test]
    fn test_both_identity_paths_agree() {
        let advertised = decode_identity(&[0x34, 0x03, 0x40, 0x26, 0xA5, 0xAE, 0x09, 0x00]);
        let read = SerialNumber::from_parts("2930", "058816").ok();
        assert_eq!(advertised, read);

        let a = DeviceIdentity::new("AA:BB:CC:DD:EE:FF", advertised.unwrap());
        let b = DeviceIdentity::new("AA:BB:CC:DD:EE:FF", read.unwrap());
        assert_eq!(a, b);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serial_number_serde_validates() {
        let serial: SerialNumber = serde_json::from_str("\"2950012345\"").unwrap();
        assert_eq!(serial.model_number(), "2950");
        assert!(serde_json::from_str::<SerialNumber>("\"12\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_valid_record_recovers_padded_serial(value: u32, reserved: u16) {
            let mut record = Vec::with_capacity(8);
            record.extend_from_slice(&AIRTHINGS_COMPANY_ID.to_le_bytes());
            record.extend_from_slice(&value.to_le_bytes());
            record.extend_from_slice(&reserved.to_le_bytes());

            let serial = decode_identity(&record).unwrap();
            prop_assert_eq!(serial.as_str().len(), 10);
            prop_assert_eq!(serial.as_str(), format!("{:010}", value));
        }

        #[test]
        fn prop_other_index_never_matches(index: u16, value: u32) {
            prop_assume!(index != AIRTHINGS_COMPANY_ID);
            let mut record = Vec::with_capacity(8);
            record.extend_from_slice(&index.to_le_bytes());
            record.extend_from_slice(&value.to_le_bytes());
            record.extend_from_slice(&[0, 0]);
            prop_assert!(decode_identity(&record).is_none());
        }

        #[test]
        fn prop_wrong_length_never_matches(bytes in proptest::collection::vec(any::<u8>(), 0..32)) {
            prop_assume!(bytes.len() != MANUFACTURER_RECORD_LEN);
            prop_assert!(decode_identity(&bytes).is_none());
        }

        #[test]
        fn prop_encode_then_decode(value: u32) {
            let serial = SerialNumber::from_advertised(value);
            let record = encode_identity(&serial).unwrap();
            prop_assert_eq!(decode_identity(&record), Some(serial));
        }
    }
}
