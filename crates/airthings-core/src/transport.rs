//! Trait abstraction over the BLE radio.
//!
//! The pipeline talks to hardware only through [`Transport`]. The
//! production implementation is [`BleTransport`](crate::BleTransport);
//! tests use [`MockTransport`](crate::MockTransport).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use airthings_types::{SerialNumber, decode_identity};

use crate::error::TransportError;

/// One advertising peripheral seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Link-layer address (MAC address, or the peripheral UUID on macOS).
    pub address: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
    /// Manufacturer-specific records, each starting with its little-endian
    /// company identifier.
    pub manufacturer_records: Vec<Vec<u8>>,
}

impl Advertisement {
    /// Create an advertisement with no name or RSSI.
    pub fn new(address: impl Into<String>, manufacturer_records: Vec<Vec<u8>>) -> Self {
        Self {
            address: address.into(),
            name: None,
            rssi: None,
            manufacturer_records,
        }
    }

    /// The Airthings serial number carried by this advertisement, if any.
    pub fn serial_number(&self) -> Option<SerialNumber> {
        self.manufacturer_records
            .iter()
            .find_map(|record| decode_identity(record))
    }
}

/// Result of asking the radio whether a link is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    /// The radio stack could not tell.
    Unknown,
}

/// Trait abstracting the radio operations the pipeline needs.
///
/// Implementations are driven sequentially: one device's connect and fetch
/// sequence owns the transport at a time.
///
/// # Example
///
/// ```ignore
/// use airthings_core::{Transport, TransportError};
///
/// async fn read_name<T: Transport>(t: &T, address: &str) -> Result<Vec<u8>, TransportError> {
///     let connection = t.connect(address).await?;
///     let name = t.read_characteristic(&connection, airthings_types::uuids::MODEL_NUMBER).await;
///     t.disconnect(connection).await?;
///     name
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// An open link to one device.
    type Connection: Send + Sync;

    /// Listen for advertisements for `timeout`.
    ///
    /// An empty list is a successful scan that saw nothing.
    async fn scan(&self, timeout: Duration) -> Result<Vec<Advertisement>, TransportError>;

    /// Open a link to the device at `address`.
    async fn connect(&self, address: &str) -> Result<Self::Connection, TransportError>;

    /// Read the value of one characteristic.
    async fn read_characteristic(
        &self,
        connection: &Self::Connection,
        uuid: Uuid,
    ) -> Result<Vec<u8>, TransportError>;

    /// Close a link.
    async fn disconnect(&self, connection: Self::Connection) -> Result<(), TransportError>;

    /// Ask whether a link is still up.
    async fn connection_status(&self, connection: &Self::Connection) -> ConnectionStatus;
}

/// A shared transport, so callers can keep a handle after moving one into an
/// [`Acquirer`](crate::Acquirer).
#[async_trait]
impl<T: Transport> Transport for Arc<T> {
    type Connection = T::Connection;

    async fn scan(&self, timeout: Duration) -> Result<Vec<Advertisement>, TransportError> {
        (**self).scan(timeout).await
    }

    async fn connect(&self, address: &str) -> Result<Self::Connection, TransportError> {
        (**self).connect(address).await
    }

    async fn read_characteristic(
        &self,
        connection: &Self::Connection,
        uuid: Uuid,
    ) -> Result<Vec<u8>, TransportError> {
        (**self).read_characteristic(connection, uuid).await
    }

    async fn disconnect(&self, connection: Self::Connection) -> Result<(), TransportError> {
        (**self).disconnect(connection).await
    }

    async fn connection_status(&self, connection: &Self::Connection) -> ConnectionStatus {
        (**self).connection_status(connection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airthings_types::encode_identity;

    #[test]
    fn test_advertisement_serial_number() {
        let serial = SerialNumber::parse("2930058816").unwrap();
        let record = encode_identity(&serial).unwrap().to_vec();
        let ad = Advertisement::new("AA:BB:CC:DD:EE:FF", vec![vec![0x4c, 0x00, 1, 2], record]);
        assert_eq!(ad.serial_number(), Some(serial));
    }

    #[test]
    fn test_advertisement_without_airthings_record() {
        let ad = Advertisement::new("AA:BB:CC:DD:EE:FF", vec![vec![0x99, 0x04, 0, 0, 0, 0, 0, 0]]);
        assert_eq!(ad.serial_number(), None);
        assert_eq!(Advertisement::new("x", Vec::new()).serial_number(), None);
    }
}
