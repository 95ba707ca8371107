//! Mock transport implementation for testing.
//!
//! This module provides a scriptable [`Transport`] that can be used for
//! unit testing without requiring actual BLE hardware.
//!
//! # Features
//!
//! - **Scripted devices**: Each [`MockPeripheral`] advertises a serial number
//!   and serves raw characteristic values
//! - **Failure injection**: Fail the next N scans, connects or reads, or drop
//!   the link on the next N reads
//! - **Call counters**: Count scans, connects, reads and disconnects to check
//!   retry budgets
//! - **Adapter cache**: Peripherals can start out unseen, so that `connect`
//!   has to scan for them the way a cold Bluetooth adapter does

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use airthings_types::{SerialNumber, encode_identity, encode_raw, uuids};

use crate::error::TransportError;
use crate::transport::{Advertisement, ConnectionStatus, Transport};

/// A simulated Airthings device.
#[derive(Debug, Clone)]
pub struct MockPeripheral {
    address: String,
    serial_number: SerialNumber,
    rssi: Option<i16>,
    characteristics: HashMap<Uuid, Vec<u8>>,
}

impl MockPeripheral {
    /// Create a peripheral that advertises `serial_number` and answers
    /// identity reads.
    pub fn new(address: impl Into<String>, serial_number: SerialNumber) -> Self {
        let mut characteristics = HashMap::new();
        characteristics.insert(
            uuids::MODEL_NUMBER,
            serial_number.model_number().as_bytes().to_vec(),
        );
        characteristics.insert(
            uuids::SERIAL_NUMBER,
            serial_number.identifier().as_bytes().to_vec(),
        );
        characteristics.insert(uuids::FIRMWARE_REVISION, b"G-BLE-1.5.3".to_vec());
        characteristics.insert(uuids::HARDWARE_REVISION, b"REV A".to_vec());

        Self {
            address: address.into(),
            serial_number,
            rssi: Some(-60),
            characteristics,
        }
    }

    /// Serve raw field values laid out for this device's model.
    ///
    /// Models whose payload is split over several characteristics get one
    /// trailing field per characteristic after the first, and the first
    /// characteristic carries the remaining leading fields. Fails if the
    /// serial number's model is not supported.
    pub fn with_fields(mut self, values: &[u32]) -> Result<Self, airthings_types::ParseError> {
        let spec = airthings_types::resolve_serial(&self.serial_number)?;
        let raw = encode_raw(&spec.layout, values);
        let ids = spec.source.characteristics();

        let fields = spec.layout.fields();
        let trailing = ids.len().saturating_sub(1);
        let mut offset = fields[..fields.len() - trailing]
            .iter()
            .map(|f| f.size())
            .sum::<usize>();

        self.characteristics.insert(ids[0], raw[..offset].to_vec());
        for (id, field) in ids[1..].iter().zip(&fields[fields.len() - trailing..]) {
            let end = offset + field.size();
            self.characteristics.insert(*id, raw[offset..end].to_vec());
            offset = end;
        }
        Ok(self)
    }

    /// Serve an arbitrary value for one characteristic.
    #[must_use]
    pub fn with_characteristic(mut self, uuid: Uuid, value: impl Into<Vec<u8>>) -> Self {
        self.characteristics.insert(uuid, value.into());
        self
    }

    #[must_use]
    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn serial_number(&self) -> &SerialNumber {
        &self.serial_number
    }

    /// The advertisement this peripheral broadcasts.
    pub fn advertisement(&self) -> Advertisement {
        let records = encode_identity(&self.serial_number)
            .map(|record| vec![record.to_vec()])
            .unwrap_or_default();
        Advertisement {
            address: self.address.clone(),
            name: Some("Airthings Wave".to_string()),
            rssi: self.rssi,
            manufacturer_records: records,
        }
    }
}

/// An open link to a [`MockPeripheral`].
#[derive(Debug)]
pub struct MockConnection {
    address: String,
    dropped: AtomicBool,
}

impl MockConnection {
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// A mock radio for testing.
///
/// # Example
///
/// ```
/// use airthings_core::{MockPeripheral, MockTransport, Transport};
/// use airthings_types::SerialNumber;
///
/// #[tokio::main]
/// async fn main() {
///     let serial = SerialNumber::parse("2930058816").unwrap();
///     let transport = MockTransport::builder()
///         .peripheral(MockPeripheral::new("AA:BB:CC:DD:EE:FF", serial))
///         .connect_failures(2)
///         .build();
///
///     assert!(transport.connect("AA:BB:CC:DD:EE:FF").await.is_err());
///     assert!(transport.connect("AA:BB:CC:DD:EE:FF").await.is_err());
///     assert!(transport.connect("AA:BB:CC:DD:EE:FF").await.is_ok());
///     assert_eq!(transport.connect_count(), 3);
/// }
/// ```
pub struct MockTransport {
    peripherals: HashMap<String, MockPeripheral>,
    /// Whether each peripheral is in the simulated adapter cache.
    seen: HashMap<String, AtomicBool>,
    advertisements: Vec<Advertisement>,
    /// Time `connect` spends scanning for an address not in the cache.
    lookup_scan: Duration,
    /// Number of scans to fail before succeeding.
    scan_failures: AtomicU32,
    /// Number of connects to fail before succeeding.
    connect_failures: AtomicU32,
    /// Number of reads to fail before succeeding.
    read_failures: AtomicU32,
    /// Number of reads that drop the link. Consumed before `read_failures`.
    read_disconnects: AtomicU32,
    /// Report [`ConnectionStatus::Unknown`] for every link.
    unknown_status: AtomicBool,
    scan_count: AtomicU32,
    lookup_scan_count: AtomicU32,
    connect_count: AtomicU32,
    read_count: AtomicU32,
    disconnect_count: AtomicU32,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("peripherals", &self.peripherals.len())
            .field("scan_count", &self.scan_count())
            .field("connect_count", &self.connect_count())
            .field("read_count", &self.read_count())
            .finish()
    }
}

impl MockTransport {
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder::new()
    }

    /// Fail the next `count` scans.
    pub fn set_scan_failures(&self, count: u32) {
        self.scan_failures.store(count, Ordering::Relaxed);
    }

    /// Fail the next `count` connects.
    pub fn set_connect_failures(&self, count: u32) {
        self.connect_failures.store(count, Ordering::Relaxed);
    }

    /// Fail the next `count` characteristic reads.
    pub fn set_read_failures(&self, count: u32) {
        self.read_failures.store(count, Ordering::Relaxed);
    }

    /// Drop the link on the next `count` characteristic reads.
    pub fn set_read_disconnects(&self, count: u32) {
        self.read_disconnects.store(count, Ordering::Relaxed);
    }

    pub fn set_unknown_status(&self, unknown: bool) {
        self.unknown_status.store(unknown, Ordering::Relaxed);
    }

    /// Number of scans made.
    pub fn scan_count(&self) -> u32 {
        self.scan_count.load(Ordering::Relaxed)
    }

    /// Number of scans `connect` made for addresses not in the cache.
    pub fn lookup_scan_count(&self) -> u32 {
        self.lookup_scan_count.load(Ordering::Relaxed)
    }

    /// Whether the simulated adapter has seen `address`.
    pub fn is_cached(&self, address: &str) -> bool {
        self.seen
            .get(address)
            .is_some_and(|seen| seen.load(Ordering::Relaxed))
    }

    fn mark_all_seen(&self) {
        for seen in self.seen.values() {
            seen.store(true, Ordering::Relaxed);
        }
    }

    /// Number of connects attempted, failed ones included.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::Relaxed)
    }

    /// Number of characteristic reads attempted.
    pub fn read_count(&self) -> u32 {
        self.read_count.load(Ordering::Relaxed)
    }

    pub fn disconnect_count(&self) -> u32 {
        self.disconnect_count.load(Ordering::Relaxed)
    }

    /// Reset all call counters to zero.
    pub fn reset_counts(&self) {
        self.scan_count.store(0, Ordering::Relaxed);
        self.lookup_scan_count.store(0, Ordering::Relaxed);
        self.connect_count.store(0, Ordering::Relaxed);
        self.read_count.store(0, Ordering::Relaxed);
        self.disconnect_count.store(0, Ordering::Relaxed);
    }
}

/// Consume one injected failure, if any remain.
fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl Transport for MockTransport {
    type Connection = MockConnection;

    async fn scan(&self, timeout: Duration) -> Result<Vec<Advertisement>, TransportError> {
        self.scan_count.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(timeout).await;

        if take_failure(&self.scan_failures) {
            return Err(TransportError::failed("scan", "Mock scan failure"));
        }
        self.mark_all_seen();
        Ok(self.advertisements.clone())
    }

    async fn connect(&self, address: &str) -> Result<MockConnection, TransportError> {
        self.connect_count.fetch_add(1, Ordering::Relaxed);

        if take_failure(&self.connect_failures) {
            return Err(TransportError::failed(
                format!("connect {address}"),
                "Mock connect failure",
            ));
        }
        if !self.is_cached(address) {
            self.lookup_scan_count.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(self.lookup_scan).await;
            self.mark_all_seen();
        }
        if !self.peripherals.contains_key(address) {
            return Err(TransportError::failed(
                format!("connect {address}"),
                "no such peripheral",
            ));
        }
        Ok(MockConnection {
            address: address.to_string(),
            dropped: AtomicBool::new(false),
        })
    }

    async fn read_characteristic(
        &self,
        connection: &MockConnection,
        uuid: Uuid,
    ) -> Result<Vec<u8>, TransportError> {
        self.read_count.fetch_add(1, Ordering::Relaxed);

        if connection.dropped.load(Ordering::Relaxed) {
            return Err(TransportError::disconnected(connection.address.as_str()));
        }
        if take_failure(&self.read_disconnects) {
            connection.dropped.store(true, Ordering::Relaxed);
            return Err(TransportError::disconnected(connection.address.as_str()));
        }
        if take_failure(&self.read_failures) {
            return Err(TransportError::failed(
                format!("read characteristic {uuid}"),
                "Mock read failure",
            ));
        }

        self.peripherals
            .get(&connection.address)
            .and_then(|p| p.characteristics.get(&uuid))
            .cloned()
            .ok_or_else(|| {
                TransportError::failed(
                    format!("read characteristic {uuid}"),
                    "characteristic not found",
                )
            })
    }

    async fn disconnect(&self, _connection: MockConnection) -> Result<(), TransportError> {
        self.disconnect_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn connection_status(&self, connection: &MockConnection) -> ConnectionStatus {
        if self.unknown_status.load(Ordering::Relaxed) {
            ConnectionStatus::Unknown
        } else if connection.dropped.load(Ordering::Relaxed) {
            ConnectionStatus::Disconnected
        } else {
            ConnectionStatus::Connected
        }
    }
}

/// Builder for creating mock transports with custom settings.
#[derive(Debug, Default)]
pub struct MockTransportBuilder {
    peripherals: Vec<MockPeripheral>,
    uncached: Vec<String>,
    lookup_scan: Duration,
    extra_advertisements: Vec<Advertisement>,
    scan_failures: u32,
    connect_failures: u32,
    read_failures: u32,
    read_disconnects: u32,
}

impl MockTransportBuilder {
    /// Create a new builder with no peripherals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device that advertises and accepts connections.
    #[must_use]
    pub fn peripheral(mut self, peripheral: MockPeripheral) -> Self {
        self.peripherals.push(peripheral);
        self
    }

    /// Add a device the adapter has not seen yet.
    ///
    /// The first scan, or the lookup scan of a `connect`, brings it into the
    /// cache.
    #[must_use]
    pub fn uncached_peripheral(mut self, peripheral: MockPeripheral) -> Self {
        self.uncached.push(peripheral.address.clone());
        self.peripherals.push(peripheral);
        self
    }

    /// Time `connect` spends scanning for an address not in the cache.
    #[must_use]
    pub fn lookup_scan(mut self, duration: Duration) -> Self {
        self.lookup_scan = duration;
        self
    }

    /// Add an advertisement with no connectable device behind it.
    #[must_use]
    pub fn advertisement(mut self, advertisement: Advertisement) -> Self {
        self.extra_advertisements.push(advertisement);
        self
    }

    #[must_use]
    pub fn scan_failures(mut self, count: u32) -> Self {
        self.scan_failures = count;
        self
    }

    #[must_use]
    pub fn connect_failures(mut self, count: u32) -> Self {
        self.connect_failures = count;
        self
    }

    #[must_use]
    pub fn read_failures(mut self, count: u32) -> Self {
        self.read_failures = count;
        self
    }

    #[must_use]
    pub fn read_disconnects(mut self, count: u32) -> Self {
        self.read_disconnects = count;
        self
    }

    /// Build the mock transport.
    pub fn build(self) -> MockTransport {
        let mut advertisements: Vec<Advertisement> =
            self.peripherals.iter().map(MockPeripheral::advertisement).collect();
        advertisements.extend(self.extra_advertisements);

        let seen = self
            .peripherals
            .iter()
            .map(|p| {
                let cached = !self.uncached.contains(&p.address);
                (p.address.clone(), AtomicBool::new(cached))
            })
            .collect();

        MockTransport {
            peripherals: self
                .peripherals
                .into_iter()
                .map(|p| (p.address.clone(), p))
                .collect(),
            seen,
            advertisements,
            lookup_scan: self.lookup_scan,
            scan_failures: AtomicU32::new(self.scan_failures),
            connect_failures: AtomicU32::new(self.connect_failures),
            read_failures: AtomicU32::new(self.read_failures),
            read_disconnects: AtomicU32::new(self.read_disconnects),
            unknown_status: AtomicBool::new(false),
            scan_count: AtomicU32::new(0),
            lookup_scan_count: AtomicU32::new(0),
            connect_count: AtomicU32::new(0),
            read_count: AtomicU32::new(0),
            disconnect_count: AtomicU32::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airthings_types::{DeviceModel, decode};

    fn serial(s: &str) -> SerialNumber {
        SerialNumber::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_mock_identity_reads() {
        let transport = MockTransport::builder()
            .peripheral(MockPeripheral::new("AA", serial("2930058816")))
            .build();

        let connection = transport.connect("AA").await.unwrap();
        let model = transport
            .read_characteristic(&connection, uuids::MODEL_NUMBER)
            .await
            .unwrap();
        let ident = transport
            .read_characteristic(&connection, uuids::SERIAL_NUMBER)
            .await
            .unwrap();
        assert_eq!(model, b"2930");
        assert_eq!(ident, b"058816");
        assert_eq!(transport.read_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_connect_unknown_address() {
        let transport = MockTransport::builder().build();
        assert!(transport.connect("nope").await.is_err());
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_connect_scans_for_uncached_peripheral() {
        let transport = MockTransport::builder()
            .uncached_peripheral(MockPeripheral::new("AA", serial("2930058816")))
            .lookup_scan(Duration::from_secs(2))
            .build();
        assert!(!transport.is_cached("AA"));

        let start = tokio::time::Instant::now();
        transport.connect("AA").await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert!(transport.is_cached("AA"));

        transport.connect("AA").await.unwrap();
        assert_eq!(transport.lookup_scan_count(), 1);
        assert_eq!(transport.scan_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_scan_fills_cache() {
        let transport = MockTransport::builder()
            .uncached_peripheral(MockPeripheral::new("AA", serial("2930058816")))
            .build();

        transport.scan(Duration::from_secs(1)).await.unwrap();
        assert!(transport.is_cached("AA"));
        transport.connect("AA").await.unwrap();
        assert_eq!(transport.lookup_scan_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_transient_connect_failures() {
        let transport = MockTransport::builder()
            .peripheral(MockPeripheral::new("AA", serial("2950000001")))
            .connect_failures(2)
            .build();

        assert!(transport.connect("AA").await.is_err());
        assert!(transport.connect("AA").await.is_err());
        assert!(transport.connect("AA").await.is_ok());
        assert_eq!(transport.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_read_disconnect_sticks_to_connection() {
        let transport = MockTransport::builder()
            .peripheral(MockPeripheral::new("AA", serial("2950000001")))
            .read_disconnects(1)
            .build();

        let connection = transport.connect("AA").await.unwrap();
        let err = transport
            .read_characteristic(&connection, uuids::MODEL_NUMBER)
            .await
            .unwrap_err();
        assert!(err.is_disconnect());
        assert_eq!(
            transport.connection_status(&connection).await,
            ConnectionStatus::Disconnected
        );
        // the link stays down until a new connection is opened
        assert!(
            transport
                .read_characteristic(&connection, uuids::MODEL_NUMBER)
                .await
                .is_err()
        );

        let fresh = transport.connect("AA").await.unwrap();
        assert!(
            transport
                .read_characteristic(&fresh, uuids::MODEL_NUMBER)
                .await
                .is_ok()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_scan_returns_advertisements() {
        let transport = MockTransport::builder()
            .peripheral(MockPeripheral::new("AA", serial("2930058816")))
            .advertisement(Advertisement::new("BB", vec![vec![0x4c, 0x00, 0x02]]))
            .build();

        let ads = transport.scan(Duration::from_secs(3)).await.unwrap();
        assert_eq!(ads.len(), 2);
        assert_eq!(ads[0].serial_number(), Some(serial("2930058816")));
        assert_eq!(ads[1].serial_number(), None);
    }

    #[tokio::test]
    async fn test_with_fields_single_characteristic() {
        let values = [1, 90, 0, 0, 25, 30, 2150, 50500, 812, 120, 0, 0];
        let peripheral = MockPeripheral::new("AA", serial("2930058816"))
            .with_fields(&values)
            .unwrap();
        let spec = DeviceModel::WavePlusGen1.spec();
        let transport = MockTransport::builder().peripheral(peripheral).build();

        let connection = transport.connect("AA").await.unwrap();
        let raw = transport
            .read_characteristic(&connection, spec.source.characteristics()[0])
            .await
            .unwrap();
        let set = decode(spec, &raw).unwrap();
        assert_eq!(set.co2().unwrap().value.as_f64(), Some(812.0));
    }

    #[tokio::test]
    async fn test_with_fields_concatenated_characteristics() {
        let values = [2024, 5, 17, 12, 30, 0, 4550, 2150, 42, 37];
        let peripheral = MockPeripheral::new("AA", serial("2900000007"))
            .with_fields(&values)
            .unwrap();
        let spec = DeviceModel::WaveGen1.spec();
        let transport = MockTransport::builder().peripheral(peripheral).build();

        let connection = transport.connect("AA").await.unwrap();
        let mut raw = Vec::new();
        for id in spec.source.characteristics() {
            raw.extend(transport.read_characteristic(&connection, *id).await.unwrap());
        }
        assert_eq!(raw.len(), spec.layout.size());

        let set = decode(spec, &raw).unwrap();
        assert_eq!(set.humidity().unwrap().value.as_f64(), Some(45.5));
        assert_eq!(set.radon_long_term_avg().unwrap().value.as_f64(), Some(37.0));
    }

    #[tokio::test]
    async fn test_unknown_status() {
        let transport = MockTransport::builder()
            .peripheral(MockPeripheral::new("AA", serial("2950000001")))
            .build();
        transport.set_unknown_status(true);
        let connection = transport.connect("AA").await.unwrap();
        assert_eq!(
            transport.connection_status(&connection).await,
            ConnectionStatus::Unknown
        );
    }
}
