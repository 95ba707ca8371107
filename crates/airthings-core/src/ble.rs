//! [`Transport`] implementation backed by btleplug.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DeviceNotFoundReason, Error, Result, TransportError};
use crate::transport::{Advertisement, ConnectionStatus, Transport};

/// Default timeout for BLE connection operations.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for service discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for BLE characteristic read operations.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time spent scanning for a device the adapter has not seen yet.
const DEFAULT_LOOKUP_SCAN_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the adapter cache is checked during a lookup scan.
const LOOKUP_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Timeouts applied to individual radio operations.
///
/// These bound a single try. How many tries are made is decided by
/// [`AcquisitionConfig`](crate::AcquisitionConfig).
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use airthings_core::BleConfig;
///
/// let config = BleConfig::default()
///     .connect_timeout(Duration::from_secs(20))
///     .read_timeout(Duration::from_secs(15));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BleConfig {
    /// Timeout for establishing a BLE connection.
    pub connect_timeout: Duration,
    /// Timeout for service discovery after connection.
    pub discovery_timeout: Duration,
    /// Timeout for BLE read operations.
    pub read_timeout: Duration,
    /// How long `connect` scans for an address missing from the adapter
    /// cache before giving up on that try.
    pub lookup_scan_timeout: Duration,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            lookup_scan_timeout: DEFAULT_LOOKUP_SCAN_TIMEOUT,
        }
    }
}

impl BleConfig {
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn lookup_scan_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_scan_timeout = timeout;
        self
    }
}

impl From<btleplug::Error> for TransportError {
    fn from(err: btleplug::Error) -> Self {
        match err {
            btleplug::Error::NotConnected => TransportError::Disconnected {
                address: String::new(),
            },
            btleplug::Error::TimedOut(duration) => TransportError::timeout("ble", duration),
            other => TransportError::failed("ble", other.to_string()),
        }
    }
}

/// An open link to one peripheral.
pub struct BleConnection {
    peripheral: Peripheral,
    address: String,
    /// Characteristics found during service discovery, by UUID.
    characteristics: HashMap<Uuid, Characteristic>,
}

impl std::fmt::Debug for BleConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleConnection")
            .field("address", &self.address)
            .field("characteristics", &self.characteristics.len())
            .finish_non_exhaustive()
    }
}

/// Radio access through the first Bluetooth adapter.
pub struct BleTransport {
    adapter: Adapter,
    config: BleConfig,
}

impl std::fmt::Debug for BleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BleTransport {
    /// Open the first available adapter with default timeouts.
    pub async fn new() -> Result<Self> {
        Self::with_config(BleConfig::default()).await
    }

    /// Open the first available adapter.
    pub async fn with_config(config: BleConfig) -> Result<Self> {
        let manager = Manager::new().await.map_err(TransportError::from)?;
        let adapters = manager.adapters().await.map_err(TransportError::from)?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))?;
        Ok(Self::from_adapter(adapter, config))
    }

    /// Use an adapter the caller already opened.
    pub fn from_adapter(adapter: Adapter, config: BleConfig) -> Self {
        Self { adapter, config }
    }

    pub fn config(&self) -> &BleConfig {
        &self.config
    }

    /// Find a peripheral by address, scanning for it if the adapter has not
    /// seen it yet.
    async fn find_peripheral(&self, address: &str) -> std::result::Result<Peripheral, TransportError> {
        if let Some(peripheral) = self.find_cached(address).await? {
            debug!("Found {} in adapter cache (no scan needed)", address);
            return Ok(peripheral);
        }

        info!(
            "{} not seen yet, scanning for up to {:?}",
            address, self.config.lookup_scan_timeout
        );
        self.adapter.start_scan(ScanFilter::default()).await?;
        let found = poll_until_found(
            self.config.lookup_scan_timeout,
            LOOKUP_POLL_INTERVAL,
            || self.find_cached(address),
        )
        .await;
        if let Err(e) = self.adapter.stop_scan().await {
            debug!("Stopping lookup scan failed: {}", e);
        }

        match found? {
            Some(peripheral) => Ok(peripheral),
            None => {
                warn!("{} was not seen during a lookup scan", address);
                Err(TransportError::failed(
                    format!("connect {address}"),
                    "device not seen by the adapter",
                ))
            }
        }
    }

    async fn find_cached(&self, address: &str) -> std::result::Result<Option<Peripheral>, TransportError> {
        for peripheral in self.adapter.peripherals().await? {
            let Some(properties) = peripheral.properties().await? else {
                continue;
            };
            let identifier = create_identifier(&properties.address.to_string(), &peripheral.id());
            if identifier.eq_ignore_ascii_case(address) {
                return Ok(Some(peripheral));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Transport for BleTransport {
    type Connection = BleConnection;

    #[tracing::instrument(level = "debug", skip(self))]
    async fn scan(&self, duration: Duration) -> std::result::Result<Vec<Advertisement>, TransportError> {
        info!("Starting BLE scan for {:?}...", duration);

        self.adapter.start_scan(ScanFilter::default()).await?;
        sleep(duration).await;
        self.adapter.stop_scan().await?;

        let mut advertisements = Vec::new();
        for peripheral in self.adapter.peripherals().await? {
            match peripheral.properties().await {
                Ok(Some(properties)) => {
                    let mut records: Vec<(u16, Vec<u8>)> =
                        properties.manufacturer_data.into_iter().collect();
                    records.sort_by_key(|(company_id, _)| *company_id);

                    advertisements.push(Advertisement {
                        address: create_identifier(
                            &properties.address.to_string(),
                            &peripheral.id(),
                        ),
                        name: properties.local_name,
                        rssi: properties.rssi,
                        manufacturer_records: records
                            .into_iter()
                            .map(|(company_id, data)| manufacturer_record(company_id, &data))
                            .collect(),
                    });
                }
                Ok(None) => {}
                Err(e) => debug!("Error reading peripheral properties: {}", e),
            }
        }

        info!("Scan complete. Saw {} peripheral(s)", advertisements.len());
        Ok(advertisements)
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn connect(&self, address: &str) -> std::result::Result<BleConnection, TransportError> {
        let peripheral = self.find_peripheral(address).await?;

        info!("Connecting to device...");
        timeout(self.config.connect_timeout, peripheral.connect())
            .await
            .map_err(|_| TransportError::timeout("connect to device", self.config.connect_timeout))?
            .map_err(|e| with_address(e.into(), address))?;

        timeout(self.config.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| {
                TransportError::timeout("discover services", self.config.discovery_timeout)
            })?
            .map_err(|e| with_address(e.into(), address))?;

        let mut characteristics = HashMap::new();
        for service in peripheral.services() {
            debug!("  Service: {}", service.uuid);
            for characteristic in service.characteristics {
                characteristics.insert(characteristic.uuid, characteristic);
            }
        }
        debug!("Cached {} characteristics", characteristics.len());

        Ok(BleConnection {
            peripheral,
            address: address.to_string(),
            characteristics,
        })
    }

    async fn read_characteristic(
        &self,
        connection: &BleConnection,
        uuid: Uuid,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        let characteristic = connection.characteristics.get(&uuid).ok_or_else(|| {
            TransportError::failed(
                format!("read characteristic {uuid}"),
                format!(
                    "characteristic not found among {} discovered",
                    connection.characteristics.len()
                ),
            )
        })?;

        timeout(self.config.read_timeout, connection.peripheral.read(characteristic))
            .await
            .map_err(|_| {
                TransportError::timeout(format!("read characteristic {uuid}"), self.config.read_timeout)
            })?
            .map_err(|e| with_address(e.into(), &connection.address))
    }

    async fn disconnect(&self, connection: BleConnection) -> std::result::Result<(), TransportError> {
        debug!(address = %connection.address, "Disconnecting from device");
        connection
            .peripheral
            .disconnect()
            .await
            .map_err(|e| with_address(e.into(), &connection.address))
    }

    async fn connection_status(&self, connection: &BleConnection) -> ConnectionStatus {
        match connection.peripheral.is_connected().await {
            Ok(true) => ConnectionStatus::Connected,
            Ok(false) => ConnectionStatus::Disconnected,
            Err(e) => {
                warn!(address = %connection.address, "Could not query connection state: {}", e);
                ConnectionStatus::Unknown
            }
        }
    }
}

/// Rebuild a manufacturer record as it appears on air.
///
/// btleplug strips the company identifier from the record and uses it as
/// the map key.
fn manufacturer_record(company_id: u16, data: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(2 + data.len());
    record.extend_from_slice(&company_id.to_le_bytes());
    record.extend_from_slice(data);
    record
}

/// Run `lookup` every `interval` until it finds something or `limit` has
/// elapsed. One final lookup is made at the deadline.
async fn poll_until_found<T, F, Fut>(
    limit: Duration,
    interval: Duration,
    mut lookup: F,
) -> std::result::Result<Option<T>, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<Option<T>, TransportError>>,
{
    let deadline = Instant::now() + limit;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return lookup().await;
        }
        sleep(interval.min(deadline - now)).await;
        if let Some(found) = lookup().await? {
            return Ok(Some(found));
        }
    }
}

fn with_address(error: TransportError, address: &str) -> TransportError {
    match error {
        TransportError::Disconnected { .. } => TransportError::disconnected(address),
        other => other,
    }
}

/// Format a peripheral ID as a string.
fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// On macOS where addresses are 00:00:00:00:00:00, use the peripheral ID.
fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if address == "00:00:00:00:00:00" {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}
