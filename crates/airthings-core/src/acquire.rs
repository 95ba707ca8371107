//! The acquisition pipeline.
//!
//! An [`Acquirer`] owns a [`Transport`] and drives every device through
//! scan, connect, fetch, decode and alarm evaluation under the retry
//! budgets of its [`AcquisitionConfig`]. Devices are processed one at a
//! time with a pause after each.
//!
//! # Example
//!
//! ```no_run
//! use airthings_core::{AcquisitionConfig, Acquirer, BleTransport};
//!
//! # async fn example() -> airthings_core::Result<()> {
//! let transport = BleTransport::new().await?;
//! let acquirer = Acquirer::new(transport, AcquisitionConfig::default())?;
//!
//! for outcome in acquirer.fetch_all().await? {
//!     if let Some(measurements) = outcome.measurements() {
//!         println!("{}: {} readings", outcome.address, measurements.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use airthings_types::{AlarmRules, DeviceModelSpec, MeasurementSet, SerialNumber, decode, uuids};

use crate::config::AcquisitionConfig;
use crate::device::{AcquisitionState, ConnectionState, DebugInfo, Device};
use crate::error::{Error, Result, TransportError};
use crate::retry::{Attempts, RetryError, cancellable_sleep, with_retry};
use crate::transport::{Advertisement, ConnectionStatus, Transport};

/// Length of the per-device identifier part of a serial number.
const IDENTIFIER_LEN: usize = 6;

/// Which advertising devices [`Acquirer::discover`] keeps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DiscoveryFilter {
    /// Every Airthings device of a supported model.
    #[default]
    All,
    /// Devices whose address is in the list (case-insensitive).
    Addresses(Vec<String>),
    /// Devices whose full serial number or 6-digit identifier is in the list.
    SerialNumbers(Vec<String>),
}

impl DiscoveryFilter {
    fn accepts(&self, address: &str, serial: &SerialNumber) -> bool {
        match self {
            DiscoveryFilter::All => true,
            DiscoveryFilter::Addresses(addresses) => {
                addresses.iter().any(|a| a.eq_ignore_ascii_case(address))
            }
            DiscoveryFilter::SerialNumbers(serials) => serials
                .iter()
                .any(|s| s == serial.as_str() || s == serial.identifier()),
        }
    }

    /// Reject serial filters that can never match a supported device.
    fn validate(&self) -> Result<()> {
        let DiscoveryFilter::SerialNumbers(serials) = self else {
            return Ok(());
        };
        for value in serials {
            match value.len() {
                IDENTIFIER_LEN if value.bytes().all(|b| b.is_ascii_digit()) => {}
                _ => {
                    let serial = SerialNumber::parse(value)?;
                    let spec = airthings_types::resolve_serial(&serial)?;
                    debug!("Matched serial number {} with model {}", serial, spec.label);
                }
            }
        }
        Ok(())
    }
}

/// How a batch reacts when one device fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the batch and return the first error.
    #[default]
    StopOnFirst,
    /// Record the error for that device and carry on with the rest.
    Isolate,
}

/// The result of acquiring one device in a batch.
#[derive(Debug)]
pub struct DeviceOutcome {
    pub address: String,
    /// The device, with its state trail and any decoded measurements.
    /// `None` when the address could not be identified.
    pub device: Option<Device>,
    pub result: Result<()>,
}

impl DeviceOutcome {
    fn acquired(device: Device, result: Result<()>) -> Self {
        Self {
            address: device.address().to_string(),
            device: Some(device),
            result,
        }
    }

    fn unidentified(address: &str, error: Error) -> Self {
        Self {
            address: address.to_string(),
            device: None,
            result: Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Where the device ended up.
    ///
    /// An address that could not be identified reports
    /// [`AcquisitionState::ConnectExhausted`] when its connect budget ran out
    /// and [`AcquisitionState::Failed`] otherwise.
    pub fn state(&self) -> AcquisitionState {
        match (&self.device, &self.result) {
            (Some(device), _) => device.state(),
            (None, Err(Error::ConnectExhausted { .. })) => AcquisitionState::ConnectExhausted,
            (None, _) => AcquisitionState::Failed,
        }
    }

    pub fn measurements(&self) -> Option<&MeasurementSet> {
        self.device.as_ref().and_then(Device::measurements)
    }
}

/// Drives devices through the acquisition pipeline.
pub struct Acquirer<T: Transport> {
    transport: T,
    config: AcquisitionConfig,
    rules: AlarmRules,
    cancel: CancellationToken,
    policy: FailurePolicy,
}

impl<T: Transport> std::fmt::Debug for Acquirer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquirer")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Acquirer<T> {
    /// Create an acquirer with the default alarm rules.
    ///
    /// Fails with [`Error::InvalidConfig`] if the configuration does not
    /// validate.
    pub fn new(transport: T, config: AcquisitionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            config,
            rules: AlarmRules::default(),
            cancel: CancellationToken::new(),
            policy: FailurePolicy::default(),
        })
    }

    /// Replace the alarm rule tables.
    #[must_use]
    pub fn with_rules(mut self, rules: AlarmRules) -> Self {
        self.rules = rules;
        self
    }

    /// Use an externally controlled cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn rules(&self) -> &AlarmRules {
        &self.rules
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    /// A handle to the token that cancels this acquirer's operations.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // ==================== Discovery ====================

    /// Scan for advertising Airthings devices.
    ///
    /// Advertisements without an Airthings record are ignored, as are devices
    /// whose model is not supported. A serial number filter is checked before
    /// scanning: each entry must be a 6-digit identifier or a full serial
    /// number of a supported model.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn discover(&self, filter: &DiscoveryFilter) -> Result<Vec<Device>> {
        filter.validate()?;

        let advertisements = self.scan().await?;
        let mut seen = HashSet::new();
        let mut devices = Vec::new();

        for ad in advertisements {
            let Some(serial) = ad.serial_number() else {
                continue;
            };
            if !filter.accepts(&ad.address, &serial) {
                debug!("Ignoring {} ({}): not in filter", ad.address, serial);
                continue;
            }
            if !seen.insert(ad.address.clone()) {
                continue;
            }
            match Device::from_parts(ad.address.clone(), serial) {
                Ok(device) => {
                    info!("Found {}", device);
                    devices.push(device);
                }
                Err(e) => warn!("Skipping {}: {}", ad.address, e),
            }
        }

        info!("Discovered {} Airthings device(s)", devices.len());
        Ok(devices)
    }

    /// Scan for the device with the given address.
    pub async fn find_device_by_address(&self, address: &str) -> Result<Device> {
        self.discover(&DiscoveryFilter::Addresses(vec![address.to_string()]))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::device_not_found(address))
    }

    /// Scan for the device with the given serial number or identifier.
    pub async fn find_device_by_serial_number(&self, serial_number: &str) -> Result<Device> {
        self.discover(&DiscoveryFilter::SerialNumbers(vec![serial_number.to_string()]))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::device_not_found(serial_number))
    }

    async fn scan(&self) -> Result<Vec<Advertisement>> {
        let policy = self.config.scan_policy();
        let transport = &self.transport;
        let scan_timeout = self.config.scan_timeout;

        with_retry(&policy, "scan", &self.cancel, || async move {
            transport.scan(scan_timeout).await.map_err(Error::from)
        })
        .await
        .map_err(|e| {
            e.into_error(|attempts, last_error| Error::ScanExhausted {
                attempts,
                scan_timeout: self.config.scan_timeout,
                rescan_sleep: self.config.rescan_sleep,
                last_error: Box::new(last_error),
            })
        })
    }

    // ==================== Identification ====================

    /// Connect to a device by address and read its identity.
    ///
    /// The model number and serial number characteristics are read and
    /// combined into a serial number. Each try connects, reads and
    /// disconnects; tries are bounded by the connect budget.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn identify(&self, address: &str) -> Result<Device> {
        let policy = self.config.connect_policy();
        let transport = &self.transport;

        let (model_number, identifier) =
            with_retry(&policy, "identify", &self.cancel, || async move {
                let connection = transport.connect(address).await?;
                let reads = async {
                    let model_number = transport
                        .read_characteristic(&connection, uuids::MODEL_NUMBER)
                        .await?;
                    let identifier = transport
                        .read_characteristic(&connection, uuids::SERIAL_NUMBER)
                        .await?;
                    Ok::<_, TransportError>((model_number, identifier))
                }
                .await;
                if let Err(e) = transport.disconnect(connection).await {
                    debug!("Disconnect after identity read failed: {}", e);
                }
                reads.map_err(Error::from)
            })
            .await
            .map_err(|e| self.connect_exhausted(address, e))?;

        let serial = SerialNumber::from_parts(
            &String::from_utf8_lossy(&model_number),
            &String::from_utf8_lossy(&identifier),
        )?;
        let device = Device::from_parts(address, serial)?;
        info!("Identified {}", device);
        Ok(device)
    }

    // ==================== Fetching ====================

    /// Acquire a batch, stopping at the first device that fails.
    ///
    /// `next_device_sleep` is observed after every device.
    #[tracing::instrument(level = "info", skip_all, fields(devices = devices.len()))]
    pub async fn fetch_devices(&self, devices: Vec<Device>) -> Result<Vec<Device>> {
        let mut done = Vec::with_capacity(devices.len());
        for mut device in devices {
            self.check_cancelled()?;
            self.acquire(&mut device).await?;
            done.push(device);
            self.pace_next_device().await?;
        }
        Ok(done)
    }

    /// Acquire a batch, recording each device's result independently.
    ///
    /// There is one outcome per device, in order. Cancellation ends the
    /// batch early: the device being acquired and every device not yet
    /// started get [`Error::Cancelled`], and the outcomes already collected
    /// are kept.
    #[tracing::instrument(level = "info", skip_all, fields(devices = devices.len()))]
    pub async fn fetch_devices_isolated(&self, devices: Vec<Device>) -> Result<Vec<DeviceOutcome>> {
        let total = devices.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut pending = devices.into_iter();
        let mut cancelled = false;

        for mut device in pending.by_ref() {
            let result = match self.check_cancelled() {
                Ok(()) => self.acquire(&mut device).await,
                Err(e) => Err(e),
            };
            match &result {
                Err(Error::Cancelled) => cancelled = true,
                Err(e) => warn!("Acquisition of {} failed: {}", device, e),
                Ok(()) => {}
            }
            outcomes.push(DeviceOutcome::acquired(device, result));
            if cancelled || self.pace_next_device().await.is_err() {
                cancelled = true;
                break;
            }
        }

        if cancelled {
            let decoded = outcomes.iter().filter(|o| o.is_ok()).count();
            warn!("Batch cancelled with {} of {} device(s) acquired", decoded, total);
            outcomes.extend(
                pending.map(|device| DeviceOutcome::acquired(device, Err(Error::Cancelled))),
            );
        }
        Ok(outcomes)
    }

    /// Acquire a batch under the configured [`FailurePolicy`].
    pub async fn fetch_batch(&self, devices: Vec<Device>) -> Result<Vec<DeviceOutcome>> {
        match self.policy {
            FailurePolicy::StopOnFirst => Ok(self
                .fetch_devices(devices)
                .await?
                .into_iter()
                .map(|device| DeviceOutcome::acquired(device, Ok(())))
                .collect()),
            FailurePolicy::Isolate => self.fetch_devices_isolated(devices).await,
        }
    }

    /// Identify each address by connecting to it, then acquire them all.
    ///
    /// The acquirer makes no scan of its own. Under
    /// [`FailurePolicy::Isolate`] an address that cannot be identified gets
    /// an outcome without a device, in its place among the others; under
    /// [`FailurePolicy::StopOnFirst`] it aborts the batch.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn fetch_from_addresses(&self, addresses: &[String]) -> Result<Vec<DeviceOutcome>> {
        let mut devices = Vec::with_capacity(addresses.len());
        let mut unidentified = Vec::new();
        for (index, address) in addresses.iter().enumerate() {
            self.check_cancelled()?;
            match self.identify(address).await {
                Ok(device) => devices.push(device),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) if self.policy == FailurePolicy::Isolate => {
                    warn!("Identification of {} failed: {}", address, e);
                    unidentified.push((index, DeviceOutcome::unidentified(address, e)));
                }
                Err(e) => return Err(e),
            }
        }
        self.pace_before_fetch().await?;

        let mut outcomes = self.fetch_batch(devices).await?;
        for (index, outcome) in unidentified {
            outcomes.insert(index.min(outcomes.len()), outcome);
        }
        Ok(outcomes)
    }

    /// Discover the devices with the given serial numbers, then acquire them.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn fetch_from_serial_numbers(
        &self,
        serial_numbers: &[String],
    ) -> Result<Vec<DeviceOutcome>> {
        let devices = self
            .discover(&DiscoveryFilter::SerialNumbers(serial_numbers.to_vec()))
            .await?;
        for wanted in serial_numbers {
            let found = devices
                .iter()
                .any(|d| d.serial_number().as_str() == wanted || d.identifier() == wanted);
            if !found {
                warn!("No device with serial number {} was seen", wanted);
            }
        }
        self.pace_before_fetch().await?;
        self.fetch_batch(devices).await
    }

    /// Discover every nearby device, then acquire them.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn fetch_all(&self) -> Result<Vec<DeviceOutcome>> {
        let devices = self.discover(&DiscoveryFilter::All).await?;
        self.pace_before_fetch().await?;
        self.fetch_batch(devices).await
    }

    /// Connect to a single device, fetch and decode its measurements.
    ///
    /// On success the device holds its annotated [`MeasurementSet`] and ends
    /// in [`AcquisitionState::Decoded`].
    #[tracing::instrument(level = "info", skip_all, fields(address = %device.address()))]
    pub async fn acquire(&self, device: &mut Device) -> Result<()> {
        let connection = self.connect(device).await?;
        let mut connection = Some(connection);

        let result = self.fetch(device, &mut connection).await;

        if let Some(connection) = connection {
            if let Err(e) = self.transport.disconnect(connection).await {
                debug!("Disconnect after fetch failed: {}", e);
            }
        }
        device.set_connection(ConnectionState::Disconnected);
        result
    }

    /// Read the firmware and hardware revision strings of a device.
    ///
    /// Connecting is bounded by the connect budget and reading by the
    /// fetch budget. The acquisition state of the device is left untouched.
    #[tracing::instrument(level = "info", skip_all, fields(address = %device.address()))]
    pub async fn read_debug_info(&self, device: &mut Device) -> Result<DebugInfo> {
        let address = device.address().to_string();
        let connection = self.open(&address).await?;

        let policy = self.config.fetch_policy();
        let transport = &self.transport;
        let link = &connection;
        let result = with_retry(&policy, "read debug info", &self.cancel, || async move {
            let firmware = transport
                .read_characteristic(link, uuids::FIRMWARE_REVISION)
                .await?;
            let hardware = transport
                .read_characteristic(link, uuids::HARDWARE_REVISION)
                .await?;
            Ok::<_, Error>(DebugInfo {
                firmware_revision: characteristic_string(&firmware),
                hardware_revision: characteristic_string(&hardware),
            })
        })
        .await
        .map_err(|e| self.fetch_exhausted(&address, e));

        if let Err(e) = self.transport.disconnect(connection).await {
            debug!("Disconnect after debug info read failed: {}", e);
        }

        let info = result?;
        device.set_debug_info(info.clone());
        Ok(info)
    }

    // ==================== Internals ====================

    async fn open(&self, address: &str) -> Result<T::Connection> {
        let policy = self.config.connect_policy();
        let transport = &self.transport;

        with_retry(&policy, "connect", &self.cancel, || async move {
            transport.connect(address).await.map_err(Error::from)
        })
        .await
        .map_err(|e| self.connect_exhausted(address, e))
    }

    async fn connect(&self, device: &mut Device) -> Result<T::Connection> {
        device.transition(AcquisitionState::Connecting);
        let address = device.address().to_string();

        match self.open(&address).await {
            Ok(connection) => {
                device.set_connection(ConnectionState::Connected);
                device.transition(AcquisitionState::Connected);
                Ok(connection)
            }
            Err(e) => {
                device.transition(if matches!(e, Error::ConnectExhausted { .. }) {
                    AcquisitionState::ConnectExhausted
                } else {
                    AcquisitionState::Failed
                });
                Err(e)
            }
        }
    }

    async fn fetch(&self, device: &mut Device, connection: &mut Option<T::Connection>) -> Result<()> {
        let policy = self.config.fetch_policy();
        let address = device.address().to_string();
        let spec = device.spec();
        let mut attempts = Attempts::new(&policy, "fetch", &self.cancel);

        device.transition(AcquisitionState::Fetching);
        loop {
            if let Err(stop) = attempts.begin() {
                device.transition(AcquisitionState::Failed);
                return Err(self.fetch_exhausted(&address, stop));
            }

            let result = match connection.as_ref() {
                Some(link) => self.read_measurements(spec, link).await,
                None => Err(TransportError::disconnected(address.as_str()).into()),
            };

            match result {
                Ok(measurements) => {
                    attempts.succeeded();
                    info!("Fetched {} measurement(s) from {}", measurements.len(), address);
                    device.set_measurements(measurements);
                    device.transition(AcquisitionState::Decoded);
                    return Ok(());
                }
                Err(e) => {
                    if e.is_disconnect() && attempts.has_remaining() {
                        self.hard_reconnect(device, connection).await;
                    }
                    if let Err(stop) = attempts.failed(e).await {
                        device.transition(match stop {
                            RetryError::Exhausted { .. } => AcquisitionState::FetchExhausted,
                            _ => AcquisitionState::Failed,
                        });
                        return Err(self.fetch_exhausted(&address, stop));
                    }
                }
            }
        }
    }

    /// Read the raw payload for a model, decode it and evaluate alarms.
    async fn read_measurements(
        &self,
        spec: &'static DeviceModelSpec,
        connection: &T::Connection,
    ) -> Result<MeasurementSet> {
        let mut raw = Vec::with_capacity(spec.layout.size());
        for uuid in spec.source.characteristics() {
            let value = self.transport.read_characteristic(connection, *uuid).await?;
            raw.extend_from_slice(&value);
        }

        let mut measurements = decode(spec, &raw)?;
        self.rules.annotate(&mut measurements);
        Ok(measurements)
    }

    /// Drop the link and make a single attempt to bring it back.
    ///
    /// Failures are logged and otherwise ignored; the fetch loop sees a
    /// missing connection as another disconnect.
    async fn hard_reconnect(&self, device: &mut Device, connection: &mut Option<T::Connection>) {
        let address = device.address().to_string();
        device.transition(AcquisitionState::Connecting);

        if let Some(link) = connection.take() {
            match self.transport.connection_status(&link).await {
                ConnectionStatus::Unknown => {
                    warn!("Connection state of {} is unknown, reconnecting anyway", address)
                }
                status => debug!("Connection state of {} is {:?}", address, status),
            }
            if let Err(e) = self.transport.disconnect(link).await {
                debug!("Disconnect before reconnect failed: {}", e);
            }
        }
        device.set_connection(ConnectionState::Disconnected);

        match self.transport.connect(&address).await {
            Ok(link) => {
                info!("Reconnected to {}", address);
                *connection = Some(link);
                device.set_connection(ConnectionState::Connected);
                device.transition(AcquisitionState::Connected);
            }
            Err(e) => debug!("Hard reconnect to {} failed: {}", address, e),
        }
        device.transition(AcquisitionState::Fetching);
    }

    async fn pace_before_fetch(&self) -> Result<()> {
        debug!(
            "Sleeping {:?} before fetching measurements",
            self.config.before_fetch_sleep
        );
        cancellable_sleep(&self.cancel, self.config.before_fetch_sleep).await
    }

    async fn pace_next_device(&self) -> Result<()> {
        debug!(
            "Sleeping {:?} before the next device",
            self.config.next_device_sleep
        );
        cancellable_sleep(&self.cancel, self.config.next_device_sleep).await
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    fn connect_exhausted(&self, address: &str, error: RetryError) -> Error {
        error.into_error(|attempts, last_error| Error::ConnectExhausted {
            address: address.to_string(),
            attempts,
            reconnect_sleep: self.config.reconnect_sleep,
            next_device_sleep: self.config.next_device_sleep,
            last_error: Box::new(last_error),
        })
    }

    fn fetch_exhausted(&self, address: &str, error: RetryError) -> Error {
        error.into_error(|attempts, last_error| Error::FetchExhausted {
            address: address.to_string(),
            attempts,
            refetch_sleep: self.config.refetch_sleep,
            last_error: Box::new(last_error),
        })
    }
}

/// Decode a string characteristic, dropping NUL padding.
fn characteristic_string(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}
