//! Resilient BLE acquisition for Airthings Wave sensors.
//!
//! This crate drives Airthings devices through discovery, connection,
//! payload fetch, decoding and alarm evaluation, with bounded retries at
//! every radio step. Decoding itself lives in [`airthings_types`]; this crate
//! adds the radio, the retry protocol and the device state machine.
//!
//! # Features
//!
//! - **Device discovery**: Scan for advertising devices and identify their
//!   model from the manufacturer record
//! - **Identity reads**: Identify a device by address without scanning
//! - **Bounded retries**: Independent budgets for scan, connect and fetch,
//!   with a hard reconnect when the link drops mid-fetch
//! - **Batch pacing**: Fixed pauses before fetching and between devices
//! - **Cancellation**: Every try and every sleep observes a
//!   [`CancellationToken`](tokio_util::sync::CancellationToken)
//! - **Mock transport**: Scripted devices and failure injection for tests
//!
//! # Supported Devices
//!
//! | Device | Sensors |
//! |--------|---------|
//! | Wave Gen 1 | Humidity, Temperature, Radon |
//! | Wave Mini Gen 1 | Humidity, Temperature, VOC |
//! | Wave Plus Gen 1 | Humidity, Temperature, Radon, Pressure, CO₂, VOC |
//! | Wave Gen 2 | Humidity, Temperature, Radon |
//!
//! # Platform Differences
//!
//! On macOS, CoreBluetooth hides MAC addresses and devices are identified by
//! a UUID that is stable for a given device on a given Mac. On Linux and
//! Windows, devices are identified by their MAC address. [`Device::address`]
//! returns whichever identifier the platform uses.
//!
//! # Quick Start
//!
//! ```no_run
//! use airthings_core::{AcquisitionConfig, Acquirer, BleTransport, FailurePolicy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = BleTransport::new().await?;
//!     let acquirer = Acquirer::new(transport, AcquisitionConfig::default())?
//!         .with_failure_policy(FailurePolicy::Isolate);
//!
//!     for outcome in acquirer.fetch_all().await? {
//!         let Some(measurements) = outcome.measurements() else {
//!             continue;
//!         };
//!         for (kind, measurement) in measurements.iter() {
//!             println!("{}: {}", kind.label(), measurement);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod acquire;
pub mod ble;
pub mod config;
pub mod device;
pub mod error;
pub mod mock;
pub mod retry;
pub mod transport;

pub use acquire::{Acquirer, DeviceOutcome, DiscoveryFilter, FailurePolicy};
pub use ble::{BleConfig, BleConnection, BleTransport};
pub use config::AcquisitionConfig;
pub use device::{AcquisitionState, ConnectionState, DebugInfo, Device};
pub use error::{DeviceNotFoundReason, Error, Result, TransportError};
pub use mock::{MockConnection, MockPeripheral, MockTransport, MockTransportBuilder};
pub use retry::{Attempts, RetryError, RetryPolicy, cancellable_sleep, with_retry};
pub use transport::{Advertisement, ConnectionStatus, Transport};

// Re-export the types crate so callers need a single dependency.
pub use airthings_types::uuid as uuids;
pub use airthings_types::{
    AlarmRuleSet, AlarmRules, AlarmState, DeviceIdentity, DeviceModel, DeviceModelSpec,
    Measurement, MeasurementSet, ParseError, SensorKind, SensorValue, SerialNumber, Severity,
};
