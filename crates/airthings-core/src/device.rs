//! Airthings devices and their acquisition state.
//!
//! A [`Device`] is created from discovery or from an identity read and then
//! handed to an [`Acquirer`](crate::Acquirer), which is the only thing that
//! moves it between states. Every transition is appended to an audit trail.

use std::fmt;

use tracing::{debug, warn};

use airthings_types::{DeviceIdentity, DeviceModelSpec, MeasurementSet, SerialNumber};

use crate::error::Result;

/// Whether the pipeline currently holds a link to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// Where a device is in the connect, fetch and decode sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionState {
    /// Never acquired.
    #[default]
    Idle,
    Connecting,
    Connected,
    Fetching,
    /// Measurements were fetched and decoded.
    Decoded,
    /// The connect budget ran out.
    ConnectExhausted,
    /// The fetch budget ran out.
    FetchExhausted,
    /// Stopped by a non-retryable error or cancellation.
    Failed,
}

impl AcquisitionState {
    /// Whether the acquisition sequence has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AcquisitionState::Decoded
                | AcquisitionState::ConnectExhausted
                | AcquisitionState::FetchExhausted
                | AcquisitionState::Failed
        )
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: AcquisitionState) -> bool {
        use AcquisitionState::*;

        match (self, next) {
            (_, Failed) => true,
            (Idle, Connecting) => true,
            (s, Connecting) if s.is_terminal() => true,
            (Connecting, Connected | ConnectExhausted) => true,
            // a hard reconnect that did not succeed resumes fetching
            (Connecting, Fetching) => true,
            (Connected, Fetching) => true,
            (Fetching, Decoded | FetchExhausted | Connecting) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AcquisitionState::Idle => "idle",
            AcquisitionState::Connecting => "connecting",
            AcquisitionState::Connected => "connected",
            AcquisitionState::Fetching => "fetching",
            AcquisitionState::Decoded => "decoded",
            AcquisitionState::ConnectExhausted => "connect exhausted",
            AcquisitionState::FetchExhausted => "fetch exhausted",
            AcquisitionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Firmware and hardware revision strings read from a device.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DebugInfo {
    pub firmware_revision: String,
    pub hardware_revision: String,
}

/// A known Airthings device: identity, model, and acquisition state.
#[derive(Debug, Clone)]
pub struct Device {
    identity: DeviceIdentity,
    spec: &'static DeviceModelSpec,
    connection: ConnectionState,
    state: AcquisitionState,
    trail: Vec<AcquisitionState>,
    measurements: Option<MeasurementSet>,
    debug_info: Option<DebugInfo>,
}

impl Device {
    /// Create a device for an identity, resolving its model.
    ///
    /// Fails with [`ParseError::UnknownModel`](airthings_types::ParseError::UnknownModel)
    /// when the serial number's model is not supported.
    pub fn new(identity: DeviceIdentity) -> Result<Self> {
        let spec = airthings_types::resolve_serial(&identity.serial_number)?;
        Ok(Self::with_spec(identity, spec))
    }

    /// Create a device from an address and serial number.
    pub fn from_parts(address: impl Into<String>, serial_number: SerialNumber) -> Result<Self> {
        Self::new(DeviceIdentity::new(address, serial_number))
    }

    /// Create a device with an already-resolved model.
    pub fn with_spec(identity: DeviceIdentity, spec: &'static DeviceModelSpec) -> Self {
        Self {
            identity,
            spec,
            connection: ConnectionState::Disconnected,
            state: AcquisitionState::Idle,
            trail: vec![AcquisitionState::Idle],
            measurements: None,
            debug_info: None,
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Link-layer address.
    pub fn address(&self) -> &str {
        &self.identity.mac_address
    }

    pub fn serial_number(&self) -> &SerialNumber {
        &self.identity.serial_number
    }

    /// The 6-digit per-device identifier.
    pub fn identifier(&self) -> &str {
        self.identity.identifier()
    }

    pub fn spec(&self) -> &'static DeviceModelSpec {
        self.spec
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Every state the device has been in, oldest first.
    pub fn trail(&self) -> &[AcquisitionState] {
        &self.trail
    }

    /// Most recent successfully decoded measurements.
    pub fn measurements(&self) -> Option<&MeasurementSet> {
        self.measurements.as_ref()
    }

    pub fn debug_info(&self) -> Option<&DebugInfo> {
        self.debug_info.as_ref()
    }

    pub(crate) fn transition(&mut self, next: AcquisitionState) {
        let legal = self.state.can_transition_to(next);
        if !legal {
            warn!(
                address = %self.identity.mac_address,
                from = %self.state,
                to = %next,
                "Unexpected acquisition state transition"
            );
        }
        debug_assert!(legal, "illegal acquisition state transition {} -> {}", self.state, next);
        debug!(address = %self.identity.mac_address, from = %self.state, to = %next, "State transition");
        self.state = next;
        self.trail.push(next);
    }

    pub(crate) fn set_connection(&mut self, connection: ConnectionState) {
        self.connection = connection;
    }

    pub(crate) fn set_measurements(&mut self, measurements: MeasurementSet) {
        self.measurements = Some(measurements);
    }

    pub(crate) fn set_debug_info(&mut self, debug_info: DebugInfo) {
        self.debug_info = Some(debug_info);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.spec.label, self.identity.serial_number, self.identity.mac_address
        )
    }
}
