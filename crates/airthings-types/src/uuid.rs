//! Bluetooth UUIDs for Airthings Wave devices.
//!
//! This module contains all the UUIDs needed to identify Airthings
//! sensors and read their current values over Bluetooth Low Energy.

use uuid::{Uuid, uuid};

// --- Airthings data characteristic UUIDs ---

/// Wave Mini (Gen 1) current values, one 20-byte record.
pub const WAVE_MINI_CURRENT_VALUES: Uuid = uuid!("b42e3b98-ade7-11e4-89d3-123b93f75cba");

/// Wave Plus (Gen 1) current values, one 20-byte record.
pub const WAVE_PLUS_CURRENT_VALUES: Uuid = uuid!("b42e2a68-ade7-11e4-89d3-123b93f75cba");

/// Wave (Gen 2) current values, one 20-byte record.
pub const WAVE_GEN2_CURRENT_VALUES: Uuid = uuid!("b42e4dcc-ade7-11e4-89d3-123b93f75cba");

/// Wave (Gen 1) radon 24 hour average.
pub const RADON_SHORT_TERM_AVG: Uuid = uuid!("b42e01aa-ade7-11e4-89d3-123b93f75cba");

/// Wave (Gen 1) radon long term average.
pub const RADON_LONG_TERM_AVG: Uuid = uuid!("b42e0a4c-ade7-11e4-89d3-123b93f75cba");

// --- Standard environmental sensing characteristic UUIDs (Wave Gen 1) ---

/// Date time characteristic.
pub const DATE_TIME: Uuid = uuid!("00002a08-0000-1000-8000-00805f9b34fb");

/// Temperature characteristic.
pub const TEMPERATURE: Uuid = uuid!("00002a6e-0000-1000-8000-00805f9b34fb");

/// Humidity characteristic.
pub const HUMIDITY: Uuid = uuid!("00002a6f-0000-1000-8000-00805f9b34fb");

// --- Device Information characteristic UUIDs ---

/// Model number string characteristic.
pub const MODEL_NUMBER: Uuid = uuid!("00002a24-0000-1000-8000-00805f9b34fb");

/// Serial number string characteristic (the 6-digit identifier).
pub const SERIAL_NUMBER: Uuid = uuid!("00002a25-0000-1000-8000-00805f9b34fb");

/// Firmware revision string characteristic.
pub const FIRMWARE_REVISION: Uuid = uuid!("00002a26-0000-1000-8000-00805f9b34fb");

/// Hardware revision string characteristic.
pub const HARDWARE_REVISION: Uuid = uuid!("00002a27-0000-1000-8000-00805f9b34fb");
