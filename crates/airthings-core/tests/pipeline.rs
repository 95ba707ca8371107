//! End-to-end tests for the acquisition pipeline against the mock transport.
//!
//! All tests run on a paused clock so the exact time spent sleeping can be
//! asserted.

use std::error::Error as _;
use std::time::Duration;

use airthings_core::{
    AcquisitionConfig, AcquisitionState, Acquirer, Advertisement, ConnectionState, Device,
    DiscoveryFilter, Error, FailurePolicy, MockPeripheral, MockTransport, ParseError, SensorKind,
    SensorValue, SerialNumber, Severity, uuids,
};
use airthings_types::encode_identity;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const PLUS: &str = "AA:00:00:00:00:01";
const GEN2: &str = "AA:00:00:00:00:02";
const MINI: &str = "AA:00:00:00:00:03";
const GEN1: &str = "AA:00:00:00:00:04";

/// Wave Plus record: version 1, humidity 45 %rH, radon 25 / 30 Bq/m3,
/// 21.5 °C, 1010 hPa, 812 ppm CO2, 120 ppb VOC.
const PLUS_FIELDS: [u32; 12] = [1, 90, 0, 0, 25, 30, 2150, 50500, 812, 120, 0, 0];

fn serial(s: &str) -> SerialNumber {
    SerialNumber::parse(s).unwrap()
}

fn config() -> AcquisitionConfig {
    AcquisitionConfig::default()
        .scan_attempts(3)
        .scan_timeout(Duration::from_secs(3))
        .rescan_sleep(Duration::from_secs(1))
        .connect_attempts(3)
        .reconnect_sleep(Duration::from_secs(10))
        .fetch_attempts(3)
        .refetch_sleep(Duration::from_secs(5))
        .next_device_sleep(Duration::from_millis(100))
        .before_fetch_sleep(Duration::from_secs(3))
}

fn plus() -> MockPeripheral {
    MockPeripheral::new(PLUS, serial("2930058816"))
        .with_fields(&PLUS_FIELDS)
        .unwrap()
}

fn gen2() -> MockPeripheral {
    MockPeripheral::new(GEN2, serial("2950000001"))
        .with_fields(&[1, 100, 0, 0, 20, 22, 1900, 0, 0, 0, 0, 0])
        .unwrap()
}

fn device_for(peripheral: &MockPeripheral) -> Device {
    Device::from_parts(peripheral.address(), peripheral.serial_number().clone()).unwrap()
}

fn acquirer(transport: MockTransport) -> Acquirer<MockTransport> {
    Acquirer::new(transport, config()).unwrap()
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_fetch_all_decodes_and_annotates() {
    let acquirer = acquirer(MockTransport::builder().peripheral(plus()).build());
    let start = Instant::now();

    let outcomes = acquirer.fetch_all().await.unwrap();

    // scan, before-fetch pause, one next-device pause
    assert_eq!(start.elapsed(), Duration::from_millis(6100));
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_ok());

    let device = outcomes[0].device.as_ref().unwrap();
    assert_eq!(device.state(), AcquisitionState::Decoded);
    assert_eq!(device.connection(), ConnectionState::Disconnected);
    assert_eq!(
        device.trail(),
        &[
            AcquisitionState::Idle,
            AcquisitionState::Connecting,
            AcquisitionState::Connected,
            AcquisitionState::Fetching,
            AcquisitionState::Decoded,
        ]
    );

    let measurements = device.measurements().unwrap();
    assert_eq!(measurements.len(), 7);

    let co2 = measurements.co2().unwrap();
    assert_eq!(co2.value, SensorValue::Number(812.0));
    assert_eq!(co2.alarm.unwrap().severity, Severity::Medium);

    let humidity = measurements.humidity().unwrap();
    assert_eq!(humidity.value, SensorValue::Number(45.0));
    assert_eq!(humidity.alarm.unwrap().severity, Severity::None);

    // pressure has no rule table
    assert!(measurements.atmospheric_pressure().unwrap().alarm.is_none());

    let transport = acquirer.transport();
    assert_eq!(transport.scan_count(), 1);
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(transport.read_count(), 1);
    assert_eq!(transport.disconnect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_capabilities_limit_measurement_keys() {
    let acquirer = acquirer(MockTransport::builder().peripheral(gen2()).build());
    let mut device = device_for(&gen2());

    acquirer.acquire(&mut device).await.unwrap();

    let measurements = device.measurements().unwrap();
    assert!(!measurements.contains(SensorKind::Co2));
    assert!(!measurements.contains(SensorKind::Voc));
    assert!(!measurements.contains(SensorKind::AtmosphericPressure));
    assert_eq!(measurements.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_concatenated_payload_reads_every_characteristic() {
    let peripheral = MockPeripheral::new(GEN1, serial("2900000007"))
        .with_fields(&[2024, 5, 17, 12, 30, 0, 4550, 2150, 160, 37])
        .unwrap();
    let mut device = device_for(&peripheral);
    let acquirer = acquirer(MockTransport::builder().peripheral(peripheral).build());

    acquirer.acquire(&mut device).await.unwrap();

    assert_eq!(acquirer.transport().read_count(), 5);
    let measurements = device.measurements().unwrap();
    assert_eq!(measurements.temperature().unwrap().value, SensorValue::Number(21.5));
    let radon = measurements.radon_short_term_avg().unwrap();
    assert_eq!(radon.value, SensorValue::Number(160.0));
    assert_eq!(radon.alarm.unwrap().severity, Severity::High);
}

#[tokio::test(start_paused = true)]
async fn test_radon_sentinel_is_unavailable() {
    let peripheral = MockPeripheral::new(GEN2, serial("2950000001"))
        .with_fields(&[1, 100, 0, 0, 65535, 22, 1900, 0, 0, 0, 0, 0])
        .unwrap();
    let mut device = device_for(&peripheral);
    let acquirer = acquirer(MockTransport::builder().peripheral(peripheral).build());

    acquirer.acquire(&mut device).await.unwrap();

    let radon = device.measurements().unwrap().radon_short_term_avg().unwrap();
    assert_eq!(radon.value, SensorValue::Unavailable);
    assert_eq!(radon.alarm.unwrap().severity, Severity::Unknown);
}

// =============================================================================
// Connect budget
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_retries_sleep_once_per_failure() {
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .connect_failures(2)
            .build(),
    );
    let start = Instant::now();

    let devices = acquirer.fetch_devices(vec![device_for(&plus())]).await.unwrap();

    assert_eq!(start.elapsed(), Duration::from_millis(20_100));
    assert_eq!(acquirer.transport().connect_count(), 3);
    assert_eq!(devices[0].state(), AcquisitionState::Decoded);
}

#[tokio::test(start_paused = true)]
async fn test_connect_exhaustion_makes_no_extra_try() {
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .connect_failures(3)
            .build(),
    );
    let mut device = device_for(&plus());
    let start = Instant::now();

    let err = acquirer.acquire(&mut device).await.unwrap_err();

    match &err {
        Error::ConnectExhausted {
            attempts,
            reconnect_sleep,
            ..
        } => {
            assert_eq!(*attempts, 3);
            assert_eq!(*reconnect_sleep, Duration::from_secs(10));
        }
        other => panic!("expected ConnectExhausted, got {other:?}"),
    }
    assert!(err.to_string().contains("connect_attempts"));
    assert!(err.source().is_some());

    // two sleeps, none after the final failure
    assert_eq!(start.elapsed(), Duration::from_secs(20));
    assert_eq!(acquirer.transport().connect_count(), 3);
    assert_eq!(acquirer.transport().read_count(), 0);
    assert_eq!(device.state(), AcquisitionState::ConnectExhausted);
    assert!(device.measurements().is_none());
}

// =============================================================================
// Fetch budget
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_fetch_retries_after_read_failures() {
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .read_failures(2)
            .build(),
    );
    let mut device = device_for(&plus());
    let start = Instant::now();

    acquirer.acquire(&mut device).await.unwrap();

    assert_eq!(start.elapsed(), Duration::from_secs(10));
    assert_eq!(acquirer.transport().read_count(), 3);
    // plain read failures never reconnect
    assert_eq!(acquirer.transport().connect_count(), 1);
    assert_eq!(device.state(), AcquisitionState::Decoded);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_triggers_hard_reconnect() {
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .read_disconnects(1)
            .build(),
    );
    let mut device = device_for(&plus());
    let start = Instant::now();

    acquirer.acquire(&mut device).await.unwrap();

    assert_eq!(start.elapsed(), Duration::from_secs(5));
    let transport = acquirer.transport();
    assert_eq!(transport.connect_count(), 2);
    assert_eq!(transport.disconnect_count(), 2);
    assert_eq!(transport.read_count(), 2);

    use AcquisitionState::*;
    assert_eq!(
        device.trail(),
        &[Idle, Connecting, Connected, Fetching, Connecting, Connected, Fetching, Decoded]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unknown_connection_status_still_reconnects() {
    let transport = MockTransport::builder()
        .peripheral(plus())
        .read_disconnects(1)
        .build();
    transport.set_unknown_status(true);
    let acquirer = acquirer(transport);
    let mut device = device_for(&plus());

    acquirer.acquire(&mut device).await.unwrap();

    assert_eq!(acquirer.transport().connect_count(), 2);
    assert_eq!(device.state(), AcquisitionState::Decoded);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_exhaustion_reconnects_only_while_budget_remains() {
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .read_disconnects(3)
            .build(),
    );
    let mut device = device_for(&plus());
    let start = Instant::now();

    let err = acquirer.acquire(&mut device).await.unwrap_err();

    assert!(matches!(err, Error::FetchExhausted { attempts: 3, .. }));
    assert!(err.to_string().contains("refetch_sleep"));
    let source = err.source().unwrap();
    assert!(source.to_string().contains("disconnected"));

    assert_eq!(start.elapsed(), Duration::from_secs(10));
    let transport = acquirer.transport();
    assert_eq!(transport.read_count(), 3);
    // initial connect plus one hard reconnect after each of the first two tries
    assert_eq!(transport.connect_count(), 3);
    assert_eq!(device.state(), AcquisitionState::FetchExhausted);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payload_is_not_retried() {
    let peripheral = MockPeripheral::new(PLUS, serial("2930058816"))
        .with_characteristic(uuids::WAVE_PLUS_CURRENT_VALUES, vec![0u8; 5]);
    let mut device = device_for(&peripheral);
    let acquirer = acquirer(MockTransport::builder().peripheral(peripheral).build());
    let start = Instant::now();

    let err = acquirer.acquire(&mut device).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Parse(ParseError::MalformedPayload {
            expected: 20,
            actual: 5,
            ..
        })
    ));
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(acquirer.transport().read_count(), 1);
    assert_eq!(acquirer.transport().disconnect_count(), 1);
    assert_eq!(device.state(), AcquisitionState::Failed);
}

// =============================================================================
// Scan budget and discovery
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_scan_retry_then_success() {
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .scan_failures(1)
            .build(),
    );
    let start = Instant::now();

    let devices = acquirer.discover(&DiscoveryFilter::All).await.unwrap();

    assert_eq!(devices.len(), 1);
    assert_eq!(start.elapsed(), Duration::from_secs(7));
    assert_eq!(acquirer.transport().scan_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_scan_exhaustion() {
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .scan_failures(3)
            .build(),
    );
    let start = Instant::now();

    let err = acquirer.discover(&DiscoveryFilter::All).await.unwrap_err();

    match err {
        Error::ScanExhausted {
            attempts,
            scan_timeout,
            rescan_sleep,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(scan_timeout, Duration::from_secs(3));
            assert_eq!(rescan_sleep, Duration::from_secs(1));
        }
        other => panic!("expected ScanExhausted, got {other:?}"),
    }
    // three scans and two rescan sleeps
    assert_eq!(start.elapsed(), Duration::from_secs(11));
    assert_eq!(acquirer.transport().scan_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_discover_skips_foreign_and_unknown_models() {
    let unknown = serial("1111000000");
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .peripheral(gen2())
            .advertisement(Advertisement::new(
                "CC:00:00:00:00:01",
                vec![encode_identity(&unknown).unwrap().to_vec()],
            ))
            .advertisement(Advertisement::new(
                "CC:00:00:00:00:02",
                vec![vec![0x4c, 0x00, 0x02, 0x15]],
            ))
            .build(),
    );

    let mut devices = acquirer.discover(&DiscoveryFilter::All).await.unwrap();
    devices.sort_by(|a, b| a.address().cmp(b.address()));

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].address(), PLUS);
    assert_eq!(devices[1].address(), GEN2);
}

#[tokio::test(start_paused = true)]
async fn test_discover_filters() {
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .peripheral(gen2())
            .build(),
    );

    let by_address = acquirer
        .discover(&DiscoveryFilter::Addresses(vec![GEN2.to_lowercase()]))
        .await
        .unwrap();
    assert_eq!(by_address.len(), 1);
    assert_eq!(by_address[0].address(), GEN2);

    let device = acquirer.find_device_by_serial_number("058816").await.unwrap();
    assert_eq!(device.address(), PLUS);

    let device = acquirer.find_device_by_serial_number("2950000001").await.unwrap();
    assert_eq!(device.address(), GEN2);

    let err = acquirer.find_device_by_address("DD:DD:DD:DD:DD:DD").await.unwrap_err();
    assert!(matches!(err, Error::DeviceNotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_requested_serial_fails_before_scanning() {
    let acquirer = acquirer(MockTransport::builder().peripheral(plus()).build());

    let err = acquirer
        .fetch_from_serial_numbers(&["1234567890".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Parse(ParseError::UnknownModel(ref m)) if m == "1234"));
    assert_eq!(acquirer.transport().scan_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_from_serial_numbers() {
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .peripheral(gen2())
            .build(),
    );

    let outcomes = acquirer
        .fetch_from_serial_numbers(&["2950000001".to_string()])
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].address, GEN2);
    assert_eq!(acquirer.transport().connect_count(), 1);
}

// =============================================================================
// Identification by address
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_fetch_from_addresses_identifies_without_scanning() {
    let mini = MockPeripheral::new(MINI, serial("2920000042"))
        .with_fields(&[0, 29565, 0, 5000, 150, 0, 0, 0])
        .unwrap();
    let acquirer = acquirer(MockTransport::builder().peripheral(mini).build());
    let start = Instant::now();

    let outcomes = acquirer.fetch_from_addresses(&[MINI.to_string()]).await.unwrap();

    assert_eq!(acquirer.transport().scan_count(), 0);
    // identify, then acquire
    assert_eq!(acquirer.transport().connect_count(), 2);
    assert_eq!(start.elapsed(), Duration::from_millis(3100));

    let device = outcomes[0].device.as_ref().unwrap();
    assert_eq!(device.serial_number().as_str(), "2920000042");
    assert_eq!(device.spec().label, "Wave Mini Gen 1");
    let measurements = device.measurements().unwrap();
    assert_eq!(measurements.temperature().unwrap().value, SensorValue::Number(22.5));
    assert_eq!(measurements.voc().unwrap().value, SensorValue::Number(150.0));
}

#[tokio::test(start_paused = true)]
async fn test_fetch_from_addresses_on_cold_adapter() {
    let acquirer = acquirer(
        MockTransport::builder()
            .uncached_peripheral(plus())
            .lookup_scan(Duration::from_secs(2))
            .build(),
    );
    let start = Instant::now();

    let outcomes = acquirer.fetch_from_addresses(&[PLUS.to_string()]).await.unwrap();

    assert!(outcomes[0].is_ok());
    assert_eq!(outcomes[0].state(), AcquisitionState::Decoded);

    let transport = acquirer.transport();
    assert_eq!(transport.scan_count(), 0);
    // one lookup scan on the identity connect, the fetch connect hits the cache
    assert_eq!(transport.lookup_scan_count(), 1);
    assert_eq!(transport.connect_count(), 2);
    assert_eq!(start.elapsed(), Duration::from_millis(5100));
}

#[tokio::test(start_paused = true)]
async fn test_identify_uses_connect_budget() {
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .connect_failures(1)
            .build(),
    );
    let start = Instant::now();

    let device = acquirer.identify(PLUS).await.unwrap();

    assert_eq!(device.serial_number().as_str(), "2930058816");
    assert_eq!(start.elapsed(), Duration::from_secs(10));
    assert_eq!(acquirer.transport().disconnect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_identify_exhaustion() {
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .connect_failures(3)
            .build(),
    );

    let err = acquirer.identify(PLUS).await.unwrap_err();
    assert!(matches!(err, Error::ConnectExhausted { attempts: 3, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_isolated_addresses_keep_unidentified_device() {
    const UNKNOWN: &str = "AA:00:00:00:00:99";
    let acquirer = acquirer(MockTransport::builder().peripheral(plus()).build())
        .with_failure_policy(FailurePolicy::Isolate);

    let outcomes = acquirer
        .fetch_from_addresses(&[UNKNOWN.to_string(), PLUS.to_string()])
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);

    assert_eq!(outcomes[0].address, UNKNOWN);
    assert!(outcomes[0].device.is_none());
    assert!(matches!(
        outcomes[0].result,
        Err(Error::ConnectExhausted { ref address, attempts: 3, .. }) if address == UNKNOWN
    ));
    assert_eq!(outcomes[0].state(), AcquisitionState::ConnectExhausted);

    assert_eq!(outcomes[1].address, PLUS);
    assert!(outcomes[1].is_ok());
    assert_eq!(outcomes[1].state(), AcquisitionState::Decoded);
    assert_eq!(outcomes[1].measurements().unwrap().len(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_stop_on_first_addresses_abort_on_unidentified_device() {
    let acquirer = acquirer(MockTransport::builder().peripheral(plus()).build());

    let err = acquirer
        .fetch_from_addresses(&[PLUS.to_string(), "AA:00:00:00:00:99".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ConnectExhausted { .. }));
    // only the identity reads of the first address, nothing fetched
    assert_eq!(acquirer.transport().read_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_read_debug_info() {
    let acquirer = acquirer(MockTransport::builder().peripheral(plus()).build());
    let mut device = device_for(&plus());

    let info = acquirer.read_debug_info(&mut device).await.unwrap();

    assert_eq!(info.firmware_revision, "G-BLE-1.5.3");
    assert_eq!(info.hardware_revision, "REV A");
    assert_eq!(device.debug_info(), Some(&info));
    assert_eq!(device.state(), AcquisitionState::Idle);
    assert_eq!(acquirer.transport().disconnect_count(), 1);
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_stop_on_first_aborts_batch() {
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .peripheral(gen2())
            .connect_failures(3)
            .build(),
    );

    let err = acquirer
        .fetch_devices(vec![device_for(&plus()), device_for(&gen2())])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ConnectExhausted { ref address, .. } if address == PLUS));
    assert_eq!(acquirer.transport().connect_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_isolate_continues_after_failure() {
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .peripheral(gen2())
            .connect_failures(3)
            .build(),
    )
    .with_failure_policy(FailurePolicy::Isolate);
    let start = Instant::now();

    let outcomes = acquirer
        .fetch_batch(vec![device_for(&plus()), device_for(&gen2())])
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0].result, Err(Error::ConnectExhausted { .. })));
    assert_eq!(outcomes[0].state(), AcquisitionState::ConnectExhausted);
    assert!(outcomes[1].is_ok());
    assert_eq!(outcomes[1].state(), AcquisitionState::Decoded);

    // two reconnect sleeps for the first device, a next-device pause after each
    assert_eq!(start.elapsed(), Duration::from_millis(20_200));
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_start() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let acquirer = acquirer(MockTransport::builder().peripheral(plus()).build())
        .with_cancellation(cancel);

    let err = acquirer.fetch_all().await.unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(acquirer.transport().scan_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_reconnect_sleep() {
    let cancel = CancellationToken::new();
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .connect_failures(2)
            .build(),
    )
    .with_cancellation(cancel.clone());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(15)).await;
        trigger.cancel();
    });

    let mut device = device_for(&plus());
    let start = Instant::now();
    let err = acquirer.acquire(&mut device).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(start.elapsed(), Duration::from_secs(15));
    assert_eq!(acquirer.transport().connect_count(), 2);
    assert_eq!(device.state(), AcquisitionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_between_devices() {
    let cancel = CancellationToken::new();
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .peripheral(gen2())
            .build(),
    )
    .with_cancellation(cancel.clone())
    .with_failure_policy(FailurePolicy::Isolate);

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcomes = acquirer
        .fetch_batch(vec![device_for(&plus()), device_for(&gen2())])
        .await
        .unwrap();

    // the first device finished and is kept, the second was never contacted
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].is_ok());
    assert!(outcomes[0].measurements().is_some());
    assert_eq!(outcomes[1].address, GEN2);
    assert!(matches!(outcomes[1].result, Err(Error::Cancelled)));
    assert_eq!(outcomes[1].state(), AcquisitionState::Idle);
    assert_eq!(acquirer.transport().connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_acquire_keeps_earlier_outcomes() {
    let cancel = CancellationToken::new();
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .peripheral(gen2())
            .build(),
    )
    .with_cancellation(cancel.clone())
    .with_failure_policy(FailurePolicy::Isolate);

    let unreachable = Device::from_parts("AA:00:00:00:00:98", serial("2950000002")).unwrap();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        // inside the first reconnect sleep of the unreachable device
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let outcomes = acquirer
        .fetch_batch(vec![device_for(&plus()), unreachable, device_for(&gen2())])
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_ok());
    assert!(matches!(outcomes[1].result, Err(Error::Cancelled)));
    assert_eq!(outcomes[1].state(), AcquisitionState::Failed);
    assert!(matches!(outcomes[2].result, Err(Error::Cancelled)));
    assert_eq!(outcomes[2].state(), AcquisitionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_stop_on_first_still_returns_cancelled() {
    let cancel = CancellationToken::new();
    let acquirer = acquirer(
        MockTransport::builder()
            .peripheral(plus())
            .peripheral(gen2())
            .build(),
    )
    .with_cancellation(cancel.clone());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = acquirer
        .fetch_batch(vec![device_for(&plus()), device_for(&gen2())])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = Acquirer::new(
        MockTransport::builder().build(),
        AcquisitionConfig::default().fetch_attempts(0),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}
