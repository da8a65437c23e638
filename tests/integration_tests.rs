// Fieldgate - Integration Tests
//
// End-to-end tests over the public API, organized into categories:
// 1. Reading queue
// 2. Register decoding
// 3. Connectivity lifecycle
// 4. Polling cycle
// 5. Full gateway

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use approx::assert_relative_eq;
use fieldgate::{
    ConnectivityManager, DeviceDescriptor, DevicePoller, FailingClock, GatewayConfig, LinkEvent,
    LinkState, MemoryLink, MemorySink, MemoryTransport, NetworkConfig, PollingConfig, Reporter,
    SensorQueue, SensorRecord, SystemClock, TransportError,
};

const BLOCK: [u16; 5] = [0x0001, 0x4120, 0x0000, 0x41A0, 0x0000];

fn record(device: u8) -> SensorRecord {
    SensorRecord::new(None, device, 1, 50.0, 20.0)
}

fn fleet_bus(units: std::ops::RangeInclusive<u8>) -> MemoryTransport {
    let mut bus = MemoryTransport::new();
    for unit in units {
        bus.set_block(unit, 0, &BLOCK);
    }
    bus
}

// ============================================================================
// Reading Queue Tests
// ============================================================================

#[test]
fn test_queue_at_capacity_refuses_without_evicting() {
    let queue = SensorQueue::with_capacity(3);
    assert!(queue.try_enqueue(record(1)));
    assert!(queue.try_enqueue(record(2)));
    assert!(queue.try_enqueue(record(3)));

    assert!(!queue.try_enqueue(record(4)));
    assert_eq!(queue.len(), 3);

    // The oldest entry is untouched
    assert_eq!(queue.dequeue().unwrap().device, 1);
}

#[test]
fn test_queue_roundtrip_returns_same_fields() {
    let queue = SensorQueue::with_capacity(50);
    let original = SensorRecord::new(None, 3, 0x0007, 61.5, 18.25);
    assert!(queue.try_enqueue(original.clone()));

    assert_eq!(queue.dequeue().unwrap(), original);
    assert!(queue.is_empty());
}

#[test]
fn test_queue_preserves_fifo_across_threads() {
    let queue = SensorQueue::with_capacity(100);
    let producer = queue.clone();

    let handle = thread::spawn(move || {
        for device in 1..=50 {
            assert!(producer.try_enqueue(record(device)));
        }
        producer.close();
    });

    let mut seen = Vec::new();
    while let Some(item) = queue.dequeue() {
        seen.push(item.device);
    }
    handle.join().unwrap();

    let expected: Vec<u8> = (1..=50).collect();
    assert_eq!(seen, expected);
}

// ============================================================================
// Register Decoding Tests
// ============================================================================

#[test]
fn test_float_pairs_decode_exactly() {
    assert_eq!(fieldgate::float_from_words(0x4120, 0x0000), 10.0);
    assert_eq!(fieldgate::float_from_words(0x42C8, 0x0000), 100.0);
    assert_eq!(fieldgate::float_from_words(0x41A0, 0x0000), 20.0);
}

#[test]
fn test_descriptor_decodes_full_block() {
    let descriptor = DeviceDescriptor::new(2);
    let reading = descriptor.decode(None, &BLOCK).unwrap();
    assert_eq!(reading.device, 2);
    assert_eq!(reading.status, 1);
    assert_relative_eq!(reading.humidity, 10.0);
    assert_relative_eq!(reading.temperature, 20.0);
}

// ============================================================================
// Connectivity Lifecycle Tests
// ============================================================================

#[test]
fn test_retry_budget_reaches_failed_with_no_extra_attempts() {
    let mut manager = ConnectivityManager::new(MemoryLink::new(), 10);
    manager.start("plant-floor", "secret").unwrap();
    manager.handle_event(LinkEvent::StationStarted).unwrap();

    for _ in 0..10 {
        manager.handle_event(LinkEvent::Disconnected).unwrap();
    }
    assert_eq!(manager.status().state(), LinkState::Failed);
    assert!(!manager.is_connected());

    // Terminal until a fresh start: further events change nothing
    manager.handle_event(LinkEvent::Disconnected).unwrap();
    assert_eq!(manager.status().state(), LinkState::Failed);
}

#[test]
fn test_address_acquired_resets_budget() {
    let mut manager = ConnectivityManager::new(MemoryLink::new(), 3);
    manager.start("plant-floor", "secret").unwrap();
    manager.handle_event(LinkEvent::StationStarted).unwrap();

    manager.handle_event(LinkEvent::Disconnected).unwrap();
    manager.handle_event(LinkEvent::Disconnected).unwrap();
    manager.handle_event(LinkEvent::AddressAcquired).unwrap();
    assert!(manager.is_connected());
    assert_eq!(manager.status().retries(), 0);

    // With the budget fresh, the link survives another two drops
    manager.handle_event(LinkEvent::Disconnected).unwrap();
    manager.handle_event(LinkEvent::Disconnected).unwrap();
    assert_eq!(manager.status().state(), LinkState::Connecting);
}

#[test]
fn test_await_outcome_observes_pumped_events() {
    let mut link = MemoryLink::new();
    link.set_auto_acquire(true);
    let mut manager = ConnectivityManager::new(link, 10);
    manager.start("plant-floor", "secret").unwrap();

    let status = manager.status();
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let pump = thread::spawn(move || manager.run(&flag));

    assert_eq!(
        status.await_outcome(Some(Duration::from_secs(2))),
        LinkState::Connected
    );
    assert!(status.is_connected());

    shutdown.store(true, Ordering::Release);
    pump.join().unwrap();
}

// ============================================================================
// Polling Cycle Tests
// ============================================================================

#[test]
fn test_one_cycle_visits_each_device_once_in_order() {
    let queue = SensorQueue::with_capacity(50);
    let devices: Vec<_> = (1..=3).map(DeviceDescriptor::new).collect();
    let mut poller = DevicePoller::new(
        &PollingConfig::immediate(),
        devices,
        fleet_bus(1..=3),
        SystemClock,
        queue.clone(),
    );

    poller.poll_cycle();

    assert_eq!(queue.len(), 3);
    for expected in 1..=3 {
        let reading = queue.dequeue().unwrap();
        assert_eq!(reading.device, expected);
        assert_eq!(reading.humidity, 10.0);
        assert_eq!(reading.temperature, 20.0);
    }
    assert_eq!(poller.stats().readings, 3);
}

#[test]
fn test_mid_cycle_failure_skips_only_that_device() {
    let mut bus = fleet_bus(1..=3);
    bus.fail_unit(2, TransportError::NoResponse { unit_id: 2 });

    let queue = SensorQueue::with_capacity(50);
    let devices: Vec<_> = (1..=3).map(DeviceDescriptor::new).collect();
    let mut poller = DevicePoller::new(
        &PollingConfig::immediate(),
        devices,
        bus,
        SystemClock,
        queue.clone(),
    );

    poller.poll_cycle();

    assert_eq!(queue.len(), 2);
    assert_eq!(queue.dequeue().unwrap().device, 1);
    assert_eq!(queue.dequeue().unwrap().device, 3);
}

#[test]
fn test_clock_failure_yields_unstamped_reading() {
    let queue = SensorQueue::with_capacity(50);
    let mut poller = DevicePoller::new(
        &PollingConfig::immediate(),
        vec![DeviceDescriptor::new(1)],
        fleet_bus(1..=1),
        FailingClock,
        queue.clone(),
    );

    poller.poll_cycle();

    let reading = queue.dequeue().unwrap();
    assert!(reading.timestamp.is_none());
    assert_eq!(reading.humidity, 10.0);
}

// ============================================================================
// Full Gateway Tests
// ============================================================================

#[test]
fn test_three_devices_one_cycle_end_to_end() {
    let queue = SensorQueue::with_capacity(50);
    let devices: Vec<_> = (1..=3).map(DeviceDescriptor::new).collect();
    let mut poller = DevicePoller::new(
        &PollingConfig::immediate(),
        devices,
        fleet_bus(1..=3),
        SystemClock,
        queue.clone(),
    );

    poller.poll_cycle();
    assert_eq!(queue.len(), 3);
    queue.close();

    let sink = MemorySink::new();
    let mut reporter = Reporter::new(queue, sink.clone());
    reporter.run();

    let devices: Vec<u8> = sink.records().iter().map(|r| r.device).collect();
    assert_eq!(devices, vec![1, 2, 3]);
    assert!(sink
        .records()
        .iter()
        .all(|r| r.humidity == 10.0 && r.temperature == 20.0));
}

#[test]
fn test_gateway_polls_while_link_is_failed() {
    // Sensing is decoupled from connectivity: a link that never comes up
    // does not stop readings from reaching the sink.
    let config = GatewayConfig::new(
        NetworkConfig::new("plant-floor", "secret").with_max_retries(1),
        vec![DeviceDescriptor::new(1)],
    )
    .with_polling(PollingConfig {
        device_gap: Duration::ZERO,
        cycle_interval: Duration::from_millis(10),
    });

    let mut link = MemoryLink::new();
    link.push_event(LinkEvent::Disconnected);

    let sink = MemorySink::new();
    let gateway = fieldgate::Gateway::start(
        config,
        fleet_bus(1..=1),
        SystemClock,
        link,
        sink.clone(),
        None,
    )
    .unwrap();

    assert_eq!(
        gateway.await_link(Some(Duration::from_secs(2))),
        LinkState::Failed
    );
    while sink.is_empty() {
        thread::sleep(Duration::from_millis(5));
    }
    gateway.shutdown();

    assert!(!sink.is_empty());
}
