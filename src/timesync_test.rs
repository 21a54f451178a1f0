use super::*;
use std::sync::atomic::{AtomicBool, AtomicI64};

use tokio::time::sleep;

// =============================================================================
// OffsetSample / estimate_offset
// =============================================================================

#[test]
fn sample_uses_round_trip_midpoint() {
    let sample = OffsetSample::from_round_trip(1_000, 1_550, 1_100);
    assert_eq!(sample.rtt_ms, 100);
    assert_eq!(sample.offset_ms, 500);
}

#[test]
fn estimate_empty_is_none() {
    assert_eq!(estimate_offset(&[]), None);
}

#[test]
fn estimate_single_sample() {
    let s = OffsetSample { offset_ms: -42, rtt_ms: 30 };
    assert_eq!(estimate_offset(&[s]), Some(-42));
}

#[test]
fn estimate_discards_slow_round_trips() {
    let samples = [
        OffsetSample { offset_ms: 100, rtt_ms: 10 },
        OffsetSample { offset_ms: 900, rtt_ms: 300 },
        OffsetSample { offset_ms: 104, rtt_ms: 12 },
        OffsetSample { offset_ms: 700, rtt_ms: 100 },
        OffsetSample { offset_ms: 102, rtt_ms: 11 },
    ];
    assert_eq!(estimate_offset(&samples), Some(102));
}

// =============================================================================
// measure_offset / spawn_timesync
// =============================================================================

struct AheadServer {
    clock: SharedClock,
    ahead_ms: AtomicI64,
    down: AtomicBool,
}

#[async_trait::async_trait]
impl OffsetTransport for AheadServer {
    async fn server_time(&self, _id: u64) -> Result<i64, ClockError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(ClockError::Request("connection refused".into()));
        }
        Ok(self.clock.local_now() + self.ahead_ms.load(Ordering::SeqCst))
    }
}

fn server(clock: &SharedClock, ahead_ms: i64, down: bool) -> Arc<AheadServer> {
    Arc::new(AheadServer { clock: clock.clone(), ahead_ms: AtomicI64::new(ahead_ms), down: AtomicBool::new(down) })
}

#[tokio::test(start_paused = true)]
async fn measure_offset_matches_server_lead() {
    let clock = SharedClock::system();
    let transport = server(&clock, 750, false);
    let ids = AtomicU64::new(1);

    let offset = measure_offset(&clock, transport.as_ref(), 5, &ids).await.expect("measure");
    assert_eq!(offset, 750);
    assert_eq!(ids.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn measure_offset_with_zero_samples_fails() {
    let clock = SharedClock::system();
    let transport = server(&clock, 0, false);
    let err = measure_offset(&clock, transport.as_ref(), 0, &AtomicU64::new(1))
        .await
        .expect_err("no samples");
    assert!(matches!(err, ClockError::NoSamples));
}

#[tokio::test(start_paused = true)]
async fn poll_loop_aligns_clock() {
    let clock = SharedClock::system();
    let transport = server(&clock, -2_000, false);

    let handle = spawn_timesync(clock.clone(), transport, Duration::from_secs(1), 3);
    sleep(Duration::from_millis(10)).await;

    assert!(clock.is_synced());
    assert_eq!(clock.offset_ms(), -2_000);
    handle.stop();
}

#[tokio::test(start_paused = true)]
async fn unreachable_server_degrades_to_local_time() {
    let clock = SharedClock::system();
    let transport = server(&clock, 500, true);

    let _handle = spawn_timesync(clock.clone(), transport, Duration::from_secs(1), 3);
    sleep(Duration::from_millis(2_500)).await;

    assert!(!clock.is_synced());
    assert_eq!(clock.now(), clock.local_now());
}

#[tokio::test(start_paused = true)]
async fn outage_after_sync_holds_last_offset() {
    let clock = SharedClock::system();
    let transport = server(&clock, 300, false);

    let _handle = spawn_timesync(clock.clone(), transport.clone(), Duration::from_secs(1), 3);
    sleep(Duration::from_millis(10)).await;
    assert!(clock.is_synced());

    transport.down.store(true, Ordering::SeqCst);
    sleep(Duration::from_millis(1_500)).await;

    assert!(!clock.is_synced());
    assert_eq!(clock.offset_ms(), 300);
}

#[tokio::test(start_paused = true)]
async fn dropping_handle_stops_polling() {
    let clock = SharedClock::system();
    let transport = server(&clock, 100, false);

    let handle = spawn_timesync(clock.clone(), transport.clone(), Duration::from_secs(1), 1);
    sleep(Duration::from_millis(10)).await;
    drop(handle);

    let mut watcher = clock.subscribe(0);
    transport.ahead_ms.store(5_000, Ordering::SeqCst);
    let waited = tokio::time::timeout(Duration::from_secs(5), watcher.changed()).await;
    assert!(waited.is_err(), "offset updated after the poll task was dropped");
}

#[tokio::test(start_paused = true)]
async fn zero_interval_still_polls() {
    let clock = SharedClock::system();
    let transport = server(&clock, 400, false);

    let _handle = spawn_timesync(clock.clone(), transport, Duration::ZERO, 1);
    sleep(Duration::from_millis(10)).await;
    assert_eq!(clock.offset_ms(), 400);
}
