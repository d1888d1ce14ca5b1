//! Tests for [`Debouncer`] — trailing-edge call coalescing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use muninn::{Debouncer, MuninnError};

const DELAY: Duration = Duration::from_millis(100);

/// Debouncer that records every argument the wrapped operation runs with.
fn recording_debouncer() -> (Debouncer<u32, u32>, Arc<Mutex<Vec<u32>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&calls);
    let debouncer = Debouncer::new(DELAY, move |x: u32| {
        let seen = Arc::clone(&seen);
        async move {
            seen.lock().unwrap().push(x);
            Ok(x * 10)
        }
    });
    (debouncer, calls)
}

#[tokio::test(start_paused = true)]
async fn burst_runs_once_with_last_arguments() {
    let (debouncer, calls) = recording_debouncer();

    let (r1, r2, r3, r4, r5) = tokio::join!(
        debouncer.call(1),
        debouncer.call(2),
        debouncer.call(3),
        debouncer.call(4),
        debouncer.call(5),
    );

    assert_eq!(*calls.lock().unwrap(), vec![5]);
    assert_eq!(r5.unwrap(), 50);
    for superseded in [r1, r2, r3, r4] {
        assert!(matches!(superseded, Err(MuninnError::Superseded)));
    }
}

#[tokio::test(start_paused = true)]
async fn each_call_resets_the_timer() {
    let (debouncer, calls) = recording_debouncer();
    let debouncer = Arc::new(debouncer);
    let started = tokio::time::Instant::now();

    let first = {
        let d = Arc::clone(&debouncer);
        tokio::spawn(async move { d.call(1).await })
    };
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(calls.lock().unwrap().is_empty());

    let second = {
        let d = Arc::clone(&debouncer);
        tokio::spawn(async move { d.call(2).await })
    };
    // 120ms after the first call, 60ms after the second: nothing ran yet
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(calls.lock().unwrap().is_empty());

    assert_eq!(second.await.unwrap().unwrap(), 20);
    assert!(started.elapsed() >= Duration::from_millis(160));
    assert!(matches!(first.await.unwrap(), Err(MuninnError::Superseded)));
    assert_eq!(*calls.lock().unwrap(), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn calls_after_quiet_period_run_separately() {
    let (debouncer, calls) = recording_debouncer();

    assert_eq!(debouncer.call(1).await.unwrap(), 10);
    assert_eq!(debouncer.call(2).await.unwrap(), 20);
    assert_eq!(*calls.lock().unwrap(), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn in_flight_execution_is_not_cancelled() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&calls);
    let debouncer = Arc::new(Debouncer::new(DELAY, move |x: u32| {
        let seen = Arc::clone(&seen);
        async move {
            // Slow operation: outlives the next call's arrival
            tokio::time::sleep(Duration::from_millis(500)).await;
            seen.lock().unwrap().push(x);
            Ok(x)
        }
    }));

    let first = {
        let d = Arc::clone(&debouncer);
        tokio::spawn(async move { d.call(1).await })
    };
    // Timer fired at 100ms; operation now running
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!debouncer.is_pending());

    let second = debouncer.call(2).await;
    assert_eq!(second.unwrap(), 2);
    assert_eq!(first.await.unwrap().unwrap(), 1);

    let mut seen = calls.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn pending_flag_tracks_schedule() {
    let (debouncer, _calls) = recording_debouncer();
    let debouncer = Arc::new(debouncer);
    assert!(!debouncer.is_pending());

    let handle = {
        let d = Arc::clone(&debouncer);
        tokio::spawn(async move { d.call(7).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(debouncer.is_pending());

    assert_eq!(handle.await.unwrap().unwrap(), 70);
    assert!(!debouncer.is_pending());
}
