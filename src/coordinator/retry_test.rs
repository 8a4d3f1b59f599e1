// ABOUTME: Tests for RetryPolicy - attempt bounds, backoff growth, and cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use super::retry::{RetryError, RetryPolicy};

#[test]
fn test_quadratic_backoff_strictly_increases() {
    let policy = RetryPolicy::quadratic(3, Duration::from_millis(100));
    let waits: Vec<_> = (1..=3).map(|n| policy.backoff(n)).collect();
    assert_eq!(
        waits,
        vec![
            Duration::from_millis(100),
            Duration::from_millis(400),
            Duration::from_millis(900)
        ]
    );
    assert!(waits.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_at_least_one_attempt() {
    assert_eq!(RetryPolicy::no_backoff(0).max_attempts(), 1);
}

#[tokio::test]
async fn test_succeeds_after_failures() {
    let policy = RetryPolicy::no_backoff(3);
    let calls = AtomicU32::new(0);

    let (value, attempts) = assert_ok!(
        policy
            .run(&CancellationToken::new(), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err("not yet")
                    } else {
                        Ok("ready")
                    }
                }
            })
            .await
    );

    assert_eq!(value, "ready");
    assert_eq!(attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_never_exceeds_max_attempts() {
    let policy = RetryPolicy::quadratic(3, Duration::from_millis(1));
    let calls = AtomicU32::new(0);

    let err = policy
        .run(&CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("down") }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(matches!(err, RetryError::Exhausted { attempts: 3, last: "down" }));
    assert_eq!(err.to_string(), "gave up after 3 attempts: down");
}

#[tokio::test]
async fn test_waits_between_attempts() {
    let waits = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let recorded = Arc::clone(&waits);
    let policy = RetryPolicy::new(3, move |n| {
        recorded.lock().push(n);
        Duration::from_millis(10 * u64::from(n))
    });

    let started = Instant::now();
    let _ = policy
        .run(&CancellationToken::new(), |_| async { Err::<(), _>("down") })
        .await;

    // No wait after the final attempt.
    assert_eq!(*waits.lock(), vec![1, 2]);
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn test_cancel_interrupts_backoff() {
    let policy = RetryPolicy::quadratic(3, Duration::from_secs(60));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = assert_err!(policy.run(&cancel, |_| async { Err::<(), _>("down") }).await);

    assert!(matches!(err, RetryError::Cancelled { attempts: 1 }));
    assert!(started.elapsed() < Duration::from_secs(5));
}
