//! Integration tests for the controller / cache / breaker interplay.

mod common;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use resilient_fetch::config::BreakerConfig;
use resilient_fetch::fetch::{FetchController, FetchError, ResourceId};
use resilient_fetch::resilience::{CircuitBreaker, CircuitState, ManualClock};

use common::ProgrammableFetcher;

fn breaker_on_clock(clock: Arc<ManualClock>) -> CircuitBreaker {
    CircuitBreaker::with_clock(
        BreakerConfig {
            failure_threshold: 3,
            cooldown_ms: 60_000,
        },
        clock,
    )
}

#[tokio::test]
async fn test_cache_hit_skips_remote_and_breaker() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();
    let fetcher = ProgrammableFetcher::new(move |id, _cancel| {
        let c = c.clone();
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(u64::from(id) * 10)
        }
    });
    let breaker = CircuitBreaker::new(BreakerConfig::default());
    let controller = FetchController::new(fetcher, breaker.clone());
    let mut rx = controller.subscribe();

    controller.request(ResourceId(1));
    rx.wait_for(|s| s.value == Some(10)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Open the breaker; the cached id must still resolve without the network
    for _ in 0..3 {
        breaker.record_failure();
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    controller.request(ResourceId(1));
    let state = controller.snapshot();
    assert_eq!(state.value, Some(10));
    assert!(state.error.is_none());
    assert!(!state.loading);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.failure_count(), 3);
}

#[tokio::test]
async fn test_newest_request_wins() {
    let release_first = Arc::new(Notify::new());
    let release = release_first.clone();
    let fetcher = ProgrammableFetcher::new(move |id, cancel| {
        let release = release.clone();
        async move {
            if id == ResourceId(1) {
                // Hold id 1 until released, noticing cancellation
                tokio::select! {
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    _ = release.notified() => {}
                }
                Ok(100)
            } else {
                Ok(200)
            }
        }
    });
    let breaker = CircuitBreaker::new(BreakerConfig::default());
    let controller = FetchController::new(fetcher, breaker.clone());
    let mut rx = controller.subscribe();

    controller.request(ResourceId(1));
    rx.wait_for(|s| s.loading).await.unwrap();

    // Supersede before the first call settles
    controller.request(ResourceId(2));
    let state = rx.wait_for(|s| s.value.is_some()).await.unwrap().clone();
    assert_eq!(state.value, Some(200));

    // Let the superseded call settle; it must not disturb anything
    release_first.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let state = controller.snapshot();
    assert_eq!(state.value, Some(200));
    assert!(state.error.is_none());
    assert_eq!(controller.cache_size(), 1);

    // Cancellation is not a dependency outcome
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

#[tokio::test]
async fn test_circuit_open_skips_remote() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();
    let fetcher = ProgrammableFetcher::new(move |_id, _cancel| {
        let c = c.clone();
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    });
    let breaker = breaker_on_clock(Arc::new(ManualClock::new()));
    for _ in 0..3 {
        breaker.record_failure();
    }

    let controller = FetchController::new(fetcher, breaker.clone());
    controller.request(ResourceId(7));

    let state = controller.snapshot();
    assert_eq!(state.error, Some(FetchError::CircuitOpen));
    assert!(!state.loading);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // A skipped call is not a failure
    assert_eq!(breaker.failure_count(), 3);
}

#[tokio::test]
async fn test_failures_open_circuit_then_probe_recovers() {
    let healthy = Arc::new(AtomicBool::new(false));
    let h = healthy.clone();
    let fetcher = ProgrammableFetcher::new(move |id, _cancel| {
        let h = h.clone();
        async move {
            if h.load(Ordering::SeqCst) {
                Ok(u64::from(id))
            } else {
                Err(FetchError::Service("connection reset".to_string()))
            }
        }
    });
    let clock = Arc::new(ManualClock::new());
    let breaker = breaker_on_clock(clock.clone());
    let controller = FetchController::new(fetcher, breaker.clone());
    let mut rx = controller.subscribe();

    // Three failing attempts trip the breaker
    for i in 0..3u64 {
        controller.request(ResourceId(i));
        rx.wait_for(|s| matches!(s.error, Some(FetchError::Service(_))) && !s.loading)
            .await
            .unwrap();
    }
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.failure_count(), 3);

    // The next attempt is refused without touching the network
    controller.request(ResourceId(99));
    assert_eq!(controller.snapshot().error, Some(FetchError::CircuitOpen));

    // After the cooldown the probe goes through and closes the circuit
    healthy.store(true, Ordering::SeqCst);
    clock.advance(60_000);
    controller.request(ResourceId(4));
    let state = rx.wait_for(|s| s.value.is_some()).await.unwrap().clone();
    assert_eq!(state.value, Some(4));
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

#[tokio::test]
async fn test_clear_cache_forces_refetch() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();
    let fetcher = ProgrammableFetcher::new(move |id, _cancel| {
        let c = c.clone();
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(u64::from(id) * 10)
        }
    });
    let controller =
        FetchController::new(fetcher, CircuitBreaker::new(BreakerConfig::default()));
    let mut rx = controller.subscribe();

    controller.request(ResourceId(5));
    rx.wait_for(|s| s.value == Some(50) && !s.loading).await.unwrap();

    controller.request(ResourceId(5));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    controller.clear_cache();
    assert_eq!(controller.cache_size(), 0);

    controller.request(ResourceId(5));
    rx.wait_for(|s| s.value == Some(50) && !s.loading).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(controller.cache_size(), 1);
}

#[tokio::test]
async fn test_success_resets_failure_streak() {
    let fetcher = ProgrammableFetcher::new(|id, _cancel| async move { Ok(u64::from(id) * 100) });
    let breaker = CircuitBreaker::new(BreakerConfig::default());
    breaker.record_failure();
    breaker.record_failure();
    assert_eq!(breaker.failure_count(), 2);

    let controller = FetchController::new(fetcher, breaker.clone());
    let mut rx = controller.subscribe();

    controller.request(ResourceId(42));
    let state = rx.wait_for(|s| s.value.is_some()).await.unwrap().clone();

    assert_eq!(state.value, Some(4200));
    assert_eq!(state.id, Some(ResourceId(42)));
    assert!(!state.loading);
    assert!(state.error.is_none());
    assert_eq!(controller.cache_size(), 1);
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}
