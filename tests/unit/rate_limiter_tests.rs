/*!
 * Tests for the rolling-window rate limiter
 */

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use subrelay::app_config::{Config, ConfigUpdate, RuntimeConfig};
use subrelay::translation::RateLimiter;

const WINDOW: Duration = Duration::from_secs(60);

fn limiter(rpm: u32) -> (Arc<RateLimiter>, RuntimeConfig) {
    let config = Config {
        requests_per_minute: rpm,
        ..Config::default()
    };
    let runtime = RuntimeConfig::new(&config);
    let limiter = RateLimiter::new(runtime.clone(), WINDOW, Duration::from_millis(100));
    (Arc::new(limiter), runtime)
}

/// Largest number of grants falling inside any window starting at a grant
fn max_in_any_window(mut grants: Vec<Instant>) -> usize {
    grants.sort();
    grants
        .iter()
        .enumerate()
        .map(|(i, start)| grants[i..].iter().take_while(|t| **t < *start + WINDOW).count())
        .max()
        .unwrap_or(0)
}

#[tokio::test(start_paused = true)]
async fn test_acquire_withConcurrentCallers_shouldNeverExceedCeiling() {
    let (limiter, _) = limiter(3);

    let tasks = (0..10).map(|_| {
        let limiter = limiter.clone();
        tokio::spawn(async move {
            limiter.acquire().await;
            Instant::now()
        })
    });
    let grants: Vec<Instant> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(grants.len(), 10);
    assert!(max_in_any_window(grants) <= 3);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_underCeiling_shouldNotWait() {
    let (limiter, _) = limiter(5);
    let start = Instant::now();
    for _ in 0..5 {
        limiter.acquire().await;
    }
    assert_eq!(Instant::now(), start);
    assert_eq!(limiter.recent_requests().await, 5);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_overCeiling_shouldWaitForOldestToExpire() {
    let (limiter, _) = limiter(2);
    let start = Instant::now();
    limiter.acquire().await;
    limiter.acquire().await;
    limiter.acquire().await;

    let waited = Instant::now() - start;
    assert!(waited >= WINDOW, "waited only {:?}", waited);
    assert!(waited <= WINDOW + Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_acquire_afterLiveRaise_shouldUseNewCeiling() {
    let (limiter, runtime) = limiter(1);
    limiter.acquire().await;

    runtime.apply(&ConfigUpdate {
        rpm: Some(3),
        max_retries: None,
    });

    let start = Instant::now();
    limiter.acquire().await;
    limiter.acquire().await;
    assert_eq!(Instant::now(), start);
}
