/*!
 * Global rolling-window rate limiter.
 *
 * One limiter is shared by every running job, since the generation API
 * enforces its ceiling per account rather than per job. The limiter keeps the
 * timestamps of recently accepted requests and holds its lock while a caller
 * waits, so acquisitions are granted strictly one at a time.
 */

use log::info;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::app_config::RuntimeConfig;

/// Timer granularity; keeps a zero safety margin from re-checking in place
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Rolling-window limiter on outbound requests
#[derive(Debug)]
pub struct RateLimiter {
    /// Accepted request timestamps, oldest first
    timestamps: Mutex<VecDeque<Instant>>,
    /// Source of the live requests-per-window ceiling
    runtime: RuntimeConfig,
    /// Window length
    window: Duration,
    /// Extra wait added after the oldest request leaves the window
    safety_margin: Duration,
}

impl RateLimiter {
    pub fn new(runtime: RuntimeConfig, window: Duration, safety_margin: Duration) -> Self {
        Self {
            timestamps: Mutex::new(VecDeque::new()),
            runtime,
            window,
            safety_margin,
        }
    }

    /// Wait until one more request is allowed, then record it.
    ///
    /// The ceiling is re-read on every check, so a live configuration change
    /// applies to waiting callers too.
    pub async fn acquire(&self) {
        let mut timestamps = self.timestamps.lock().await;

        loop {
            let now = Instant::now();
            while timestamps
                .front()
                .is_some_and(|oldest| now.duration_since(*oldest) > self.window)
            {
                timestamps.pop_front();
            }

            let ceiling = self.runtime.requests_per_minute().max(1) as usize;
            if timestamps.len() < ceiling {
                break;
            }

            // At least `len - ceiling + 1` entries must leave the window; an
            // entry exactly one window old still counts
            let blocking = timestamps[timestamps.len() - ceiling];
            let wait = ((blocking + self.window).saturating_duration_since(now) + self.safety_margin)
                .max(MIN_WAIT);
            info!("Rate limit reached, waiting {:.1}s", wait.as_secs_f64());
            tokio::time::sleep(wait).await;
        }

        timestamps.push_back(Instant::now());
    }

    /// Requests accepted within the current window
    pub async fn recent_requests(&self) -> usize {
        let timestamps = self.timestamps.lock().await;
        let now = Instant::now();
        timestamps
            .iter()
            .filter(|t| now.duration_since(**t) <= self.window)
            .count()
    }
}
