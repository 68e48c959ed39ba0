//! Concurrency cap and rolling daily quota for outbound API calls.
//!
//! A [`RateLimiter`] hands out [`RateLimitLease`]s. A lease is granted only
//! when fewer than `max_concurrent` leases are outstanding and fewer than
//! `daily_limit` leases were granted in the trailing 24 hours. Dropping a
//! lease frees its concurrency slot; quota consumption only decays as old
//! grants leave the window.
//!
//! The window lives in memory for the lifetime of the process. Two processes
//! sharing one API key each see only their own requests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Length of the rolling quota window.
pub const QUOTA_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Rate limiter shared by every request of one client.
#[derive(Debug)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    daily_limit: u32,
    quota_wait: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

/// Permission to issue one request. Dropping it frees the concurrency slot.
#[derive(Debug)]
pub struct RateLimitLease {
    _permit: OwnedSemaphorePermit,
}

impl RateLimitLease {
    /// Return the concurrency slot explicitly.
    pub fn release(self) {}
}

impl RateLimiter {
    /// Create a limiter. A `max_concurrent` of zero is treated as one.
    pub fn new(max_concurrent: usize, daily_limit: u32) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            daily_limit,
            quota_wait: Duration::ZERO,
            grants: Mutex::new(VecDeque::new()),
        }
    }

    /// How long a caller is willing to wait for quota to free up before
    /// [`acquire`](Self::acquire) fails with [`Error::QuotaExhausted`].
    #[must_use]
    pub fn with_quota_wait(mut self, wait: Duration) -> Self {
        self.quota_wait = wait;
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Wait for a lease.
    ///
    /// Suspends while the concurrency cap is reached. When the daily quota
    /// is used up, waits for the oldest grant to expire if that happens
    /// within the configured tolerance, and fails otherwise.
    pub async fn acquire(&self) -> Result<RateLimitLease> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::InvalidConfig("rate limiter closed".to_string()))?;

        let deadline = Instant::now() + self.quota_wait;
        loop {
            let retry_after = {
                let mut grants = self.grants.lock().unwrap_or_else(PoisonError::into_inner);
                let now = Instant::now();
                prune(&mut grants, now);
                if grants.len() < self.daily_limit as usize {
                    grants.push_back(now);
                    return Ok(RateLimitLease { _permit: permit });
                }
                match grants.front() {
                    Some(oldest) => (*oldest + QUOTA_WINDOW).saturating_duration_since(now),
                    None => QUOTA_WINDOW,
                }
            };

            if Instant::now() + retry_after > deadline {
                warn!(
                    limit = self.daily_limit,
                    retry_after_secs = retry_after.as_secs(),
                    "Daily API limit reached"
                );
                return Err(Error::QuotaExhausted {
                    limit: self.daily_limit,
                    retry_after,
                });
            }

            debug!(
                wait_secs = retry_after.as_secs(),
                "Daily API limit reached, waiting for quota"
            );
            sleep(retry_after).await;
        }
    }

    /// Number of leases granted in the trailing 24 hours.
    pub fn requests_in_window(&self) -> u32 {
        let mut grants = self.grants.lock().unwrap_or_else(PoisonError::into_inner);
        prune(&mut grants, Instant::now());
        u32::try_from(grants.len()).unwrap_or(u32::MAX)
    }

    /// Leases still available in the current window.
    pub fn remaining(&self) -> u32 {
        self.daily_limit.saturating_sub(self.requests_in_window())
    }

    /// Concurrency slots not currently held.
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }
}

fn prune(grants: &mut VecDeque<Instant>, now: Instant) {
    while let Some(oldest) = grants.front() {
        if now.saturating_duration_since(*oldest) >= QUOTA_WINDOW {
            grants.pop_front();
        } else {
            break;
        }
    }
}
