//! Bounded waits
//!
//! Every suspension point in a scenario goes through a [`WaitPolicy`]. A wait
//! that runs out of time yields `false`/unmatched; it never aborts the scenario.

use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

use crate::driver::{BrowserDriver, ElementHandle};
use crate::error::ProbeResult;

/// Extra time granted to the driver beyond the policy timeout before we give up on it
const DRIVER_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Outcome of waiting for the browser location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationWait {
    pub matched: bool,
    /// Last URL observed before the wait ended
    pub observed: String,
}

/// Poll `current_url` until `predicate` holds or the policy timeout elapses
pub async fn wait_for_location<D, P>(
    driver: &mut D,
    policy: &WaitPolicy,
    predicate: P,
) -> ProbeResult<LocationWait>
where
    D: BrowserDriver + ?Sized,
    P: Fn(&str) -> bool,
{
    let deadline = Instant::now() + policy.timeout;
    loop {
        let observed = driver.current_url().await?;
        if predicate(&observed) {
            return Ok(LocationWait { matched: true, observed });
        }
        if Instant::now() >= deadline {
            debug!("Location wait expired at {}", observed);
            return Ok(LocationWait { matched: false, observed });
        }
        sleep(policy.poll_interval).await;
    }
}

/// Driver visibility wait, hard-capped so a stalled driver still resolves
pub async fn bounded_visible<D>(
    driver: &mut D,
    handle: &ElementHandle,
    policy: &WaitPolicy,
) -> ProbeResult<bool>
where
    D: BrowserDriver + ?Sized,
{
    match timeout(policy.timeout + DRIVER_GRACE, driver.wait_visible(handle, policy.timeout)).await {
        Ok(result) => result,
        Err(_) => {
            debug!("Driver did not answer visibility wait for {}", handle.query);
            Ok(false)
        }
    }
}
