//! DOM waiter: polls a selector until the element exists, the deadline
//! passes, or the run is cancelled.

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use formpilot_page_driver::{DriverError, PageDriver};

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How a wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitVerdict {
    Found,
    TimedOut,
    Cancelled,
}

/// Polling element waiter with a hard timeout.
///
/// Cancellation is observed at every poll, so an abort lands within one
/// poll interval even while the deadline is still far away.
#[derive(Clone, Copy, Debug)]
pub struct DomWaiter {
    poll_interval: Duration,
    default_timeout: Duration,
}

impl Default for DomWaiter {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl DomWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Wait until `selector` resolves on the page.
    ///
    /// `deadline` falls back to the waiter default. Driver failures
    /// propagate; an absent element is a verdict, not an error.
    pub async fn wait_for(
        &self,
        driver: &dyn PageDriver,
        selector: &str,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<WaitVerdict, DriverError> {
        let deadline = deadline.unwrap_or(self.default_timeout);

        match timeout(deadline, self.poll_until_present(driver, selector, cancel)).await {
            Ok(verdict) => verdict,
            Err(_) => {
                debug!(selector, deadline_ms = deadline.as_millis() as u64, "wait timed out");
                Ok(WaitVerdict::TimedOut)
            }
        }
    }

    async fn poll_until_present(
        &self,
        driver: &dyn PageDriver,
        selector: &str,
        cancel: &CancellationToken,
    ) -> Result<WaitVerdict, DriverError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(WaitVerdict::Cancelled);
            }
            if driver.query(selector).await? {
                return Ok(WaitVerdict::Found);
            }
            sleep(self.poll_interval).await;
        }
    }
}
