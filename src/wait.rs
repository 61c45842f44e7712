//! Wait controller: re-runs the snapshot pipeline until a required set
//! of env bindings exists or the retry budget is exhausted
//!
//! The sampler and the sleep are both injected so the retry protocol
//! can be tested deterministically without real time passing.
use std::time::Duration;

use crate::env::EnvBinding;
use crate::error::{Error, ErrorKind, Result};

/// Unlimited retry sentinel for [`WaitController::retries`]
pub const RETRY_FOREVER: i32 = -1;

/// Runs one full snapshot-filter-label-generate pass
pub trait Sampler {
    /// Generate env bindings from a fresh device database snapshot
    fn sample(&mut self) -> Result<Vec<EnvBinding>>;
}

impl<F> Sampler for F
where
    F: FnMut() -> Result<Vec<EnvBinding>>,
{
    fn sample(&mut self) -> Result<Vec<EnvBinding>> {
        self()
    }
}

/// Blocks between retry attempts
pub trait Sleeper {
    /// Sleep for `duration`
    fn sleep(&mut self, duration: Duration);
}

/// [`Sleeper`] backed by [`std::thread::sleep`]
#[derive(Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Retry policy for waiting on required env names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitController {
    /// Sampling attempts before giving up; [`RETRY_FOREVER`] to never stop
    pub retries: i32,
    /// Pause between attempts
    pub interval: Duration,
}

impl Default for WaitController {
    fn default() -> Self {
        WaitController {
            retries: 10,
            interval: Duration::from_secs(1),
        }
    }
}

impl WaitController {
    /// New controller with an explicit retry budget and interval
    pub fn new(retries: i32, interval: Duration) -> Self {
        WaitController { retries, interval }
    }

    /// Sample until every name in `required` is present among the
    /// generated bindings
    ///
    /// Returns the full binding set of the satisfying attempt. A
    /// [`ErrorKind::WaitTimeout`] error carries the names that never
    /// appeared; sampling errors abort immediately.
    pub fn wait<S, Z>(
        &self,
        required: &[String],
        sampler: &mut S,
        sleeper: &mut Z,
    ) -> Result<Vec<EnvBinding>>
    where
        S: Sampler,
        Z: Sleeper,
    {
        let mut remaining = self.retries;
        loop {
            let bindings = sampler.sample()?;
            let missing: Vec<&str> = required
                .iter()
                .filter(|name| !bindings.iter().any(|b| &b.name == *name))
                .map(String::as_str)
                .collect();

            if missing.is_empty() {
                return Ok(bindings);
            }

            if self.retries != RETRY_FOREVER {
                remaining -= 1;
                if remaining <= 0 {
                    let present: Vec<&str> = required
                        .iter()
                        .filter(|name| bindings.iter().any(|b| &&b.name == name))
                        .map(String::as_str)
                        .collect();
                    return Err(Error::new(
                        ErrorKind::WaitTimeout,
                        &format!(
                            "Gave up waiting after {} attempts; missing: [{}] present: [{}]",
                            self.retries,
                            missing.join(", "),
                            present.join(", ")
                        ),
                    ));
                }
            }

            log::info!(
                "Missing {} required name(s), retrying in {:?}",
                missing.len(),
                self.interval
            );
            sleeper.sleep(self.interval);
        }
    }
}
