//! Timeout-bounded polling

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

/// Shortest pause between attempts
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Result of [`poll_until`]
#[derive(Debug)]
pub enum PollOutcome<T, E> {
    /// A produced value passed the stop condition
    Satisfied {
        value: T,
        attempts: u32,
        elapsed: Duration,
    },
    /// The deadline passed first; carries whatever was seen last
    TimedOut {
        last: Option<T>,
        last_error: Option<E>,
        attempts: u32,
        elapsed: Duration,
    },
}

impl<T, E> PollOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Satisfied { attempts, .. } | PollOutcome::TimedOut { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollOutcome::Satisfied { .. })
    }
}

/// Call `produce` until `stop` accepts its value or `timeout` elapses.
///
/// `produce` always runs at least once and is never interrupted mid-call.
/// Failed attempts are remembered and retried. Between attempts the poller
/// sleeps for `interval`, clamped to the time left. A timeout too large to
/// put on the clock means there is no deadline.
pub async fn poll_until<T, E, P, Fut, S>(
    mut produce: P,
    mut stop: S,
    timeout: Duration,
    interval: Duration,
) -> PollOutcome<T, E>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    S: FnMut(&T) -> bool,
    E: Display,
{
    let started = Instant::now();
    let deadline = started.checked_add(timeout);
    let interval = interval.max(MIN_INTERVAL);
    let mut last = None;
    let mut last_error = None;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match produce().await {
            Ok(value) => {
                if stop(&value) {
                    return PollOutcome::Satisfied {
                        value,
                        attempts,
                        elapsed: started.elapsed(),
                    };
                }
                last = Some(value);
            }
            Err(err) => {
                debug!(attempt = attempts, "poll attempt failed: {err}");
                last_error = Some(err);
            }
        }

        let now = Instant::now();
        let pause = match deadline {
            Some(deadline) if now >= deadline => {
                return PollOutcome::TimedOut {
                    last,
                    last_error,
                    attempts,
                    elapsed: now - started,
                };
            }
            Some(deadline) => interval.min(deadline - now),
            None => interval,
        };
        sleep(pause).await;
    }
}
