//! Ambient timeout bookkeeping
//!
//! A resolver keeps one mutable "current timeout". Callers raise or lower it
//! before a lookup; every top-level call reads it exactly once into a
//! [`CallContext`] and the value drops back to the policy baseline once the
//! call completes.

use std::time::Duration;

use locus_policy_center::TimeoutResetPolicy;
use parking_lot::Mutex;
use tracing::debug;

/// Current timeout override; `None` means the policy baseline applies
#[derive(Debug, Default)]
pub struct TimeoutSettings {
    current: Mutex<Option<Duration>>,
}

impl TimeoutSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `timeout` for lookups until the next reset
    pub fn set_timeout(&self, timeout: Duration) {
        *self.current.lock() = Some(timeout);
    }

    /// Timeout the next lookup will use
    pub fn current(&self, baseline: Duration) -> Duration {
        (*self.current.lock()).unwrap_or(baseline)
    }

    /// Return to the baseline
    pub fn drop_timeouts(&self) {
        *self.current.lock() = None;
    }

    pub fn is_overridden(&self) -> bool {
        self.current.lock().is_some()
    }
}

/// Budget captured once at the entry of a resolution and carried down to
/// nested steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    timeout: Duration,
    depth: usize,
    ambient: bool,
}

impl CallContext {
    /// Entry of a call reading the ambient timeout
    pub fn top_level(timeout: Duration) -> Self {
        Self {
            timeout,
            depth: 0,
            ambient: true,
        }
    }

    /// Entry of a call with its own timeout; the ambient value is left alone
    pub fn explicit(timeout: Duration) -> Self {
        Self {
            timeout,
            depth: 0,
            ambient: false,
        }
    }

    /// Same budget, one level deeper
    pub fn nested(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..*self
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_top_level(&self) -> bool {
        self.depth == 0
    }

    pub fn uses_ambient(&self) -> bool {
        self.ambient
    }
}

/// Resets the ambient timeout when dropped, whichever way the call ends
#[must_use = "the ambient timeout is reset when the lease is dropped"]
pub struct TimeoutLease<'a> {
    settings: &'a TimeoutSettings,
    reset: bool,
    depth: usize,
}

impl<'a> TimeoutLease<'a> {
    pub fn acquire(
        settings: &'a TimeoutSettings,
        ctx: &CallContext,
        policy: TimeoutResetPolicy,
    ) -> Self {
        let reset = ctx.uses_ambient()
            && match policy {
                TimeoutResetPolicy::EveryCall => true,
                TimeoutResetPolicy::TopLevelOnly => ctx.is_top_level(),
            };
        Self {
            settings,
            reset,
            depth: ctx.depth(),
        }
    }

    pub fn resets(&self) -> bool {
        self.reset
    }
}

impl Drop for TimeoutLease<'_> {
    fn drop(&mut self) {
        if self.reset {
            debug!(depth = self.depth, "ambient timeout back to baseline");
            self.settings.drop_timeouts();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASELINE: Duration = Duration::from_secs(20);

    #[test]
    fn override_applies_until_dropped() {
        let settings = TimeoutSettings::new();
        assert_eq!(settings.current(BASELINE), BASELINE);

        settings.set_timeout(Duration::from_secs(2));
        assert_eq!(settings.current(BASELINE), Duration::from_secs(2));
        assert!(settings.is_overridden());

        settings.drop_timeouts();
        assert_eq!(settings.current(BASELINE), BASELINE);
    }

    #[test]
    fn nested_context_keeps_outer_budget() {
        let outer = CallContext::top_level(Duration::from_secs(7));
        let inner = outer.nested();
        assert_eq!(inner.timeout(), Duration::from_secs(7));
        assert_eq!(inner.depth(), 1);
        assert!(!inner.is_top_level());
    }

    #[test]
    fn every_call_resets_after_nested_step() {
        let settings = TimeoutSettings::new();
        settings.set_timeout(Duration::from_secs(3));
        let outer = CallContext::top_level(Duration::from_secs(3));
        {
            let _lease = TimeoutLease::acquire(
                &settings,
                &outer.nested(),
                TimeoutResetPolicy::EveryCall,
            );
        }
        assert!(!settings.is_overridden());
    }

    #[test]
    fn top_level_only_defers_reset_to_outermost_call() {
        let settings = TimeoutSettings::new();
        settings.set_timeout(Duration::from_secs(3));
        let outer = CallContext::top_level(Duration::from_secs(3));

        let outer_lease =
            TimeoutLease::acquire(&settings, &outer, TimeoutResetPolicy::TopLevelOnly);
        {
            let inner_lease = TimeoutLease::acquire(
                &settings,
                &outer.nested(),
                TimeoutResetPolicy::TopLevelOnly,
            );
            assert!(!inner_lease.resets());
        }
        assert!(settings.is_overridden());

        drop(outer_lease);
        assert!(!settings.is_overridden());
    }

    #[test]
    fn explicit_timeout_never_touches_ambient_value() {
        let settings = TimeoutSettings::new();
        settings.set_timeout(Duration::from_secs(9));
        let ctx = CallContext::explicit(Duration::from_secs(1));
        let lease = TimeoutLease::acquire(&settings, &ctx, TimeoutResetPolicy::EveryCall);
        assert!(!lease.resets());
        drop(lease);
        assert_eq!(settings.current(BASELINE), Duration::from_secs(9));
    }

    #[test]
    fn lease_resets_on_early_exit() {
        fn fails(settings: &TimeoutSettings) -> Result<(), &'static str> {
            let _lease = TimeoutLease::acquire(
                settings,
                &CallContext::top_level(Duration::from_secs(1)),
                TimeoutResetPolicy::EveryCall,
            );
            Err::<(), _>("lookup failed")?;
            Ok(())
        }

        let settings = TimeoutSettings::new();
        settings.set_timeout(Duration::from_secs(1));
        assert!(fails(&settings).is_err());
        assert!(!settings.is_overridden());
    }
}
