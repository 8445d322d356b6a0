use crate::model::{
    CriteriaPolicy, DefaultCriteria, LoggingPolicy, PollingPolicy, PolicySnapshot, TimeoutPolicy,
    TimeoutResetPolicy,
};

pub const DEFAULT_BASELINE_SECS: u64 = 20;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

pub fn default_snapshot() -> PolicySnapshot {
    PolicySnapshot {
        rev: 1,
        timeouts: TimeoutPolicy {
            baseline_secs: DEFAULT_BASELINE_SECS,
            reset: TimeoutResetPolicy::EveryCall,
        },
        polling: PollingPolicy {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
        },
        criteria: CriteriaPolicy {
            default: DefaultCriteria::Displayed,
        },
        logging: LoggingPolicy {
            short_log_messages: false,
        },
        provenance: Default::default(),
    }
}
