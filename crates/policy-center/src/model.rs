use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PolicySnapshot {
    pub rev: u64,
    pub timeouts: TimeoutPolicy,
    pub polling: PollingPolicy,
    pub criteria: CriteriaPolicy,
    pub logging: LoggingPolicy,
    pub provenance: HashMap<String, PolicyProvenance>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct TimeoutPolicy {
    /// Baseline element wait in seconds; the ambient timeout drops back to it
    pub baseline_secs: u64,
    pub reset: TimeoutResetPolicy,
}

impl TimeoutPolicy {
    pub fn baseline(&self) -> Duration {
        Duration::from_secs(self.baseline_secs)
    }
}

/// When a completed resolution drops the ambient timeout back to baseline.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutResetPolicy {
    /// Every completed resolution resets, nested steps included
    #[default]
    EveryCall,
    /// Only the outermost resolution resets
    TopLevelOnly,
}

impl TimeoutResetPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "every_call" | "every-call" => Some(Self::EveryCall),
            "top_level_only" | "top-level-only" => Some(Self::TopLevelOnly),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PollingPolicy {
    pub interval_ms: u64,
}

impl PollingPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CriteriaPolicy {
    pub default: DefaultCriteria,
}

/// Process-wide candidate filter applied when an element has no override.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DefaultCriteria {
    #[default]
    Displayed,
    DisplayedAndEnabled,
    Any,
}

impl DefaultCriteria {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "displayed" | "visible" => Some(Self::Displayed),
            "displayed_and_enabled" | "visible_and_enabled" => Some(Self::DisplayedAndEnabled),
            "any" => Some(Self::Any),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct LoggingPolicy {
    pub short_log_messages: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyProvenance {
    pub path: String,
    pub source: PolicySource,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PolicySource {
    Builtin,
    File,
    Env,
    Cli,
    RuntimeOverride,
}

/// Flattened read-only view handed to resolvers.
#[derive(Clone, Debug)]
pub struct PolicyView {
    pub rev: u64,
    pub timeouts: TimeoutPolicy,
    pub polling: PollingPolicy,
    pub criteria: CriteriaPolicy,
    pub logging: LoggingPolicy,
}

impl From<PolicySnapshot> for PolicyView {
    fn from(snapshot: PolicySnapshot) -> Self {
        Self {
            rev: snapshot.rev,
            timeouts: snapshot.timeouts,
            polling: snapshot.polling,
            criteria: snapshot.criteria,
            logging: snapshot.logging,
        }
    }
}

impl PolicySnapshot {
    pub fn set_provenance(&mut self, path: &str, source: PolicySource) {
        self.provenance.insert(
            path.to_string(),
            PolicyProvenance {
                path: path.to_string(),
                source,
            },
        );
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeOverrideSpec {
    pub path: String,
    pub value: serde_json::Value,
    pub owner: String,
    pub reason: String,
    pub ttl_seconds: u64,
}
