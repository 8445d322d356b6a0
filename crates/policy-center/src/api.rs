use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::errors::PolicyError;
use crate::loader::{load_snapshot_with_options, LoadOptions};
use crate::model::{
    DefaultCriteria, PolicySnapshot, PolicySource, PolicyView, RuntimeOverrideSpec,
    TimeoutResetPolicy,
};
use crate::override_store::RuntimeOverrideStore;

#[async_trait]
pub trait PolicyCenter: Send + Sync {
    async fn snapshot(&self) -> Arc<PolicySnapshot>;
    async fn reload(&self) -> Result<(), PolicyError>;
    async fn apply_override(&self, override_spec: RuntimeOverrideSpec) -> Result<(), PolicyError>;
    async fn clear_override(&self, path: &str) -> Result<bool, PolicyError>;
    fn subscribe(&self) -> watch::Receiver<Arc<PolicySnapshot>>;
    async fn guard(&self) -> PolicyGuard;
}

struct PolicyState {
    base: PolicySnapshot,
    snapshot: PolicySnapshot,
    overrides: RuntimeOverrideStore,
    rev_counter: u64,
}

impl PolicyState {
    fn new(base: PolicySnapshot) -> Self {
        let rev_counter = base.rev;
        Self {
            base: base.clone(),
            snapshot: base,
            overrides: RuntimeOverrideStore::default(),
            rev_counter,
        }
    }

    fn rebuild(&mut self) -> Result<(), PolicyError> {
        let mut next = self.base.clone();
        for (path, value) in self.overrides.live_entries() {
            apply_override_to_snapshot(&mut next, &path, &value, PolicySource::RuntimeOverride)?;
        }
        self.rev_counter = self.rev_counter.saturating_add(1);
        next.rev = self.rev_counter;
        self.snapshot = next;
        Ok(())
    }
}

/// Policy center backed by an in-process snapshot.
///
/// Every change bumps `rev` and is broadcast to subscribers. Overrides with a
/// TTL are removed by a background task once they expire.
pub struct InMemoryPolicyCenter {
    state: Arc<Mutex<PolicyState>>,
    watch_tx: watch::Sender<Arc<PolicySnapshot>>,
    source: Option<LoadOptions>,
}

impl InMemoryPolicyCenter {
    pub fn new(snapshot: PolicySnapshot) -> Self {
        let state = PolicyState::new(snapshot);
        let current_snapshot = Arc::new(state.snapshot.clone());
        let (watch_tx, _watch_rx) = watch::channel(current_snapshot);
        Self {
            state: Arc::new(Mutex::new(state)),
            watch_tx,
            source: None,
        }
    }

    /// Loads the initial snapshot from `options` and remembers them for `reload`.
    pub fn from_options(options: LoadOptions) -> Result<Self, PolicyError> {
        let snapshot = load_snapshot_with_options(&options)?;
        let mut center = Self::new(snapshot);
        center.source = Some(options);
        Ok(center)
    }

    fn broadcast(&self, snapshot: Arc<PolicySnapshot>) {
        // send_replace keeps the stored value current even with no live receivers.
        self.watch_tx.send_replace(snapshot);
    }
}

#[async_trait]
impl PolicyCenter for InMemoryPolicyCenter {
    async fn snapshot(&self) -> Arc<PolicySnapshot> {
        let guard = self.state.lock().await;
        Arc::new(guard.snapshot.clone())
    }

    async fn reload(&self) -> Result<(), PolicyError> {
        let Some(options) = &self.source else {
            return Ok(());
        };
        let base = load_snapshot_with_options(options)?;
        let mut guard = self.state.lock().await;
        guard.base = base;
        guard.rebuild()?;
        let snapshot = Arc::new(guard.snapshot.clone());
        drop(guard);
        self.broadcast(snapshot);
        Ok(())
    }

    async fn apply_override(&self, override_spec: RuntimeOverrideSpec) -> Result<(), PolicyError> {
        // Validate against a scratch copy before storing anything.
        let mut scratch = PolicySnapshot::default();
        apply_override_to_snapshot(
            &mut scratch,
            &override_spec.path,
            &override_spec.value,
            PolicySource::RuntimeOverride,
        )?;

        let ttl = if override_spec.ttl_seconds > 0 {
            Some(Duration::from_secs(override_spec.ttl_seconds))
        } else {
            None
        };
        let mut guard = self.state.lock().await;
        let generation = guard.overrides.insert(
            override_spec.path.clone(),
            override_spec.value.clone(),
            override_spec.owner.clone(),
            ttl,
        );
        guard.rebuild()?;
        let snapshot = Arc::new(guard.snapshot.clone());
        drop(guard);
        debug!(
            path = %override_spec.path,
            owner = %override_spec.owner,
            reason = %override_spec.reason,
            "policy override applied"
        );
        self.broadcast(snapshot);

        if let Some(ttl) = ttl {
            let state = Arc::clone(&self.state);
            let watch_tx = self.watch_tx.clone();
            let path = override_spec.path.clone();
            tokio::spawn(async move {
                sleep(ttl).await;
                let mut guard = state.lock().await;
                // A later apply for the same path owns it now.
                if !guard.overrides.remove_generation(&path, generation) {
                    return;
                }
                match guard.rebuild() {
                    Ok(()) => {
                        let snapshot = Arc::new(guard.snapshot.clone());
                        drop(guard);
                        watch_tx.send_replace(snapshot);
                    }
                    Err(err) => warn!("policy override expiry recompute failed: {err}"),
                }
            });
        }

        Ok(())
    }

    async fn clear_override(&self, path: &str) -> Result<bool, PolicyError> {
        let mut guard = self.state.lock().await;
        if !guard.overrides.remove(path) {
            return Ok(false);
        }
        guard.rebuild()?;
        let snapshot = Arc::new(guard.snapshot.clone());
        drop(guard);
        self.broadcast(snapshot);
        Ok(true)
    }

    fn subscribe(&self) -> watch::Receiver<Arc<PolicySnapshot>> {
        self.watch_tx.subscribe()
    }

    async fn guard(&self) -> PolicyGuard {
        let snapshot = self.snapshot().await;
        PolicyGuard { snapshot }
    }
}

/// Sticky view of one policy revision.
#[derive(Clone, Debug)]
pub struct PolicyGuard {
    snapshot: Arc<PolicySnapshot>,
}

impl PolicyGuard {
    pub fn revision(&self) -> u64 {
        self.snapshot.rev
    }

    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn view(&self) -> PolicyView {
        PolicyView::from((*self.snapshot).clone())
    }
}

pub(crate) fn apply_override_to_snapshot(
    snapshot: &mut PolicySnapshot,
    path: &str,
    value: &Value,
    source: PolicySource,
) -> Result<(), PolicyError> {
    let changed = match path {
        "timeouts.baseline_secs" => replace(&mut snapshot.timeouts.baseline_secs, to_u64(value)?),
        "timeouts.reset" => replace(&mut snapshot.timeouts.reset, to_reset_policy(value)?),
        "polling.interval_ms" => replace(&mut snapshot.polling.interval_ms, to_u64(value)?),
        "criteria.default" => replace(&mut snapshot.criteria.default, to_criteria(value)?),
        "logging.short_log_messages" => {
            replace(&mut snapshot.logging.short_log_messages, to_bool(value)?)
        }
        path => return Err(PolicyError::UnsupportedPath(path.to_string())),
    };
    if changed {
        snapshot.set_provenance(path, source);
    }
    Ok(())
}

fn replace<T: PartialEq>(target: &mut T, candidate: T) -> bool {
    if *target == candidate {
        return false;
    }
    *target = candidate;
    true
}

fn to_u64(value: &Value) -> Result<u64, PolicyError> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|raw| raw.trim().parse().ok()))
        .ok_or_else(|| {
            PolicyError::InvalidValue(format!("expected non-negative integer, got {value}"))
        })
}

fn to_bool(value: &Value) -> Result<bool, PolicyError> {
    value
        .as_bool()
        .or_else(|| value.as_str().and_then(|raw| raw.trim().parse().ok()))
        .ok_or_else(|| PolicyError::InvalidValue(format!("expected bool, got {value}")))
}

fn to_reset_policy(value: &Value) -> Result<TimeoutResetPolicy, PolicyError> {
    value
        .as_str()
        .and_then(TimeoutResetPolicy::parse)
        .ok_or_else(|| {
            PolicyError::InvalidValue(format!(
                "expected `every_call` or `top_level_only`, got {value}"
            ))
        })
}

fn to_criteria(value: &Value) -> Result<DefaultCriteria, PolicyError> {
    value.as_str().and_then(DefaultCriteria::parse).ok_or_else(|| {
        PolicyError::InvalidValue(format!(
            "expected `displayed`, `displayed_and_enabled` or `any`, got {value}"
        ))
    })
}
