use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

/// Active runtime overrides keyed by policy path.
#[derive(Clone, Debug, Default)]
pub struct RuntimeOverrideStore {
    entries: BTreeMap<String, RuntimeOverrideEntry>,
    next_generation: u64,
}

#[derive(Clone, Debug)]
pub struct RuntimeOverrideEntry {
    pub value: Value,
    pub owner: String,
    pub expires_at: Option<Instant>,
    pub generation: u64,
}

impl RuntimeOverrideEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires| expires > now)
    }
}

impl RuntimeOverrideStore {
    /// Stores the override, replacing any earlier one for `path`, and returns
    /// the generation tag of the new entry.
    pub fn insert(
        &mut self,
        path: String,
        value: Value,
        owner: String,
        ttl: Option<Duration>,
    ) -> u64 {
        // A TTL past the end of the clock never expires.
        let expires_at = ttl.and_then(|dur| Instant::now().checked_add(dur));
        self.next_generation += 1;
        let generation = self.next_generation;
        self.entries.insert(
            path,
            RuntimeOverrideEntry {
                value,
                owner,
                expires_at,
                generation,
            },
        );
        generation
    }

    pub fn remove(&mut self, path: &str) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Removes `path` only while it still holds the entry tagged `generation`.
    pub fn remove_generation(&mut self, path: &str, generation: u64) -> bool {
        match self.entries.get(path) {
            Some(entry) if entry.generation == generation => {
                self.entries.remove(path);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops expired entries and returns the remaining ones in path order.
    pub fn live_entries(&mut self) -> Vec<(String, Value)> {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
        self.entries
            .iter()
            .map(|(path, entry)| (path.clone(), entry.value.clone()))
            .collect()
    }
}
