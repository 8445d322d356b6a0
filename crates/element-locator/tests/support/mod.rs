//! In-memory scripted driver for resolver tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use element_locator::{Driver, DriverError, ElementHandle, Scope};
use locus_core_types::Locator;
use locus_policy_center::{default_snapshot, InMemoryPolicyCenter, PolicySnapshot};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Builtin policy with a short baseline so timeouts stay readable in tests
pub fn snapshot(baseline_secs: u64) -> PolicySnapshot {
    let mut snapshot = default_snapshot();
    snapshot.timeouts.baseline_secs = baseline_secs;
    snapshot
}

pub fn policy(baseline_secs: u64) -> Arc<InMemoryPolicyCenter> {
    Arc::new(InMemoryPolicyCenter::new(snapshot(baseline_secs)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeElement {
    pub name: String,
    pub displayed: bool,
    pub enabled: bool,
}

impl FakeElement {
    pub fn visible(name: &str) -> Self {
        Self {
            name: name.to_string(),
            displayed: true,
            enabled: true,
        }
    }

    pub fn hidden(name: &str) -> Self {
        Self {
            displayed: false,
            ..Self::visible(name)
        }
    }

    pub fn disabled(name: &str) -> Self {
        Self {
            enabled: false,
            ..Self::visible(name)
        }
    }
}

impl ElementHandle for FakeElement {
    fn is_displayed(&self) -> bool {
        self.displayed
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// One recorded `find_all` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub scope: String,
    pub expression: String,
}

impl Query {
    pub fn new(scope: &str, expression: &str) -> Self {
        Self {
            scope: scope.to_string(),
            expression: expression.to_string(),
        }
    }
}

type Response = Result<Vec<FakeElement>, DriverError>;

/// Answers queries from per-(scope, expression) scripts.
///
/// Scripted responses are consumed in order and the last one repeats.
/// Unscripted queries match nothing. Scopes are keyed by element name, with
/// frames written as `frame:<name>`.
#[derive(Default)]
pub struct ScriptedDriver {
    scripts: Mutex<HashMap<(String, String), VecDeque<Response>>>,
    queries: Mutex<Vec<Query>>,
}

impl ScriptedDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, scope: &str, expression: &str, elements: Vec<FakeElement>) {
        self.script(scope, expression, vec![Ok(elements)]);
    }

    pub fn script(&self, scope: &str, expression: &str, responses: Vec<Response>) {
        self.scripts.lock().insert(
            (scope.to_string(), expression.to_string()),
            responses.into(),
        );
    }

    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().len()
    }
}

fn scope_key(scope: &Scope<FakeElement>) -> String {
    match scope {
        Scope::Root => "root".to_string(),
        Scope::Element(element) => element.name.clone(),
        Scope::Frame(element) => format!("frame:{}", element.name),
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    type Handle = FakeElement;

    async fn find_all(
        &self,
        scope: &Scope<FakeElement>,
        locator: &Locator,
    ) -> Result<Vec<FakeElement>, DriverError> {
        let key = (scope_key(scope), locator.expression().to_string());
        self.queries.lock().push(Query::new(&key.0, &key.1));

        let mut scripts = self.scripts.lock();
        let Some(responses) = scripts.get_mut(&key) else {
            return Ok(Vec::new());
        };
        if responses.len() > 1 {
            responses.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        } else {
            responses.front().cloned().unwrap_or_else(|| Ok(Vec::new()))
        }
    }
}
