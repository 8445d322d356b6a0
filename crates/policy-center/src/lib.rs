//! Resolution policy center
//!
//! Holds the timeout, polling, criteria and logging knobs that element
//! resolution reads on every call, layered from builtin defaults, YAML files
//! and the environment, with runtime overrides on top.

pub mod api;
pub mod defaults;
pub mod errors;
pub mod loader;
pub mod model;
pub mod override_store;

pub use api::{InMemoryPolicyCenter, PolicyCenter, PolicyGuard};
pub use defaults::default_snapshot;
pub use errors::PolicyError;
pub use loader::{load_snapshot, load_snapshot_with_options, LoadOptions};
pub use model::{
    DefaultCriteria, PolicySnapshot, PolicySource, PolicyView, RuntimeOverrideSpec,
    TimeoutResetPolicy,
};
