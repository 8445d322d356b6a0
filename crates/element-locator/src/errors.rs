//! Error types for element resolution

use std::time::Duration;

use locus_core_types::{ElementId, LocusError};
use locus_policy_center::PolicyError;
use thiserror::Error;

/// Failures reported by a driver implementation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Transport or protocol failure talking to the browser
    #[error("driver protocol error: {0}")]
    Protocol(String),

    /// Handle no longer attached to the document
    #[error("stale element reference: {0}")]
    StaleElement(String),

    /// Frame could not be entered
    #[error("no such frame: {0}")]
    NoSuchFrame(String),

    /// Driver does not support the locator or operation
    #[error("unsupported by driver: {0}")]
    Unsupported(String),
}

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// Zero matches after the full timeout window
    #[error("Element {element} not found within {:.1}s", timeout.as_secs_f64())]
    NotFound { element: String, timeout: Duration },

    /// Several matches where exactly one was required
    #[error("Found {count} elements instead of one for {element} within {:.1}s", timeout.as_secs_f64())]
    AmbiguousMatch {
        count: usize,
        element: String,
        timeout: Duration,
    },

    /// An ancestor in the scope chain did not resolve to exactly one element
    #[error("Scope for {element} is broken: {locator} matched {count} elements instead of one")]
    ScopeResolution {
        element: String,
        locator: String,
        count: usize,
    },

    /// The underlying query never produced any data
    #[error("Can't get elements for {element}: {reason}")]
    Resolution { element: String, reason: String },

    /// Driver failure outside the polling loop
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Element id is not registered in the tree
    #[error("Unknown element: {0}")]
    UnknownElement(ElementId),

    /// Parent chain loops back on itself
    #[error("Parent chain of {0} contains a cycle")]
    CyclicParent(ElementId),

    /// Element description cannot be resolved as given
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    /// Policy could not be read or applied
    #[error("Policy error: {0}")]
    Policy(String),
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LocatorError::NotFound { .. }
                | LocatorError::Resolution { .. }
                | LocatorError::Driver(DriverError::Protocol(_))
                | LocatorError::Driver(DriverError::StaleElement(_))
        )
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::CyclicParent(_) | LocatorError::UnknownElement(_) => 3,
            LocatorError::Driver(_) | LocatorError::Resolution { .. } | LocatorError::Policy(_) => {
                2
            }
            LocatorError::NotFound { .. }
            | LocatorError::AmbiguousMatch { .. }
            | LocatorError::ScopeResolution { .. } => 1,
            LocatorError::InvalidLocator(_) => 0,
        }
    }
}

impl From<PolicyError> for LocatorError {
    fn from(value: PolicyError) -> Self {
        LocatorError::Policy(value.to_string())
    }
}

impl From<LocatorError> for LocusError {
    fn from(value: LocatorError) -> Self {
        LocusError::new(value.to_string())
    }
}
