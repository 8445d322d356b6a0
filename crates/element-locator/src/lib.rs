//! Resilient element resolution
//!
//! This crate turns abstract element descriptions into driver handles:
//! - Parent and context chains build the scope a locator is evaluated in
//! - XPath locators are anchored to the current node inside nested scopes
//! - Lookups are polled until a candidate passes the search criteria or the
//!   timeout expires
//! - Zero, one and many matches are told apart for single-element lookups

pub mod criteria;
pub mod driver;
pub mod errors;
pub mod normalizer;
pub mod poller;
pub mod resolver;
pub mod scope;
pub mod timeouts;
pub mod types;

pub use criteria::*;
pub use driver::*;
pub use errors::*;
pub use normalizer::normalize;
pub use poller::{poll_until, PollOutcome};
pub use resolver::*;
pub use scope::ContextResolver;
pub use timeouts::*;
pub use types::*;
