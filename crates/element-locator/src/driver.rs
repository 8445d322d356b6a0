//! Driver contract consumed by the resolver
//!
//! The resolver never talks to a browser directly. It asks a [`Driver`] for
//! the elements matching a [`Locator`] inside a [`Scope`] and works with the
//! opaque handles the driver hands back.

use std::fmt::Debug;

use async_trait::async_trait;
use locus_core_types::Locator;

use crate::errors::DriverError;

/// Driver-returned element reference
///
/// Handles are held for the duration of one resolution and are only kept
/// longer when a caller pins them on a logical element.
pub trait ElementHandle: Clone + Send + Sync + Debug + 'static {
    /// Whether the element is rendered and visible
    fn is_displayed(&self) -> bool;

    /// Whether the element accepts interaction
    fn is_enabled(&self) -> bool;
}

/// Where a query is evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope<H> {
    /// Top-level document
    Root,
    /// Subtree below a single element
    Element(H),
    /// Document of an entered frame
    Frame(H),
}

impl<H> Scope<H> {
    /// False only for the top-level document
    pub fn is_nested(&self) -> bool {
        !matches!(self, Scope::Root)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scope::Root => "root",
            Scope::Element(_) => "element",
            Scope::Frame(_) => "frame",
        }
    }
}

/// Browser automation backend
#[async_trait]
pub trait Driver: Send + Sync {
    type Handle: ElementHandle;

    /// All elements matching `locator` inside `scope`, in document order
    async fn find_all(
        &self,
        scope: &Scope<Self::Handle>,
        locator: &Locator,
    ) -> Result<Vec<Self::Handle>, DriverError>;

    /// Scope used when an element has no scope-bearing parent
    fn root_scope(&self) -> Scope<Self::Handle> {
        Scope::Root
    }

    /// Candidates for a single-element narrowing step.
    ///
    /// The resolver requires exactly one match; drivers with a cheaper
    /// single-element lookup may override this.
    async fn narrow(
        &self,
        scope: &Scope<Self::Handle>,
        locator: &Locator,
    ) -> Result<Vec<Self::Handle>, DriverError> {
        self.find_all(scope, locator).await
    }

    /// Switch into the frame backed by `handle`
    async fn enter_frame(&self, handle: Self::Handle) -> Result<Scope<Self::Handle>, DriverError> {
        Ok(Scope::Frame(handle))
    }
}
