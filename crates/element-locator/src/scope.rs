//! Search scope construction from parent and context chains

use async_recursion::async_recursion;
use locus_core_types::{ContextKind, ElementId, Locator};
use tracing::debug;

use crate::driver::{Driver, Scope};
use crate::errors::LocatorError;
use crate::normalizer::normalize;
use crate::types::{ElementTree, LogicalElement};

/// Builds the scope an element's own locator is evaluated in.
///
/// Ancestors are resolved root first: each one narrows the scope through its
/// context chain and then its locator, and every step must match exactly one
/// element. The terminal element contributes its context chain only.
pub struct ContextResolver<'a, D: Driver> {
    driver: &'a D,
    tree: &'a ElementTree<D::Handle>,
}

impl<'a, D: Driver> ContextResolver<'a, D> {
    pub fn new(driver: &'a D, tree: &'a ElementTree<D::Handle>) -> Self {
        Self { driver, tree }
    }

    /// Scope in which the locator of `id` is evaluated
    pub async fn resolve_scope(&self, id: &ElementId) -> Result<Scope<D::Handle>, LocatorError> {
        self.search_scope(id, 0).await
    }

    #[async_recursion]
    async fn search_scope(
        &self,
        id: &ElementId,
        depth: usize,
    ) -> Result<Scope<D::Handle>, LocatorError> {
        if depth > self.tree.len() {
            return Err(LocatorError::CyclicParent(id.clone()));
        }
        let element = self.tree.get(id)?;

        let outer = match element.parent_element() {
            Some(parent_id) => {
                let parent_scope = self.search_scope(parent_id, depth + 1).await?;
                let parent = self.tree.get(parent_id)?;
                match parent.locator() {
                    Some(locator) => {
                        Scope::Element(self.single(parent, &parent_scope, locator).await?)
                    }
                    None => parent_scope,
                }
            }
            None => self.driver.root_scope(),
        };

        let mut scope = outer;
        for entry in element.context() {
            let handle = self.single(element, &scope, &entry.locator).await?;
            scope = match entry.kind {
                ContextKind::Locator => Scope::Element(handle),
                ContextKind::Frame => self.driver.enter_frame(handle).await?,
            };
        }
        Ok(scope)
    }

    /// The one element `locator` matches inside `scope`
    async fn single(
        &self,
        owner: &LogicalElement<D::Handle>,
        scope: &Scope<D::Handle>,
        locator: &Locator,
    ) -> Result<D::Handle, LocatorError> {
        let query = normalize(locator, scope.is_nested());
        let mut matches = self.driver.narrow(scope, &query).await?;
        debug!(
            element = %owner.id(),
            scope = scope.name(),
            locator = %query,
            count = matches.len(),
            "narrowing search scope"
        );
        match matches.len() {
            1 => Ok(matches.remove(0)),
            count => Err(LocatorError::ScopeResolution {
                element: owner.describe(false),
                locator: query.to_string(),
                count,
            }),
        }
    }
}
