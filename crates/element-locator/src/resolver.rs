//! Element resolver facade

use std::sync::Arc;
use std::time::Duration;

use locus_core_types::ElementId;
use locus_policy_center::{PolicyCenter, PolicySnapshot};
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::criteria::{effective_criteria, SearchCriteria};
use crate::driver::Driver;
use crate::errors::LocatorError;
use crate::normalizer::normalize;
use crate::poller::{poll_until, PollOutcome};
use crate::scope::ContextResolver;
use crate::timeouts::{CallContext, TimeoutLease, TimeoutSettings};
use crate::types::{ElementTree, LogicalElement};

/// Resolves logical elements into driver handles.
///
/// One resolver talks to one driver. Timing, polling cadence and the default
/// candidate filter come from the policy center and are read per call, so
/// runtime overrides apply to the next lookup.
pub struct ElementResolver<D: Driver> {
    driver: Arc<D>,
    policy: Arc<dyn PolicyCenter>,
    timeouts: TimeoutSettings,
    default_criteria: RwLock<Option<SearchCriteria<D::Handle>>>,
}

impl<D: Driver> ElementResolver<D> {
    pub fn new(driver: Arc<D>, policy: Arc<dyn PolicyCenter>) -> Self {
        Self {
            driver,
            policy,
            timeouts: TimeoutSettings::new(),
            default_criteria: RwLock::new(None),
        }
    }

    /// Use `timeout` for lookups until the next completed call resets it
    pub fn set_timeout(&self, timeout: Duration) {
        self.timeouts.set_timeout(timeout);
    }

    pub fn drop_timeouts(&self) {
        self.timeouts.drop_timeouts();
    }

    /// Timeout the next top-level lookup would use
    pub async fn current_timeout(&self) -> Duration {
        let policy = self.policy.snapshot().await;
        self.timeouts.current(policy.timeouts.baseline())
    }

    /// Replace the policy default filter for elements without their own criteria
    pub fn set_default_criteria(&self, criteria: SearchCriteria<D::Handle>) {
        *self.default_criteria.write() = Some(criteria);
    }

    /// Fall back to the policy default filter again
    pub fn clear_default_criteria(&self) {
        *self.default_criteria.write() = None;
    }

    /// All handles matching the element, filtered by its effective criteria.
    ///
    /// Returns an empty list when candidates were found but none passed the
    /// filter before the timeout.
    pub async fn resolve_all(
        &self,
        tree: &ElementTree<D::Handle>,
        id: &ElementId,
    ) -> Result<Vec<D::Handle>, LocatorError> {
        let policy = self.policy.snapshot().await;
        let ctx = CallContext::top_level(self.timeouts.current(policy.timeouts.baseline()));
        self.resolve_all_in(tree, id, &ctx, &policy).await
    }

    /// Like [`resolve_all`](Self::resolve_all) with a timeout for this call only
    pub async fn resolve_all_within(
        &self,
        tree: &ElementTree<D::Handle>,
        id: &ElementId,
        timeout: Duration,
    ) -> Result<Vec<D::Handle>, LocatorError> {
        let policy = self.policy.snapshot().await;
        self.resolve_all_in(tree, id, &CallContext::explicit(timeout), &policy)
            .await
    }

    /// The single handle matching the element
    pub async fn resolve_one(
        &self,
        tree: &ElementTree<D::Handle>,
        id: &ElementId,
    ) -> Result<D::Handle, LocatorError> {
        let policy = self.policy.snapshot().await;
        let ctx = CallContext::top_level(self.timeouts.current(policy.timeouts.baseline()));
        self.resolve_one_in(tree, id, &ctx, &policy).await
    }

    /// Like [`resolve_one`](Self::resolve_one) with a timeout for this call only
    pub async fn resolve_one_within(
        &self,
        tree: &ElementTree<D::Handle>,
        id: &ElementId,
        timeout: Duration,
    ) -> Result<D::Handle, LocatorError> {
        let policy = self.policy.snapshot().await;
        self.resolve_one_in(tree, id, &CallContext::explicit(timeout), &policy)
            .await
    }

    /// Context for a top-level call starting now, carrying the ambient timeout
    pub async fn call_context(&self) -> CallContext {
        CallContext::top_level(self.current_timeout().await)
    }

    /// [`resolve_all`](Self::resolve_all) under a caller-built context.
    ///
    /// Lets several lookups share one budget: pass `ctx.nested()` for the
    /// inner steps. Whether a nested step resets the ambient timeout follows
    /// `timeouts.reset`.
    pub async fn resolve_all_with(
        &self,
        tree: &ElementTree<D::Handle>,
        id: &ElementId,
        ctx: &CallContext,
    ) -> Result<Vec<D::Handle>, LocatorError> {
        let policy = self.policy.snapshot().await;
        self.resolve_all_in(tree, id, ctx, &policy).await
    }

    /// [`resolve_one`](Self::resolve_one) under a caller-built context
    pub async fn resolve_one_with(
        &self,
        tree: &ElementTree<D::Handle>,
        id: &ElementId,
        ctx: &CallContext,
    ) -> Result<D::Handle, LocatorError> {
        let policy = self.policy.snapshot().await;
        self.resolve_one_in(tree, id, ctx, &policy).await
    }

    /// Make the element accept every candidate, ignoring the default filter
    pub fn search_all<'t>(
        &self,
        tree: &'t mut ElementTree<D::Handle>,
        id: &ElementId,
    ) -> Result<&'t mut LogicalElement<D::Handle>, LocatorError> {
        Ok(tree.get_mut(id)?.search_all())
    }

    /// Resolve once and pin the result on the element
    pub async fn lock_in(
        &self,
        tree: &mut ElementTree<D::Handle>,
        id: &ElementId,
    ) -> Result<Vec<D::Handle>, LocatorError> {
        let handles = self.resolve_all(tree, id).await?;
        tree.get_mut(id)?.pin(handles.clone());
        info!(element = %id, count = handles.len(), "element locked in");
        Ok(handles)
    }

    /// Drop pinned handles; returns them if there were any
    pub fn unpin(
        &self,
        tree: &mut ElementTree<D::Handle>,
        id: &ElementId,
    ) -> Result<Option<Vec<D::Handle>>, LocatorError> {
        Ok(tree.get_mut(id)?.unpin())
    }

    /// Description used in messages, honouring `logging.short_log_messages`
    pub async fn describe(
        &self,
        tree: &ElementTree<D::Handle>,
        id: &ElementId,
    ) -> Result<String, LocatorError> {
        let policy = self.policy.snapshot().await;
        Ok(tree.get(id)?.describe(policy.logging.short_log_messages))
    }

    async fn resolve_one_in(
        &self,
        tree: &ElementTree<D::Handle>,
        id: &ElementId,
        ctx: &CallContext,
        policy: &PolicySnapshot,
    ) -> Result<D::Handle, LocatorError> {
        let _lease = TimeoutLease::acquire(&self.timeouts, ctx, policy.timeouts.reset);
        let element = tree.get(id)?;
        let mut handles = match element.pinned() {
            Some(pinned) => pinned.to_vec(),
            None => self.resolve_all_in(tree, id, &ctx.nested(), policy).await?,
        };

        let label = element.describe(policy.logging.short_log_messages);
        match handles.len() {
            0 => {
                warn!(element = %label, "element not found");
                Err(LocatorError::NotFound {
                    element: label,
                    timeout: ctx.timeout(),
                })
            }
            1 => Ok(handles.remove(0)),
            count => {
                warn!(element = %label, count, "expected one element");
                Err(LocatorError::AmbiguousMatch {
                    count,
                    element: label,
                    timeout: ctx.timeout(),
                })
            }
        }
    }

    async fn resolve_all_in(
        &self,
        tree: &ElementTree<D::Handle>,
        id: &ElementId,
        ctx: &CallContext,
        policy: &PolicySnapshot,
    ) -> Result<Vec<D::Handle>, LocatorError> {
        let _lease = TimeoutLease::acquire(&self.timeouts, ctx, policy.timeouts.reset);
        let element = tree.get(id)?;
        let label = element.describe(policy.logging.short_log_messages);

        if let Some(pinned) = element.pinned() {
            debug!(element = %label, count = pinned.len(), "using pinned handles");
            return Ok(pinned.to_vec());
        }
        let locator = element
            .locator()
            .ok_or_else(|| LocatorError::InvalidLocator(format!("{label} has no locator")))?;

        let driver = self.driver.as_ref();
        let scopes = ContextResolver::new(driver, tree);
        let scopes = &scopes;
        let policy_rx = self.policy.subscribe();

        debug!(element = %label, timeout = ?ctx.timeout(), depth = ctx.depth(), "resolving");
        let outcome = poll_until(
            move || async move {
                let scope = scopes.resolve_scope(id).await?;
                let query = normalize(locator, scope.is_nested());
                Ok::<_, LocatorError>(driver.find_all(&scope, &query).await?)
            },
            |handles: &Vec<D::Handle>| self.criteria_for(element, &policy_rx).any_match(handles),
            ctx.timeout(),
            policy.polling.interval(),
        )
        .await;

        match outcome {
            PollOutcome::Satisfied { value, attempts, .. } => {
                let found = self.criteria_for(element, &policy_rx).filter(value);
                info!(element = %label, count = found.len(), attempts, "resolved");
                Ok(found)
            }
            PollOutcome::TimedOut {
                last: Some(value),
                attempts,
                elapsed,
                ..
            } => {
                let found = self.criteria_for(element, &policy_rx).filter(value);
                warn!(
                    element = %label,
                    count = found.len(),
                    attempts,
                    elapsed = ?elapsed,
                    "timed out waiting for matching elements"
                );
                Ok(found)
            }
            PollOutcome::TimedOut {
                last: None,
                last_error,
                attempts,
                ..
            } => {
                warn!(element = %label, attempts, "no data before timeout");
                match last_error {
                    Some(err @ LocatorError::ScopeResolution { .. }) => Err(err),
                    Some(err) => Err(LocatorError::Resolution {
                        element: label,
                        reason: err.to_string(),
                    }),
                    None => Err(LocatorError::Resolution {
                        element: label,
                        reason: "driver returned no data".to_string(),
                    }),
                }
            }
        }
    }

    fn criteria_for(
        &self,
        element: &LogicalElement<D::Handle>,
        policy_rx: &watch::Receiver<Arc<PolicySnapshot>>,
    ) -> SearchCriteria<D::Handle> {
        let ambient = self
            .default_criteria
            .read()
            .clone()
            .unwrap_or_else(|| policy_rx.borrow().criteria.default.into());
        effective_criteria(element, &ambient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ElementHandle, Scope};
    use crate::errors::DriverError;
    use async_trait::async_trait;
    use locus_core_types::Locator;
    use locus_policy_center::{default_snapshot, InMemoryPolicyCenter};

    #[derive(Debug, Clone, PartialEq)]
    struct Stub(&'static str);

    impl ElementHandle for Stub {
        fn is_displayed(&self) -> bool {
            true
        }

        fn is_enabled(&self) -> bool {
            true
        }
    }

    struct StaticDriver;

    #[async_trait]
    impl Driver for StaticDriver {
        type Handle = Stub;

        async fn find_all(
            &self,
            _scope: &Scope<Stub>,
            locator: &Locator,
        ) -> Result<Vec<Stub>, DriverError> {
            Ok(match locator.expression() {
                "#one" => vec![Stub("one")],
                _ => Vec::new(),
            })
        }
    }

    fn resolver() -> ElementResolver<StaticDriver> {
        ElementResolver::new(
            Arc::new(StaticDriver),
            Arc::new(InMemoryPolicyCenter::new(default_snapshot())),
        )
    }

    #[test]
    fn describe_uses_full_form_by_default() {
        let resolver = resolver();
        let mut tree = ElementTree::new();
        let id = tree.insert(LogicalElement::new(Locator::css("#one"))).unwrap();

        let text = tokio_test::block_on(resolver.describe(&tree, &id)).unwrap();
        assert_eq!(text, "Locator: 'css selector: #one'");
    }

    #[test]
    fn found_element_resolves_on_first_attempt() {
        let resolver = resolver();
        let mut tree = ElementTree::new();
        let id = tree.insert(LogicalElement::new(Locator::css("#one"))).unwrap();

        let handle = tokio_test::block_on(resolver.resolve_one(&tree, &id)).unwrap();
        assert_eq!(handle, Stub("one"));
    }

    #[test]
    fn search_all_and_unpin_go_through_the_tree() {
        let resolver = resolver();
        let mut tree = ElementTree::new();
        let id = tree.insert(LogicalElement::new(Locator::css("#one"))).unwrap();

        resolver.search_all(&mut tree, &id).unwrap();
        assert_eq!(tree.get(&id).unwrap().criteria().map(|c| c.name()), Some("any"));
        assert_eq!(resolver.unpin(&mut tree, &id).unwrap(), None);

        let ghost = ElementId("ghost".into());
        assert!(matches!(
            resolver.search_all(&mut tree, &ghost),
            Err(LocatorError::UnknownElement(_))
        ));
    }

    #[test]
    fn child_resolves_through_its_parent_scope() {
        let resolver = resolver();
        let mut tree = ElementTree::new();
        let parent = tree.insert(LogicalElement::new(Locator::css("#one"))).unwrap();
        let child = tree
            .insert(LogicalElement::new(Locator::css("#one")).child_of(&parent))
            .unwrap();

        let handle = tokio_test::block_on(resolver.resolve_one(&tree, &child)).unwrap();
        assert_eq!(handle, Stub("one"));
    }
}
