//! Candidate filtering

use std::fmt;
use std::sync::Arc;

use locus_policy_center::DefaultCriteria;

use crate::driver::ElementHandle;
use crate::types::LogicalElement;

type Predicate<H> = Arc<dyn Fn(&H) -> bool + Send + Sync>;

/// Filter deciding which driver candidates count as matches
pub enum SearchCriteria<H> {
    /// Visible elements only
    Displayed,
    /// Visible and interactable elements only
    DisplayedAndEnabled,
    /// Every element the driver returned
    Any,
    /// Caller supplied predicate; must be side-effect free
    Custom(Predicate<H>),
}

impl<H: ElementHandle> SearchCriteria<H> {
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&H) -> bool + Send + Sync + 'static,
    {
        SearchCriteria::Custom(Arc::new(predicate))
    }

    pub fn matches(&self, handle: &H) -> bool {
        match self {
            SearchCriteria::Displayed => handle.is_displayed(),
            SearchCriteria::DisplayedAndEnabled => handle.is_displayed() && handle.is_enabled(),
            SearchCriteria::Any => true,
            SearchCriteria::Custom(predicate) => predicate(handle),
        }
    }

    /// True when at least one candidate passes
    pub fn any_match(&self, handles: &[H]) -> bool {
        handles.iter().any(|handle| self.matches(handle))
    }

    /// Keep passing candidates in their original order
    pub fn filter(&self, handles: Vec<H>) -> Vec<H> {
        handles
            .into_iter()
            .filter(|handle| self.matches(handle))
            .collect()
    }
}

impl<H> SearchCriteria<H> {
    pub fn name(&self) -> &'static str {
        match self {
            SearchCriteria::Displayed => "displayed",
            SearchCriteria::DisplayedAndEnabled => "displayed_and_enabled",
            SearchCriteria::Any => "any",
            SearchCriteria::Custom(_) => "custom",
        }
    }
}

impl<H> Clone for SearchCriteria<H> {
    fn clone(&self) -> Self {
        match self {
            SearchCriteria::Displayed => SearchCriteria::Displayed,
            SearchCriteria::DisplayedAndEnabled => SearchCriteria::DisplayedAndEnabled,
            SearchCriteria::Any => SearchCriteria::Any,
            SearchCriteria::Custom(predicate) => SearchCriteria::Custom(Arc::clone(predicate)),
        }
    }
}

impl<H> fmt::Debug for SearchCriteria<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl<H> From<DefaultCriteria> for SearchCriteria<H> {
    fn from(value: DefaultCriteria) -> Self {
        match value {
            DefaultCriteria::Displayed => SearchCriteria::Displayed,
            DefaultCriteria::DisplayedAndEnabled => SearchCriteria::DisplayedAndEnabled,
            DefaultCriteria::Any => SearchCriteria::Any,
        }
    }
}

/// The element's own criteria if it has one, otherwise the ambient default
pub fn effective_criteria<H: ElementHandle>(
    element: &LogicalElement<H>,
    ambient: &SearchCriteria<H>,
) -> SearchCriteria<H> {
    element
        .criteria()
        .cloned()
        .unwrap_or_else(|| ambient.clone())
}
