//! Logical elements and the tree that owns them

use std::collections::{HashMap, HashSet};
use std::fmt;

use locus_core_types::{ContextEntry, ElementId, Locator};

use crate::criteria::SearchCriteria;
use crate::errors::LocatorError;

/// Owner of a logical element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    /// Another element of the same tree; its resolved handle scopes the search
    Element(ElementId),
    /// Non scope-bearing owner such as a page object, kept for diagnostics
    Container(String),
}

/// Abstract description of something on the page
///
/// A logical element is resolved into driver handles on every use. It is
/// never cached unless a caller pins a result on it.
pub struct LogicalElement<H> {
    id: ElementId,
    name: Option<String>,
    locator: Option<Locator>,
    context: Vec<ContextEntry>,
    parent: Option<ParentRef>,
    pinned: Option<Vec<H>>,
    criteria: Option<SearchCriteria<H>>,
}

impl<H> LogicalElement<H> {
    /// Create an element located by `locator`
    pub fn new(locator: Locator) -> Self {
        Self {
            locator: Some(locator),
            ..Self::unlocated()
        }
    }

    /// Create an element with no locator of its own.
    ///
    /// Such an element only groups children under its parent and context chain.
    pub fn unlocated() -> Self {
        Self {
            id: ElementId::new(),
            name: None,
            locator: None,
            context: Vec::new(),
            parent: None,
            pinned: None,
            criteria: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = ElementId(id.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a context link; links are applied outer to inner in insertion order
    pub fn in_context(mut self, entry: ContextEntry) -> Self {
        self.context.push(entry);
        self
    }

    pub fn with_context(mut self, entries: impl IntoIterator<Item = ContextEntry>) -> Self {
        self.context.extend(entries);
        self
    }

    /// Resolve this element below the element registered as `parent`
    pub fn child_of(mut self, parent: &ElementId) -> Self {
        self.parent = Some(ParentRef::Element(parent.clone()));
        self
    }

    pub fn in_container(mut self, owner: impl Into<String>) -> Self {
        self.parent = Some(ParentRef::Container(owner.into()));
        self
    }

    pub fn with_criteria(mut self, criteria: SearchCriteria<H>) -> Self {
        self.criteria = Some(criteria);
        self
    }

    pub fn id(&self) -> &ElementId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn locator(&self) -> Option<&Locator> {
        self.locator.as_ref()
    }

    pub fn context(&self) -> &[ContextEntry] {
        &self.context
    }

    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    /// Scope-bearing parent id, if any
    pub fn parent_element(&self) -> Option<&ElementId> {
        match &self.parent {
            Some(ParentRef::Element(id)) => Some(id),
            _ => None,
        }
    }

    pub fn criteria(&self) -> Option<&SearchCriteria<H>> {
        self.criteria.as_ref()
    }

    /// Accept every candidate regardless of the ambient default
    pub fn search_all(&mut self) -> &mut Self {
        self.criteria = Some(SearchCriteria::Any);
        self
    }

    pub fn pinned(&self) -> Option<&[H]> {
        self.pinned.as_deref()
    }

    /// Fix the result of future resolutions to `handles`
    pub fn pin(&mut self, handles: Vec<H>) {
        self.pinned = Some(handles);
    }

    /// Drop pinned handles so the next resolution queries the driver again
    pub fn unpin(&mut self) -> Option<Vec<H>> {
        self.pinned.take()
    }

    /// Human readable description.
    ///
    /// The short form lists `kind='expression'` pairs for the context chain
    /// and the locator; the full form prints the locator and the context.
    pub fn describe(&self, short: bool) -> String {
        let Some(locator) = &self.locator else {
            return "No Locators".to_string();
        };
        if short {
            return self
                .context
                .iter()
                .map(|entry| entry.locator.short())
                .chain(std::iter::once(locator.short()))
                .collect::<Vec<_>>()
                .join("; ");
        }
        let mut text = format!("Locator: '{locator}'");
        if !self.context.is_empty() {
            let chain = self
                .context
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            text.push_str(&format!(", Context: '[{chain}]'"));
        }
        text
    }
}

impl<H> fmt::Display for LogicalElement<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(false))
    }
}

impl<H> fmt::Debug for LogicalElement<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicalElement")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("locator", &self.locator)
            .field("context", &self.context)
            .field("parent", &self.parent)
            .field("pinned", &self.pinned.as_ref().map(Vec::len))
            .field("criteria", &self.criteria)
            .finish()
    }
}

/// Registry of logical elements keyed by id
///
/// Parent links are ids into the same tree. A scope-bearing parent must be
/// registered before its children, so chains always terminate.
pub struct ElementTree<H> {
    elements: HashMap<ElementId, LogicalElement<H>>,
}

impl<H> Default for ElementTree<H> {
    fn default() -> Self {
        Self {
            elements: HashMap::new(),
        }
    }
}

impl<H> ElementTree<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an element and return its id
    pub fn insert(&mut self, element: LogicalElement<H>) -> Result<ElementId, LocatorError> {
        if self.elements.contains_key(&element.id) {
            return Err(LocatorError::InvalidLocator(format!(
                "element {} is already registered",
                element.id
            )));
        }
        if let Some(parent) = element.parent_element() {
            if !self.elements.contains_key(parent) {
                return Err(LocatorError::UnknownElement(parent.clone()));
            }
        }
        let id = element.id.clone();
        self.elements.insert(id.clone(), element);
        Ok(id)
    }

    pub fn get(&self, id: &ElementId) -> Result<&LogicalElement<H>, LocatorError> {
        self.elements
            .get(id)
            .ok_or_else(|| LocatorError::UnknownElement(id.clone()))
    }

    pub fn get_mut(&mut self, id: &ElementId) -> Result<&mut LogicalElement<H>, LocatorError> {
        self.elements
            .get_mut(id)
            .ok_or_else(|| LocatorError::UnknownElement(id.clone()))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Scope-bearing chain ending at `id`, outermost first
    pub fn ancestors(&self, id: &ElementId) -> Result<Vec<&LogicalElement<H>>, LocatorError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if !seen.insert(current) {
                return Err(LocatorError::CyclicParent(id.clone()));
            }
            let element = self.get(current)?;
            chain.push(element);
            cursor = element.parent_element();
        }
        chain.reverse();
        Ok(chain)
    }
}
