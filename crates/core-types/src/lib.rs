use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the locus crates.
#[derive(Debug, Error, Clone)]
pub enum LocusError {
    #[error("{message}")]
    Message { message: String },
}

impl LocusError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Identifier of a logical element inside an element tree.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ElementId(pub String);

impl ElementId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Locator strategies understood by drivers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LocatorKind {
    Id,
    Name,
    ClassName,
    CssSelector,
    XPath,
    TagName,
    LinkText,
    PartialLinkText,
}

impl LocatorKind {
    /// Parse a strategy from its WebDriver name
    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim() {
            "id" => Some(Self::Id),
            "name" => Some(Self::Name),
            "class name" => Some(Self::ClassName),
            "css selector" | "css" => Some(Self::CssSelector),
            "xpath" => Some(Self::XPath),
            "tag name" => Some(Self::TagName),
            "link text" => Some(Self::LinkText),
            "partial link text" => Some(Self::PartialLinkText),
            _ => None,
        }
    }

    /// WebDriver strategy name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::ClassName => "class name",
            Self::CssSelector => "css selector",
            Self::XPath => "xpath",
            Self::TagName => "tag name",
            Self::LinkText => "link text",
            Self::PartialLinkText => "partial link text",
        }
    }

    /// Compact name used in short descriptions
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::ClassName => "class",
            Self::CssSelector => "css",
            Self::XPath => "xpath",
            Self::TagName => "tag",
            Self::LinkText => "text",
            Self::PartialLinkText => "partialText",
        }
    }
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Driver-specific selector expression with its strategy.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Locator {
    kind: LocatorKind,
    expression: String,
}

impl Locator {
    pub fn new(kind: LocatorKind, expression: impl Into<String>) -> Self {
        Self {
            kind,
            expression: expression.into(),
        }
    }

    pub fn id(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::Id, value)
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(LocatorKind::CssSelector, selector)
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::new(LocatorKind::XPath, expression)
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self::new(LocatorKind::TagName, name)
    }

    pub fn kind(&self) -> LocatorKind {
        self.kind
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// `kind='expression'`
    pub fn short(&self) -> String {
        format!("{}='{}'", self.kind.short_name(), self.expression)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.expression)
    }
}

/// How a context link narrows the search scope.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ContextKind {
    /// Drill into the single element matched by the locator
    Locator,
    /// Drill into the single frame element matched by the locator and enter it
    Frame,
}

impl ContextKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Locator => "locator",
            Self::Frame => "frame",
        }
    }
}

/// One link of an explicit nested-context chain.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ContextEntry {
    pub kind: ContextKind,
    pub locator: Locator,
}

impl ContextEntry {
    pub fn new(kind: ContextKind, locator: Locator) -> Self {
        Self { kind, locator }
    }

    pub fn locator(locator: Locator) -> Self {
        Self::new(ContextKind::Locator, locator)
    }

    pub fn frame(locator: Locator) -> Self {
        Self::new(ContextKind::Frame, locator)
    }
}

impl fmt::Display for ContextEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind.name(), self.locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_webdriver_strategy_names() {
        assert_eq!(
            LocatorKind::from_string("css selector"),
            Some(LocatorKind::CssSelector)
        );
        assert_eq!(LocatorKind::from_string("xpath"), Some(LocatorKind::XPath));
        assert_eq!(LocatorKind::from_string("unknown"), None);
    }

    #[test]
    fn locator_renders_short_and_full_forms() {
        let locator = Locator::css("#submit");
        assert_eq!(locator.short(), "css='#submit'");
        assert_eq!(locator.to_string(), "css selector: #submit");
    }

    #[test]
    fn context_entry_display_includes_kind() {
        let entry = ContextEntry::frame(Locator::id("main"));
        assert_eq!(entry.to_string(), "frame=id: main");
    }

    #[test]
    fn element_ids_are_unique() {
        assert_ne!(ElementId::new(), ElementId::new());
    }
}
