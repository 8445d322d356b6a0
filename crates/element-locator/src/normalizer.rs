//! XPath rewriting for nested scopes
//!
//! An absolute XPath such as `//button` is evaluated from the document root
//! even when the driver is asked to search below an element. Inside a nested
//! scope such expressions are anchored to the context node instead.

use std::borrow::Cow;

use locus_core_types::{Locator, LocatorKind};

/// Anchor root-relative XPath expressions to the current node when the
/// search happens inside a nested scope. Anything else is returned as is.
pub fn normalize(locator: &Locator, nested: bool) -> Cow<'_, Locator> {
    if !nested || locator.kind() != LocatorKind::XPath {
        return Cow::Borrowed(locator);
    }
    let trimmed = locator.expression().trim_start();
    if !trimmed.starts_with('/') {
        return Cow::Borrowed(locator);
    }
    Cow::Owned(Locator::xpath(format!(".{trimmed}")))
}
