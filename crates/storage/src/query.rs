//! Child listing queries.
//!
//! The provider only understands one way of asking "what is in this folder":
//! a filter expression over *every* node the credentials can see. A
//! [`ChildQuery`] captures the handful of shapes we actually need and renders
//! them into that expression.

use crate::node::{Node, NodeId};

/// Page size used when the caller doesn't care.
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Largest page the provider is willing to return.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// A request for the (non-trashed) children of a single parent node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildQuery {
    pub parent: NodeId,
    /// Exact name match.
    pub name: Option<String>,
    /// Extra provider-native filter expression, joined with `and`.
    pub filter: Option<String>,
    /// A hint, not a guarantee: providers may return fewer items per page.
    pub page_size: u32,
}
impl ChildQuery {
    pub fn children_of(parent: impl Into<NodeId>) -> Self {
        Self {
            parent: parent.into(),
            name: None,
            filter: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn filtered(mut self, filter: Option<impl Into<String>>) -> Self {
        self.filter = filter.map(Into::into).filter(|f: &String| !f.trim().is_empty());
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Render the provider's query language.
    ///
    /// ```
    /// use drivepath_storage::query::ChildQuery;
    ///
    /// let query = ChildQuery::children_of("root").named("Bob's files");
    /// assert_eq!(
    ///     query.render(),
    ///     r"'root' in parents and trashed = false and name = 'Bob\'s files'",
    /// );
    /// ```
    pub fn render(&self) -> String {
        let mut rendered = format!("{} in parents and trashed = false", quote(self.parent.as_str()));
        if let Some(name) = &self.name {
            rendered.push_str(" and name = ");
            rendered.push_str(&quote(name));
        }
        if let Some(filter) = &self.filter {
            rendered.push_str(" and (");
            rendered.push_str(filter);
            rendered.push(')');
        }
        rendered
    }
}

/// One page of a child listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub nodes: Vec<Node>,
    /// Present while the provider has more to give.
    pub next_page_token: Option<String>,
}

/// Quote a string literal for the provider's query language.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if matches!(c, '\\' | '\'') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}
