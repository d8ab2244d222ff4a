//! Element lookup over a [`UiSnapshot`].
//!
//! The locator is pure: given a snapshot, a [`Matcher`] and an optional
//! [`Scope`], [`find`] lazily yields every matching [`ElementHandle`] in
//! traversal order. Because snapshots are flattened topmost window first,
//! the first result is the most likely intended target.
//!
//! # Example
//!
//! ```
//! use uictl_core::element::{ScreenDump, UIElement, UiWindow};
//! use uictl_core::locator::{find, Matcher, Scope};
//! use uictl_core::snapshot::UiSnapshot;
//!
//! let dump = ScreenDump {
//!     windows: vec![UiWindow {
//!         component: Some("com.app/.Main".to_string()),
//!         root: UIElement { text: Some("Allow".to_string()), ..Default::default() },
//!     }],
//!     ..Default::default()
//! };
//! let snapshot = UiSnapshot::from_dump(dump);
//!
//! let matcher = Matcher::text("allow");
//! let scope = Scope::new("com.app");
//! assert_eq!(find(&snapshot, &matcher, Some(&scope)).count(), 1);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::snapshot::{ElementHandle, ElementNode, UiSnapshot};

/// How a text criterion compares against element text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatch {
    /// Exact, case-sensitive equality.
    Equals,
    /// Case-insensitive substring match.
    #[default]
    Contains,
}

/// A single search criterion: either text or identifier, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Matcher {
    /// Match on visible text or content description.
    ByText { value: String, mode: TextMatch },
    /// Match on the stable resource identifier.
    ById { value: String },
}

impl Matcher {
    /// Text criterion using the default [`TextMatch::Contains`] mode.
    pub fn text(value: impl Into<String>) -> Self {
        Matcher::ByText {
            value: value.into(),
            mode: TextMatch::default(),
        }
    }

    pub fn text_with_mode(value: impl Into<String>, mode: TextMatch) -> Self {
        Matcher::ByText {
            value: value.into(),
            mode,
        }
    }

    pub fn id(value: impl Into<String>) -> Self {
        Matcher::ById {
            value: value.into(),
        }
    }

    /// Returns true if the node satisfies this criterion.
    pub fn matches(&self, node: &ElementNode) -> bool {
        match self {
            Matcher::ByText { value, mode } => {
                let candidates = [node.text.as_deref(), node.description.as_deref()];
                candidates
                    .into_iter()
                    .flatten()
                    .any(|candidate| text_matches(value, candidate, *mode))
            }
            Matcher::ById { value } => node
                .identifier
                .as_deref()
                .is_some_and(|id| id_matches(value, id)),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::ByText { value, mode: TextMatch::Equals } => write!(f, "text == '{}'", value),
            Matcher::ByText { value, mode: TextMatch::Contains } => {
                write!(f, "text contains '{}'", value)
            }
            Matcher::ById { value } => write!(f, "id '{}'", value),
        }
    }
}

fn text_matches(query: &str, candidate: &str, mode: TextMatch) -> bool {
    match mode {
        TextMatch::Equals => candidate == query,
        TextMatch::Contains => candidate.to_lowercase().contains(&query.to_lowercase()),
    }
}

/// Matches an identifier exactly, or by short name when the query is not
/// fully qualified (`allow_button` matches `com.app:id/allow_button`).
fn id_matches(query: &str, identifier: &str) -> bool {
    if identifier == query {
        return true;
    }
    if query.contains(':') {
        return false;
    }
    identifier
        .split_once(":id/")
        .is_some_and(|(_, name)| name == query)
}

/// Restricts a search to the windows of a single component.
///
/// The qualifier is a component short string (`com.app/.MainActivity`) or a
/// bare package name (`com.app`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub fn new(qualifier: impl Into<String>) -> Self {
        Scope(qualifier.into())
    }

    /// Builds a scope from an optional caller argument; blank values mean "no scope".
    pub fn from_arg(qualifier: Option<&str>) -> Option<Self> {
        qualifier
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(Scope::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if a window owned by `component` is inside this scope.
    pub fn contains(&self, component: Option<&str>) -> bool {
        let Some(component) = component else {
            return false;
        };
        if component == self.0 {
            return true;
        }
        component
            .split_once('/')
            .is_some_and(|(package, _)| package == self.0)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lazily yields every element matching `matcher`, in traversal order.
///
/// An empty snapshot yields nothing. Without a scope, elements from every
/// window are considered.
pub fn find<'a>(
    snapshot: &'a UiSnapshot,
    matcher: &'a Matcher,
    scope: Option<&'a Scope>,
) -> impl Iterator<Item = ElementHandle> + 'a {
    snapshot
        .iter()
        .filter(move |(_, node)| scope.map_or(true, |s| s.contains(node.component.as_deref())))
        .filter(move |(_, node)| matcher.matches(node))
        .map(|(handle, _)| handle)
}
