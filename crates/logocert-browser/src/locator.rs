//! Element locators resolved in page JavaScript
//!
//! Elements are never held as driver handles. A lookup records the chain of
//! `(locator, index)` steps that reached the element, and every later action
//! re-resolves that chain in the page. This keeps elements cheap to pass
//! around, lets lookups be scoped to a parent element or an iframe, and turns
//! a stale element into an ordinary "not found" error.

use serde::{Deserialize, Serialize};

/// How to find elements relative to a root node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locator {
    /// Elements carrying a class name (space-separated for compound classes)
    Class(String),
    /// The element with this id
    Id(String),
    /// Elements whose `name` attribute matches
    Name(String),
    /// Elements with this tag name
    Tag(String),
    /// Elements matching a CSS selector
    Css(String),
    /// Nodes matching an XPath expression, evaluated with the root as context
    XPath(String),
    /// Elements whose own text nodes contain the needle
    Text(String),
}

impl Locator {
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class(name.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Tag(tag.into())
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    pub fn text(needle: impl Into<String>) -> Self {
        Self::Text(needle.into())
    }

    /// JS expression evaluating to an array of the elements under `root`
    pub fn query_js(&self, root: &str) -> String {
        match self {
            Self::Class(name) => {
                format!("Array.from({}.getElementsByClassName({}))", root, js_str(name))
            }
            Self::Id(id) => format!(
                "Array.from({}.querySelectorAll('[id]')).filter(e => e.id === {})",
                root,
                js_str(id)
            ),
            Self::Name(name) => format!(
                "Array.from({}.querySelectorAll('[name]')).filter(e => e.getAttribute('name') === {})",
                root,
                js_str(name)
            ),
            Self::Tag(tag) => {
                format!("Array.from({}.getElementsByTagName({}))", root, js_str(tag))
            }
            Self::Css(selector) => {
                format!("Array.from({}.querySelectorAll({}))", root, js_str(selector))
            }
            Self::XPath(expr) => format!(
                "((r) => {{ const d = r.ownerDocument || r; \
                 const s = d.evaluate({}, r, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                 const out = []; for (let i = 0; i < s.snapshotLength; i++) {{ out.push(s.snapshotItem(i)); }} \
                 return out; }})({})",
                js_str(expr),
                root
            ),
            Self::Text(needle) => format!(
                "Array.from({}.querySelectorAll('*')).filter(e => Array.from(e.childNodes)\
                 .some(n => n.nodeType === 3 && n.textContent.includes({})))",
                root,
                js_str(needle)
            ),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Class(name) => write!(f, ".{}", name.replace(' ', ".")),
            Self::Id(id) => write!(f, "#{}", id),
            Self::Name(name) => write!(f, "[name={}]", name),
            Self::Tag(tag) => write!(f, "{}", tag),
            Self::Css(selector) => write!(f, "{}", selector),
            Self::XPath(expr) => write!(f, "xpath:{}", expr),
            Self::Text(needle) => write!(f, "text:{}", needle),
        }
    }
}

/// Steps from a root node down to one element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementPath {
    steps: Vec<(Locator, usize)>,
}

impl ElementPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Path to the `index`th match of `locator` below this path
    pub fn child(&self, locator: Locator, index: usize) -> Self {
        let mut steps = self.steps.clone();
        steps.push((locator, index));
        Self { steps }
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// JS expression evaluating to the element, or `null` if any step misses
    pub fn resolve_js(&self, root: &str) -> String {
        if self.steps.is_empty() {
            return root.to_string();
        }
        let mut body = format!("let n = {};", root);
        for (locator, index) in &self.steps {
            body.push_str(&format!(
                " if (!n) {{ return null; }} n = {}[{}] || null;",
                locator.query_js("n"),
                index
            ));
        }
        format!("(() => {{ {} return n; }})()", body)
    }
}

impl std::fmt::Display for ElementPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "document");
        }
        let parts: Vec<String> = self
            .steps
            .iter()
            .map(|(locator, index)| format!("{}[{}]", locator, index))
            .collect();
        write!(f, "{}", parts.join(" > "))
    }
}

/// Snapshot of an element found on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageElement {
    pub path: ElementPath,
    /// Visible text at lookup time, trimmed
    pub text: String,
}

/// Quote a Rust string as a JS string literal
pub(crate) fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}
