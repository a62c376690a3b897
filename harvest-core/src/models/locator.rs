//! Element locators and ordered locator chains.
//!
//! A [`LocatorChain`] is pure data: an ordered list of named
//! [`LocatorStrategy`] entries, each mapping the roles a caller needs
//! (e.g. `identity`, `secret`) to an [`ElementLocator`]. The evaluator that
//! runs a chain against a live page lives in `harvest-fetch`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How to find elements on a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// A CSS selector.
    Css(String),
    /// An `XPath` expression.
    Xpath(String),
}

impl Selector {
    /// CSS selector shorthand.
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// `XPath` shorthand.
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::Xpath(expression.into())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css:{s}"),
            Self::Xpath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// The `nth` element matched by a selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementLocator {
    /// The selector to evaluate.
    #[serde(flatten)]
    pub selector: Selector,
    /// Zero-based index among the matches.
    #[serde(default)]
    pub nth: usize,
}

impl ElementLocator {
    /// First element matching a CSS selector.
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: Selector::css(selector),
            nth: 0,
        }
    }

    /// First element matching an `XPath` expression.
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self {
            selector: Selector::xpath(expression),
            nth: 0,
        }
    }

    /// Selects the `nth` match instead of the first.
    pub fn nth(mut self, nth: usize) -> Self {
        self.nth = nth;
        self
    }
}

impl fmt::Display for ElementLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nth == 0 {
            write!(f, "{}", self.selector)
        } else {
            write!(f, "{}[{}]", self.selector, self.nth)
        }
    }
}

/// One named way of locating every role a caller needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorStrategy {
    /// Name used in logs, e.g. `by-name`.
    pub name: String,
    /// Role name to locator.
    pub targets: BTreeMap<String, ElementLocator>,
}

impl LocatorStrategy {
    /// Creates an empty strategy.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: BTreeMap::new(),
        }
    }

    /// Adds a role target.
    pub fn target(mut self, role: impl Into<String>, locator: ElementLocator) -> Self {
        self.targets.insert(role.into(), locator);
        self
    }

    /// Returns true if this strategy names a locator for every role.
    pub fn covers(&self, roles: &[&str]) -> bool {
        roles.iter().all(|role| self.targets.contains_key(*role))
    }
}

/// Ordered, first-match-wins list of locator strategies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocatorChain {
    strategies: Vec<LocatorStrategy>,
}

impl LocatorChain {
    /// Creates a chain from strategies in priority order.
    pub fn new(strategies: Vec<LocatorStrategy>) -> Self {
        Self { strategies }
    }

    /// Strategies in evaluation order.
    pub fn strategies(&self) -> &[LocatorStrategy] {
        &self.strategies
    }

    /// Number of strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Returns true if the chain has no strategies.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_json_shape() {
        let json = r#"{"css": "input[type='date']", "nth": 1}"#;
        let locator: ElementLocator = serde_json::from_str(json).unwrap();
        assert_eq!(locator, ElementLocator::css("input[type='date']").nth(1));

        let json = r#"{"xpath": "//button"}"#;
        let locator: ElementLocator = serde_json::from_str(json).unwrap();
        assert_eq!(locator.nth, 0);
        assert_eq!(locator.to_string(), "xpath://button");
    }

    #[test]
    fn test_strategy_covers_roles() {
        let strategy = LocatorStrategy::new("by-name")
            .target("identity", ElementLocator::css("input[name='email']"))
            .target("secret", ElementLocator::css("input[name='password']"));

        assert!(strategy.covers(&["identity", "secret"]));
        assert!(!strategy.covers(&["identity", "secret", "submit"]));
    }
}
