//! First-match-wins evaluation of locator chains.
//!
//! A [`LocatorChain`] is plain data. This module is the evaluator: it walks
//! the strategies in order and returns the first one whose every required
//! role resolves to an element on the page. Later strategies are never
//! probed once one is complete.

use std::collections::BTreeMap;

use harvest_core::{ElementLocator, LocatorChain};
use tracing::{debug, trace};

use crate::error::LocatorError;
use crate::host::browser::PageDriver;

/// The outcome of a successful chain evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTargets {
    /// Name of the strategy that matched.
    pub strategy: String,
    targets: BTreeMap<String, ElementLocator>,
}

impl ResolvedTargets {
    /// Locator for `role`. Present for every role that was requested.
    pub fn get(&self, role: &str) -> Option<&ElementLocator> {
        self.targets.get(role)
    }

    /// Locator for `role`, as an error if missing.
    pub fn require(&self, role: &str) -> Result<&ElementLocator, LocatorError> {
        self.get(role).ok_or_else(|| LocatorError::NoMatch {
            roles: vec![role.to_string()],
            tried: vec![self.strategy.clone()],
        })
    }
}

/// Resolves `roles` against `chain` on the current page.
///
/// A strategy is complete when it defines every role and each role's
/// locator has more than `nth` matches. Strategies missing a role are
/// skipped without probing. A page error while probing counts as no match
/// for that strategy.
pub async fn resolve_chain(
    page: &dyn PageDriver,
    chain: &LocatorChain,
    roles: &[&str],
) -> Result<ResolvedTargets, LocatorError> {
    let mut tried = Vec::with_capacity(chain.len());

    'strategies: for strategy in chain.strategies() {
        tried.push(strategy.name.clone());
        if !strategy.covers(roles) {
            trace!(strategy = %strategy.name, "Strategy does not define every role");
            continue;
        }

        let mut targets = BTreeMap::new();
        for role in roles {
            let Some(locator) = strategy.targets.get(*role) else {
                continue 'strategies;
            };
            let matches = match page.count(&locator.selector).await {
                Ok(n) => n,
                Err(err) => {
                    debug!(strategy = %strategy.name, role, error = %err, "Locator probe failed");
                    0
                }
            };
            if matches <= locator.nth {
                trace!(strategy = %strategy.name, role, matches, "Role not located");
                continue 'strategies;
            }
            targets.insert((*role).to_string(), locator.clone());
        }

        debug!(strategy = %strategy.name, "Locator strategy matched");
        return Ok(ResolvedTargets {
            strategy: strategy.name.clone(),
            targets,
        });
    }

    Err(LocatorError::NoMatch {
        roles: roles.iter().map(|r| (*r).to_string()).collect(),
        tried,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubPage;
    use harvest_core::{LocatorStrategy, Selector};

    fn date_chain() -> LocatorChain {
        LocatorChain::new(vec![
            LocatorStrategy::new("by-id")
                .target("start", ElementLocator::css("#desde"))
                .target("end", ElementLocator::css("#hasta")),
            LocatorStrategy::new("start-only").target("start", ElementLocator::css("#x")),
            LocatorStrategy::new("by-type")
                .target("start", ElementLocator::css("input[type='date']"))
                .target("end", ElementLocator::css("input[type='date']").nth(1)),
            LocatorStrategy::new("by-name")
                .target("start", ElementLocator::css("[name='desde']"))
                .target("end", ElementLocator::css("[name='hasta']")),
        ])
    }

    #[tokio::test]
    async fn test_first_complete_strategy_wins() {
        let page = StubPage::default()
            .with(Selector::css("input[type='date']"), 2)
            .with(Selector::css("[name='desde']"), 1)
            .with(Selector::css("[name='hasta']"), 1);

        let resolved = resolve_chain(&page, &date_chain(), &["start", "end"])
            .await
            .unwrap();

        assert_eq!(resolved.strategy, "by-type");
        assert_eq!(resolved.get("end").unwrap().nth, 1);

        // by-name matched too but was never probed
        let probed = page.probed.lock().unwrap();
        assert!(!probed.contains(&Selector::css("[name='desde']")));
    }

    #[tokio::test]
    async fn test_partial_strategy_is_not_a_match() {
        // Only one date input: by-type cannot satisfy nth = 1
        let page = StubPage::default()
            .with(Selector::css("#desde"), 1)
            .with(Selector::css("input[type='date']"), 1);

        let err = resolve_chain(&page, &date_chain(), &["start", "end"])
            .await
            .unwrap_err();

        let LocatorError::NoMatch { tried, .. } = err;
        assert_eq!(tried, ["by-id", "start-only", "by-type", "by-name"]);
    }

    #[tokio::test]
    async fn test_probe_error_falls_through() {
        let chain = LocatorChain::new(vec![
            LocatorStrategy::new("broken").target("submit", ElementLocator::xpath("//broken[")),
            LocatorStrategy::new("fallback").target("submit", ElementLocator::css("button")),
        ]);
        let page = StubPage::default().with(Selector::css("button"), 3);

        let resolved = resolve_chain(&page, &chain, &["submit"]).await.unwrap();
        assert_eq!(resolved.strategy, "fallback");
        assert!(resolved.require("submit").is_ok());
        assert!(resolved.require("download").is_err());
    }
}
