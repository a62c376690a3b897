//! Report view navigation.
//!
//! Opens the report page in an authenticated session, fills the date
//! range, submits the query, and waits until the results stop changing.

use harvest_core::{roles, PortalDescriptor, ReportQuery, WaitSettings};
use harvest_fetch::{
    resolve_chain, wait_for, wait_settled, Clock, FetchError, PageDriver, ResolvedTargets,
    WaitSpec,
};
use tracing::{debug, enabled, info, instrument, Level};

use crate::diagnostics::{stage, Diagnostics};

/// Lists the first inputs on the page, for debugging locator chains.
const INPUT_INVENTORY_SCRIPT: &str = "Array.from(document.querySelectorAll('input')).slice(0, 15)\
    .map(i => ({ name: i.name || '', id: i.id || '', type: i.type || '', placeholder: i.placeholder || '' }))";

/// A report view showing results for a submitted query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportView {
    /// Address of the view after the query settled.
    pub url: String,
    /// Name of the date-field locator strategy that matched.
    pub date_strategy: String,
}

/// Drives an authenticated page to the report results.
pub struct Navigator<'a> {
    portal: &'a PortalDescriptor,
    waits: &'a WaitSettings,
    clock: &'a dyn Clock,
    diagnostics: &'a Diagnostics,
}

impl<'a> Navigator<'a> {
    /// Creates a navigator.
    pub fn new(
        portal: &'a PortalDescriptor,
        waits: &'a WaitSettings,
        clock: &'a dyn Clock,
        diagnostics: &'a Diagnostics,
    ) -> Self {
        Self {
            portal,
            waits,
            clock,
            diagnostics,
        }
    }

    /// Opens the report view and submits `query`.
    ///
    /// # Errors
    ///
    /// - [`FetchError::SessionExpired`] if the portal sends the page back to
    ///   the login surface, before or after the query.
    /// - [`FetchError::Navigation`] if the date controls or the submit
    ///   control cannot be located, or the results never settle.
    #[instrument(skip(self, page, query), fields(account = %label, start = %query.start, end = %query.end))]
    pub async fn fetch_report_view(
        &self,
        page: &dyn PageDriver,
        query: &ReportQuery,
        label: &str,
    ) -> Result<ReportView, FetchError> {
        page.goto(&self.portal.report_url).await?;
        self.ensure_session(page, label).await?;
        if enabled!(Level::DEBUG) {
            log_input_inventory(page).await;
        }

        let dates = self.locate_dates(page).await?;
        debug!(strategy = %dates.strategy, "Date controls located");
        page.fill(dates.require(roles::START)?, &query.start_param())
            .await?;
        page.fill(dates.require(roles::END)?, &query.end_param())
            .await?;
        self.diagnostics
            .capture(page, stage::BEFORE_QUERY, label)
            .await;

        let submit = resolve_chain(page, &self.portal.query_submit, &[roles::SUBMIT])
            .await
            .map_err(|e| FetchError::Navigation(format!("query submit control not found: {e}")))?;
        page.click(submit.require(roles::SUBMIT)?).await?;

        self.wait_for_results(page).await?;
        let url = self.ensure_session(page, label).await?;
        self.diagnostics
            .capture(page, stage::AFTER_RESULTS, label)
            .await;

        info!(url = %url, "Report results ready");
        Ok(ReportView {
            url,
            date_strategy: dates.strategy,
        })
    }

    /// Returns the current URL, or `SessionExpired` if it is the login page.
    async fn ensure_session(&self, page: &dyn PageDriver, label: &str) -> Result<String, FetchError> {
        let url = page.current_url().await?;
        if self.portal.is_login_url(&url) {
            self.diagnostics
                .capture(page, stage::SESSION_EXPIRED, label)
                .await;
            return Err(FetchError::SessionExpired { url });
        }
        Ok(url)
    }

    async fn locate_dates(&self, page: &dyn PageDriver) -> Result<ResolvedTargets, FetchError> {
        let chain = &self.portal.date_fields;
        let wanted = [roles::START, roles::END];
        let spec = WaitSpec::new(self.waits.page_ready(), self.waits.poll_interval());

        let found = wait_for(self.clock, spec, "date range controls", move || async move {
            resolve_chain(page, chain, &wanted).await.ok()
        })
        .await;

        match found {
            Ok(dates) => Ok(dates),
            Err(_) => resolve_chain(page, chain, &wanted)
                .await
                .map_err(|e| FetchError::Navigation(format!("date range controls not found: {e}"))),
        }
    }

    async fn wait_for_results(&self, page: &dyn PageDriver) -> Result<(), FetchError> {
        let expression = self.portal.ready_expression.as_str();
        let spec = WaitSpec::new(self.waits.results(), self.waits.poll_interval());

        wait_settled(
            self.clock,
            spec,
            "report results",
            self.waits.settle_polls,
            move || async move {
                page.evaluate(expression)
                    .await
                    .ok()
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false)
            },
        )
        .await
        .map_err(|e| FetchError::Navigation(format!("results never settled: {e}")))
    }
}

/// Logs name, id, type and placeholder of the first inputs on the page.
async fn log_input_inventory(page: &dyn PageDriver) {
    let Ok(serde_json::Value::Array(inputs)) = page.evaluate(INPUT_INVENTORY_SCRIPT).await else {
        return;
    };
    for (index, input) in inputs.iter().enumerate() {
        let field = |key: &str| input.get(key).and_then(|v| v.as_str()).unwrap_or("").to_string();
        debug!(
            index,
            name = %field("name"),
            id = %field("id"),
            kind = %field("type"),
            placeholder = %field("placeholder"),
            "Report page input"
        );
    }
}
