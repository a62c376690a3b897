//! Portal authentication.
//!
//! Locates the credential fields through the configured locator chain,
//! fills them, submits, and waits for the browser to leave the login
//! surface. When the submit control does not navigate, the form is
//! submitted directly by script as a second try.

use harvest_core::{roles, AccountCredential, PortalDescriptor, WaitSettings};
use harvest_fetch::{resolve_chain, wait_for, Clock, FetchError, PageDriver, WaitSpec};
use tracing::{debug, info, instrument, warn};

use crate::diagnostics::{stage, Diagnostics};

/// Proof that a page holds an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    /// Where the portal landed after login.
    pub landing_url: String,
    /// True if the scripted form submit was needed.
    pub used_form_fallback: bool,
}

/// Logs accounts into the portal.
pub struct Authenticator<'a> {
    portal: &'a PortalDescriptor,
    waits: &'a WaitSettings,
    clock: &'a dyn Clock,
    diagnostics: &'a Diagnostics,
}

impl<'a> Authenticator<'a> {
    /// Creates an authenticator.
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

    /// Logs `account` in on `page`.
    ///
    /// Fails with [`FetchError::Authentication`] if the login form cannot be
    /// found or the page is still on the login surface after submitting.
    /// A `post_login` screenshot is taken either way.
    #[instrument(skip(self, page, account), fields(account = %account.label))]
    pub async fn login(
        &self,
        page: &dyn PageDriver,
        account: &AccountCredential,
    ) -> Result<AuthenticatedSession, FetchError> {
        page.goto(&self.portal.login_url).await?;

        let fields = self.locate_fields(page).await?;
        debug!(strategy = %fields.strategy, "Login fields located");
        page.fill(fields.require(roles::IDENTITY)?, &account.identity)
            .await?;
        page.fill(fields.require(roles::SECRET)?, account.secret.expose())
            .await?;

        // The scripted submit posts the credentials; it runs at most once.
        let mut used_form_fallback =
            match resolve_chain(page, &self.portal.login_submit, &[roles::SUBMIT]).await {
                Ok(submit) => {
                    debug!(strategy = %submit.strategy, "Submitting login");
                    page.click(submit.require(roles::SUBMIT)?).await?;
                    false
                }
                Err(err) => {
                    warn!(error = %err, "No login submit control, submitting form directly");
                    self.submit_form(page).await;
                    true
                }
            };

        let mut landed = self.wait_off_login(page).await;
        if landed.is_none() && !used_form_fallback && self.submit_form(page).await {
            info!("Still on login surface, retried with direct form submit");
            used_form_fallback = true;
            landed = self.wait_off_login(page).await;
        }

        self.diagnostics
            .capture(page, stage::POST_LOGIN, &account.label)
            .await;

        match landed {
            Some(landing_url) => {
                info!(url = %landing_url, "Logged in");
                Ok(AuthenticatedSession {
                    landing_url,
                    used_form_fallback,
                })
            }
            None => {
                let url = page.current_url().await.unwrap_or_default();
                Err(FetchError::Authentication(format!(
                    "still on the login surface after submitting credentials ({url})"
                )))
            }
        }
    }

    async fn locate_fields(
        &self,
        page: &dyn PageDriver,
    ) -> Result<harvest_fetch::ResolvedTargets, FetchError> {
        let chain = &self.portal.login_fields;
        let wanted = [roles::IDENTITY, roles::SECRET];
        let spec = WaitSpec::new(self.waits.page_ready(), self.waits.poll_interval());

        let found = wait_for(self.clock, spec, "login form", move || async move {
            resolve_chain(page, chain, &wanted).await.ok()
        })
        .await;

        match found {
            Ok(fields) => Ok(fields),
            Err(_) => resolve_chain(page, chain, &wanted)
                .await
                .map_err(|e| FetchError::Authentication(format!("login form not found: {e}"))),
        }
    }

    /// Polls until the page is off the login surface. Returns the new URL.
    async fn wait_off_login(&self, page: &dyn PageDriver) -> Option<String> {
        let portal = self.portal;
        let spec = WaitSpec::new(self.waits.login(), self.waits.poll_interval());
        wait_for(self.clock, spec, "leave login surface", move || async move {
            match page.current_url().await {
                Ok(url) if !url.is_empty() && !portal.is_login_url(&url) => Some(url),
                _ => None,
            }
        })
        .await
        .ok()
    }

    /// Runs the scripted form submit. Returns true if a form was submitted.
    async fn submit_form(&self, page: &dyn PageDriver) -> bool {
        match page.evaluate(&self.portal.form_submit_script).await {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(err) => {
                // The context is torn down when the submit navigates.
                debug!(error = %err, "Form submit script did not return");
                true
            }
        }
    }
}
