//! The four acquisition strategies, in their default order.
//!
//! Each strategy carries the slice of portal configuration it needs and
//! reads everything else from the [`AcquireContext`]. A missing
//! precondition (no control, no discoverable request) is reported as
//! skipped; anything that was tried and did not yield bytes is a failure.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use harvest_core::{roles, LocatorChain, QueryParams};
use harvest_fetch::host::files;
use harvest_fetch::{
    resolve_chain, wait_for, AcquireContext, AcquisitionKind, AcquisitionStrategy,
    SessionCredentials, StrategyOutcome,
};
use tracing::{debug, warn};

use crate::discovery::{discover_csrf_token, discover_download_target};
use crate::error::PortalError;
use crate::web::{endpoint_url, host_of, send_target};

/// Installs the blob hook. Idempotent; re-running only clears the slot.
const CAPTURE_HOOK_SCRIPT: &str = r"(() => {
  window.__harvestCapture = null;
  if (window.__harvestHooked) { return true; }
  window.__harvestHooked = true;
  const original = URL.createObjectURL.bind(URL);
  URL.createObjectURL = function (obj) {
    try {
      if (obj instanceof Blob) {
        const reader = new FileReader();
        reader.onloadend = () => {
          const data = String(reader.result || '');
          window.__harvestCapture = data.slice(data.indexOf(',') + 1);
        };
        reader.readAsDataURL(obj);
      }
    } catch (e) {}
    return original(obj);
  };
  return true;
})()";

const CAPTURE_READ_EXPRESSION: &str = "window.__harvestCapture || null";

// ============================================================================
// Download Watch
// ============================================================================

/// Clicks the download control and watches the download directory.
#[derive(Debug, Clone)]
pub struct DownloadWatchStrategy {
    control: LocatorChain,
}

impl DownloadWatchStrategy {
    /// Strategy id.
    pub const ID: &'static str = "download_watch";

    /// Creates the strategy with the download-control locator chain.
    pub fn new(control: LocatorChain) -> Self {
        Self { control }
    }
}

#[async_trait]
impl AcquisitionStrategy for DownloadWatchStrategy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn kind(&self) -> AcquisitionKind {
        AcquisitionKind::DownloadWatch
    }

    async fn attempt(&self, ctx: &AcquireContext<'_>) -> StrategyOutcome {
        let control = match resolve_chain(ctx.page, &self.control, &[roles::DOWNLOAD]).await {
            Ok(targets) => targets,
            Err(e) => return StrategyOutcome::skipped(format!("no download control: {e}")),
        };
        let Some(locator) = control.get(roles::DOWNLOAD) else {
            return StrategyOutcome::skipped("no download control");
        };

        let before = match files::snapshot_dir(ctx.download_dir).await {
            Ok(snapshot) => snapshot,
            Err(e) => return StrategyOutcome::failure(format!("cannot read download directory: {e}")),
        };
        debug!(strategy = %control.strategy, known = before.len(), "Clicking download control");
        if let Err(e) = ctx.page.click(locator).await {
            return StrategyOutcome::failure(format!("download click failed: {e}"));
        }

        let dir = ctx.download_dir;
        let extension = ctx.settings.artifact_extension.as_str();
        let before = &before;
        let found = wait_for(ctx.clock, ctx.download_wait(), "download", move || async move {
            match files::find_new_download(dir, before, extension).await {
                Ok(found) => found,
                Err(e) => {
                    debug!(error = %e, "Download directory scan failed");
                    None
                }
            }
        })
        .await;

        match found {
            Ok(path) => match ctx.promote_download(&path, Self::ID).await {
                Ok(artifact) => StrategyOutcome::Success(artifact),
                Err(e) => StrategyOutcome::failure(format!("cannot promote {}: {e}", path.display())),
            },
            Err(e) => StrategyOutcome::failure(e.to_string()),
        }
    }
}

// ============================================================================
// Resource Capture
// ============================================================================

/// Hooks in-page blob creation, clicks the control, and reads the bytes
/// the page produced.
#[derive(Debug, Clone)]
pub struct ResourceCaptureStrategy {
    control: LocatorChain,
}

impl ResourceCaptureStrategy {
    /// Strategy id.
    pub const ID: &'static str = "resource_capture";

    /// Creates the strategy with the download-control locator chain.
    pub fn new(control: LocatorChain) -> Self {
        Self { control }
    }
}

#[async_trait]
impl AcquisitionStrategy for ResourceCaptureStrategy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn kind(&self) -> AcquisitionKind {
        AcquisitionKind::ResourceCapture
    }

    async fn attempt(&self, ctx: &AcquireContext<'_>) -> StrategyOutcome {
        let control = match resolve_chain(ctx.page, &self.control, &[roles::DOWNLOAD]).await {
            Ok(targets) => targets,
            Err(e) => return StrategyOutcome::skipped(format!("no download control: {e}")),
        };
        let Some(locator) = control.get(roles::DOWNLOAD) else {
            return StrategyOutcome::skipped("no download control");
        };

        if let Err(e) = ctx.page.evaluate(CAPTURE_HOOK_SCRIPT).await {
            return StrategyOutcome::failure(format!("cannot install capture hook: {e}"));
        }
        if let Err(e) = ctx.page.click(locator).await {
            return StrategyOutcome::failure(format!("download click failed: {e}"));
        }

        let page = ctx.page;
        let captured = wait_for(ctx.clock, ctx.capture_wait(), "captured resource", move || async move {
            match page.evaluate(CAPTURE_READ_EXPRESSION).await {
                Ok(serde_json::Value::String(encoded)) if !encoded.is_empty() => Some(encoded),
                _ => None,
            }
        })
        .await;

        let encoded = match captured {
            Ok(encoded) => encoded,
            Err(e) => return StrategyOutcome::failure(e.to_string()),
        };
        let bytes = match STANDARD.decode(encoded.trim()).map_err(PortalError::from) {
            Ok(bytes) => bytes,
            Err(e) => return StrategyOutcome::failure(e.to_string()),
        };
        match ctx.store_bytes(bytes, Self::ID).await {
            Ok(artifact) => StrategyOutcome::Success(artifact),
            Err(e) => StrategyOutcome::failure(e.to_string()),
        }
    }
}

// ============================================================================
// Authenticated Replay
// ============================================================================

/// Replays the download request found in the results markup with the
/// browser session's cookies.
#[derive(Debug, Clone)]
pub struct AuthenticatedReplayStrategy {
    keywords: Vec<String>,
}

impl AuthenticatedReplayStrategy {
    /// Strategy id.
    pub const ID: &'static str = "authenticated_replay";

    /// Creates the strategy with the keywords that label a download.
    pub fn new(keywords: Vec<String>) -> Self {
        Self { keywords }
    }
}

#[async_trait]
impl AcquisitionStrategy for AuthenticatedReplayStrategy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn kind(&self) -> AcquisitionKind {
        AcquisitionKind::AuthenticatedReplay
    }

    async fn attempt(&self, ctx: &AcquireContext<'_>) -> StrategyOutcome {
        let (html, view_url) = match snapshot(ctx).await {
            Ok(snapshot) => snapshot,
            Err(reason) => return StrategyOutcome::failure(reason),
        };
        let Some(target) = discover_download_target(&html, &view_url, &self.keywords) else {
            return StrategyOutcome::skipped("no download request found on the results page");
        };
        debug!(target = %target.describe(), "Replaying download request");

        let session = match session_for(ctx, target.url(), &view_url).await {
            Ok(session) => session,
            Err(reason) => return StrategyOutcome::failure(reason),
        };
        let payload = match send_target(ctx.http, &target, &session).await {
            Ok(payload) => payload,
            Err(e) => return StrategyOutcome::failure(format!("{}: {e}", target.describe())),
        };

        let min = ctx.settings.min_payload_bytes;
        if !payload.is_ok() || payload.bytes.len() < min {
            return StrategyOutcome::failure(format!(
                "{} returned status {} with {} bytes (need 200 and at least {min})",
                target.describe(),
                payload.status,
                payload.bytes.len()
            ));
        }
        match ctx.store_bytes(payload.bytes, Self::ID).await {
            Ok(artifact) => StrategyOutcome::Success(artifact),
            Err(e) => StrategyOutcome::failure(e.to_string()),
        }
    }
}

// ============================================================================
// Direct Request
// ============================================================================

/// Tries known export endpoints next to the report view with the query
/// parameters and any anti-forgery token.
#[derive(Debug, Clone)]
pub struct DirectRequestStrategy {
    keywords: Vec<String>,
    suffixes: Vec<String>,
    csrf_selectors: Vec<String>,
    params: QueryParams,
}

impl DirectRequestStrategy {
    /// Strategy id.
    pub const ID: &'static str = "direct_request";

    /// Creates the strategy.
    ///
    /// `keywords` is used only to detect an explicit download request, in
    /// which case this strategy stands aside.
    pub fn new(
        keywords: Vec<String>,
        suffixes: Vec<String>,
        csrf_selectors: Vec<String>,
        params: QueryParams,
    ) -> Self {
        Self {
            keywords,
            suffixes,
            csrf_selectors,
            params,
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for DirectRequestStrategy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn kind(&self) -> AcquisitionKind {
        AcquisitionKind::DirectRequest
    }

    async fn attempt(&self, ctx: &AcquireContext<'_>) -> StrategyOutcome {
        if self.suffixes.is_empty() {
            return StrategyOutcome::skipped("no endpoint suffixes configured");
        }
        let (html, view_url) = match snapshot(ctx).await {
            Ok(snapshot) => snapshot,
            Err(reason) => return StrategyOutcome::failure(reason),
        };
        if discover_download_target(&html, &view_url, &self.keywords).is_some() {
            return StrategyOutcome::skipped("the page exposes an explicit download request");
        }

        let mut params = vec![
            (self.params.start.clone(), ctx.query.start_param()),
            (self.params.end.clone(), ctx.query.end_param()),
        ];
        match discover_csrf_token(&html, &self.csrf_selectors, &self.params.csrf) {
            Some(token) => params.push(token),
            None => debug!("No anti-forgery token on the page"),
        }

        let session = match session_for(ctx, &view_url, &view_url).await {
            Ok(session) => session,
            Err(reason) => return StrategyOutcome::failure(reason),
        };

        let mut tried = Vec::with_capacity(self.suffixes.len());
        for suffix in &self.suffixes {
            let Some(url) = endpoint_url(&view_url, suffix) else {
                tried.push(format!("{suffix}: not a valid endpoint"));
                continue;
            };
            match ctx.http.get_as_session(&url, &params, &session).await {
                Ok(payload) if payload.is_ok() && payload.is_spreadsheet() && !payload.bytes.is_empty() => {
                    debug!(url = %url, bytes = payload.bytes.len(), "Endpoint returned a spreadsheet");
                    return match ctx.store_bytes(payload.bytes, Self::ID).await {
                        Ok(artifact) => StrategyOutcome::Success(artifact),
                        Err(e) => StrategyOutcome::failure(e.to_string()),
                    };
                }
                Ok(payload) => tried.push(format!(
                    "{url}: status {} ({})",
                    payload.status,
                    payload.content_type.as_deref().unwrap_or("no content type")
                )),
                Err(e) => tried.push(format!("{url}: {e}")),
            }
        }

        StrategyOutcome::failure(format!(
            "no endpoint returned a spreadsheet: {}",
            tried.join("; ")
        ))
    }
}

// ============================================================================
// Shared
// ============================================================================

/// Current markup and address of the results page.
async fn snapshot(ctx: &AcquireContext<'_>) -> Result<(String, String), String> {
    let html = ctx
        .page
        .content()
        .await
        .map_err(|e| format!("cannot read the results page: {e}"))?;
    let url = ctx
        .page
        .current_url()
        .await
        .map_err(|e| format!("cannot read the page address: {e}"))?;
    Ok((html, url))
}

/// Credentials that make a plain request pass as the browser session.
async fn session_for(
    ctx: &AcquireContext<'_>,
    target_url: &str,
    referer: &str,
) -> Result<SessionCredentials, String> {
    let cookies = ctx
        .page
        .cookies()
        .await
        .map_err(|e| format!("cannot read session cookies: {e}"))?;
    let user_agent = match ctx.page.user_agent().await {
        Ok(ua) => Some(ua),
        Err(e) => {
            warn!(error = %e, "Cannot read the browser user agent");
            None
        }
    };
    Ok(SessionCredentials::from_cookies(
        &cookies,
        host_of(target_url).as_deref(),
        user_agent,
        Some(referer.to_string()),
    ))
}
