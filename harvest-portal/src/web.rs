//! URL helpers and replay of discovered requests.

use harvest_fetch::{HttpClient, HttpError, HttpPayload, SessionCredentials};
use url::Url;

use crate::discovery::DownloadTarget;

/// Host part of `url`, if it parses.
pub(crate) fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_string)
}

/// `suffix` appended to the path of `view_url`, dropping its query and
/// fragment. `https://h/reporte/pacientes?x=1` with `/exportar` gives
/// `https://h/reporte/pacientes/exportar`.
pub(crate) fn endpoint_url(view_url: &str, suffix: &str) -> Option<String> {
    let mut url = Url::parse(view_url).ok()?;
    let path = format!(
        "{}/{}",
        url.path().trim_end_matches('/'),
        suffix.trim().trim_start_matches('/')
    );
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    Some(url.into())
}

/// Issues the request described by `target` as the browser session.
pub(crate) async fn send_target(
    http: &HttpClient,
    target: &DownloadTarget,
    session: &SessionCredentials,
) -> Result<HttpPayload, HttpError> {
    match target {
        DownloadTarget::Link { url } => http.get_as_session(url, &[], session).await,
        DownloadTarget::Form {
            action,
            method,
            fields,
        } => {
            if method == "POST" {
                http.post_form_as_session(action, fields, session).await
            } else {
                http.get_as_session(action, fields, session).await
            }
        }
    }
}
