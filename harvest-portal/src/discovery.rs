//! Discovery of the report's download request in the results markup.
//!
//! The results page exposes the export either as a link, as a scripted
//! navigation on a clickable element, or as a submit button inside a form.
//! Discovery is synchronous and pure over the HTML snapshot; the strategies
//! decide what to do with the result.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A request that should produce the report when replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadTarget {
    /// A plain link to follow with GET.
    Link {
        /// Absolute URL.
        url: String,
    },
    /// A form to submit.
    Form {
        /// Absolute action URL.
        action: String,
        /// Upper-case method, `GET` or `POST`.
        method: String,
        /// Named fields in document order, including the clicked button.
        fields: Vec<(String, String)>,
    },
}

impl DownloadTarget {
    /// The URL the request goes to.
    pub fn url(&self) -> &str {
        match self {
            Self::Link { url } => url,
            Self::Form { action, .. } => action,
        }
    }

    /// Short description for logs and failure reasons.
    pub fn describe(&self) -> String {
        match self {
            Self::Link { url } => format!("link {url}"),
            Self::Form { action, method, .. } => format!("form {method} {action}"),
        }
    }
}

// ============================================================================
// Download Target
// ============================================================================

/// Finds the download request on a results page.
///
/// Looks, in order, for a link whose text names one of `keywords`, a
/// clickable element that navigates by script, and a keyword submit button
/// inside a form. Relative URLs are resolved against `base_url`.
pub fn discover_download_target(
    html: &str,
    base_url: &str,
    keywords: &[String],
) -> Option<DownloadTarget> {
    if keywords.is_empty() {
        return None;
    }
    let document = Html::parse_document(html);

    find_link(&document, base_url, keywords)
        .or_else(|| find_scripted_navigation(&document, base_url, keywords))
        .or_else(|| find_form_button(&document, base_url, keywords))
}

fn find_link(document: &Html, base_url: &str, keywords: &[String]) -> Option<DownloadTarget> {
    let links = selector("a[href]")?;
    document.select(&links).find_map(|link| {
        if !mentions_keyword(&label_of(link), keywords) {
            return None;
        }
        let href = link.value().attr("href")?.trim();
        if href.is_empty() || href.starts_with('#') || href.to_lowercase().starts_with("javascript:") {
            return None;
        }
        resolve_url(base_url, href).map(|url| DownloadTarget::Link { url })
    })
}

fn find_scripted_navigation(
    document: &Html,
    base_url: &str,
    keywords: &[String],
) -> Option<DownloadTarget> {
    let clickable = selector("[onclick]")?;
    let pattern = location_pattern()?;
    document.select(&clickable).find_map(|element| {
        if !mentions_keyword(&label_of(element), keywords) {
            return None;
        }
        let script = element.value().attr("onclick")?;
        let target = pattern.captures(script)?.get(1)?.as_str();
        resolve_url(base_url, target).map(|url| DownloadTarget::Link { url })
    })
}

fn find_form_button(document: &Html, base_url: &str, keywords: &[String]) -> Option<DownloadTarget> {
    let buttons = selector("button, input[type='submit']")?;
    document.select(&buttons).find_map(|button| {
        if !mentions_keyword(&label_of(button), keywords) {
            return None;
        }
        if button.value().attr("type").is_some_and(|t| t.eq_ignore_ascii_case("button")) {
            return None;
        }
        let form = button
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "form")?;

        let action = match form.value().attr("action").map(str::trim) {
            Some(raw) if !raw.is_empty() => resolve_url(base_url, raw)?,
            _ => base_url.to_string(),
        };
        let method = form
            .value()
            .attr("method")
            .unwrap_or("GET")
            .trim()
            .to_uppercase();

        let mut fields = form_fields(form);
        if let Some(name) = button.value().attr("name").filter(|n| !n.is_empty()) {
            let value = button.value().attr("value").unwrap_or_default();
            fields.push((name.to_string(), value.to_string()));
        }

        Some(DownloadTarget::Form {
            action,
            method,
            fields,
        })
    })
}

/// Named, successful controls of a form, in document order.
fn form_fields(form: ElementRef<'_>) -> Vec<(String, String)> {
    let Some(controls) = selector("input[name], select[name], textarea[name]") else {
        return Vec::new();
    };
    let mut fields = Vec::new();

    for control in form.select(&controls) {
        let element = control.value();
        let Some(name) = element.attr("name").filter(|n| !n.is_empty()) else {
            continue;
        };
        let value = match element.name() {
            "select" => selected_option(control),
            "textarea" => control.text().collect::<String>(),
            _ => {
                let kind = element.attr("type").unwrap_or("text").to_lowercase();
                match kind.as_str() {
                    "submit" | "button" | "image" | "reset" | "file" => continue,
                    "checkbox" | "radio" if element.attr("checked").is_none() => continue,
                    "checkbox" | "radio" => element.attr("value").unwrap_or("on").to_string(),
                    _ => element.attr("value").unwrap_or_default().to_string(),
                }
            }
        };
        fields.push((name.to_string(), value));
    }
    fields
}

fn selected_option(select: ElementRef<'_>) -> String {
    let Some(options) = selector("option") else {
        return String::new();
    };
    let mut first = None;
    for option in select.select(&options) {
        let value = option
            .value()
            .attr("value")
            .map_or_else(|| option.text().collect::<String>(), str::to_string);
        if option.value().attr("selected").is_some() {
            return value;
        }
        first.get_or_insert(value);
    }
    first.unwrap_or_default()
}

// ============================================================================
// CSRF Token
// ============================================================================

/// Finds the page's anti-forgery token.
///
/// Tries each CSS selector in order. A `<meta>` match yields its `content`
/// under `default_param`; any other element yields its `value` under its own
/// `name` (or `default_param` when unnamed). Empty tokens are ignored.
pub fn discover_csrf_token(
    html: &str,
    selectors: &[String],
    default_param: &str,
) -> Option<(String, String)> {
    let document = Html::parse_document(html);

    selectors.iter().find_map(|css| {
        let sel = selector(css)?;
        let element = document.select(&sel).next()?;
        let element = element.value();

        let (name, value) = if element.name() == "meta" {
            (default_param, element.attr("content")?)
        } else {
            let name = element
                .attr("name")
                .filter(|n| !n.is_empty())
                .unwrap_or(default_param);
            (name, element.attr("value")?)
        };

        let value = value.trim();
        (!value.is_empty()).then(|| (name.to_string(), value.to_string()))
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn location_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r#"(?:window\.|document\.)?location(?:\.href)?\s*=\s*['"]([^'"]+)['"]"#).ok()
        })
        .as_ref()
}

/// Visible text plus the attributes a control is commonly labelled by.
fn label_of(element: ElementRef<'_>) -> String {
    let mut label: String = element.text().collect::<Vec<_>>().join(" ");
    for attr in ["value", "title", "aria-label"] {
        if let Some(extra) = element.value().attr(attr) {
            label.push(' ');
            label.push_str(extra);
        }
    }
    label
}

fn mentions_keyword(text: &str, keywords: &[String]) -> bool {
    let text = text.to_lowercase();
    keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .any(|k| text.contains(&k.trim().to_lowercase()))
}

/// Resolves `raw` against `base`, or parses it alone when `base` is unusable.
pub(crate) fn resolve_url(base: &str, raw: &str) -> Option<String> {
    match Url::parse(base) {
        Ok(base) => base.join(raw).ok().map(String::from),
        Err(_) => Url::parse(raw).ok().map(String::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://portal.example/reporte/pacientes?page=1";

    fn keywords() -> Vec<String> {
        vec!["Descargar".into(), "Excel".into()]
    }

    #[test]
    fn test_link_with_keyword_text() {
        let html = r#"<html><body>
            <a href="/inicio">Inicio</a>
            <a href="exportar?fmt=xlsx"><i class="fa-file"></i> Descargar Excel</a>
        </body></html>"#;

        let target = discover_download_target(html, BASE, &keywords());
        assert_eq!(
            target,
            Some(DownloadTarget::Link {
                url: "https://portal.example/reporte/exportar?fmt=xlsx".into()
            })
        );
    }

    #[test]
    fn test_script_links_fall_through_to_onclick() {
        let html = r#"<html><body>
            <a href="javascript:void(0)">Descargar</a>
            <span onclick="window.location.href = '/reporte/excel/42'">Excel</span>
        </body></html>"#;

        let target = discover_download_target(html, BASE, &keywords()).unwrap();
        assert_eq!(target.url(), "https://portal.example/reporte/excel/42");
    }

    #[test]
    fn test_form_button_collects_fields() {
        let html = r#"<html><body>
            <form action="/reporte/exportar" method="post">
                <input type="hidden" name="_token" value="abc123">
                <input type="date" name="desde_inicio_cita" value="2025-06-30">
                <input type="checkbox" name="todos">
                <select name="formato"><option value="csv">CSV</option><option value="xlsx" selected>XLSX</option></select>
                <button type="submit" name="accion" value="excel">Descargar</button>
            </form>
        </body></html>"#;

        let target = discover_download_target(html, BASE, &keywords()).unwrap();
        match target {
            DownloadTarget::Form {
                action,
                method,
                fields,
            } => {
                assert_eq!(action, "https://portal.example/reporte/exportar");
                assert_eq!(method, "POST");
                assert_eq!(
                    fields,
                    vec![
                        ("_token".to_string(), "abc123".to_string()),
                        ("desde_inicio_cita".to_string(), "2025-06-30".to_string()),
                        ("formato".to_string(), "xlsx".to_string()),
                        ("accion".to_string(), "excel".to_string()),
                    ]
                );
            }
            other => panic!("expected form, got {other:?}"),
        }
    }

    #[test]
    fn test_form_without_action_posts_to_page() {
        let html = r#"<form><input type="submit" value="Descargar"></form>"#;

        let target = discover_download_target(html, BASE, &keywords()).unwrap();
        assert_eq!(target.url(), BASE);
        assert!(target.describe().starts_with("form GET"));
    }

    #[test]
    fn test_nothing_matches() {
        let html = r#"<a href="/inicio">Inicio</a><button>Buscar</button>"#;
        assert_eq!(discover_download_target(html, BASE, &keywords()), None);
        assert_eq!(discover_download_target(html, BASE, &[]), None);
    }

    #[test]
    fn test_csrf_from_meta_uses_default_param() {
        let html = r#"<head><meta name="csrf-token" content="tok-1"></head>"#;
        let selectors = vec!["meta[name='csrf-token']".to_string()];

        assert_eq!(
            discover_csrf_token(html, &selectors, "_token"),
            Some(("_token".to_string(), "tok-1".to_string()))
        );
    }

    #[test]
    fn test_csrf_from_input_uses_its_name() {
        let html = r#"<meta name="csrf-token" content=""><input name="csrf_field" value="tok-2">"#;
        let selectors = vec![
            "meta[name='csrf-token']".to_string(),
            "input[name='csrf_field']".to_string(),
        ];

        assert_eq!(
            discover_csrf_token(html, &selectors, "_token"),
            Some(("csrf_field".to_string(), "tok-2".to_string()))
        );
    }

    #[test]
    fn test_csrf_missing() {
        assert_eq!(discover_csrf_token("<p>hola</p>", &["meta".to_string()], "_token"), None);
    }
}
