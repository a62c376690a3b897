//! Login and report navigation against a scripted page.

mod support;

use chrono::NaiveDate;
use harvest_core::{AccountCredential, ReportQuery, Secret, WaitSettings};
use harvest_fetch::{FetchError, ManualClock};
use harvest_portal::{Authenticator, Diagnostics, Navigator};
use support::{portal, screenshot_names, shared, FakePage, FakeState, HOME_URL, LOGIN_URL, REPORT_URL};

fn account() -> AccountCredential {
    AccountCredential::new("Ana", "ana@example.com", Secret::new("hunter2"))
}

fn query() -> ReportQuery {
    ReportQuery::single_day(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap())
}

// ============================================================================
// Authenticator
// ============================================================================

#[tokio::test]
async fn test_login_fills_credentials_and_leaves_login() {
    let portal = portal();
    let state = shared(FakeState::working(&portal));
    let page = FakePage::new(state.clone());
    let dir = tempfile::tempdir().unwrap();
    let diagnostics = Diagnostics::new(dir.path());
    let waits = WaitSettings::default();
    let clock = ManualClock::new();

    let session = Authenticator::new(&portal, &waits, &clock, &diagnostics)
        .login(&page, &account())
        .await
        .unwrap();

    assert_eq!(session.landing_url, HOME_URL);
    assert!(!session.used_form_fallback);
    let fills = state.lock().unwrap().fills.clone();
    assert_eq!(
        fills,
        vec![
            ("css:input[name='email']".to_string(), "ana@example.com".to_string()),
            ("css:input[name='password']".to_string(), "hunter2".to_string()),
        ]
    );
    assert_eq!(screenshot_names(&state), vec!["post_login_Ana.png"]);
}

#[tokio::test]
async fn test_login_falls_back_to_form_submit() {
    let portal = portal();
    let mut fake = FakeState::working(&portal);
    fake.on_click.clear();
    fake.form_submit_url = Some(HOME_URL.to_string());
    let state = shared(fake);
    let page = FakePage::new(state.clone());
    let waits = WaitSettings::default();
    let clock = ManualClock::new();

    let session = Authenticator::new(&portal, &waits, &clock, &Diagnostics::disabled())
        .login(&page, &account())
        .await
        .unwrap();

    assert!(session.used_form_fallback);
    assert_eq!(session.landing_url, HOME_URL);
    assert!(clock.elapsed() >= waits.login());
}

#[tokio::test]
async fn test_login_form_submit_runs_once_without_submit_control() {
    let portal = portal();
    let mut fake = FakeState {
        ready: true,
        ..FakeState::default()
    };
    fake.show(&portal.login_fields);
    let state = shared(fake);
    let page = FakePage::new(state.clone());
    let waits = WaitSettings::default();
    let clock = ManualClock::new();

    let err = Authenticator::new(&portal, &waits, &clock, &Diagnostics::disabled())
        .login(&page, &account())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Authentication(_)), "{err}");
    assert_eq!(state.lock().unwrap().form_submits, 1);
    assert!(state.lock().unwrap().clicks.is_empty());
}

#[tokio::test]
async fn test_login_click_then_single_form_submit() {
    let portal = portal();
    let mut fake = FakeState::working(&portal);
    fake.on_click.clear();
    let state = shared(fake);
    let page = FakePage::new(state.clone());
    let waits = WaitSettings::default();
    let clock = ManualClock::new();

    let result = Authenticator::new(&portal, &waits, &clock, &Diagnostics::disabled())
        .login(&page, &account())
        .await;

    assert!(result.is_err());
    assert_eq!(state.lock().unwrap().form_submits, 1);
}

#[tokio::test]
async fn test_login_rejected_stays_on_login() {
    let portal = portal();
    let mut fake = FakeState::working(&portal);
    fake.on_click.clear();
    let state = shared(fake);
    let page = FakePage::new(state.clone());
    let dir = tempfile::tempdir().unwrap();
    let diagnostics = Diagnostics::new(dir.path());
    let waits = WaitSettings::default();
    let clock = ManualClock::new();

    let err = Authenticator::new(&portal, &waits, &clock, &diagnostics)
        .login(&page, &account())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Authentication(_)), "{err}");
    assert!(err.to_string().contains(LOGIN_URL));
    assert!(!err.to_string().contains("hunter2"));
    assert_eq!(screenshot_names(&state), vec!["post_login_Ana.png"]);
}

#[tokio::test]
async fn test_login_form_missing() {
    let portal = portal();
    let page = FakePage::new(shared(FakeState::default()));
    let waits = WaitSettings::default();
    let clock = ManualClock::new();

    let err = Authenticator::new(&portal, &waits, &clock, &Diagnostics::disabled())
        .login(&page, &account())
        .await
        .unwrap_err();

    let FetchError::Authentication(message) = err else {
        panic!("expected authentication error, got {err:?}");
    };
    assert!(message.contains("by-name"), "{message}");
    assert_eq!(clock.elapsed(), waits.page_ready());
}

// ============================================================================
// Navigator
// ============================================================================

#[tokio::test]
async fn test_navigator_fills_dates_and_waits_for_results() {
    let portal = portal();
    let state = shared(FakeState::working(&portal));
    let page = FakePage::new(state.clone());
    let dir = tempfile::tempdir().unwrap();
    let diagnostics = Diagnostics::new(dir.path());
    let waits = WaitSettings::default();
    let clock = ManualClock::new();

    let view = Navigator::new(&portal, &waits, &clock, &diagnostics)
        .fetch_report_view(&page, &query(), "Ana")
        .await
        .unwrap();

    assert_eq!(view.url, REPORT_URL);
    assert_eq!(view.date_strategy, "by-id");
    let guard = state.lock().unwrap();
    assert_eq!(
        guard.fills,
        vec![
            ("css:#desde_inicio_cita".to_string(), "2025-06-30".to_string()),
            ("css:#hasta_inicio_cita".to_string(), "2025-06-30".to_string()),
        ]
    );
    assert_eq!(guard.clicks, vec!["xpath://button[contains(text(), 'Enviar')]".to_string()]);
    drop(guard);
    assert_eq!(
        screenshot_names(&state),
        vec!["before_query_Ana.png", "after_results_Ana.png"]
    );
}

#[tokio::test]
async fn test_navigator_detects_expired_session() {
    let portal = portal();
    let mut fake = FakeState::working(&portal);
    fake.redirects.insert(REPORT_URL.to_string(), LOGIN_URL.to_string());
    let state = shared(fake);
    let page = FakePage::new(state.clone());
    let dir = tempfile::tempdir().unwrap();
    let diagnostics = Diagnostics::new(dir.path());
    let waits = WaitSettings::default();
    let clock = ManualClock::new();

    let err = Navigator::new(&portal, &waits, &clock, &diagnostics)
        .fetch_report_view(&page, &query(), "Ana")
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::SessionExpired { ref url } if url == LOGIN_URL));
    assert_eq!(screenshot_names(&state), vec!["session_expired_Ana.png"]);
    assert!(state.lock().unwrap().fills.is_empty());
}

#[tokio::test]
async fn test_navigator_missing_date_controls() {
    let portal = portal();
    let mut fake = FakeState::working(&portal);
    fake.counts.clear();
    let page = FakePage::new(shared(fake));
    let waits = WaitSettings::default();
    let clock = ManualClock::new();

    let err = Navigator::new(&portal, &waits, &clock, &Diagnostics::disabled())
        .fetch_report_view(&page, &query(), "Ana")
        .await
        .unwrap_err();

    let FetchError::Navigation(message) = err else {
        panic!("expected navigation error, got {err:?}");
    };
    assert!(message.contains("date range controls"), "{message}");
    assert!(message.contains("by-placeholder"), "{message}");
}

#[tokio::test]
async fn test_navigator_results_never_settle() {
    let portal = portal();
    let mut fake = FakeState::working(&portal);
    fake.ready = false;
    let page = FakePage::new(shared(fake));
    let waits = WaitSettings::default();
    let clock = ManualClock::new();

    let err = Navigator::new(&portal, &waits, &clock, &Diagnostics::disabled())
        .fetch_report_view(&page, &query(), "Ana")
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Navigation(ref m) if m.contains("never settled")), "{err}");
    assert_eq!(clock.elapsed(), waits.results());
}
