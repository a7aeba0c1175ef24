//! The browsing loop
//!
//! Ties the session, scheduler, auth handling, and stats together: launch the
//! browser, land on the start page, handle login, then tick until the
//! configured duration runs out, performing one action per tick and logging
//! cookie and header growth along the way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::auth::{self, Credentials};
use crate::browser::{click_random_link, BrowserSession, CapturedHeaders};
use crate::scheduler::{SessionClock, TickAction, TICK_PAUSE};
use crate::stats::{header_wire_size, new_cookies_since, CookieRecord, HeaderMap};
use crate::{TrackerConfig, NAV};

/// Run one full tracking session against the configured start URL.
pub async fn browse_and_track(config: &TrackerConfig) -> anyhow::Result<()> {
    let session = BrowserSession::launch(config).await?;

    // Close unconditionally so no Chrome process outlives a failed setup
    let outcome = drive_session(&session, config).await;
    if let Err(e) = session.close().await {
        warn!("Error closing browser session: {}", e);
    }
    outcome?;

    info!(target: NAV, "==== BROWSING SESSION COMPLETE ====");
    Ok(())
}

/// Everything between launch and close: land on the start page, handle
/// login, take the initial measurements, then tick.
async fn drive_session(session: &BrowserSession, config: &TrackerConfig) -> anyhow::Result<()> {
    let credentials = Credentials::from_env();

    session.watch_popups();
    let cognito_flag = session.watch_responses();
    let captured_headers = session.watch_request_headers();

    info!(target: NAV, "Navigating to: {}", config.start_url);
    session.goto(&config.start_url).await?;
    let _ = session
        .wait_for_navigation(std::time::Duration::from_secs(30))
        .await;

    check_for_login(&session, &cognito_flag, credentials.as_ref()).await?;

    let initial_cookies = session.cookies().await?;
    info!(
        target: NAV,
        "Initial cookie count: {}",
        initial_cookies.len()
    );
    log_cookie_snapshot("Initial cookies", &initial_cookies);

    // A settle reload so the first header measurement reflects the cookie jar
    if let Err(e) = session.reload().await {
        warn!("Initial stabilizing reload failed: {}", e);
    }
    log_header_size(&captured_headers);

    info!(
        target: NAV,
        "Pausing {}s before the browsing loop (log in now if needed)",
        config.initial_pause.as_secs()
    );
    tokio::time::sleep(config.initial_pause).await;

    // The pause may have left us anywhere; start the loop from the start page
    if let Err(e) = session.goto(&config.start_url).await {
        error!("Could not return to start page, ending session: {}", e);
        return Ok(());
    }

    run_loop(
        session,
        config,
        &initial_cookies,
        &cognito_flag,
        &captured_headers,
        credentials.as_ref(),
    )
    .await;

    Ok(())
}

/// Tick until the browse duration expires or the browser goes away.
async fn run_loop(
    session: &BrowserSession,
    config: &TrackerConfig,
    initial_cookies: &[CookieRecord],
    cognito_flag: &Arc<AtomicBool>,
    captured_headers: &CapturedHeaders,
    credentials: Option<&Credentials>,
) {
    let mut clock = SessionClock::new(Instant::now());

    loop {
        let now = Instant::now();
        if clock.expired(config, now) {
            info!(
                target: NAV,
                "Browse duration of {}s reached",
                config.browse_duration.as_secs()
            );
            break;
        }
        if !session.is_alive() {
            warn!("Browser disconnected, ending the loop");
            break;
        }

        debug!("Tick at {}s elapsed", clock.elapsed(now).as_secs());

        if let Err(e) = check_for_login(session, cognito_flag, credentials).await {
            warn!("Login handling failed: {}", e);
        }

        match session.current_url().await {
            Ok(url) => info!(target: NAV, "Current URL: {}", url),
            Err(e) => warn!("Could not read current URL: {}", e),
        }

        match session.cookies().await {
            Ok(cookies) => {
                info!(target: NAV, "Current cookie count: {}", cookies.len());
                log_cookie_snapshot("Current cookies", &cookies);

                let added = new_cookies_since(&cookies, initial_cookies);
                if !added.is_empty() {
                    info!(
                        target: NAV,
                        "{} cookies added or changed since the session started",
                        added.len()
                    );
                    for cookie in added {
                        debug!(
                            "New/changed cookie: {} (domain: {}, expires: {})",
                            cookie.name, cookie.domain, cookie.expires
                        );
                    }
                }
            }
            Err(e) => warn!("Could not snapshot cookies: {}", e),
        }

        let action = clock.next_action(config, Instant::now());
        debug!("Selected action: {:?}", action);
        if let Err(e) = perform_action(session, config, action).await {
            // One failed action never ends the session
            warn!("Action {:?} failed: {}", action, e);
        }
        clock.mark(action, Instant::now());

        // Reload so the header measurement reflects a request from this tick,
        // whatever the action did (a failed click may not have navigated)
        if let Err(e) = session.reload().await {
            warn!("Per-tick reload failed: {}", e);
        }
        log_header_size(captured_headers);

        tokio::time::sleep(TICK_PAUSE).await;
    }
}

/// Perform the one action chosen for this tick.
async fn perform_action(
    session: &BrowserSession,
    config: &TrackerConfig,
    action: TickAction,
) -> anyhow::Result<()> {
    match action {
        TickAction::ModifyCookies => {
            info!(target: NAV, "Modifying auth-cookie expiry");
            let modified = session.reset_cookie_expiry().await?;
            info!(target: NAV, "Reset expiry on {} cookies", modified);
        }
        TickAction::ReturnToStart => {
            info!(target: NAV, "Returning to start page: {}", config.start_url);
            session.goto(&config.start_url).await?;
        }
        TickAction::Refresh => {
            info!(target: NAV, "Refreshing the page");
            session.reload().await?;
        }
        TickAction::ClickRandomLink => {
            click_random_link(session, &config.start_url).await?;
        }
    }
    Ok(())
}

/// Handle a login page if either the redirect watcher flagged one or the
/// current URL is a Cognito hosted UI. Clears the flag once handled.
async fn check_for_login(
    session: &BrowserSession,
    cognito_flag: &Arc<AtomicBool>,
    credentials: Option<&Credentials>,
) -> anyhow::Result<()> {
    let flagged = cognito_flag.swap(false, Ordering::Relaxed);
    let current = session.current_url().await?;

    if flagged || auth::is_cognito_url(&current) {
        auth::handle_login(session, credentials).await?;
    }
    Ok(())
}

/// Record a full cookie snapshot in the file trace.
fn log_cookie_snapshot(label: &str, cookies: &[CookieRecord]) {
    match serde_json::to_string_pretty(cookies) {
        Ok(rendered) => debug!("{}:\n{}", label, rendered),
        Err(e) => debug!("Could not serialize cookie snapshot: {}", e),
    }
}

/// Take the latest captured document-request headers, clearing the slot so
/// the same capture is never measured twice.
fn take_captured_headers(captured: &CapturedHeaders) -> Option<HeaderMap> {
    captured.lock().ok().and_then(|mut slot| slot.take())
}

/// Report the size of the document-request headers captured since the last
/// measurement.
fn log_header_size(captured: &CapturedHeaders) {
    match take_captured_headers(captured) {
        Some(headers) => {
            info!(
                target: NAV,
                "Request header size: {} bytes ({} headers)",
                header_wire_size(&headers),
                headers.len()
            );
        }
        None => debug!("No document request captured since the last measurement"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_header_capture_is_consumed_per_measurement() {
        let captured: CapturedHeaders = Arc::new(Mutex::new(None));
        let mut headers = HeaderMap::new();
        headers.insert("Host".into(), "example.com".into());
        headers.insert("Cookie".into(), "sid=abc123".into());
        *captured.lock().unwrap() = Some(headers.clone());

        assert_eq!(take_captured_headers(&captured), Some(headers));
        // Nothing arrived since; a stale capture must not be reported again
        assert_eq!(take_captured_headers(&captured), None);
    }

    #[test]
    fn test_empty_slot_yields_no_measurement() {
        let captured: CapturedHeaders = Arc::new(Mutex::new(None));
        assert_eq!(take_captured_headers(&captured), None);
    }
}
