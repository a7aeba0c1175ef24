//! AWS Cognito hosted-UI login
//!
//! The hosted UI renders duplicate form elements (one set per device class),
//! so every selector is resolved to the first *visible* match before filling
//! or clicking.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::browser::{BrowserError, BrowserSession};
use crate::NAV;

/// URL substrings that identify a Cognito hosted login page.
pub const COGNITO_URL_MARKERS: &[&str] = &["amazoncognito", "awscognito"];

/// How long to wait for a human to complete the login when automation is
/// unavailable or fails.
pub const MANUAL_LOGIN_GRACE: Duration = Duration::from_secs(60);

/// Selectors for the username field, most specific first.
const USERNAME_SELECTORS: &[&str] = &["#signInFormUsername", "input[name=\"username\"]"];
/// Selectors for the password field.
const PASSWORD_SELECTORS: &[&str] = &["#signInFormPassword", "input[type=\"password\"]"];
/// Selectors for the submit button.
const SUBMIT_SELECTORS: &[&str] = &["input[name=\"signInSubmitButton\"]", "input[type=\"submit\"]"];

/// Whether a URL points at a Cognito hosted UI.
pub fn is_cognito_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    COGNITO_URL_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Login credentials, sourced from the environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Read `COGNITO_USERNAME` / `COGNITO_PASSWORD`; both must be set and
    /// non-empty for automated login to be attempted.
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("COGNITO_USERNAME").ok()?;
        let password = std::env::var("COGNITO_PASSWORD").ok()?;
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self { username, password })
    }
}

/// Handle a login page the session has landed on.
///
/// With credentials, fills and submits the Cognito form; without them, or
/// when the automated attempt fails, announces the situation and leaves the
/// browser idle for [`MANUAL_LOGIN_GRACE`] so a human can sign in.
///
/// Returns `true` when the automated login navigated away from the login
/// page.
pub async fn handle_login(
    session: &BrowserSession,
    credentials: Option<&Credentials>,
) -> Result<bool, BrowserError> {
    let login_url = session.current_url().await?;
    info!(target: NAV, "Login page detected: {}", login_url);

    let credentials = match credentials {
        Some(credentials) => credentials,
        None => {
            info!(
                target: NAV,
                "No credentials configured (COGNITO_USERNAME / COGNITO_PASSWORD); \
                 please log in manually in the browser window"
            );
            tokio::time::sleep(MANUAL_LOGIN_GRACE).await;
            return Ok(false);
        }
    };

    info!(target: NAV, "Attempting automated login as {}", credentials.username);

    match attempt_login(session, credentials, &login_url).await {
        Ok(true) => {
            info!(target: NAV, "Login successful");
            Ok(true)
        }
        Ok(false) => {
            info!(
                target: NAV,
                "Automated login did not complete; please finish logging in manually"
            );
            tokio::time::sleep(MANUAL_LOGIN_GRACE).await;
            Ok(false)
        }
        Err(e) => {
            warn!("Automated login failed: {}", e);
            info!(target: NAV, "Please log in manually in the browser window");
            tokio::time::sleep(MANUAL_LOGIN_GRACE).await;
            Ok(false)
        }
    }
}

/// Drive the form: username, password, submit, then verify the URL moved off
/// the login page.
async fn attempt_login(
    session: &BrowserSession,
    credentials: &Credentials,
    login_url: &str,
) -> Result<bool, BrowserError> {
    if !fill_first_visible(session, USERNAME_SELECTORS, &credentials.username).await? {
        return Err(BrowserError::ElementNotFound(
            "No visible username field".into(),
        ));
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    if !fill_first_visible(session, PASSWORD_SELECTORS, &credentials.password).await? {
        return Err(BrowserError::ElementNotFound(
            "No visible password field".into(),
        ));
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    if !click_first_visible(session, SUBMIT_SELECTORS).await? {
        return Err(BrowserError::ElementNotFound(
            "No visible submit button".into(),
        ));
    }

    if let Err(e) = session.wait_for_navigation(Duration::from_secs(30)).await {
        debug!("Navigation after submit did not settle: {}", e);
    }
    tokio::time::sleep(Duration::from_secs(2)).await;

    let current = session.current_url().await?;
    if looks_like_login_page(login_url, &current) {
        if let Some(message) = extract_error_message(session).await? {
            warn!("Login page reports: {}", message);
        }
        return Ok(false);
    }

    Ok(true)
}

/// Whether the post-submit URL still points at a login page: either we never
/// navigated, or the URL still carries a login/signin marker anywhere in it
/// (case-insensitively).
fn looks_like_login_page(login_url: &str, current_url: &str) -> bool {
    if current_url == login_url {
        return true;
    }
    let lower = current_url.to_lowercase();
    lower.contains("login") || lower.contains("signin")
}

/// Set the value of the first visible element matching any of the selectors,
/// firing input/change events so the framework behind the form notices.
async fn fill_first_visible(
    session: &BrowserSession,
    selectors: &[&str],
    value: &str,
) -> Result<bool, BrowserError> {
    let value_literal = serde_json::to_string(value)
        .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

    for selector in selectors {
        let selector_literal = serde_json::to_string(selector)
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
        let script = format!(
            r#"(() => {{
                for (const el of document.querySelectorAll({selector})) {{
                    const rect = el.getBoundingClientRect();
                    if (rect.width > 0 && rect.height > 0) {{
                        el.focus();
                        el.value = {value};
                        el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                        el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                        return true;
                    }}
                }}
                return false;
            }})()"#,
            selector = selector_literal,
            value = value_literal,
        );

        if session.execute_js(&script).await? == serde_json::Value::Bool(true) {
            debug!("Filled visible element: {}", selector);
            return Ok(true);
        }
    }

    Ok(false)
}

/// Click the first visible element matching any of the selectors.
async fn click_first_visible(
    session: &BrowserSession,
    selectors: &[&str],
) -> Result<bool, BrowserError> {
    for selector in selectors {
        let selector_literal = serde_json::to_string(selector)
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
        let script = format!(
            r#"(() => {{
                for (const el of document.querySelectorAll({selector})) {{
                    const rect = el.getBoundingClientRect();
                    if (rect.width > 0 && rect.height > 0) {{
                        el.click();
                        return true;
                    }}
                }}
                return false;
            }})()"#,
            selector = selector_literal,
        );

        if session.execute_js(&script).await? == serde_json::Value::Bool(true) {
            debug!("Clicked visible element: {}", selector);
            return Ok(true);
        }
    }

    Ok(false)
}

/// Pull the error banner off a failed Cognito login page, if any.
async fn extract_error_message(
    session: &BrowserSession,
) -> Result<Option<String>, BrowserError> {
    let script = r#"(() => {
        const el = document.querySelector('.error-message, .alert-error');
        return el ? el.textContent.trim() : null;
    })()"#;

    match session.execute_js(script).await? {
        serde_json::Value::String(message) if !message.is_empty() => Ok(Some(message)),
        _ => Ok(None),
    }
}
