//! Browser session management
//!
//! Launches and controls the single Chrome/Chromium instance the tracker
//! drives, and wires the CDP event subscriptions: popup interception,
//! response-status logging, and request-header capture.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCookiesParams, CookieParam, EnableParams, EventRequestWillBeSent,
    EventResponseReceived, GetResponseBodyParams, ResourceType, TimeSinceEpoch,
};
use chromiumoxide::cdp::browser_protocol::page::EventWindowOpen;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::BrowserError;
use crate::stats::{header_map_from_cdp, plan_expiry_reset, CookieRecord};
use crate::{TrackerConfig, NAV};

/// Substring marking an identity-provider redirect target.
pub const COGNITO_REDIRECT_MARKER: &str = "amazoncognito";

/// Latest captured top-level request headers, shared with the event task.
pub type CapturedHeaders = Arc<Mutex<Option<crate::stats::HeaderMap>>>;

/// Find a Chrome/Chromium executable on the system
fn find_chrome() -> Option<std::path::PathBuf> {
    let candidates: Vec<std::path::PathBuf> = if cfg!(target_os = "windows") {
        let mut paths = vec![
            std::path::PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
            std::path::PathBuf::from(
                r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            ),
        ];
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            paths.push(std::path::PathBuf::from(format!(
                r"{}\Google\Chrome\Application\chrome.exe",
                local
            )));
        }
        paths
    } else if cfg!(target_os = "macos") {
        vec![std::path::PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        )]
    } else {
        vec![
            std::path::PathBuf::from("/usr/bin/google-chrome"),
            std::path::PathBuf::from("/usr/bin/google-chrome-stable"),
            std::path::PathBuf::from("/usr/bin/chromium"),
            std::path::PathBuf::from("/usr/bin/chromium-browser"),
        ]
    };

    candidates.into_iter().find(|p| p.exists())
}

/// The single browser session the tracker drives
pub struct BrowserSession {
    /// The browser instance
    browser: Arc<RwLock<Option<Browser>>>,
    /// The main page; popups are folded back into it
    page: Page,
    /// Whether the session is alive
    alive: Arc<AtomicBool>,
}

impl BrowserSession {
    /// Launch the browser and take over its initial tab.
    pub async fn launch(config: &TrackerConfig) -> Result<Self, BrowserError> {
        info!("Launching browser session (headless: {})", config.headless);

        let chrome_path = find_chrome().ok_or_else(|| {
            BrowserError::LaunchFailed(
                "Chrome/Chromium not found; install it or put it on a standard path".to_string(),
            )
        })?;
        info!("Using Chrome at: {}", chrome_path.display());

        // Fresh profile per run so the cookie jar starts empty
        let user_data_dir = std::env::temp_dir()
            .join("cookie-tracker")
            .join(chrono::Local::now().format("%Y%m%d_%H%M%S").to_string());
        std::fs::create_dir_all(&user_data_dir)?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(&user_data_dir)
            .window_size(1920, 1080)
            // The target apps under test often sit behind self-signed staging certs
            .arg("--ignore-certificate-errors")
            .arg("--no-default-browser-check")
            .arg("--disable-notifications")
            // Required when running as root (e.g., in Docker or on a VPS)
            .arg("--no-sandbox");

        if !config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(BrowserError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        // Drive the CDP websocket; when this ends, Chrome has disconnected
        let alive = Arc::new(AtomicBool::new(true));
        let alive_for_handler = alive.clone();
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            warn!("Chrome disconnected (event handler ended)");
            alive_for_handler.store(false, Ordering::Relaxed);
        });

        // Chrome opens with one blank tab; take it, close any extras
        let page = {
            let mut pages = browser
                .pages()
                .await
                .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

            let main_page = if !pages.is_empty() {
                pages.remove(0)
            } else {
                browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?
            };

            for extra in pages {
                debug!("Closing extra blank tab");
                let _ = extra.close().await;
            }

            main_page
        };

        page.execute(EnableParams::default())
            .await
            .map_err(|e| BrowserError::LaunchFailed(format!("Network.enable failed: {}", e)))?;

        info!("Browser session created");

        Ok(Self {
            browser: Arc::new(RwLock::new(Some(browser))),
            page,
            alive,
        })
    }

    /// Check if the session is alive
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Navigate to a URL
    pub async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        debug!("Navigating to: {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    /// Reload the current page
    pub async fn reload(&self) -> Result<(), BrowserError> {
        self.page
            .reload()
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    /// Wait for an in-flight navigation to settle, bounded by a timeout
    pub async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), BrowserError> {
        tokio::time::timeout(timeout, self.page.wait_for_navigation())
            .await
            .map_err(|_| BrowserError::Timeout("Navigation timeout".into()))?
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    /// Get the current URL
    pub async fn current_url(&self) -> Result<String, BrowserError> {
        self.page
            .url()
            .await
            .map_err(|e| BrowserError::ConnectionLost(e.to_string()))?
            .ok_or_else(|| BrowserError::ConnectionLost("No URL".into()))
    }

    /// Execute JavaScript on the page, returning its JSON result.
    pub async fn execute_js(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let evaluation = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
        Ok(evaluation.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    /// Access the underlying page for element queries.
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Snapshot all cookies of the session.
    pub async fn cookies(&self) -> Result<Vec<CookieRecord>, BrowserError> {
        let raw = self
            .page
            .get_cookies()
            .await
            .map_err(|e| BrowserError::CookieError(e.to_string()))?;

        raw.into_iter()
            .map(|cookie| {
                serde_json::to_value(&cookie)
                    .and_then(serde_json::from_value)
                    .map_err(|e| BrowserError::CookieError(e.to_string()))
            })
            .collect()
    }

    /// Reset the expiry of every cookie that carries one: clear the jar,
    /// re-add unmodified cookies, add expiring cookies with expiry forced to
    /// zero, then reload to observe the effect.
    ///
    /// Returns the number of cookies rewritten (0 when nothing carried an
    /// expiry, in which case the jar is left untouched).
    pub async fn reset_cookie_expiry(&self) -> Result<usize, BrowserError> {
        let snapshot = self.cookies().await?;
        let plan = plan_expiry_reset(&snapshot);

        if plan.is_empty() {
            info!("No cookies with an expiry found to modify");
            return Ok(0);
        }

        for cookie in &plan.reset {
            info!("Resetting expiry for cookie: {}", cookie.name);
        }

        self.page
            .execute(ClearBrowserCookiesParams::default())
            .await
            .map_err(|e| BrowserError::CookieError(e.to_string()))?;

        if !plan.keep.is_empty() {
            self.page
                .set_cookies(plan.keep.iter().map(cookie_param).collect())
                .await
                .map_err(|e| BrowserError::CookieError(e.to_string()))?;
        }

        let reset_count = plan.reset.len();
        self.page
            .set_cookies(plan.reset.iter().map(cookie_param).collect())
            .await
            .map_err(|e| BrowserError::CookieError(e.to_string()))?;

        info!("Successfully modified {} auth cookies", reset_count);

        debug!("Reloading page to apply cookie changes");
        if let Err(e) = self.reload().await {
            warn!("Error during reload after cookie modification: {}", e);
        }

        Ok(reset_count)
    }

    /// Log every response's status and flag identity-provider redirects.
    ///
    /// Returns the flag set to true when a 302 points at a Cognito URL; the
    /// caller resets it after handling login.
    pub fn watch_responses(&self) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        let flag_for_task = flag.clone();
        let page = self.page.clone();

        tokio::spawn(async move {
            let mut events = match page.event_listener::<EventResponseReceived>().await {
                Ok(events) => events,
                Err(e) => {
                    warn!("Could not subscribe to response events: {}", e);
                    return;
                }
            };

            while let Some(event) = events.next().await {
                let status = event.response.status;
                debug!(
                    "Response status: {} {} for {}",
                    status, event.response.status_text, event.response.url
                );

                if status == 302 {
                    let headers = serde_json::to_value(&event.response.headers)
                        .map(|v| header_map_from_cdp(&v))
                        .unwrap_or_default();
                    let location = headers
                        .iter()
                        .find(|(name, _)| name.eq_ignore_ascii_case("location"))
                        .map(|(_, value)| value.clone())
                        .unwrap_or_default();

                    if location.contains(COGNITO_REDIRECT_MARKER) {
                        info!(
                            "Cognito redirect detected (302 to Cognito URL: {})",
                            location
                        );
                        flag_for_task.store(true, Ordering::Relaxed);
                    }
                }

                if status >= 400 {
                    warn!("Response code {} indicates an error: {}", status, event.response.url);
                    match page
                        .execute(GetResponseBodyParams::new(event.request_id.clone()))
                        .await
                    {
                        Ok(response) => {
                            let body: String =
                                response.result.body.chars().take(500).collect();
                            if !body.is_empty() {
                                debug!("Error response (truncated): {}", body);
                            }
                        }
                        Err(e) => {
                            debug!("Could not retrieve error response body: {}", e);
                        }
                    }
                }
            }
        });

        flag
    }

    /// Keep the headers of the latest top-level document request in shared
    /// state so the loop can measure them after each reload.
    pub fn watch_request_headers(&self) -> CapturedHeaders {
        let captured: CapturedHeaders = Arc::new(Mutex::new(None));
        let captured_for_task = captured.clone();
        let page = self.page.clone();

        tokio::spawn(async move {
            let mut events = match page.event_listener::<EventRequestWillBeSent>().await {
                Ok(events) => events,
                Err(e) => {
                    warn!("Could not subscribe to request events: {}", e);
                    return;
                }
            };

            while let Some(event) = events.next().await {
                if !matches!(event.r#type, Some(ResourceType::Document)) {
                    continue;
                }

                let headers = serde_json::to_value(&event.request.headers)
                    .map(|v| header_map_from_cdp(&v))
                    .unwrap_or_default();

                debug!("Request headers for {}:", event.request.url);
                for (name, value) in &headers {
                    debug!("{}: {}", name, value);
                }

                if let Ok(mut slot) = captured_for_task.lock() {
                    *slot = Some(headers);
                }
            }
        });

        captured
    }

    /// Fold popups back into the main tab: navigate the main page to the
    /// popup URL (unless it is about:blank) and close the extra target.
    pub fn watch_popups(&self) {
        let page = self.page.clone();
        let browser = self.browser.clone();

        tokio::spawn(async move {
            let mut events = match page.event_listener::<EventWindowOpen>().await {
                Ok(events) => events,
                Err(e) => {
                    warn!("Could not subscribe to window-open events: {}", e);
                    return;
                }
            };

            while let Some(event) = events.next().await {
                info!(target: NAV, "New tab opened with URL: {}", event.url);

                if event.url != "about:blank" {
                    info!(target: NAV, "Redirecting main tab to: {}", event.url);
                    if let Err(e) = page.goto(event.url.clone()).await {
                        warn!("Error redirecting main tab: {}", e);
                    }
                } else {
                    debug!("Ignoring about:blank tab");
                }

                // Give the popup target a moment to register, then close it
                tokio::time::sleep(Duration::from_millis(500)).await;
                if let Err(e) = Self::close_extra_tabs(&browser, &page).await {
                    warn!("Error closing extra tab: {}", e);
                }
            }
        });
    }

    /// Close every tab except the main one.
    async fn close_extra_tabs(
        browser: &Arc<RwLock<Option<Browser>>>,
        main_page: &Page,
    ) -> Result<(), BrowserError> {
        let guard = browser.read().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| BrowserError::ConnectionLost("Browser already closed".into()))?;

        let main_target = main_page.target_id().clone();
        let pages = browser
            .pages()
            .await
            .map_err(|e| BrowserError::ConnectionLost(e.to_string()))?;

        for page in pages {
            if *page.target_id() != main_target {
                debug!("Closing extra tab");
                let _ = page.close().await;
            }
        }

        Ok(())
    }

    /// Close the browser session
    pub async fn close(&self) -> Result<(), BrowserError> {
        self.alive.store(false, Ordering::Relaxed);

        let _ = self.page.clone().close().await;

        let mut guard = self.browser.write().await;
        if let Some(mut browser) = guard.take() {
            // Graceful close first, then force kill any straggler processes
            let _ = browser.close().await;
            tokio::time::sleep(Duration::from_millis(500)).await;
            let _ = browser.kill().await;
        }

        info!("Browser session closed");
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
    }
}

/// Build a CDP cookie parameter from a snapshot record.
fn cookie_param(record: &CookieRecord) -> CookieParam {
    let mut param = CookieParam::new(record.name.clone(), record.value.clone());
    param.domain = Some(record.domain.clone());
    param.path = Some(record.path.clone());
    param.secure = Some(record.secure);
    param.http_only = Some(record.http_only);
    if !record.session {
        param.expires = Some(TimeSinceEpoch::new(record.expires));
    }
    param
}
