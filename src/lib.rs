//! Cookie Tracker
//!
//! Drives one headed Chrome/Chromium session against a target web application
//! and tracks cookie and request-header growth over time, while periodically
//! tampering with cookie expiry to probe session-renewal behavior.

pub mod auth;
pub mod browser;
pub mod scheduler;
pub mod stats;
pub mod tracker;

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Log target for lines that should also reach the console.
///
/// The file layer records the full event trace; the console layer is filtered
/// to this target so the operator only sees navigation/URL events, prompts,
/// and the session start/complete lines.
pub const NAV: &str = "cookie_tracker::nav";

/// Tracker configuration
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// The starting URL to browse
    pub start_url: String,
    /// Total duration to run the browsing loop
    pub browse_duration: Duration,
    /// How often to refresh the current page
    pub refresh_interval: Duration,
    /// How often to return to the starting page
    pub return_interval: Duration,
    /// How long to wait after the first page is shown (manual login window)
    pub initial_pause: Duration,
    /// How often to reset auth-cookie expiry
    pub cookie_mod_interval: Duration,
    /// Run the browser headless (set COOKIE_TRACKER_HEADLESS=1)
    pub headless: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            start_url: "https://example.com".to_string(),
            browse_duration: Duration::from_secs(600),
            refresh_interval: Duration::from_secs(60),
            return_interval: Duration::from_secs(300),
            initial_pause: Duration::from_secs(60),
            cookie_mod_interval: Duration::from_secs(120),
            headless: false,
        }
    }
}

impl TrackerConfig {
    /// Build a config from positional CLI arguments, defaulting where omitted.
    ///
    /// Order: start_url, duration, refresh_interval, return_interval,
    /// initial_pause, cookie_mod_interval (all interval values in seconds).
    pub fn from_args<I>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter();

        if let Some(url) = args.next() {
            config.start_url = url;
        }

        let fields: [(&str, &mut Duration); 5] = [
            ("duration", &mut config.browse_duration),
            ("refresh_interval", &mut config.refresh_interval),
            ("return_interval", &mut config.return_interval),
            ("initial_pause", &mut config.initial_pause),
            ("cookie_mod_interval", &mut config.cookie_mod_interval),
        ];

        for (name, slot) in fields {
            match args.next() {
                Some(raw) => {
                    let secs: u64 = raw
                        .parse()
                        .map_err(|_| format!("invalid {}: {:?} (expected seconds)", name, raw))?;
                    *slot = Duration::from_secs(secs);
                }
                None => break,
            }
        }

        config.headless = std::env::var("COOKIE_TRACKER_HEADLESS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(config)
    }
}

/// Log directory, created relative to the working directory like the other
/// run artifacts.
pub fn log_dir() -> PathBuf {
    PathBuf::from("logs")
}

/// Initialize logging: a per-run timestamped file with the full trace plus a
/// console layer limited to the [`NAV`] target.
///
/// Returns the appender guard (must stay alive for the run) and the log file
/// path for display.
pub fn init_logging(
    log_dir: &Path,
) -> std::io::Result<(tracing_appender::non_blocking::WorkerGuard, PathBuf)> {
    use tracing_subscriber::filter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    std::fs::create_dir_all(log_dir)?;

    let file_name = format!(
        "cookie_tracker_{}.log",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let log_file = log_dir.join(&file_name);

    let file_appender = tracing_appender::rolling::never(log_dir, &file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(non_blocking)
        .with_filter(filter::LevelFilter::DEBUG);

    let console_filter = filter::Targets::new().with_target(NAV, tracing::Level::INFO);
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok((guard, log_file))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_config_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.start_url, "https://example.com");
        assert_eq!(config.browse_duration, Duration::from_secs(600));
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.return_interval, Duration::from_secs(300));
        assert_eq!(config.initial_pause, Duration::from_secs(60));
        assert_eq!(config.cookie_mod_interval, Duration::from_secs(120));
    }

    #[test]
    fn test_from_args_partial() {
        let config =
            TrackerConfig::from_args(strings(&["https://app.example.org", "3500", "30"])).unwrap();
        assert_eq!(config.start_url, "https://app.example.org");
        assert_eq!(config.browse_duration, Duration::from_secs(3500));
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        // Remaining fields keep their defaults
        assert_eq!(config.return_interval, Duration::from_secs(300));
        assert_eq!(config.cookie_mod_interval, Duration::from_secs(120));
    }

    #[test]
    fn test_from_args_rejects_bad_interval() {
        let err = TrackerConfig::from_args(strings(&["https://x.test", "ten"])).unwrap_err();
        assert!(err.contains("duration"));
    }

    #[test]
    fn test_from_args_rejects_negative_interval() {
        assert!(TrackerConfig::from_args(strings(&["https://x.test", "600", "-5"])).is_err());
    }
}
