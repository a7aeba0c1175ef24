use cookie_tracker::NAV;

use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = cookie_tracker::TrackerConfig::from_args(std::env::args().skip(1))
        .map_err(|e| anyhow::anyhow!(e))?;

    let (_guard, log_file) = cookie_tracker::init_logging(&cookie_tracker::log_dir())?;

    info!(target: NAV, "Starting automated browsing at {}", config.start_url);
    info!(
        target: NAV,
        "Duration: {}s, refresh every {}s, return to start every {}s, cookie reset every {}s",
        config.browse_duration.as_secs(),
        config.refresh_interval.as_secs(),
        config.return_interval.as_secs(),
        config.cookie_mod_interval.as_secs()
    );
    info!(target: NAV, "Full trace log: {}", log_file.display());

    cookie_tracker::tracker::browse_and_track(&config).await
}
