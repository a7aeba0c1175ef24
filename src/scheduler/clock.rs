//! Session clock and per-tick action selection

use std::time::{Duration, Instant};

use crate::TrackerConfig;

/// Pause between loop ticks.
pub const TICK_PAUSE: Duration = Duration::from_secs(10);

/// The one action performed on a loop tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Reset auth-cookie expiry and reload
    ModifyCookies,
    /// Navigate back to the starting page
    ReturnToStart,
    /// Reload the current page
    Refresh,
    /// Click one randomly chosen link
    ClickRandomLink,
}

/// Timestamps driving the browsing loop.
#[derive(Debug, Clone)]
pub struct SessionClock {
    start: Instant,
    last_refresh: Instant,
    last_return: Instant,
    last_cookie_mod: Instant,
}

impl SessionClock {
    /// Start the clock; all interval timers begin at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            start: now,
            last_refresh: now,
            last_return: now,
            last_cookie_mod: now,
        }
    }

    /// Total time since the loop started.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.duration_since(self.start)
    }

    /// Whether the configured browse duration has run out.
    pub fn expired(&self, config: &TrackerConfig, now: Instant) -> bool {
        self.elapsed(now) >= config.browse_duration
    }

    /// Pick the action for this tick, by strict priority: cookie modification,
    /// then return-to-start, then refresh, otherwise a random link click.
    pub fn next_action(&self, config: &TrackerConfig, now: Instant) -> TickAction {
        if now.duration_since(self.last_cookie_mod) >= config.cookie_mod_interval {
            TickAction::ModifyCookies
        } else if now.duration_since(self.last_return) >= config.return_interval {
            TickAction::ReturnToStart
        } else if now.duration_since(self.last_refresh) >= config.refresh_interval {
            TickAction::Refresh
        } else {
            TickAction::ClickRandomLink
        }
    }

    /// Record that a timed action ran at `now`. Link clicks are untimed and
    /// leave the clock untouched.
    pub fn mark(&mut self, action: TickAction, now: Instant) {
        match action {
            TickAction::ModifyCookies => self.last_cookie_mod = now,
            TickAction::ReturnToStart => self.last_return = now,
            TickAction::Refresh => self.last_refresh = now,
            TickAction::ClickRandomLink => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TrackerConfig {
        TrackerConfig {
            refresh_interval: Duration::from_secs(60),
            return_interval: Duration::from_secs(300),
            cookie_mod_interval: Duration::from_secs(120),
            ..TrackerConfig::default()
        }
    }

    #[test]
    fn test_fresh_clock_clicks_links() {
        let base = Instant::now();
        let clock = SessionClock::new(base);
        assert_eq!(
            clock.next_action(&config(), base + Duration::from_secs(10)),
            TickAction::ClickRandomLink
        );
    }

    #[test]
    fn test_refresh_after_interval() {
        let base = Instant::now();
        let clock = SessionClock::new(base);
        assert_eq!(
            clock.next_action(&config(), base + Duration::from_secs(61)),
            TickAction::Refresh
        );
    }

    #[test]
    fn test_cookie_mod_outranks_everything() {
        let base = Instant::now();
        let clock = SessionClock::new(base);
        // All three thresholds elapsed; cookie modification wins.
        assert_eq!(
            clock.next_action(&config(), base + Duration::from_secs(400)),
            TickAction::ModifyCookies
        );
    }

    #[test]
    fn test_return_outranks_refresh() {
        let base = Instant::now();
        let mut clock = SessionClock::new(base);
        let now = base + Duration::from_secs(400);
        clock.mark(TickAction::ModifyCookies, now);
        assert_eq!(clock.next_action(&config(), now), TickAction::ReturnToStart);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let base = Instant::now();
        let clock = SessionClock::new(base);
        assert_eq!(
            clock.next_action(&config(), base + Duration::from_secs(60)),
            TickAction::Refresh
        );
    }

    #[test]
    fn test_mark_resets_only_its_own_timer() {
        let base = Instant::now();
        let mut clock = SessionClock::new(base);
        let now = base + Duration::from_secs(130);

        assert_eq!(clock.next_action(&config(), now), TickAction::ModifyCookies);
        clock.mark(TickAction::ModifyCookies, now);

        // Cookie timer is reset, refresh threshold is still elapsed.
        assert_eq!(clock.next_action(&config(), now), TickAction::Refresh);
    }

    #[test]
    fn test_link_click_is_untimed() {
        let base = Instant::now();
        let mut clock = SessionClock::new(base);
        let now = base + Duration::from_secs(30);
        clock.mark(TickAction::ClickRandomLink, now);
        // Nothing changed; refresh still elapses at its original schedule.
        assert_eq!(
            clock.next_action(&config(), base + Duration::from_secs(60)),
            TickAction::Refresh
        );
    }

    #[test]
    fn test_expiry() {
        let base = Instant::now();
        let clock = SessionClock::new(base);
        let cfg = config();
        assert!(!clock.expired(&cfg, base + Duration::from_secs(599)));
        assert!(clock.expired(&cfg, base + Duration::from_secs(600)));
    }
}
