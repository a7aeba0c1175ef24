//! Browser automation module
//!
//! Handles launching and controlling the single Chrome/Chromium instance over
//! CDP: navigation, cookies, and the event subscriptions the tracker needs.

mod actions;
mod errors;
mod session;

pub use actions::{
    click_random_link, href_is_blocklisted, href_is_clickable, resolve_href, LINK_BLOCKLIST,
    MAX_CANDIDATE_LINKS,
};
pub use errors::BrowserError;
pub use session::{BrowserSession, CapturedHeaders, COGNITO_REDIRECT_MARKER};
