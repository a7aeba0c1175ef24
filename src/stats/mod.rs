//! Cookie and header instrumentation
//!
//! Snapshot records for cookies, diffing against the initial set, expiry-reset
//! planning, and request-header wire-size measurement.

mod cookies;
mod headers;

pub use cookies::{new_cookies_since, plan_expiry_reset, CookieRecord, ExpiryResetPlan};
pub use headers::{header_map_from_cdp, header_wire_size, HeaderMap};
