//! Cookie snapshots, diffing, and expiry-reset planning

use serde::{Deserialize, Serialize};

/// One cookie as reported by CDP `Network.getCookies`.
///
/// Session cookies carry `session = true` and a sentinel `expires` of -1;
/// only cookies with a real expiry are candidates for the expiry reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires: f64,
    pub http_only: bool,
    pub secure: bool,
    pub session: bool,
}

impl CookieRecord {
    /// Whether this cookie carries an expiry attribute.
    pub fn has_expiry(&self) -> bool {
        !self.session && self.expires >= 0.0
    }
}

/// Outcome of planning an expiry reset over a cookie snapshot.
#[derive(Debug, Clone, Default)]
pub struct ExpiryResetPlan {
    /// Cookies re-added unchanged
    pub keep: Vec<CookieRecord>,
    /// Copies of expiring cookies with `expires` forced to 0
    pub reset: Vec<CookieRecord>,
}

impl ExpiryResetPlan {
    pub fn is_empty(&self) -> bool {
        self.reset.is_empty()
    }
}

/// Partition a snapshot for the expiry reset: every cookie that carries an
/// expiry gets a copy with `expires` forced to 0; all other cookies are kept
/// byte-identical.
pub fn plan_expiry_reset(cookies: &[CookieRecord]) -> ExpiryResetPlan {
    let mut plan = ExpiryResetPlan::default();

    for cookie in cookies {
        if cookie.has_expiry() {
            let mut reset = cookie.clone();
            reset.expires = 0.0;
            plan.reset.push(reset);
        } else {
            plan.keep.push(cookie.clone());
        }
    }

    plan
}

/// Cookies present in `current` but not in `initial`.
pub fn new_cookies_since<'a>(
    current: &'a [CookieRecord],
    initial: &[CookieRecord],
) -> Vec<&'a CookieRecord> {
    current
        .iter()
        .filter(|cookie| !initial.contains(cookie))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str, expires: f64, session: bool) -> CookieRecord {
        CookieRecord {
            name: name.to_string(),
            value: format!("{}-value", name),
            domain: ".example.com".to_string(),
            path: "/".to_string(),
            expires,
            http_only: false,
            secure: true,
            session,
        }
    }

    #[test]
    fn test_reset_only_touches_expiring_cookies() {
        let snapshot = vec![
            cookie("oidc_access_token", 1_900_000_000.0, false),
            cookie("sid", -1.0, true),
            cookie("csrf", 1_900_000_100.0, false),
        ];

        let plan = plan_expiry_reset(&snapshot);

        assert_eq!(plan.reset.len(), 2);
        assert!(plan.reset.iter().all(|c| c.expires == 0.0));
        assert_eq!(plan.keep, vec![snapshot[1].clone()]);
    }

    #[test]
    fn test_reset_preserves_everything_but_expiry() {
        let original = cookie("token", 2_000_000_000.0, false);
        let plan = plan_expiry_reset(std::slice::from_ref(&original));

        let reset = &plan.reset[0];
        assert_eq!(reset.name, original.name);
        assert_eq!(reset.value, original.value);
        assert_eq!(reset.domain, original.domain);
        assert_eq!(reset.path, original.path);
        assert_eq!(reset.secure, original.secure);
        assert_eq!(reset.expires, 0.0);
    }

    #[test]
    fn test_reset_plan_empty_for_session_cookies() {
        let snapshot = vec![cookie("a", -1.0, true), cookie("b", -1.0, true)];
        let plan = plan_expiry_reset(&snapshot);
        assert!(plan.is_empty());
        assert_eq!(plan.keep.len(), 2);
    }

    #[test]
    fn test_new_cookies_since_initial() {
        let initial = vec![cookie("sid", -1.0, true)];
        let mut current = initial.clone();
        current.push(cookie("oidc_access_token", 1_900_000_000.0, false));

        let added = new_cookies_since(&current, &initial);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].name, "oidc_access_token");
    }

    #[test]
    fn test_changed_value_counts_as_new() {
        let initial = vec![cookie("sid", -1.0, true)];
        let mut current = initial.clone();
        current[0].value = "rotated".to_string();

        assert_eq!(new_cookies_since(&current, &initial).len(), 1);
    }

    #[test]
    fn test_record_deserializes_from_cdp_shape() {
        let raw = serde_json::json!({
            "name": "sid",
            "value": "abc",
            "domain": ".example.com",
            "path": "/",
            "expires": -1,
            "size": 6,
            "httpOnly": true,
            "secure": true,
            "session": true,
            "priority": "Medium",
        });

        let record: CookieRecord = serde_json::from_value(raw).unwrap();
        assert!(record.http_only);
        assert!(record.session);
        assert!(!record.has_expiry());
    }
}
