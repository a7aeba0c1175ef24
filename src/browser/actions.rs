//! Link discovery and random-click navigation

use rand::seq::SliceRandom;
use tracing::{debug, info, warn};
use url::Url;

use super::{BrowserError, BrowserSession};
use crate::NAV;

/// Links whose href contains any of these are never clicked.
pub const LINK_BLOCKLIST: &[&str] = &["install", "uninstall", "forgot", "google"];

/// Only the first N acceptable links on a page are considered.
pub const MAX_CANDIDATE_LINKS: usize = 10;

/// Whether an href matches the blocklist (case-insensitive substring match).
pub fn href_is_blocklisted(href: &str) -> bool {
    let lower = href.to_lowercase();
    LINK_BLOCKLIST.iter().any(|term| lower.contains(term))
}

/// Whether an href is worth clicking at all. Fragment-only and `javascript:`
/// hrefs never navigate anywhere.
pub fn href_is_clickable(href: &str) -> bool {
    !href.is_empty() && !href.starts_with('#') && !href.starts_with("javascript:")
}

/// Resolve a possibly-relative href against the page we started from.
pub fn resolve_href(base_url: &str, href: &str) -> String {
    if href.starts_with("http") {
        return href.to_string();
    }

    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => {
            // Fall back to naive concatenation so we still have something to try
            format!("{}/{}", base_url.trim_end_matches('/'), href.trim_start_matches('/'))
        }
    }
}

/// Click a random link on the current page.
///
/// Collects the first [`MAX_CANDIDATE_LINKS`] acceptable anchors, picks one at
/// random, and clicks it; if the click does not pan out (overlay in the way,
/// element detached), navigates directly to the resolved href instead. Does
/// nothing when the page has no acceptable links.
pub async fn click_random_link(
    session: &BrowserSession,
    base_url: &str,
) -> Result<(), BrowserError> {
    let anchors = session
        .page()
        .find_elements("a")
        .await
        .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

    let mut candidates = Vec::new();
    for anchor in anchors {
        let href = match anchor.attribute("href").await {
            Ok(Some(href)) => href,
            _ => continue,
        };
        if !href_is_clickable(&href) {
            debug!("Skipping non-navigating href: {}", href);
            continue;
        }
        if href_is_blocklisted(&href) {
            debug!("Skipping blocklisted link: {}", href);
            continue;
        }
        candidates.push((anchor, href));
        if candidates.len() >= MAX_CANDIDATE_LINKS {
            break;
        }
    }

    if candidates.is_empty() {
        info!(target: NAV, "No acceptable links found on the page");
        return Ok(());
    }

    let (anchor, href) = candidates
        .choose(&mut rand::thread_rng())
        .ok_or_else(|| BrowserError::ElementNotFound("No link candidates".into()))?;

    info!(target: NAV, "Clicking link: {}", href);

    match anchor.click().await {
        Ok(_) => {
            if let Err(e) = session
                .wait_for_navigation(std::time::Duration::from_secs(30))
                .await
            {
                debug!("Navigation after click did not settle: {}", e);
            }
        }
        Err(e) => {
            // Overlays and stale elements make clicks flaky; navigate directly
            let resolved = resolve_href(base_url, href);
            warn!(
                "Click failed ({}); navigating directly to: {}",
                e, resolved
            );
            session.goto(&resolved).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocklist_is_case_insensitive() {
        assert!(href_is_blocklisted("/account/Forgot-password"));
        assert!(href_is_blocklisted("https://accounts.GOOGLE.com/signin"));
        assert!(href_is_blocklisted("/app/UNINSTALL"));
        assert!(!href_is_blocklisted("/products/gadget"));
    }

    #[test]
    fn test_install_substring_also_blocks_uninstall_like_paths() {
        // "uninstall" contains "install", both terms match it
        assert!(href_is_blocklisted("/help/installation-guide"));
    }

    #[test]
    fn test_clickable_rejects_fragments_and_javascript() {
        assert!(!href_is_clickable("#top"));
        assert!(!href_is_clickable("javascript:void(0)"));
        assert!(!href_is_clickable(""));
        assert!(href_is_clickable("/pricing"));
        assert!(href_is_clickable("https://example.com/docs"));
    }

    #[test]
    fn test_resolve_absolute_href_untouched() {
        assert_eq!(
            resolve_href("https://example.com/start", "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_resolve_relative_href_against_base() {
        assert_eq!(
            resolve_href("https://example.com/app/home", "/pricing"),
            "https://example.com/pricing"
        );
        assert_eq!(
            resolve_href("https://example.com/app/", "details"),
            "https://example.com/app/details"
        );
    }

    #[test]
    fn test_resolve_falls_back_to_concatenation() {
        assert_eq!(
            resolve_href("not a url", "/pricing"),
            "not a url/pricing"
        );
    }
}
