//! Request-header size measurement

use std::collections::BTreeMap;

/// Headers of one HTTP request, name to value.
pub type HeaderMap = BTreeMap<String, String>;

/// Approximate on-the-wire size of a header block in bytes.
///
/// Per header line: name + ": " separator + value + CRLF, plus the final CRLF
/// that separates headers from the body. An empty map measures 0.
pub fn header_wire_size(headers: &HeaderMap) -> usize {
    if headers.is_empty() {
        return 0;
    }

    let lines: usize = headers
        .iter()
        .map(|(name, value)| name.len() + value.len() + 4)
        .sum();

    lines + 2
}

/// Flatten the CDP `Network.Headers` object (a JSON map) into a [`HeaderMap`].
///
/// CDP reports header values as strings, but be tolerant of anything else by
/// rendering it through its JSON form.
pub fn header_map_from_cdp(value: &serde_json::Value) -> HeaderMap {
    let mut map = HeaderMap::new();
    if let Some(object) = value.as_object() {
        for (name, value) in object {
            let rendered = match value.as_str() {
                Some(s) => s.to_string(),
                None => value.to_string(),
            };
            map.insert(name.clone(), rendered);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Host".into(), "example.com".into());
        headers.insert("Cookie".into(), "sid=abc123".into());
        headers
    }

    #[test]
    fn test_empty_headers_measure_zero() {
        assert_eq!(header_wire_size(&HeaderMap::new()), 0);
    }

    #[test]
    fn test_wire_size_exact() {
        // "Host: example.com\r\n" = 4 + 11 + 4 = 19
        // "Cookie: sid=abc123\r\n" = 6 + 10 + 4 = 20
        // final CRLF = 2
        assert_eq!(header_wire_size(&sample()), 41);
    }

    #[test]
    fn test_wire_size_deterministic() {
        let headers = sample();
        assert_eq!(header_wire_size(&headers), header_wire_size(&headers));
    }

    #[test]
    fn test_wire_size_counts_utf8_bytes() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Note".into(), "café".into());
        // name 6 + value 5 (é is two bytes) + 4 + final 2
        assert_eq!(header_wire_size(&headers), 17);
    }

    #[test]
    fn test_from_cdp_keeps_strings_and_renders_rest() {
        let raw = serde_json::json!({
            "accept": "text/html",
            "content-length": 42,
        });
        let map = header_map_from_cdp(&raw);
        assert_eq!(map.get("accept").unwrap(), "text/html");
        assert_eq!(map.get("content-length").unwrap(), "42");
    }

    #[test]
    fn test_from_cdp_non_object_is_empty() {
        assert!(header_map_from_cdp(&serde_json::Value::Null).is_empty());
    }
}
