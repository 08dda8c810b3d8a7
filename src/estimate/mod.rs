//! Estimation module: bandwidth per domain and the CO2 it implies.

mod bandwidth;
mod emission;
mod region;

pub use bandwidth::*;
pub use emission::*;
pub use region::*;

use regex::Regex;
use std::sync::LazyLock;

static SCHEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").expect("valid scheme regex")
});
static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)*$")
        .expect("valid hostname regex")
});

/// Reduce a domain or URL to the bare hostname used as a tracking key:
/// lower-cased, without scheme, port, path or a leading `www.`.
///
/// Returns `None` for input that does not contain a plausible hostname.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let without_scheme = SCHEME.replace(trimmed, "");
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .rsplit('@')
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default()
        .to_lowercase();

    let host = host.strip_prefix("www.").unwrap_or(&host).trim_end_matches('.');
    if host.is_empty() || !HOSTNAME.is_match(host) {
        return None;
    }
    Some(host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("youtube.com").as_deref(), Some("youtube.com"));
        assert_eq!(normalize_domain("  WWW.YouTube.com ").as_deref(), Some("youtube.com"));
        assert_eq!(
            normalize_domain("https://www.netflix.com/watch/123?x=1").as_deref(),
            Some("netflix.com")
        );
        assert_eq!(normalize_domain("http://localhost:8080/").as_deref(), Some("localhost"));
        assert_eq!(normalize_domain("meet.google.com.").as_deref(), Some("meet.google.com"));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert_eq!(normalize_domain(""), None);
        assert_eq!(normalize_domain("   "), None);
        assert_eq!(normalize_domain("https://"), None);
        assert_eq!(normalize_domain("not a domain"), None);
        assert_eq!(normalize_domain("www."), None);
    }
}
