use std::{fmt::Display, sync::Arc, sync::LazyLock};

use regex::{Regex, RegexSet};
use tracing::trace;
use url::{Host, Url};

/// Domain of a navigated page that can be tracked. Only [resolve_hostname] creates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hostname(Arc<str>);

impl Hostname {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Hostname {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Hostname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Browser internals, extension pages and local files.
static BLOCKED_URLS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^chrome://",
        r"(?i)^chrome-extension://",
        r"(?i)^chrome-search://",
        r"(?i)^devtools://",
        r"(?i)^edge://",
        r"(?i)^extension://",
        r"(?i)^moz-extension://",
        r"(?i)^brave://",
        r"(?i)^opera://",
        r"(?i)^vivaldi://",
        r"(?i)^view-source:",
        r"(?i)^about:",
        r"(?i)^file://",
    ])
    .expect("Blocked url patterns should be valid")
});

/// Extension stores, matched against the host followed by the path.
static EXTENSION_STORES: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^chrome\.google\.com/webstore(/|$)",
        r"(?i)^chromewebstore\.google\.com/",
        r"(?i)^microsoftedge\.microsoft\.com/addons(/|$)",
        r"(?i)^addons\.mozilla\.org/",
    ])
    .expect("Extension store patterns should be valid")
});

static IPV4_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,3}(\.\d{1,3}){3}$").expect("Ip pattern should be valid")
});

/// Turns a navigated url into a trackable hostname. `None` means the page is not tracked, which
/// is a normal outcome for browser pages, local development servers and the like.
pub fn resolve_hostname(url: Option<&str>) -> Option<Hostname> {
    let url = url.map(str::trim).filter(|v| !v.is_empty())?;

    if BLOCKED_URLS.is_match(url) {
        trace!("Url {url} is blocked");
        return None;
    }

    let parsed = match Url::parse(url) {
        Ok(v) => v,
        Err(e) => {
            trace!("Failed to parse url {url}: {e}");
            return None;
        }
    };

    let domain = match parsed.host() {
        Some(Host::Domain(domain)) => domain,
        Some(Host::Ipv4(_) | Host::Ipv6(_)) | None => return None,
    };

    if EXTENSION_STORES.is_match(&format!("{domain}{}", parsed.path())) {
        trace!("Url {url} is an extension store");
        return None;
    }

    if !is_trackable_domain(domain) {
        trace!("Domain {domain} is not trackable");
        return None;
    }

    Some(Hostname(domain.to_ascii_lowercase().into()))
}

fn is_trackable_domain(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.');
    domain.contains('.')
        && !domain.eq_ignore_ascii_case("localhost")
        && !domain.to_ascii_lowercase().ends_with(".local")
        && !IPV4_LITERAL.is_match(domain)
}

#[cfg(test)]
mod tests {
    use super::resolve_hostname;

    fn resolved(url: &str) -> Option<String> {
        resolve_hostname(Some(url)).map(|v| v.to_string())
    }

    #[test]
    fn test_accepts_regular_sites() {
        assert_eq!(resolved("https://example.com/path"), Some("example.com".into()));
        assert_eq!(
            resolved("https://Docs.RS/tokio/latest?search=select"),
            Some("docs.rs".into())
        );
        assert_eq!(
            resolved("http://news.ycombinator.com:8080/"),
            Some("news.ycombinator.com".into())
        );
    }

    #[test]
    fn test_store_names_elsewhere_in_url_are_tracked() {
        assert_eq!(
            resolved("https://example.com/?ref=addons.mozilla.org"),
            Some("example.com".into())
        );
        assert_eq!(
            resolved("https://example.com/chromewebstore.google.com/x"),
            Some("example.com".into())
        );
        assert_eq!(
            resolved("https://chrome.google.com/search?q=webstore"),
            Some("chrome.google.com".into())
        );
    }

    #[test]
    fn test_rejects_browser_pages() {
        assert_eq!(resolved("chrome://extensions"), None);
        assert_eq!(resolved("CHROME://settings"), None);
        assert_eq!(resolved("chrome-extension://abcdef/popup.html"), None);
        assert_eq!(resolved("moz-extension://abcdef/popup.html"), None);
        assert_eq!(resolved("edge://newtab"), None);
        assert_eq!(resolved("about:blank"), None);
        assert_eq!(resolved("file:///x"), None);
        assert_eq!(resolved("https://chrome.google.com/webstore/detail/x"), None);
        assert_eq!(resolved("https://chromewebstore.google.com/detail/x"), None);
        assert_eq!(resolved("https://addons.mozilla.org/en-US/firefox/"), None);
        assert_eq!(resolved("https://microsoftedge.microsoft.com/addons/detail/x"), None);
    }

    #[test]
    fn test_rejects_local_hosts() {
        assert_eq!(resolved("http://localhost:3000"), None);
        assert_eq!(resolved("http://printer.local/status"), None);
        assert_eq!(resolved("http://intranet/"), None);
        assert_eq!(resolved("http://192.168.1.1"), None);
        assert_eq!(resolved("http://[::1]:8080/"), None);
    }

    #[test]
    fn test_rejects_missing_and_malformed() {
        assert_eq!(resolve_hostname(None), None);
        assert_eq!(resolved(""), None);
        assert_eq!(resolved("   "), None);
        assert_eq!(resolved("not a url"), None);
        assert_eq!(resolved("https://"), None);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let first = resolved("https://example.com/a");
        let second = resolved("https://example.com/b");
        assert_eq!(first, second);
        assert_eq!(resolved(&format!("https://{}/", first.unwrap())), second);
    }
}
