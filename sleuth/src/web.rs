//! Facilities for searching the open web.

use anyhow::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surf::Url;

pub mod brave;

pub use brave::Brave;

/// A web search engine.
#[async_trait]
pub trait WebSearch {
    /// Search for pages matching `query`, in rank order.
    async fn search(&self, query: &WebQuery) -> Result<Vec<WebPage>, Error>;
}

/// A web search request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct WebQuery {
    pub query: String,
    /// The maximum number of results to return.
    pub count: usize,
}

/// A single web search result.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct WebPage {
    pub title: String,
    pub url: String,
    /// A snippet of the page, as plain text.
    pub description: String,
    /// When the page was published, in whatever format the search engine reports it.
    pub age: Option<String>,
}

impl WebPage {
    /// The host serving this page, without a leading `www.`.
    pub fn host(&self) -> Option<String> {
        host(&self.url)
    }
}

/// The lowercase host of `url`, without a leading `www.`.
pub fn host(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let host = url.host_str()?.to_lowercase();
    Some(match host.strip_prefix("www.") {
        Some(host) => host.to_string(),
        None => host,
    })
}

/// The domain under which an organization registered `host`.
///
/// This handles the common two-level public suffixes like `co.uk` heuristically, without a full
/// public suffix list: `blog.acme.co.uk` becomes `acme.co.uk` and `www.acme.com` becomes
/// `acme.com`.
pub fn registrable_domain(host: &str) -> String {
    const SECOND_LEVEL: &[&str] = &["ac", "co", "com", "edu", "gov", "net", "org"];

    let labels = host.split('.').collect::<Vec<_>>();
    let n = labels.len();
    let keep = if n >= 3 && labels[n - 1].len() == 2 && SECOND_LEVEL.contains(&labels[n - 2]) {
        3
    } else {
        2
    };
    labels[n.saturating_sub(keep)..].join(".")
}

/// The name of the organization owning `host`, i.e. the first label of its registrable domain.
pub fn organization(host: &str) -> String {
    let domain = registrable_domain(host);
    match domain.split_once('.') {
        Some((name, _)) => name.to_string(),
        None => domain,
    }
}

/// Whether `host` is `domain` or one of its subdomains.
pub fn within(host: &str, domain: &str) -> bool {
    let domain = domain.trim().to_lowercase();
    let domain = domain.trim_start_matches("www.");
    host == domain
        || host
            .strip_suffix(domain)
            .map_or(false, |prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_host() {
        assert_eq!(
            host("https://www.LinkedIn.com/pulse/meps").as_deref(),
            Some("linkedin.com")
        );
        assert_eq!(
            host("http://blog.acme.co.uk/post").as_deref(),
            Some("blog.acme.co.uk")
        );
        assert_eq!(host("not a url"), None);
    }

    #[test]
    fn test_organization() {
        assert_eq!(registrable_domain("blog.acme.co.uk"), "acme.co.uk");
        assert_eq!(organization("blog.acme.co.uk"), "acme");
        assert_eq!(organization("careers.acme.com"), "acme");
        assert_eq!(organization("acme.io"), "acme");
        assert_eq!(organization("localhost"), "localhost");
    }

    #[test]
    fn test_within() {
        assert!(within("linkedin.com", "linkedin.com"));
        assert!(within("news.linkedin.com", "linkedin.com"));
        assert!(within("x.com", "www.x.com"));
        assert!(within("rants.substack.com", "Rants.Substack.com"));
        assert!(within("news.linkedin.com", " WWW.LinkedIn.com "));
        assert!(!within("notlinkedin.com", "linkedin.com"));
        assert!(!within("linkedin.com.evil.io", "linkedin.com"));
    }
}
