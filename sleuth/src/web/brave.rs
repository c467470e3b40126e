//! A client for the Brave Search web search API.

use super::{WebPage, WebQuery, WebSearch};
use crate::{
    http,
    throttle::{self, Throttle},
};
use anyhow::Error;
use async_trait::async_trait;
use clap::Args;
use serde::Deserialize;
use surf::Url;

/// The most results Brave will return for a single query.
pub const MAX_COUNT: usize = 20;

/// Brave Search connection options.
#[derive(Clone, Debug, Args)]
pub struct Options {
    /// Base URL of the Brave Search API.
    #[clap(
        long,
        env = "BRAVE_SEARCH_URL",
        default_value = "https://api.search.brave.com/"
    )]
    pub brave_url: Url,

    /// Brave Search API subscription token.
    ///
    /// Without a token, the web-based categories of a survey are reported as unavailable.
    #[clap(long, env = "BRAVE_SEARCH_API_KEY")]
    pub brave_api_key: Option<String>,
}

/// A Brave Search client.
pub struct Brave {
    client: surf::Client,
    api_key: Option<String>,
    throttle: Throttle,
}

impl Brave {
    /// Connect to Brave Search.
    pub fn new(opt: &Options) -> Result<Self, Error> {
        Ok(Self {
            client: http::client(&opt.brave_url)?,
            api_key: opt.brave_api_key.clone(),
            throttle: throttle::per_second(1),
        })
    }
}

#[async_trait]
impl WebSearch for Brave {
    async fn search(&self, query: &WebQuery) -> Result<Vec<WebPage>, Error> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::msg("no web search API key configured"))?;
        let count = query.count.clamp(1, MAX_COUNT);

        self.throttle.until_ready().await;
        tracing::info!(query = %query.query, count, "Brave Search request");
        let req = self
            .client
            .get("res/v1/web/search")
            .header("Accept", "application/json")
            .header("X-Subscription-Token", api_key.as_str())
            .query(&[("q", query.query.clone()), ("count", count.to_string())])
            .map_err(Error::msg)?;
        let res: SearchResponse = http::recv_json(req)
            .await
            .map_err(|err| err.context("Brave Search request failed"))?;

        Ok(res
            .web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .map(WebPage::from)
            .collect())
    }
}

/// Response from the web search endpoint.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    web: Option<Results>,
}

#[derive(Debug, Deserialize)]
struct Results {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    description: String,
    age: Option<String>,
}

impl From<SearchResult> for WebPage {
    fn from(res: SearchResult) -> Self {
        Self {
            title: strip_tags(&res.title),
            url: res.url,
            description: strip_tags(&res.description),
            age: res.age,
        }
    }
}

/// Brave highlights matches in titles and snippets with inline HTML.
fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    decode_entities(&text)
}

/// Decode HTML character references in a single pass, so decoded text is never decoded again.
fn decode_entities(text: &str) -> String {
    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        decoded.push_str(&rest[..start]);
        rest = &rest[start..];
        let entity = rest[1..]
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| Some((decode_entity(&rest[1..=end])?, end + 2)));
        match entity {
            Some((c, len)) => {
                decoded.push(c);
                rest = &rest[len..];
            }
            None => {
                decoded.push('&');
                rest = &rest[1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return char::from_u32(u32::from_str_radix(hex, 16).ok()?);
    }
    if let Some(dec) = name.strip_prefix('#') {
        return char::from_u32(dec.parse().ok()?);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        _ => return None,
    })
}
