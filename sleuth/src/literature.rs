//! Facilities for searching academic literature.

use anyhow::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub mod pubmed;

pub use pubmed::PubMed;

/// A searchable index of academic publications.
#[async_trait]
pub trait Literature {
    /// Search for articles matching `query`.
    async fn search(&self, query: &LiteratureQuery) -> Result<Hits, Error>;
}

/// The order in which a literature search returns articles.
#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Sort {
    /// The backend's notion of best match.
    Relevance,
    /// Newest publications first.
    Recent,
}

/// A literature search request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct LiteratureQuery {
    /// The backend search expression.
    pub term: String,
    pub sort: Sort,
    /// The maximum number of articles to fetch.
    pub max: usize,
}

/// The result of a literature search.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Hits {
    /// The total number of matching articles, of which [`articles`](Self::articles) is a prefix.
    ///
    /// This may be larger than the number of articles actually fetched, or unknown.
    pub total: Option<u64>,
    pub articles: Vec<Article>,
}

/// A published article.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Article {
    /// The unique identifier for this article in the backend which found it.
    pub id: String,
    pub title: String,
    pub journal: String,
    pub publication_date: String,
    pub doi: Option<String>,
    /// The number of times this article has been cited, if known.
    pub citations: Option<u32>,
    /// A human-readable page describing this article.
    pub link: String,
}
