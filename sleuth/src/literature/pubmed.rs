//! A PubMed client, built on the NCBI E-utilities API.

use super::{Article, Hits, Literature, LiteratureQuery, Sort};
use crate::{
    http,
    throttle::{self, Throttle},
};
use anyhow::Error;
use async_trait::async_trait;
use clap::Args;
use serde::{
    de::{DeserializeOwned, Deserializer, IgnoredAny},
    Deserialize,
};
use serde_json::Value;
use std::collections::HashMap;
use surf::Url;

/// The most IDs NCBI accepts in a single GET request to `esummary`.
const SUMMARY_BATCH: usize = 200;

/// PubMed connection options.
#[derive(Clone, Debug, Args)]
pub struct Options {
    /// Base URL of the NCBI E-utilities API.
    #[clap(
        long,
        env = "PUBMED_URL",
        default_value = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/"
    )]
    pub pubmed_url: Url,

    /// NCBI API key, raising the request limit from 3 to 10 per second.
    #[clap(long, env = "NCBI_API_KEY")]
    pub ncbi_api_key: Option<String>,

    /// Tool name reported to NCBI with each request.
    #[clap(long, env = "NCBI_TOOL", default_value = "citation-sleuth")]
    pub ncbi_tool: String,

    /// Contact email reported to NCBI with each request.
    #[clap(long, env = "NCBI_EMAIL")]
    pub ncbi_email: Option<String>,
}

/// A PubMed client.
pub struct PubMed {
    client: surf::Client,
    params: Vec<(&'static str, String)>,
    throttle: Throttle,
}

impl PubMed {
    /// Connect to PubMed.
    pub fn new(opt: &Options) -> Result<Self, Error> {
        let mut params = vec![("db", "pubmed".to_string()), ("retmode", "json".into())];
        params.push(("tool", opt.ncbi_tool.clone()));
        if let Some(email) = &opt.ncbi_email {
            params.push(("email", email.clone()));
        }
        if let Some(key) = &opt.ncbi_api_key {
            params.push(("api_key", key.clone()));
        }
        let throttle = throttle::per_second(if opt.ncbi_api_key.is_some() { 10 } else { 3 });

        Ok(Self {
            client: http::client(&opt.pubmed_url)?,
            params,
            throttle,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: impl IntoIterator<Item = (&'static str, String)>,
    ) -> Result<T, Error> {
        let params = self
            .params
            .iter()
            .cloned()
            .chain(params)
            .collect::<Vec<_>>();
        self.throttle.until_ready().await;
        tracing::info!(
            endpoint,
            params = ?params.iter().filter(|(key, _)| *key != "api_key").collect::<Vec<_>>(),
            "PubMed request"
        );
        let req = self
            .client
            .get(endpoint)
            .query(&params)
            .map_err(Error::msg)?;
        http::recv_json(req)
            .await
            .map_err(|err| err.context(format!("PubMed {endpoint} failed")))
    }

    /// Find the IDs of articles matching `query`, along with the total number of matches.
    async fn search_ids(&self, query: &LiteratureQuery) -> Result<(Option<u64>, Vec<String>), Error> {
        let sort = match query.sort {
            Sort::Relevance => "relevance",
            Sort::Recent => "pub_date",
        };
        let res: SearchResponse = self
            .get(
                "esearch.fcgi",
                [
                    ("term", query.term.clone()),
                    ("retmax", query.max.to_string()),
                    ("sort", sort.to_string()),
                ],
            )
            .await?;
        if let Some(message) = res.error {
            return Err(Error::msg(format!("PubMed API error: {message}")));
        }
        let result = res
            .esearchresult
            .ok_or_else(|| Error::msg("PubMed response is missing esearchresult"))?;
        if let Some(message) = result.error {
            return Err(Error::msg(format!("PubMed API error: {message}")));
        }
        Ok((result.count, result.idlist))
    }

    /// Fetch summaries for `ids`, preserving the order of `ids`.
    async fn summarize(&self, ids: &[String]) -> Result<Vec<Article>, Error> {
        let mut articles = Vec::with_capacity(ids.len());
        for batch in ids.chunks(SUMMARY_BATCH) {
            articles.extend(self.summarize_batch(batch).await?);
        }
        Ok(articles)
    }

    async fn summarize_batch(&self, ids: &[String]) -> Result<Vec<Article>, Error> {
        let res: SummaryResponse = self
            .get("esummary.fcgi", [("id", ids.join(","))])
            .await?;
        if let Some(message) = res.error {
            return Err(Error::msg(format!("PubMed API error: {message}")));
        }
        let mut result = res
            .result
            .ok_or_else(|| Error::msg("PubMed response is missing result"))?;

        Ok(ids
            .iter()
            .filter_map(|id| {
                let Some(summary) = result.remove(id) else {
                    tracing::warn!("PubMed returned no summary for article {id}, skipping");
                    return None;
                };
                let summary: Summary = match serde_json::from_value(summary) {
                    Ok(summary) => summary,
                    Err(err) => {
                        tracing::error!("summary of article {id} is malformed: {err}");
                        return None;
                    }
                };
                if let Some(err) = &summary.error {
                    tracing::warn!("PubMed cannot summarize article {id}: {err}");
                    return None;
                }
                Some(summary.into())
            })
            .collect())
    }
}

#[async_trait]
impl Literature for PubMed {
    async fn search(&self, query: &LiteratureQuery) -> Result<Hits, Error> {
        let (total, ids) = self.search_ids(query).await?;
        tracing::info!("{} PubMed articles match {}", total.unwrap_or(0), query.term);
        let articles = self.summarize(&ids).await?;
        Ok(Hits { total, articles })
    }
}

/// Response from the `esearch` endpoint.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    esearchresult: Option<SearchResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default, deserialize_with = "deserialize_count")]
    count: Option<u64>,
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR")]
    error: Option<String>,
}

/// Response from the `esummary` endpoint.
///
/// The result object maps each requested ID to its summary, alongside a `uids` list which we
/// ignore in favor of the order of the requested IDs.
#[derive(Debug, Deserialize)]
struct SummaryResponse {
    result: Option<HashMap<String, Value>>,
    error: Option<String>,
}

/// The summary of a single article.
#[derive(Debug, Deserialize)]
struct Summary {
    uid: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    fulljournalname: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    pubdate: String,
    #[serde(default)]
    epubdate: String,
    #[serde(default)]
    articleids: Vec<ArticleId>,
    #[serde(default, deserialize_with = "deserialize_count")]
    pmcrefcount: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    idtype: String,
    value: String,
}

impl From<Summary> for Article {
    fn from(summary: Summary) -> Self {
        let journal = if summary.fulljournalname.is_empty() {
            summary.source
        } else {
            summary.fulljournalname
        };
        let publication_date = if summary.epubdate.is_empty() {
            summary.pubdate
        } else {
            summary.epubdate
        };
        let doi = summary
            .articleids
            .into_iter()
            .find(|id| id.idtype == "doi" && !id.value.is_empty())
            .map(|id| id.value);
        Self {
            link: format!("https://pubmed.ncbi.nlm.nih.gov/{}/", summary.uid),
            id: summary.uid,
            title: summary.title,
            journal,
            publication_date,
            doi,
            citations: summary
                .pmcrefcount
                .map(|count| count.try_into().unwrap_or(u32::MAX)),
        }
    }
}

/// E-utilities report counts as either JSON numbers or strings, and sometimes as `""`.
fn deserialize_count<'a, D: Deserializer<'a>>(d: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        String(String),
        Other(IgnoredAny),
    }

    Ok(match Count::deserialize(d)? {
        Count::Number(n) => Some(n),
        Count::String(s) => s.trim().parse().ok(),
        Count::Other(_) => None,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{json, serve};
    use async_std::sync::{Arc, Mutex};
    use serde_json::json;

    type Requests = Arc<Mutex<Vec<(String, HashMap<String, String>)>>>;

    fn options(url: Url) -> Options {
        Options {
            pubmed_url: url,
            ncbi_api_key: None,
            ncbi_tool: "sleuth-test".into(),
            ncbi_email: Some("sleuth@example.com".into()),
        }
    }

    async fn mock_pubmed(search: Value, summary: Value) -> (Url, Requests) {
        let requests = Requests::default();
        let mut app = tide::with_state(requests.clone());
        app.at("/esearch.fcgi")
            .get(move |req: tide::Request<Requests>| {
                let search = search.clone();
                async move {
                    let params: HashMap<String, String> = req.query()?;
                    req.state().lock().await.push(("esearch".into(), params));
                    json(search)
                }
            });
        app.at("/esummary.fcgi")
            .get(move |req: tide::Request<Requests>| {
                let summary = summary.clone();
                async move {
                    let params: HashMap<String, String> = req.query()?;
                    req.state().lock().await.push(("esummary".into(), params));
                    json(summary)
                }
            });
        (serve(app).await, requests)
    }

    #[async_std::test]
    async fn test_search() {
        let (url, requests) = mock_pubmed(
            json!({
                "header": { "type": "esearch" },
                "esearchresult": {
                    "count": "1234",
                    "retmax": "3",
                    "idlist": ["111", "222", "333"],
                },
            }),
            json!({
                "result": {
                    "uids": ["333", "111", "222"],
                    "111": {
                        "uid": "111",
                        "title": "Spending on chronic disease.",
                        "fulljournalname": "Health Affairs",
                        "source": "Health Aff",
                        "pubdate": "2020 Jan",
                        "epubdate": "2019 Dec 3",
                        "articleids": [
                            { "idtype": "pubmed", "value": "111" },
                            { "idtype": "doi", "value": "10.1377/hlthaff.1" },
                        ],
                        "pmcrefcount": 42,
                    },
                    "222": {
                        "uid": "222",
                        "title": "Out-of-pocket costs.",
                        "fulljournalname": "",
                        "source": "Med Care",
                        "pubdate": "2021",
                        "epubdate": "",
                        "articleids": [],
                        "pmcrefcount": "",
                    },
                    "333": {
                        "uid": "333",
                        "error": "cannot get document summary",
                    },
                },
            }),
        )
        .await;

        let pubmed = PubMed::new(&options(url)).unwrap();
        let hits = pubmed
            .search(&LiteratureQuery {
                term: "\"MEPS\"".into(),
                sort: Sort::Recent,
                max: 3,
            })
            .await
            .unwrap();

        assert_eq!(hits.total, Some(1234));
        assert_eq!(
            hits.articles,
            [
                Article {
                    id: "111".into(),
                    title: "Spending on chronic disease.".into(),
                    journal: "Health Affairs".into(),
                    publication_date: "2019 Dec 3".into(),
                    doi: Some("10.1377/hlthaff.1".into()),
                    citations: Some(42),
                    link: "https://pubmed.ncbi.nlm.nih.gov/111/".into(),
                },
                Article {
                    id: "222".into(),
                    title: "Out-of-pocket costs.".into(),
                    journal: "Med Care".into(),
                    publication_date: "2021".into(),
                    doi: None,
                    citations: None,
                    link: "https://pubmed.ncbi.nlm.nih.gov/222/".into(),
                },
            ]
        );

        let requests = requests.lock().await;
        assert_eq!(requests.len(), 2);
        let (endpoint, search) = &requests[0];
        assert_eq!(endpoint, "esearch");
        assert_eq!(search["term"], "\"MEPS\"");
        assert_eq!(search["sort"], "pub_date");
        assert_eq!(search["retmax"], "3");
        assert_eq!(search["db"], "pubmed");
        assert_eq!(search["email"], "sleuth@example.com");
        assert!(!search.contains_key("api_key"));
        let (endpoint, summary) = &requests[1];
        assert_eq!(endpoint, "esummary");
        assert_eq!(summary["id"], "111,222,333");
    }

    #[async_std::test]
    async fn test_search_no_matches_skips_summary() {
        let (url, requests) = mock_pubmed(
            json!({ "esearchresult": { "count": "0", "idlist": [] } }),
            json!({}),
        )
        .await;

        let pubmed = PubMed::new(&options(url)).unwrap();
        let hits = pubmed
            .search(&LiteratureQuery {
                term: "\"nothing\"".into(),
                sort: Sort::Relevance,
                max: 10,
            })
            .await
            .unwrap();
        assert_eq!(hits, Hits { total: Some(0), articles: vec![] });

        let requests = requests.lock().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1["sort"], "relevance");
    }

    #[async_std::test]
    async fn test_search_error() {
        let (url, _) = mock_pubmed(
            json!({ "esearchresult": { "ERROR": "Invalid query" } }),
            json!({}),
        )
        .await;

        let pubmed = PubMed::new(&options(url)).unwrap();
        let err = pubmed
            .search(&LiteratureQuery {
                term: "(".into(),
                sort: Sort::Relevance,
                max: 10,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid query"), "{err}");
    }

    #[async_std::test]
    async fn test_http_error_status() {
        let mut app = tide::new();
        app.at("/esearch.fcgi").get(|_| async {
            Ok(tide::Response::builder(429)
                .body(r#"{"error":"API rate limit exceeded"}"#)
                .build())
        });
        let url = serve(app).await;

        let pubmed = PubMed::new(&options(url)).unwrap();
        let err = pubmed
            .search(&LiteratureQuery {
                term: "\"MEPS\"".into(),
                sort: Sort::Relevance,
                max: 10,
            })
            .await
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("429"), "{message}");
        assert!(message.contains("API rate limit exceeded"), "{message}");
    }

    #[async_std::test]
    async fn test_summaries_are_fetched_in_batches() {
        let ids = (1..=450).map(|id| id.to_string()).collect::<Vec<_>>();
        let requests = Requests::default();
        let mut app = tide::with_state(requests.clone());
        app.at("/esearch.fcgi").get({
            let ids = ids.clone();
            move |_: tide::Request<Requests>| {
                let ids = ids.clone();
                async move { json(json!({ "esearchresult": { "count": "9000", "idlist": ids } })) }
            }
        });
        app.at("/esummary.fcgi")
            .get(|req: tide::Request<Requests>| async move {
                let params: HashMap<String, String> = req.query()?;
                let mut result = serde_json::Map::new();
                for id in params["id"].split(',') {
                    result.insert(id.into(), json!({ "uid": id, "title": format!("Article {id}") }));
                }
                req.state().lock().await.push(("esummary".into(), params));
                json(json!({ "result": result }))
            });
        let url = serve(app).await;

        let pubmed = PubMed::new(&options(url)).unwrap();
        let hits = pubmed
            .search(&LiteratureQuery {
                term: "\"MEPS\"".into(),
                sort: Sort::Relevance,
                max: ids.len(),
            })
            .await
            .unwrap();
        assert_eq!(hits.total, Some(9000));
        assert_eq!(
            hits.articles.iter().map(|article| &article.id).collect::<Vec<_>>(),
            ids.iter().collect::<Vec<_>>()
        );

        let requests = requests.lock().await;
        let batches = requests
            .iter()
            .map(|(_, params)| params["id"].split(',').count())
            .collect::<Vec<_>>();
        assert_eq!(batches, [200, 200, 50]);
    }

    #[async_std::test]
    async fn test_error_payload_with_ok_status() {
        // NCBI reports some failures, like a bad API key, in the body of a 200 response.
        let (url, _) = mock_pubmed(json!({ "error": "API key invalid" }), json!({})).await;
        let pubmed = PubMed::new(&options(url)).unwrap();
        let err = pubmed
            .search(&LiteratureQuery {
                term: "\"MEPS\"".into(),
                sort: Sort::Relevance,
                max: 10,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("API key invalid"), "{err}");

        let (url, requests) = mock_pubmed(
            json!({ "esearchresult": { "count": "1", "idlist": ["111"] } }),
            json!({ "error": "API key invalid" }),
        )
        .await;
        let pubmed = PubMed::new(&options(url)).unwrap();
        let err = pubmed
            .search(&LiteratureQuery {
                term: "\"MEPS\"".into(),
                sort: Sort::Relevance,
                max: 10,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("API key invalid"), "{err}");
        assert_eq!(requests.lock().await.len(), 2);
    }
}
