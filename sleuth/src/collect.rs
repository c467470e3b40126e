//! Collectors for each category of usage evidence, and the survey which dispatches to them.

use crate::{
    literature::{Article, Hits, Literature, LiteratureQuery, Sort},
    source::DataSource,
    web::{self, WebPage, WebQuery, WebSearch},
};
use anyhow::Error;
use clap::Args;
use derive_more::From;
use futures::future::{join_all, try_join};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use strum::{Display, EnumIter, EnumString};

/// The most results requested from the web search backend in a single query.
const WEB_RESULTS: usize = 20;

/// The most evidence pages listed for a single organization.
const MAX_EVIDENCE: usize = 3;

/// High-impression outlets searched for commentary by default, in priority order.
pub const DEFAULT_OUTLETS: &[&str] = &[
    "linkedin.com",
    "x.com",
    "twitter.com",
    "substack.com",
    "medium.com",
    "hbr.org",
    "forbes.com",
    "wsj.com",
    "ft.com",
    "bloomberg.com",
    "statnews.com",
    "healthaffairs.org",
    "fiercehealthcare.com",
    "techcrunch.com",
    "towardsdatascience.com",
];

/// Hosts which never indicate private industry usage: reference works, publishers, social
/// networks and job boards (which list other companies' postings).
const NON_INDUSTRY: &[&str] = &[
    "wikipedia.org",
    "doi.org",
    "researchgate.net",
    "semanticscholar.org",
    "scholar.google.com",
    "sciencedirect.com",
    "springer.com",
    "wiley.com",
    "nature.com",
    "jstor.org",
    "arxiv.org",
    "ssrn.com",
    "plos.org",
    "bmj.com",
    "github.com",
    "kaggle.com",
    "youtube.com",
    "reddit.com",
    "quora.com",
    "facebook.com",
    "instagram.com",
    "indeed.com",
    "glassdoor.com",
    "ziprecruiter.com",
    "monster.com",
    "simplyhired.com",
];

/// A category of usage evidence.
///
/// Categories are ordered the way they appear in a report.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    EnumString,
    Deserialize,
    Serialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// The most cited academic publications using the data source.
    MostCited,
    /// A broad, recent sample of academic publications using the data source.
    Comprehensive,
    /// Commentary from high-impression industry outlets.
    HighImpression,
    /// Organizations likely to be using the data source privately.
    InferredIndustry,
}

impl Category {
    /// A human-readable heading for this category.
    pub fn title(&self) -> &'static str {
        match self {
            Self::MostCited => "Most cited academic usages",
            Self::Comprehensive => "Comprehensive academic usages",
            Self::HighImpression => "High-impression commentary",
            Self::InferredIndustry => "Inferred industry usages",
        }
    }
}

/// Options controlling how much evidence is collected and which sources are trusted.
#[derive(Clone, Debug, Args)]
pub struct Options {
    /// Number of most cited articles to report.
    #[clap(long, env = "SLEUTH_MOST_CITED", default_value = "10")]
    pub most_cited: usize,

    /// Number of relevant articles from which the most cited are chosen.
    #[clap(long, env = "SLEUTH_CITATION_POOL", default_value = "100")]
    pub citation_pool: usize,

    /// Number of recent articles to report in the comprehensive section.
    #[clap(long, env = "SLEUTH_COMPREHENSIVE", default_value = "50")]
    pub comprehensive: usize,

    /// Number of high-impression commentary items to report.
    #[clap(long, env = "SLEUTH_COMMENTARY", default_value = "15")]
    pub commentary: usize,

    /// Number of organizations to report as likely industry users.
    #[clap(long, env = "SLEUTH_INDUSTRY", default_value = "15")]
    pub industry: usize,

    /// Domains of high-impression outlets, in priority order.
    #[clap(
        long = "outlet",
        value_name = "OUTLET",
        env = "SLEUTH_OUTLETS",
        value_delimiter = ',',
        default_values_t = default_outlets()
    )]
    pub outlets: Vec<String>,

    /// Domains never to report, e.g. known sources of demagoguery.
    #[clap(long = "exclude", value_name = "DOMAIN", env = "SLEUTH_EXCLUDE", value_delimiter = ',')]
    pub exclude: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            most_cited: 10,
            citation_pool: 100,
            comprehensive: 50,
            commentary: 15,
            industry: 15,
            outlets: default_outlets(),
            exclude: vec![],
        }
    }
}

impl Options {
    fn is_excluded(&self, host: &str) -> bool {
        self.exclude.iter().any(|domain| web::within(host, domain))
    }

    /// The priority of the outlet serving `host`, if it is an outlet at all.
    fn outlet(&self, host: &str) -> Option<(usize, String)> {
        self.outlets
            .iter()
            .enumerate()
            .find(|(_, outlet)| web::within(host, outlet))
            .map(|(i, outlet)| {
                let outlet = outlet.trim().to_lowercase();
                (i, outlet.trim_start_matches("www.").to_string())
            })
    }
}

fn default_outlets() -> Vec<String> {
    DEFAULT_OUTLETS.iter().map(|outlet| outlet.to_string()).collect()
}

/// The evidence collected for every requested category.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Survey {
    pub source: DataSource,
    /// One section per requested category, in category order.
    pub sections: Vec<Section>,
}

/// The evidence collected for one category.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Section {
    pub category: Category,
    pub outcome: Outcome,
}

/// The result of running a collector.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Found(Findings),
    /// The collector failed; the reason is reported in place of findings.
    Unavailable(String),
}

/// Evidence produced by a collector.
#[derive(Clone, Debug, PartialEq, Eq, From, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Findings {
    Articles(Hits),
    Commentary(Vec<Commentary>),
    Organizations(Vec<Organization>),
}

impl Findings {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Articles(hits) => hits.articles.is_empty(),
            Self::Commentary(items) => items.is_empty(),
            Self::Organizations(orgs) => orgs.is_empty(),
        }
    }
}

/// A piece of commentary published by a high-impression outlet.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Commentary {
    pub title: String,
    /// The domain of the outlet which published this commentary.
    pub outlet: String,
    pub url: String,
    pub summary: String,
    pub age: Option<String>,
}

/// Why an organization is suspected of using a data source.
#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Signal {
    /// The organization mentions the data source in case studies, products or blog posts.
    Usage,
    /// The organization is hiring for work involving the data source.
    Hiring,
}

/// An organization likely to be using a data source.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Organization {
    pub name: String,
    pub domain: String,
    /// The number of distinct pages suggesting usage.
    pub hits: usize,
    pub signals: BTreeSet<Signal>,
    /// A sample of the pages suggesting usage.
    pub evidence: Vec<Evidence>,
}

/// A page suggesting that an organization uses a data source.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Evidence {
    pub title: String,
    pub url: String,
    pub signal: Signal,
}

/// Survey the usages of `source` in each of `categories`.
///
/// Collectors run concurrently. A collector which fails does not fail the survey; its section
/// is marked [unavailable](Outcome::Unavailable) instead.
pub async fn survey<L: Literature, W: WebSearch>(
    literature: &L,
    web: &W,
    source: &DataSource,
    categories: &[Category],
    opt: &Options,
) -> Survey {
    let categories = categories.iter().copied().collect::<BTreeSet<_>>();
    let sections = join_all(categories.into_iter().map(|category| async move {
        tracing::info!("collecting {category} usages of {source}");
        let res = match category {
            Category::MostCited => most_cited(literature, source, opt).await,
            Category::Comprehensive => comprehensive(literature, source, opt).await,
            Category::HighImpression => high_impression(web, source, opt).await,
            Category::InferredIndustry => inferred_industry(web, source, opt).await,
        };
        let outcome = match res {
            Ok(findings) => Outcome::Found(findings),
            Err(err) => {
                tracing::error!("unable to collect {category} usages of {source}: {err:#}");
                Outcome::Unavailable(format!("{err:#}"))
            }
        };
        Section { category, outcome }
    }))
    .await;

    Survey {
        source: source.clone(),
        sections,
    }
}

/// The most cited academic publications using `source`.
///
/// The citation pool is the most relevant articles; these are ordered by citation count, with
/// articles of unknown citation count last and ties kept in relevance order.
pub async fn most_cited<L: Literature>(
    literature: &L,
    source: &DataSource,
    opt: &Options,
) -> Result<Findings, Error> {
    let mut hits = literature
        .search(&LiteratureQuery {
            term: source.phrase_query(),
            sort: Sort::Relevance,
            max: opt.citation_pool.max(opt.most_cited),
        })
        .await?;
    rank_by_citations(&mut hits.articles);
    hits.articles.truncate(opt.most_cited);
    Ok(hits.into())
}

fn rank_by_citations(articles: &mut [Article]) {
    // `None` orders before `Some`, so comparing in reverse puts unknown counts last.
    articles.sort_by(|a, b| b.citations.cmp(&a.citations));
}

/// The most recent academic publications using `source`, with the total number of matches.
pub async fn comprehensive<L: Literature>(
    literature: &L,
    source: &DataSource,
    opt: &Options,
) -> Result<Findings, Error> {
    let hits = literature
        .search(&LiteratureQuery {
            term: source.phrase_query(),
            sort: Sort::Recent,
            max: opt.comprehensive,
        })
        .await?;
    Ok(hits.into())
}

/// Commentary on `source` published by high-impression outlets.
pub async fn high_impression<W: WebSearch>(
    web: &W,
    source: &DataSource,
    opt: &Options,
) -> Result<Findings, Error> {
    if opt.outlets.is_empty() {
        tracing::warn!("no high-impression outlets configured");
        return Ok(Findings::Commentary(vec![]));
    }

    let sites = opt
        .outlets
        .iter()
        .map(|outlet| format!("site:{}", outlet.trim()))
        .collect::<Vec<_>>()
        .join(" OR ");
    let pages = web
        .search(&WebQuery {
            query: format!("({}) ({sites})", source.phrase_query()),
            count: (2 * opt.commentary).min(WEB_RESULTS),
        })
        .await?;

    let mut seen = HashSet::new();
    let mut commentary = pages
        .into_iter()
        .enumerate()
        .filter_map(|(rank, page)| {
            let host = page.host()?;
            if opt.is_excluded(&host) {
                tracing::debug!("excluding commentary from {host}: {}", page.url);
                return None;
            }
            let Some((priority, outlet)) = opt.outlet(&host) else {
                tracing::debug!("{host} is not a high-impression outlet: {}", page.url);
                return None;
            };
            if !seen.insert(page.url.clone()) {
                return None;
            }
            let item = Commentary {
                outlet,
                title: page.title,
                url: page.url,
                summary: page.description,
                age: page.age,
            };
            Some(((priority, rank), item))
        })
        .collect::<Vec<_>>();
    commentary.sort_by_key(|(key, _)| *key);

    Ok(Findings::Commentary(
        commentary
            .into_iter()
            .map(|(_, item)| item)
            .take(opt.commentary)
            .collect(),
    ))
}

/// Organizations whose web presence suggests they use `source`, even if they don't say so.
pub async fn inferred_industry<W: WebSearch>(
    web: &W,
    source: &DataSource,
    opt: &Options,
) -> Result<Findings, Error> {
    let names = source.phrase_query();
    let (usage, hiring) = try_join(
        web.search(&WebQuery {
            query: format!(
                "({names}) (\"case study\" OR customers OR \"powered by\" OR \"we use\")"
            ),
            count: WEB_RESULTS,
        }),
        web.search(&WebQuery {
            query: format!("({names}) (careers OR jobs OR hiring)"),
            count: WEB_RESULTS,
        }),
    )
    .await?;

    let pages = usage
        .into_iter()
        .map(|page| (Signal::Usage, page))
        .chain(hiring.into_iter().map(|page| (Signal::Hiring, page)));
    let mut orgs = group_by_organization(pages, opt);
    orgs.truncate(opt.industry);
    Ok(orgs.into())
}

fn group_by_organization(
    pages: impl IntoIterator<Item = (Signal, WebPage)>,
    opt: &Options,
) -> Vec<Organization> {
    let mut orgs: BTreeMap<String, (Organization, HashSet<String>)> = BTreeMap::new();
    for (signal, page) in pages {
        let Some(host) = page.host() else {
            tracing::warn!("search result has malformed URL {}, skipping", page.url);
            continue;
        };
        if opt.is_excluded(&host) || opt.outlet(&host).is_some() || !is_industry(&host) {
            tracing::debug!("{host} is not an industry user: {}", page.url);
            continue;
        }

        let name = web::organization(&host);
        let (org, urls) = orgs.entry(name.clone()).or_insert_with(|| {
            (
                Organization {
                    name,
                    domain: web::registrable_domain(&host),
                    hits: 0,
                    signals: Default::default(),
                    evidence: vec![],
                },
                Default::default(),
            )
        });
        if !urls.insert(page.url.clone()) {
            continue;
        }
        org.hits += 1;
        org.signals.insert(signal);
        if org.evidence.len() < MAX_EVIDENCE {
            org.evidence.push(Evidence {
                title: page.title,
                url: page.url,
                signal,
            });
        }
    }

    let mut orgs = orgs.into_values().map(|(org, _)| org).collect::<Vec<_>>();
    // `orgs` is already sorted by name, and the sort is stable.
    orgs.sort_by(|a, b| b.hits.cmp(&a.hits));
    orgs
}

/// Whether `host` could belong to a private organization.
fn is_industry(host: &str) -> bool {
    let labels = host.split('.').collect::<Vec<_>>();
    let tld = labels.last().copied().unwrap_or_default();
    if ["edu", "gov", "mil", "int"].contains(&tld) {
        return false;
    }
    // Academic and government second-level domains, like `ox.ac.uk` or `nhs.gov.uk`.
    if labels.len() >= 3 && tld.len() == 2 {
        let sld = labels[labels.len() - 2];
        if ["ac", "edu", "gov", "mil"].contains(&sld) {
            return false;
        }
    }
    !NON_INDUSTRY.iter().any(|domain| web::within(host, domain))
}
