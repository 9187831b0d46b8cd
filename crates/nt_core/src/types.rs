use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Raw query-string parameters exactly as the caller sent them.
pub type RawParams = BTreeMap<String, String>;

/// An article as returned by the news provider.
///
/// Only the fields this service relies on are typed, and even those may be
/// null or missing. Everything else the provider sends is kept in `extra`
/// and written back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: ArticleSource,
    #[serde(rename = "publishedAt", default)]
    pub published_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleSource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Article {
    /// Parses `publishedAt` into a UTC instant, if present and well formed.
    pub fn published_instant(&self) -> Option<DateTime<Utc>> {
        self.published_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }
}

/// An article persisted together with the provenance of the fetch that
/// produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArticle {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub article: Article,
    #[serde(rename = "fetchedAt")]
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub filters: RawParams,
}

impl StoredArticle {
    pub fn new(article: Article, fetched_at: DateTime<Utc>, filters: RawParams) -> Self {
        Self {
            id: derive_id(article.url.as_deref().unwrap_or_default(), fetched_at),
            article,
            fetched_at,
            filters,
        }
    }
}

/// Identifier used as the document key: the article url joined with the
/// ingestion instant in Unix milliseconds.
///
/// Two ingestions of the same url at different instants produce different
/// identifiers, so this only collapses duplicates within one instant. An
/// article without a url gets an empty url part.
pub fn derive_id(url: &str, fetched_at: DateTime<Utc>) -> String {
    format!("{}_{}", url, fetched_at.timestamp_millis())
}

/// A news outlet as listed by the provider's sources endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSourceInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One page of articles from a successful live fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticlesPage {
    #[serde(rename = "totalResults")]
    pub total_results: Option<u64>,
    pub articles: Vec<Article>,
}
