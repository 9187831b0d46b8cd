use async_trait::async_trait;
use nt_core::{Article, ArticlesPage, Error, NewsSourceInfo, Result};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, warn};
use url::Url;

use crate::query::{Endpoint, OutboundQuery};

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2";

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Current top headlines (`/top-headlines`).
    async fn fetch_headlines(&self, query: &OutboundQuery) -> Result<ArticlesPage>;

    /// Full-text search over a date range (`/everything`).
    async fn fetch_everything(&self, query: &OutboundQuery) -> Result<ArticlesPage>;

    /// Outlets known to the provider (`/sources`).
    async fn fetch_sources(&self, query: &OutboundQuery) -> Result<Vec<NewsSourceInfo>>;

    /// Runs an article query against whichever endpoint it was built for.
    async fn fetch_articles(&self, query: &OutboundQuery) -> Result<ArticlesPage> {
        match query.endpoint {
            Endpoint::TopHeadlines => self.fetch_headlines(query).await,
            Endpoint::Everything => self.fetch_everything(query).await,
            Endpoint::Sources => Err(Error::InvalidUrl(
                "sources query cannot return articles".to_string(),
            )),
        }
    }
}

/// Envelope shared by every provider response.
#[derive(Debug, Deserialize)]
struct Envelope {
    status: Option<String>,
    code: Option<String>,
    message: Option<String>,
    #[serde(rename = "totalResults")]
    total_results: Option<u64>,
    #[serde(default)]
    articles: Option<Vec<Article>>,
    #[serde(default)]
    sources: Option<Vec<NewsSourceInfo>>,
}

pub struct NewsApiClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl NewsApiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", base_url, e)))?;
        Ok(Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// One GET against the provider, classified into success, in-payload
    /// rejection, or transport failure.
    async fn get(&self, query: &OutboundQuery) -> Result<Envelope> {
        let url = query.to_url(&self.base_url)?;
        debug!(endpoint = query.endpoint.path(), %url, "Calling news provider");

        let response = self
            .client
            .get(url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let envelope = serde_json::from_str::<Envelope>(&body);

        if !status.is_success() {
            let message = envelope
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));
            warn!(status = status.as_u16(), %message, "News provider returned an error status");
            return Err(Error::Transport(message));
        }

        let envelope = envelope.map_err(|e| Error::Transport(format!("Malformed provider response: {}", e)))?;
        if envelope.status.as_deref() == Some("error") {
            let message = envelope
                .message
                .clone()
                .unwrap_or_else(|| "Unknown provider error".to_string());
            warn!(code = ?envelope.code, %message, "News provider rejected the request");
            return Err(Error::UpstreamRejected {
                message,
                code: envelope.code,
            });
        }

        Ok(envelope)
    }

    async fn get_articles(&self, query: &OutboundQuery) -> Result<ArticlesPage> {
        let envelope = self.get(query).await?;
        Ok(ArticlesPage {
            total_results: envelope.total_results,
            articles: envelope.articles.unwrap_or_default(),
        })
    }
}

impl fmt::Debug for NewsApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsApiClient")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn fetch_headlines(&self, query: &OutboundQuery) -> Result<ArticlesPage> {
        self.get_articles(query).await
    }

    async fn fetch_everything(&self, query: &OutboundQuery) -> Result<ArticlesPage> {
        self.get_articles(query).await
    }

    async fn fetch_sources(&self, query: &OutboundQuery) -> Result<Vec<NewsSourceInfo>> {
        let envelope = self.get(query).await?;
        Ok(envelope.sources.unwrap_or_default())
    }
}
