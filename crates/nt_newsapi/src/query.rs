//! Translation of live-news request parameters into provider queries.

use nt_core::{Error, RawParams, Result};
use url::Url;

/// Search term used when the full-text endpoint is hit without `q`.
pub const MATCH_ALL: &str = "*";

const DEFAULT_COUNTRY: &str = "us";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_PAGE_SIZE: &str = "20";
const DEFAULT_PAGE: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    TopHeadlines,
    Everything,
    Sources,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::TopHeadlines => "top-headlines",
            Endpoint::Everything => "everything",
            Endpoint::Sources => "sources",
        }
    }
}

/// A provider request: which endpoint to call and its parameters, in the
/// order they will appear in the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundQuery {
    pub endpoint: Endpoint,
    pub params: Vec<(&'static str, String)>,
}

impl OutboundQuery {
    fn new(endpoint: Endpoint) -> Self {
        Self { endpoint, params: Vec::new() }
    }

    fn push(&mut self, key: &'static str, value: Option<&str>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.params.push((key, value.to_string()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    /// Percent-encoded query string, without the leading `?`.
    pub fn query_string(&self) -> String {
        self.params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Full request URL below `base` (e.g. `https://newsapi.org/v2`).
    pub fn to_url(&self, base: &Url) -> Result<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(format!("{} cannot be a base URL", base)))?
            .pop_if_empty()
            .push(self.endpoint.path());
        let query = self.query_string();
        url.set_query((!query.is_empty()).then_some(query.as_str()));
        Ok(url)
    }
}

/// Live-news parameters after defaults have been applied.
///
/// A default only fills a key the caller left out. A key sent with an empty
/// value stays empty and is never forwarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsParams {
    pub country: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub sources: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub q: Option<String>,
    pub page_size: Option<String>,
    pub page: Option<String>,
}

impl NewsParams {
    pub fn from_params(params: &RawParams) -> Self {
        Self {
            country: with_default(params, "country", DEFAULT_COUNTRY),
            category: present(params, "category"),
            language: with_default(params, "language", DEFAULT_LANGUAGE),
            sources: present(params, "sources"),
            from: present(params, "from"),
            to: present(params, "to"),
            q: present(params, "q"),
            page_size: with_default(params, "pageSize", DEFAULT_PAGE_SIZE),
            page: with_default(params, "page", DEFAULT_PAGE),
        }
    }

    pub fn has_date_range(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// Headline search unless a date bound is given, in which case the
    /// full-text endpoint is used. That endpoint takes no country or category
    /// and needs a search term.
    pub fn translate(&self) -> OutboundQuery {
        if self.has_date_range() {
            let mut query = OutboundQuery::new(Endpoint::Everything);
            query.push("q", Some(self.q.as_deref().unwrap_or(MATCH_ALL)));
            query.push("language", self.language.as_deref());
            query.push("sources", self.sources.as_deref());
            query.push("from", self.from.as_deref());
            query.push("to", self.to.as_deref());
            query.push("pageSize", self.page_size.as_deref());
            query.push("page", self.page.as_deref());
            query
        } else {
            let mut query = OutboundQuery::new(Endpoint::TopHeadlines);
            query.push("country", self.country.as_deref());
            query.push("category", self.category.as_deref());
            query.push("language", self.language.as_deref());
            query.push("sources", self.sources.as_deref());
            query.push("q", self.q.as_deref());
            query.push("pageSize", self.page_size.as_deref());
            query.push("page", self.page.as_deref());
            query
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcesParams {
    pub country: Option<String>,
    pub language: Option<String>,
    pub category: Option<String>,
}

impl SourcesParams {
    pub fn from_params(params: &RawParams) -> Self {
        Self {
            country: present(params, "country"),
            language: with_default(params, "language", DEFAULT_LANGUAGE),
            category: present(params, "category"),
        }
    }

    pub fn translate(&self) -> OutboundQuery {
        let mut query = OutboundQuery::new(Endpoint::Sources);
        query.push("country", self.country.as_deref());
        query.push("language", self.language.as_deref());
        query.push("category", self.category.as_deref());
        query
    }
}

/// Translates raw live-news parameters straight into a provider query.
pub fn translate_news(params: &RawParams) -> OutboundQuery {
    NewsParams::from_params(params).translate()
}

pub fn translate_sources(params: &RawParams) -> OutboundQuery {
    SourcesParams::from_params(params).translate()
}

fn present(params: &RawParams, key: &str) -> Option<String> {
    params.get(key).filter(|v| !v.is_empty()).cloned()
}

fn with_default(params: &RawParams, key: &str, default: &str) -> Option<String> {
    match params.get(key) {
        Some(value) if value.is_empty() => None,
        Some(value) => Some(value.clone()),
        None => Some(default.to_string()),
    }
}
