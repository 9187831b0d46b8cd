//! Translation of stored-news request parameters into a store query.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::types::{RawParams, StoredArticle};
use crate::{Error, Result};

pub const DEFAULT_LIMIT: u64 = 20;
pub const DEFAULT_SKIP: u64 = 0;

/// Predicate over stored articles.
///
/// `country`, `category` and `language` match the filters recorded at fetch
/// time exactly. `source` is a case-insensitive substring of `source.name`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleFilter {
    pub country: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub source: Option<String>,
    pub published: Option<PublishedRange>,
}

/// Inclusive bounds on `publishedAt`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PublishedRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl PublishedRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| instant >= from) && self.to.map_or(true, |to| instant <= to)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredQuery {
    pub filter: ArticleFilter,
    /// Zero means unlimited.
    pub limit: u64,
    pub skip: u64,
}

impl Default for StoredQuery {
    fn default() -> Self {
        Self {
            filter: ArticleFilter::default(),
            limit: DEFAULT_LIMIT,
            skip: DEFAULT_SKIP,
        }
    }
}

/// Result of a stored query: one page plus the size of the whole match set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredPage {
    pub total: u64,
    pub articles: Vec<StoredArticle>,
}

impl StoredQuery {
    pub fn from_params(params: &RawParams) -> Result<Self> {
        let from = param(params, "from").map(|v| parse_instant("from", v)).transpose()?;
        let to = param(params, "to").map(|v| parse_instant("to", v)).transpose()?;
        let published = (from.is_some() || to.is_some()).then_some(PublishedRange { from, to });

        let filter = ArticleFilter {
            country: param(params, "country").map(str::to_string),
            category: param(params, "category").map(str::to_string),
            language: param(params, "language").map(str::to_string),
            source: param(params, "source").map(str::to_string),
            published,
        };

        Ok(Self {
            filter,
            limit: parse_count(params, "limit", DEFAULT_LIMIT)?,
            skip: parse_count(params, "skip", DEFAULT_SKIP)?,
        })
    }
}

impl ArticleFilter {
    pub fn matches(&self, stored: &StoredArticle) -> bool {
        let recorded = |key: &str, wanted: &Option<String>| match wanted {
            Some(wanted) => stored.filters.get(key) == Some(wanted),
            None => true,
        };

        if !recorded("country", &self.country)
            || !recorded("category", &self.category)
            || !recorded("language", &self.language)
        {
            return false;
        }

        if let Some(needle) = &self.source {
            let name = stored.article.source.name.as_deref().unwrap_or_default().to_lowercase();
            if !name.contains(&needle.to_lowercase()) {
                return false;
            }
        }

        match &self.published {
            Some(range) => stored
                .article
                .published_instant()
                .is_some_and(|instant| range.contains(instant)),
            None => true,
        }
    }
}

fn param<'a>(params: &'a RawParams, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Counts are capped at `i64::MAX` so every backend can take them as a signed
/// value.
fn parse_count(params: &RawParams, key: &str, default: u64) -> Result<u64> {
    match param(params, key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|count| i64::try_from(*count).is_ok())
            .ok_or_else(|| Error::InvalidFilter(format!("{} must be a non-negative integer, got {:?}", key, raw))),
        None => Ok(default),
    }
}

/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC), or a bare
/// date (midnight UTC).
pub fn parse_instant(key: &str, raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(ts.and_utc());
    }
    if let Some(ts) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(ts.and_utc());
    }
    Err(Error::InvalidFilter(format!("{} is not a valid date: {:?}", key, raw)))
}
