//! Client for the NewsAPI v2 HTTP API and the translation of incoming
//! request parameters into its queries.

pub mod client;
pub mod query;

pub use client::{NewsApiClient, NewsSource, DEFAULT_BASE_URL};
pub use query::{translate_news, translate_sources, Endpoint, NewsParams, OutboundQuery, SourcesParams, MATCH_ALL};

pub mod prelude {
    pub use super::client::NewsSource;
    pub use super::query::{Endpoint, OutboundQuery};
    pub use nt_core::{Article, ArticlesPage, Error, Result};
}
