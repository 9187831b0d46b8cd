//! Persisting a copy of every successful live fetch.
//!
//! Ingestion is best effort. Its outcome is reported to the logs and never
//! back to whoever triggered the fetch.

use chrono::{DateTime, Utc};
use nt_core::{Article, ArticleStore, RawParams, StoredArticle};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// What happened to one ingested batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub submitted: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn ArticleStore>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    /// Stamps each article with the fetch metadata and its derived `_id`.
    pub fn prepare(articles: Vec<Article>, filters: &RawParams, fetched_at: DateTime<Utc>) -> Vec<StoredArticle> {
        articles
            .into_iter()
            .map(|article| StoredArticle::new(article, fetched_at, filters.clone()))
            .collect()
    }

    pub async fn ingest(&self, articles: Vec<Article>, filters: RawParams) -> IngestReport {
        self.ingest_at(articles, filters, Utc::now()).await
    }

    pub async fn ingest_at(&self, articles: Vec<Article>, filters: RawParams, fetched_at: DateTime<Utc>) -> IngestReport {
        if articles.is_empty() {
            return IngestReport::default();
        }

        let batch = Self::prepare(articles, &filters, fetched_at);
        let submitted = batch.len();

        match self.store.insert_many(batch).await {
            Ok(outcome) => {
                if outcome.duplicates > 0 {
                    debug!(duplicates = outcome.duplicates, "Skipped articles already stored");
                }
                for failure in &outcome.failures {
                    error!(%failure, "Error storing article");
                }
                let report = IngestReport {
                    submitted,
                    inserted: outcome.inserted,
                    duplicates: outcome.duplicates,
                    failed: outcome.failures.len(),
                };
                info!(
                    inserted = report.inserted,
                    duplicates = report.duplicates,
                    failed = report.failed,
                    "Stored fetched articles"
                );
                report
            }
            Err(e) => {
                error!(error = %e, submitted, "Error storing articles");
                IngestReport {
                    submitted,
                    failed: submitted,
                    ..Default::default()
                }
            }
        }
    }

    /// Runs the ingestion on its own task; the caller may drop the handle.
    pub fn spawn(&self, articles: Vec<Article>, filters: RawParams) -> JoinHandle<IngestReport> {
        let ingestor = self.clone();
        tokio::spawn(async move { ingestor.ingest(articles, filters).await })
    }
}
