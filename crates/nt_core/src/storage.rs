use async_trait::async_trait;
use crate::query::{StoredPage, StoredQuery};
use crate::types::StoredArticle;
use crate::Result;

/// Outcome of an unordered bulk insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertReport {
    pub inserted: usize,
    /// Records skipped because their `_id` already existed.
    pub duplicates: usize,
    /// Per-record failures other than duplicate keys.
    pub failures: Vec<String>,
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Inserts every record it can. A failing record never prevents the
    /// others from being written; only a failure of the whole call is an `Err`.
    async fn insert_many(&self, articles: Vec<StoredArticle>) -> Result<InsertReport>;

    /// Returns the matching page, newest `publishedAt` first, plus the total
    /// number of matches ignoring `limit` and `skip`.
    async fn find(&self, query: &StoredQuery) -> Result<StoredPage>;

    /// Verifies the backend is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Releases connections held by the backend.
    async fn close(&self) {}
}
