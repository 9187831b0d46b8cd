use async_trait::async_trait;
use nt_core::{ArticleStore, InsertReport, Result, StoredArticle, StoredPage, StoredQuery};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::{BackendConfig, StorageBackend};

/// Articles in insertion order, keyed by `_id`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    articles: Vec<StoredArticle>,
    ids: HashSet<String>,
}

impl MemoryStore {
    pub fn insert_many(&mut self, articles: Vec<StoredArticle>) -> InsertReport {
        let mut report = InsertReport::default();
        for article in articles {
            if self.ids.insert(article.id.clone()) {
                self.articles.push(article);
                report.inserted += 1;
            } else {
                report.duplicates += 1;
            }
        }
        report
    }

    pub fn find(&self, query: &StoredQuery) -> StoredPage {
        let mut matching: Vec<&StoredArticle> = self
            .articles
            .iter()
            .filter(|a| query.filter.matches(a))
            .collect();
        // Stable sort, so equal timestamps keep insertion order.
        matching.sort_by(|a, b| b.article.published_instant().cmp(&a.article.published_instant()));

        let total = matching.len() as u64;
        let page = matching.into_iter().skip(query.skip as usize);
        let articles = match query.limit {
            0 => page.cloned().collect(),
            limit => page.take(limit as usize).cloned().collect(),
        };
        StoredPage { total, articles }
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

/// Process-local store. Contents are lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn connect(_config: &BackendConfig) -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait]
impl ArticleStore for MemoryStorage {
    async fn insert_many(&self, articles: Vec<StoredArticle>) -> Result<InsertReport> {
        let mut store = self.store.write().await;
        Ok(store.insert_many(articles))
    }

    async fn find(&self, query: &StoredQuery) -> Result<StoredPage> {
        let store = self.store.read().await;
        Ok(store.find(query))
    }
}
