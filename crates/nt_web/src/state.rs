use std::sync::Arc;
use nt_core::ArticleStore;
use nt_newsapi::NewsSource;
use nt_storage::Ingestor;

pub struct AppState {
    pub news: Arc<dyn NewsSource>,
    pub store: Arc<dyn ArticleStore>,
    pub ingestor: Ingestor,
}

impl AppState {
    pub fn new(news: Arc<dyn NewsSource>, store: Arc<dyn ArticleStore>) -> Self {
        Self {
            news,
            ingestor: Ingestor::new(store.clone()),
            store,
        }
    }
}
