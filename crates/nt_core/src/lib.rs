pub mod error;
pub mod query;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use query::{ArticleFilter, PublishedRange, StoredPage, StoredQuery};
pub use storage::{ArticleStore, InsertReport};
pub use types::{Article, ArticleSource, ArticlesPage, NewsSourceInfo, RawParams, StoredArticle};
