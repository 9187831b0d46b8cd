use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Bson, Document},
    error::{ErrorKind, WriteFailure},
    Client, Collection,
};
use nt_core::{ArticleFilter, ArticleStore, Error, InsertReport, Result, StoredArticle, StoredPage, StoredQuery};
use tracing::debug;
use crate::{BackendConfig, StorageBackend};

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

const FETCHED_AT: &str = "fetchedAt";
/// Scratch field holding the parsed `publishedAt` while sorting.
const PUBLISHED_SORT_KEY: &str = "_publishedSort";

pub struct MongoStorage {
    client: Client,
    collection: Collection<Document>,
}

impl MongoStorage {
    pub async fn new_with_config(config: &BackendConfig) -> Result<Self> {
        let client = Client::with_uri_str(&config.url)
            .await
            .map_err(|e| Error::Store(format!("Failed to create MongoDB client: {}", e)))?;
        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);
        Ok(Self { client, collection })
    }

    pub fn collection(&self) -> &Collection<Document> {
        &self.collection
    }
}

/// Encodes an article for the collection, with `fetchedAt` as a BSON date.
pub fn to_stored_document(stored: &StoredArticle) -> Result<Document> {
    let mut document = bson::to_document(stored)
        .map_err(|e| Error::Store(format!("Cannot encode article {}: {}", stored.id, e)))?;
    document.insert(FETCHED_AT, bson::DateTime::from_millis(stored.fetched_at.timestamp_millis()));
    Ok(document)
}

pub fn from_stored_document(mut document: Document) -> Result<StoredArticle> {
    if let Ok(millis) = document.get_datetime(FETCHED_AT).map(|at| at.timestamp_millis()) {
        let at = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| Error::Store(format!("fetchedAt out of range: {}", millis)))?;
        document.insert(FETCHED_AT, at.to_rfc3339_opts(SecondsFormat::Millis, true));
    }
    bson::from_document(document).map_err(|e| Error::Store(format!("Malformed stored article: {}", e)))
}

/// `publishedAt` parsed server side; null when missing or unparseable.
fn published_instant() -> Document {
    doc! {
        "$dateFromString": { "dateString": "$publishedAt", "onError": Bson::Null, "onNull": Bson::Null }
    }
}

fn bson_date(instant: DateTime<Utc>) -> Bson {
    Bson::DateTime(bson::DateTime::from_millis(instant.timestamp_millis()))
}

fn signed_count(name: &str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::InvalidFilter(format!("{} is out of range: {}", name, value)))
}

/// Builds the server-side filter equivalent of [`ArticleFilter::matches`].
///
/// `publishedAt` stays the provider's string, so the range parses it per
/// document and compares instants, never text.
pub fn filter_document(filter: &ArticleFilter) -> Document {
    let mut query = Document::new();
    if let Some(country) = &filter.country {
        query.insert("filters.country", country.as_str());
    }
    if let Some(category) = &filter.category {
        query.insert("filters.category", category.as_str());
    }
    if let Some(language) = &filter.language {
        query.insert("filters.language", language.as_str());
    }
    if let Some(source) = &filter.source {
        query.insert(
            "source.name",
            doc! { "$regex": regex::escape(source), "$options": "i" },
        );
    }
    if let Some(range) = &filter.published {
        let mut conditions = vec![Bson::from(doc! { "$ne": ["$$published", Bson::Null] })];
        if let Some(from) = range.from {
            conditions.push(doc! { "$gte": ["$$published", bson_date(from)] }.into());
        }
        if let Some(to) = range.to {
            conditions.push(doc! { "$lte": ["$$published", bson_date(to)] }.into());
        }
        query.insert(
            "$expr",
            doc! { "$let": { "vars": { "published": published_instant() }, "in": { "$and": conditions } } },
        );
    }
    query
}

/// Match, newest first by parsed `publishedAt`, then skip and limit.
pub fn page_pipeline(query: &StoredQuery) -> Result<Vec<Document>> {
    let mut pipeline = vec![
        doc! { "$match": filter_document(&query.filter) },
        doc! { "$addFields": { PUBLISHED_SORT_KEY: published_instant() } },
        doc! { "$sort": { PUBLISHED_SORT_KEY: -1 } },
    ];
    if query.skip > 0 {
        pipeline.push(doc! { "$skip": signed_count("skip", query.skip)? });
    }
    if query.limit > 0 {
        pipeline.push(doc! { "$limit": signed_count("limit", query.limit)? });
    }
    pipeline.push(doc! { "$project": { PUBLISHED_SORT_KEY: 0 } });
    Ok(pipeline)
}

/// Splits a failed unordered insert into duplicates and real failures.
fn classify_insert_error(error: &mongodb::error::Error, attempted: usize) -> Result<InsertReport> {
    match error.kind.as_ref() {
        ErrorKind::InsertMany(failure) => {
            let mut report = InsertReport::default();
            let write_errors = failure.write_errors.as_deref().unwrap_or_default();
            for write_error in write_errors {
                if write_error.code == DUPLICATE_KEY {
                    report.duplicates += 1;
                } else {
                    report.failures.push(format!("#{}: {}", write_error.index, write_error.message));
                }
            }
            if let Some(concern) = &failure.write_concern_error {
                report.failures.push(format!("write concern: {}", concern.message));
            }
            report.inserted = attempted.saturating_sub(write_errors.len());
            Ok(report)
        }
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY => {
            Ok(InsertReport { duplicates: attempted, ..Default::default() })
        }
        _ => Err(Error::Store(error.to_string())),
    }
}

#[async_trait]
impl StorageBackend for MongoStorage {
    fn get_error_message() -> &'static str {
        "MongoDB should be reachable at the configured URI"
    }

    async fn connect(config: &BackendConfig) -> Result<Self> {
        Self::new_with_config(config).await
    }
}

#[async_trait]
impl ArticleStore for MongoStorage {
    async fn insert_many(&self, articles: Vec<StoredArticle>) -> Result<InsertReport> {
        let mut report = InsertReport::default();
        let mut documents = Vec::with_capacity(articles.len());
        for article in &articles {
            match to_stored_document(article) {
                Ok(document) => documents.push(document),
                Err(e) => report.failures.push(e.detail()),
            }
        }
        if documents.is_empty() {
            return Ok(report);
        }

        let attempted = documents.len();
        let outcome = match self.collection.insert_many(documents).ordered(false).await {
            Ok(result) => InsertReport {
                inserted: result.inserted_ids.len(),
                ..Default::default()
            },
            Err(e) => classify_insert_error(&e, attempted)?,
        };
        report.inserted = outcome.inserted;
        report.duplicates = outcome.duplicates;
        report.failures.extend(outcome.failures);
        Ok(report)
    }

    async fn find(&self, query: &StoredQuery) -> Result<StoredPage> {
        let pipeline = page_pipeline(query)?;
        let filter = filter_document(&query.filter);
        debug!(?filter, limit = query.limit, skip = query.skip, "Querying stored articles");

        let documents: Vec<Document> = self
            .collection
            .aggregate(pipeline)
            .await
            .map_err(|e| Error::Store(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let articles = documents
            .into_iter()
            .map(from_stored_document)
            .collect::<Result<Vec<_>>>()?;

        let total = self
            .collection
            .count_documents(filter)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;

        Ok(StoredPage { total, articles })
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| Error::Store(format!("MongoDB ping failed: {}", e)))?;
        Ok(())
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ingestor;
    use chrono::TimeZone;
    use nt_core::{Article, PublishedRange, RawParams};
    use serde_json::json;
    use std::sync::Arc;

    fn millis(raw: &str) -> Bson {
        bson_date(nt_core::query::parse_instant("test", raw).unwrap())
    }

    fn range_expr(conditions: Vec<Bson>) -> Document {
        doc! { "$let": { "vars": { "published": published_instant() }, "in": { "$and": conditions } } }
    }

    #[test]
    fn test_empty_filter() {
        assert_eq!(filter_document(&ArticleFilter::default()), Document::new());
    }

    #[test]
    fn test_filter_document() {
        let mut params = RawParams::new();
        for (k, v) in [("country", "us"), ("language", "en"), ("source", "bbc.co"), ("from", "2024-01-01"), ("to", "2024-01-31")] {
            params.insert(k.to_string(), v.to_string());
        }
        let query = StoredQuery::from_params(&params).unwrap();

        assert_eq!(
            filter_document(&query.filter),
            doc! {
                "filters.country": "us",
                "filters.language": "en",
                "source.name": { "$regex": "bbc\\.co", "$options": "i" },
                "$expr": range_expr(vec![
                    doc! { "$ne": ["$$published", Bson::Null] }.into(),
                    doc! { "$gte": ["$$published", millis("2024-01-01")] }.into(),
                    doc! { "$lte": ["$$published", millis("2024-01-31")] }.into(),
                ]),
            }
        );
    }

    #[test]
    fn test_open_ended_range() {
        let filter = ArticleFilter {
            published: Some(PublishedRange {
                from: Some(nt_core::query::parse_instant("from", "2024-03-01T12:30:00+02:00").unwrap()),
                to: None,
            }),
            ..Default::default()
        };
        let expected = Bson::DateTime(bson::DateTime::from_millis(
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap().timestamp_millis(),
        ));
        assert_eq!(
            filter_document(&filter),
            doc! {
                "$expr": range_expr(vec![
                    doc! { "$ne": ["$$published", Bson::Null] }.into(),
                    doc! { "$gte": ["$$published", expected] }.into(),
                ]),
            }
        );
    }

    #[test]
    fn test_page_pipeline_omits_zero_counts() {
        let pipeline = page_pipeline(&StoredQuery { limit: 0, skip: 0, ..Default::default() }).unwrap();
        let stages: Vec<&str> = pipeline.iter().filter_map(|stage| stage.keys().next().map(String::as_str)).collect();
        assert_eq!(stages, vec!["$match", "$addFields", "$sort", "$project"]);

        let pipeline = page_pipeline(&StoredQuery { limit: 2, skip: 4, ..Default::default() }).unwrap();
        assert_eq!(pipeline[3], doc! { "$skip": 4_i64 });
        assert_eq!(pipeline[4], doc! { "$limit": 2_i64 });
    }

    #[test]
    fn test_counts_beyond_signed_range_are_invalid() {
        let query = StoredQuery { limit: i64::MAX as u64 + 1, ..Default::default() };
        assert!(matches!(page_pipeline(&query), Err(Error::InvalidFilter(_))));

        let query = StoredQuery { skip: u64::MAX, ..Default::default() };
        assert!(matches!(page_pipeline(&query), Err(Error::InvalidFilter(_))));
    }

    #[test]
    fn test_fetched_at_is_stored_as_date() {
        let article: Article = serde_json::from_value(json!({
            "source": { "id": null, "name": "BBC News" },
            "url": "https://bbc.co.uk/1",
            "publishedAt": "2024-01-05T10:30:00Z",
            "rank": 3
        }))
        .unwrap();
        let at = Utc.timestamp_millis_opt(1_704_450_600_123).unwrap();
        let stored = StoredArticle::new(article, at, RawParams::new());

        let document = to_stored_document(&stored).unwrap();
        assert_eq!(document.get_datetime(FETCHED_AT).unwrap().timestamp_millis(), 1_704_450_600_123);
        assert_eq!(document.get_str("_id").unwrap(), "https://bbc.co.uk/1_1704450600123");
        assert_eq!(document.get_str("publishedAt").unwrap(), "2024-01-05T10:30:00Z");

        assert_eq!(from_stored_document(document).unwrap(), stored);
    }

    // The tests below need a running server:
    // NT_TEST_MONGODB_URI=mongodb://localhost:27017 cargo test -p nt_storage --features mongodb -- --ignored

    async fn live_storage(label: &str) -> MongoStorage {
        let url = std::env::var("NT_TEST_MONGODB_URI").unwrap_or_else(|_| crate::DEFAULT_URL.to_string());
        let config = BackendConfig {
            url,
            database: "nt_storage_test".to_string(),
            collection: format!("{}_{}", label, Utc::now().timestamp_micros()),
        };
        let storage = MongoStorage::connect(&config).await.unwrap();
        storage.ping().await.unwrap();
        storage
    }

    fn articles() -> Vec<Article> {
        serde_json::from_value(json!([
            { "source": { "id": null, "name": "BBC News" }, "url": "https://bbc.co.uk/t2", "publishedAt": "2024-01-02T00:00:00Z" },
            { "source": { "id": null, "name": "BBC Sport" }, "url": "https://bbc.co.uk/t1", "publishedAt": "2024-01-01T00:00:00Z" },
            { "source": { "id": null, "name": "bbc.com" }, "url": "https://bbc.com/t3", "publishedAt": "2024-01-03T00:00:00Z" },
            { "source": { "id": null, "name": "Reuters" }, "url": "https://reuters.com/x", "publishedAt": "2024-01-04T00:00:00Z" }
        ]))
        .unwrap()
    }

    fn urls(page: &StoredPage) -> Vec<&str> {
        page.articles.iter().filter_map(|a| a.article.url.as_deref()).collect()
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_reingest_same_instant_counts_duplicates() {
        let storage = Arc::new(live_storage("duplicates").await);
        let ingestor = Ingestor::new(storage.clone());
        let at = Utc.with_ymd_and_hms(2024, 1, 5, 8, 0, 0).unwrap();

        let first = ingestor.ingest_at(articles(), RawParams::new(), at).await;
        assert_eq!(first.inserted, 4);
        let second = ingestor.ingest_at(articles(), RawParams::new(), at).await;
        assert_eq!((second.inserted, second.duplicates, second.failed), (0, 4, 0));

        let raw = storage.collection().find_one(doc! {}).await.unwrap().unwrap();
        assert!(raw.get_datetime(FETCHED_AT).is_ok());

        storage.collection().drop().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_pages_newest_first() {
        let storage = Arc::new(live_storage("pages").await);
        let ingestor = Ingestor::new(storage.clone());
        ingestor.ingest(articles(), RawParams::new()).await;

        let mut query = StoredQuery { limit: 2, ..Default::default() };
        query.filter.source = Some("bbc".to_string());
        let first = storage.find(&query).await.unwrap();
        assert_eq!(urls(&first), vec!["https://bbc.com/t3", "https://bbc.co.uk/t2"]);
        assert_eq!(first.total, 3);

        query.skip = 2;
        let second = storage.find(&query).await.unwrap();
        assert_eq!(urls(&second), vec!["https://bbc.co.uk/t1"]);
        assert_eq!(second.total, 3);

        storage.collection().drop().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_range_compares_instants() {
        let storage = Arc::new(live_storage("range").await);
        let ingestor = Ingestor::new(storage.clone());
        let batch: Vec<Article> = serde_json::from_value(json!([
            { "source": { "name": "A" }, "url": "https://a.com/edge", "publishedAt": "2024-01-31T00:00:00Z" },
            { "source": { "name": "A" }, "url": "https://a.com/fraction", "publishedAt": "2024-01-31T00:00:00.500Z" },
            { "source": { "name": "A" }, "url": "https://a.com/offset", "publishedAt": "2024-01-31T01:00:00+02:00" },
            { "source": { "name": "A" }, "url": "https://a.com/undated" }
        ]))
        .unwrap();
        ingestor.ingest(batch, RawParams::new()).await;

        let mut params = RawParams::new();
        params.insert("to".to_string(), "2024-01-31".to_string());
        let query = StoredQuery::from_params(&params).unwrap();
        let page = storage.find(&query).await.unwrap();

        let mut found = urls(&page);
        found.sort();
        assert_eq!(found, vec!["https://a.com/edge", "https://a.com/offset"]);
        assert_eq!(page.total, 2);

        storage.collection().drop().await.unwrap();
    }
}
