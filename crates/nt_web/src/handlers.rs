use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use nt_core::{Article, Error, NewsSourceInfo, RawParams, StoredArticle, StoredQuery};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct NewsResponse {
    pub status: &'static str,
    #[serde(rename = "totalResults", skip_serializing_if = "Option::is_none")]
    pub total_results: Option<u64>,
    pub articles: Vec<Article>,
}

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub status: &'static str,
    pub sources: Vec<NewsSourceInfo>,
}

#[derive(Debug, Serialize)]
pub struct StoredNewsResponse {
    pub status: &'static str,
    #[serde(rename = "totalResults")]
    pub total_results: u64,
    pub articles: Vec<StoredArticle>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
}

/// JSON error body: always an `error`, plus a `message` when one is known.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, message: Option<String>) -> Self {
        Self {
            status,
            body: ErrorBody { error: error.into(), message },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// GET /api/news - live fetch from the provider, with a copy persisted in the
/// background.
pub async fn get_news(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RawParams>,
) -> Result<Json<NewsResponse>, ApiError> {
    let query = nt_newsapi::translate_news(&params);
    debug!(endpoint = query.endpoint.path(), params = %query.query_string(), "Fetching live news");

    let page = match state.news.fetch_articles(&query).await {
        Ok(page) => page,
        Err(Error::UpstreamRejected { message, .. }) => {
            return Err(ApiError::new(StatusCode::BAD_REQUEST, message, None));
        }
        Err(e) => {
            error!(error = %e, "News fetch error");
            return Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch news",
                Some(e.detail()),
            ));
        }
    };

    if !page.articles.is_empty() {
        // Not awaited: storage problems must not reach the caller.
        state.ingestor.spawn(page.articles.clone(), params);
    }

    Ok(Json(NewsResponse {
        status: "ok",
        total_results: page.total_results,
        articles: page.articles,
    }))
}

/// GET /api/sources - outlets known to the provider.
pub async fn get_sources(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RawParams>,
) -> Result<Json<SourcesResponse>, ApiError> {
    let query = nt_newsapi::translate_sources(&params);
    match state.news.fetch_sources(&query).await {
        Ok(sources) => Ok(Json(SourcesResponse { status: "ok", sources })),
        Err(e) => {
            error!(error = %e, "Sources fetch error");
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch sources",
                Some(e.detail()),
            ))
        }
    }
}

/// GET /api/news/stored - previously persisted articles.
pub async fn get_stored_news(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RawParams>,
) -> Result<Json<StoredNewsResponse>, ApiError> {
    let query = StoredQuery::from_params(&params)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, "Invalid filter", Some(e.detail())))?;

    let page = state.store.find(&query).await.map_err(|e| match e {
        Error::InvalidFilter(_) => ApiError::new(StatusCode::BAD_REQUEST, "Invalid filter", Some(e.detail())),
        e => {
            error!(error = %e, "Database query error");
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch stored news",
                Some(e.detail()),
            )
        }
    })?;

    Ok(Json(StoredNewsResponse {
        status: "ok",
        total_results: page.total,
        articles: page.articles,
    }))
}

/// GET /api/health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        message: "News API server is running",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
