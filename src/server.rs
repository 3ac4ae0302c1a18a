//! HTTP surface: health, the public match browser and the analysis endpoint.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::analysis::{self, MatchupRequest};
use crate::browse;
use crate::error::{IngestError, Result};
use crate::store::FootballStore;
use crate::upstream::GeminiClient;

pub struct AppState<S: ?Sized> {
    pub store: Arc<S>,
    pub gemini: Option<Arc<GeminiClient>>,
}

// Derived Clone would require `S: Clone`.
impl<S: ?Sized> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            gemini: self.gemini.clone(),
        }
    }
}

/// Error body for failed requests.
pub struct ApiError(IngestError);

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            IngestError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            IngestError::NotFound(_) => StatusCode::NOT_FOUND,
            IngestError::NoData { .. } => StatusCode::BAD_GATEWAY,
            IngestError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn health_handler<S: FootballStore + ?Sized + 'static>(
    State(state): State<AppState<S>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let database = state.store.ping().await;
    if let Err(e) = &database {
        error!("Health check database ping failed: {}", e);
    }

    let http_status = if database.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(json!({
            "service": "football-ingestion",
            "version": env!("CARGO_PKG_VERSION"),
            "status": if database.is_ok() { "ok" } else { "degraded" },
            "database": database.is_ok(),
            "analysis": state.gemini.is_some(),
        })),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct MatchesQuery {
    pub date: Option<String>,
}

/// `YYYY-MM-DD`; anything else means today.
fn requested_day(query: &MatchesQuery) -> NaiveDate {
    let today = Utc::now().date_naive();
    match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap_or_else(|_| {
            warn!("Invalid date '{}' requested, showing today", text);
            today
        }),
        None => today,
    }
}

async fn matches_handler<S: FootballStore + ?Sized + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<MatchesQuery>,
) -> std::result::Result<Json<browse::MatchDay>, ApiError> {
    let day = browse::matches_for_day(state.store.as_ref(), requested_day(&query)).await?;
    Ok(Json(day))
}

async fn analysis_handler<S: FootballStore + ?Sized + 'static>(
    State(state): State<AppState<S>>,
    Json(request): Json<MatchupRequest>,
) -> std::result::Result<Json<analysis::Analysis>, ApiError> {
    let gemini = state.gemini.as_ref().ok_or_else(|| {
        IngestError::Config("analysis is not configured (GEMINI_API_KEY missing)".to_string())
    })?;
    let result = analysis::analyze(state.store.as_ref(), gemini, &request).await?;
    Ok(Json(result))
}

pub fn router<S: FootballStore + ?Sized + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health_handler::<S>))
        .route("/matches", get(matches_handler::<S>))
        .route("/analysis", post(analysis_handler::<S>))
        .with_state(state)
}

pub async fn serve<S: FootballStore + ?Sized + 'static>(state: AppState<S>, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router(state))
        .await
        .context("HTTP server stopped")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState {
            store: Arc::new(MemoryStore::new()),
            gemini: None,
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_database() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["analysis"], false);
    }

    #[tokio::test]
    async fn matches_for_explicit_and_invalid_dates() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/matches?date=2025-03-01")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["date"], "2025-03-01");
        assert_eq!(body["counts"]["total"], 0);

        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/matches?date=yesterday")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["date"], Utc::now().date_naive().to_string());
    }

    #[tokio::test]
    async fn analysis_without_key_is_unavailable() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/analysis")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"home":"Arsenal","away":"Everton"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn day_parsing() {
        let query = MatchesQuery { date: Some("2024-02-29".to_string()) };
        assert_eq!(requested_day(&query), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let query = MatchesQuery { date: Some("2023-02-29".to_string()) };
        assert_eq!(requested_day(&query), Utc::now().date_naive());
    }
}
