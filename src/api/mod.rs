use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Settings;
use crate::models::{AnalysisReport, ApiResponse, MatchDay, MatchRecord};
use crate::services::competitions::CompetitionIndex;
use crate::services::data_fetcher::DataFetcher;
use crate::services::message_builder::format_daily_message;
use crate::services::ranking::analyze_matches;
use crate::snapshot::{load_match_data, SnapshotStore};

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<CompetitionIndex>,
    pub fetcher: Option<Arc<DataFetcher>>,
    pub snapshots: Option<Arc<SnapshotStore>>,
}

impl AppState {
    pub fn from_settings(settings: &Settings, index: CompetitionIndex) -> Self {
        let fetcher = match DataFetcher::new(settings) {
            Ok(fetcher) => Some(Arc::new(fetcher)),
            Err(e) => {
                tracing::warn!("Fixture fetching disabled: {}", e);
                None
            }
        };
        Self {
            index: Arc::new(index),
            fetcher,
            snapshots: Some(Arc::new(SnapshotStore::new(&settings.cache_dir))),
        }
    }
}

pub async fn serve(port: u16, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("oddsbot API server listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/regions", get(get_regions_handler))
        .route("/analysis", post(analyze_handler))
        .route("/predictions", get(get_predictions_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// Health check endpoint
async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("oddsbot API is running"))
}

// GET /regions - Declared regions with their competitions
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSummary {
    pub region: String,
    pub label: String,
    pub competitions: Vec<String>,
}

pub fn region_summaries(index: &CompetitionIndex) -> Vec<RegionSummary> {
    index
        .region_order()
        .iter()
        .map(|region| RegionSummary {
            region: region.clone(),
            label: index.region_label(region).to_string(),
            competitions: index
                .competitions()
                .iter()
                .filter(|competition| &competition.region == region)
                .map(|competition| competition.display_name.clone())
                .collect(),
        })
        .collect()
}

async fn get_regions_handler(State(state): State<AppState>) -> Json<ApiResponse<Vec<RegionSummary>>> {
    Json(ApiResponse::success(region_summaries(&state.index)))
}

// POST /analysis - Analyze posted match records
#[derive(Deserialize)]
#[serde(untagged)]
enum AnalysisRequest {
    Matches(Vec<MatchRecord>),
    Day(MatchDay),
}

async fn analyze_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Json<ApiResponse<AnalysisReport>> {
    let matches = match request {
        AnalysisRequest::Matches(matches) => matches,
        AnalysisRequest::Day(day) => day.matches,
    };
    Json(ApiResponse::success(analyze_matches(&matches, &state.index)))
}

// GET /predictions?date=YYYY-MM-DD - Fetch, fall back to the snapshot, analyze
#[derive(Deserialize)]
struct PredictionsQuery {
    date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionsResponse {
    pub match_data: MatchDay,
    pub analysis: AnalysisReport,
    pub message: String,
    pub used_cache: bool,
}

fn failure<T>(status: StatusCode, message: String) -> (StatusCode, Json<ApiResponse<T>>) {
    (status, Json(ApiResponse::error(message)))
}

async fn get_predictions_handler(
    State(state): State<AppState>,
    Query(params): Query<PredictionsQuery>,
) -> Result<Json<ApiResponse<PredictionsResponse>>, (StatusCode, Json<ApiResponse<PredictionsResponse>>)> {
    let date = match params.date.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| failure(StatusCode::BAD_REQUEST, format!("invalid date {:?}, expected YYYY-MM-DD", raw)))?,
        None => Utc::now().date_naive(),
    };
    let Some(fetcher) = state.fetcher.clone() else {
        return Err(failure(
            StatusCode::SERVICE_UNAVAILABLE,
            "fixture fetching is not configured".to_string(),
        ));
    };

    let index = state.index.clone();
    let result = load_match_data(date, state.snapshots.as_deref(), move || async move {
        fetcher.fetch_matches(date, &index).await
    })
    .await;

    match result {
        Ok((match_data, used_cache)) => {
            let analysis = analyze_matches(&match_data.matches, &state.index);
            let message = format_daily_message(&match_data, &analysis);
            Ok(Json(ApiResponse::success(PredictionsResponse {
                match_data,
                analysis,
                message,
                used_cache,
            })))
        }
        Err(e) => {
            tracing::error!("Failed to fetch fixtures for {}: {}", date, e);
            Err(failure(StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::competitions::tests::sample_index;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(AppState {
            index: Arc::new(sample_index()),
            fetcher: None,
            snapshots: None,
        })
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_regions_follow_declared_order() {
        let response = app()
            .oneshot(Request::builder().uri("/regions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        let regions = body["data"].as_array().unwrap();
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0]["region"], "portugal");
        assert_eq!(regions[0]["competitions"][0], "Liga Portugal");
        assert_eq!(regions[1]["label"], "Inglaterra");
    }

    #[tokio::test]
    async fn test_analysis_accepts_records_and_days() {
        let records = json!([
            {"fixtureId": 1, "competition": {"region": "portugal"},
             "teams": {"home": {"name": "Benfica"}, "away": {"name": "Porto"}},
             "odds": [{"name": "Match Winner", "values": [
                {"value": "Home", "odd": "1.50"}, {"value": "Draw", "odd": "4.00"}, {"value": "Away", "odd": "6.50"}
             ]}]}
        ]);

        for payload in [records.clone(), json!({"date": "2025-10-15", "matches": records})] {
            let response = app()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/analysis")
                        .header("content-type", "application/json")
                        .body(Body::from(payload.to_string()))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = body_json(response).await;
            assert_eq!(body["data"]["totalAnalyzed"], 1);
            assert_eq!(body["data"]["bestMatches"][0]["predictions"]["homeWinProbability"], 67);
            assert_eq!(body["data"]["bestMatches"][0]["recommendedBets"][0], "✅ Favorito: Benfica (67%)");
            assert_eq!(body["data"]["breakdownByRegion"][0]["total"], 1);
        }
    }

    #[tokio::test]
    async fn test_predictions_validation() {
        let response = app()
            .oneshot(Request::builder().uri("/predictions?date=15-10-2025").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("YYYY-MM-DD"));

        let response = app()
            .oneshot(Request::builder().uri("/predictions?date=2025-10-15").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
