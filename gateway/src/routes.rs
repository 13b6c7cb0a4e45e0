use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use beacon_sim::{RelaySource, SimError, SimulationConfig, SimulationResult};
use chrono::{DateTime, Utc};
use orbital_mechanics::ElementSet;
use relay_catalog::parse_tle_text;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::AppState;

pub type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl ToString) -> ApiError {
    (status, Json(json!({ "error": message.to_string() })))
}

fn sim_error(e: SimError) -> ApiError {
    let status = match &e {
        e if e.is_invalid_input() => StatusCode::BAD_REQUEST,
        SimError::NoUsableRelayData => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e)
}

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/relays", get(list_relays))
        .route("/simulations", post(create_simulation))
        .with_state(state)
}

#[derive(Deserialize)]
pub struct RelaysQuery {
    /// Epoch for the built-in constellation (default: now)
    pub epoch: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaysResponse {
    pub epoch: DateTime<Utc>,
    pub count: usize,
    pub relays: Vec<ElementSet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    #[serde(flatten)]
    pub config: SimulationConfig,
    pub start_time: Option<DateTime<Utc>>,
    /// Inline TLE text used instead of the relay catalog
    pub relay_tle: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResponse {
    pub run_id: Uuid,
    #[serde(flatten)]
    pub result: SimulationResult,
}

pub async fn list_relays(
    State(state): State<AppState>,
    Query(query): Query<RelaysQuery>,
) -> Json<RelaysResponse> {
    let epoch = query.epoch.unwrap_or_else(Utc::now);
    let relays = state.catalog.fetch_relay_element_sets(epoch).await;

    Json(RelaysResponse {
        epoch,
        count: relays.len(),
        relays,
    })
}

pub async fn create_simulation(
    State(state): State<AppState>,
    Json(request): Json<SimulationRequest>,
) -> Result<Json<SimulationResponse>, ApiError> {
    let run_id = Uuid::new_v4();
    request.config.validate().map_err(sim_error)?;
    let start = request.start_time.unwrap_or_else(Utc::now);

    let relays = match &request.relay_tle {
        Some(text) => parse_tle_text(text).element_sets,
        None => state.catalog.fetch_relay_element_sets(start).await,
    };
    tracing::info!("Run {}: {} relay element sets", run_id, relays.len());

    let config = request.config;
    let result = tokio::task::spawn_blocking(move || beacon_sim::run(&config, &relays, Some(start)))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?
        .map_err(sim_error)?;

    Ok(Json(SimulationResponse { run_id, result }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use relay_catalog::{RelayCatalog, RelayCatalogConfig};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn offline_app() -> Router {
        let catalog = RelayCatalog::new(RelayCatalogConfig::offline()).unwrap();
        app(AppState {
            catalog: Arc::new(catalog),
        })
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = offline_app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    fn post_json(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/simulations")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_list_relays_offline() {
        let (status, body) = send(
            Request::get("/api/v1/relays?epoch=2025-03-20T00:00:00Z")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 66);
        assert_eq!(body["relays"][0]["name"], "IRIDIUM-P1-S1");
    }

    #[tokio::test]
    async fn test_create_simulation() {
        let (status, body) = send(post_json(json!({
            "beaconIntent": {"kind": "sunSynchronous", "altitudeKm": 700, "localSolarTimeHours": 10.5},
            "durationHours": 0.5,
            "startTime": "2025-03-20T00:00:00Z"
        })))
        .await;

        assert_eq!(status, StatusCode::OK, "{}", body);
        assert!(body["runId"].is_string());
        assert_eq!(body["relayCount"], 66);
        assert_eq!(body["stepsSimulated"].as_u64().unwrap() + body["stepsSkipped"].as_u64().unwrap(), 31);
        assert!(body["blackoutStatistics"]["numberOfBlackouts"].is_u64());
    }

    #[tokio::test]
    async fn test_invalid_intent_is_bad_request() {
        let (status, body) = send(post_json(json!({
            "beaconIntent": {"kind": "sunSynchronous", "altitudeKm": -10, "localSolarTimeHours": 10.5}
        })))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid orbit parameters"));
    }

    #[tokio::test]
    async fn test_oversized_run_is_bad_request() {
        let (status, body) = send(post_json(json!({
            "beaconIntent": {"kind": "sunSynchronous", "altitudeKm": 700, "localSolarTimeHours": 10.5},
            "durationHours": 2000,
            "timeStepSeconds": 0.001
        })))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("steps"));
    }

    #[tokio::test]
    async fn test_unusable_relays_is_unprocessable() {
        let (status, body) = send(post_json(json!({
            "beaconIntent": {"kind": "nonPolar", "altitudeKm": 550, "inclinationDeg": 53},
            "durationHours": 0.1,
            "relayTle": "not a catalog"
        })))
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].is_string());
    }
}
