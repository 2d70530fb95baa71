//! Projected house summaries

use axum::{
    extract::{Path, State},
    Json,
};
use patak_common::models::{HouseSummary, Reading};
use patak_common::time;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::projector::ProjectedHouse;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HousesResponse {
    pub summary: BTreeMap<String, ProjectedHouse>,
}

#[derive(Debug, Serialize)]
pub struct HouseDetailResponse {
    pub house: String,
    /// Live log readings, oldest first
    pub history: Vec<Reading>,
    pub latest: Option<HouseSummary>,
}

/// GET /api/houses
pub async fn list_houses(State(state): State<AppState>) -> Json<HousesResponse> {
    let snapshot = state.store.summary_snapshot().await;
    Json(HousesResponse {
        summary: state.projector.project(&snapshot, time::now()),
    })
}

/// GET /api/houses/:house
pub async fn get_house(
    State(state): State<AppState>,
    Path(house): Path<String>,
) -> Json<HouseDetailResponse> {
    let house = house.trim().to_lowercase();
    let history = state.store.live_readings_for(&house).await;
    let latest = state.store.latest_for(&house).await;

    Json(HouseDetailResponse {
        house,
        history,
        latest,
    })
}
