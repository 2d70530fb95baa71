//! Reading ingestion and per-device history

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use patak_common::models::Reading;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::error::ApiResult;
use crate::ingest::IngestOutcome;
use crate::AppState;

/// Readings without a device id are grouped under this key
pub const UNKNOWN_DEVICE: &str = "unknown";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHistoryResponse {
    pub house_id: String,
    pub by_device: BTreeMap<String, Vec<Reading>>,
}

/// POST /api/readings
///
/// Returns `{ok: true}`, or `{ok: true, ignored: true}` for a known test
/// fixture. A missing `house` is a 400.
pub async fn post_reading(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(raw) = payload?;

    let body = match state.ingest.accept(&raw).await? {
        IngestOutcome::Accepted(_) => json!({ "ok": true }),
        IngestOutcome::Ignored { .. } => json!({ "ok": true, "ignored": true }),
    };
    Ok(Json(body))
}

/// GET /api/readings/:house
///
/// Durable history for one house grouped by reporting device.
pub async fn get_device_history(
    State(state): State<AppState>,
    Path(house): Path<String>,
) -> ApiResult<Json<DeviceHistoryResponse>> {
    let house = house.trim().to_lowercase();
    let readings = state.store.history_for(&house).await?;

    let mut by_device: BTreeMap<String, Vec<Reading>> = BTreeMap::new();
    for reading in readings.into_iter().filter(|r| !r.is_test_fixture()) {
        let device = reading
            .device_id
            .clone()
            .unwrap_or_else(|| UNKNOWN_DEVICE.to_string());
        by_device.entry(device).or_default().push(reading);
    }

    Ok(Json(DeviceHistoryResponse {
        house_id: house,
        by_device,
    }))
}
