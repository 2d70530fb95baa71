//! Billing history

use axum::{
    extract::{Path, Query, State},
    Json,
};
use patak_common::models::BillingPeriod;
use patak_common::time;
use serde::{Deserialize, Serialize};

use crate::billing::{anchor_for, reconcile, BillingView};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub view: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BillingHistoryResponse {
    pub house: String,
    pub view: BillingView,
    pub periods: Vec<BillingPeriod>,
}

fn parse_view(raw: Option<&str>) -> ApiResult<BillingView> {
    match raw.map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("web") => Ok(BillingView::Web),
        Some("mobile") => Ok(BillingView::Mobile),
        Some(other) => Err(ApiError::BadRequest(format!(
            "view must be web or mobile, got {}",
            other
        ))),
    }
}

/// GET /api/billing/history/:house?view=web|mobile
pub async fn billing_history(
    State(state): State<AppState>,
    Path(house): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<BillingHistoryResponse>> {
    let view = parse_view(query.view.as_deref())?;
    let house = house.trim().to_lowercase();
    let now = time::now();

    let readings = state.store.history_for(&house).await?;
    let account = state.store.account_for(&house).await;
    let payments = state.ledger.for_user(&house).await;

    let anchor = anchor_for(account.as_ref(), &readings, now);
    let periods = reconcile(
        &readings,
        anchor,
        &payments,
        view.cycles(&state.config.billing),
        now,
    );

    Ok(Json(BillingHistoryResponse {
        house,
        view,
        periods,
    }))
}
