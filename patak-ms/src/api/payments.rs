//! Payment submission, listing and verification intake

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use patak_common::models::Payment;
use serde::Serialize;

use crate::error::ApiResult;
use crate::payments::{PaymentSubmission, VerificationOutcome};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub payment: Payment,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentListResponse {
    pub user_id: String,
    pub payments: Vec<Payment>,
}

/// POST /api/payments
pub async fn submit_payment(
    State(state): State<AppState>,
    payload: Result<Json<PaymentSubmission>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PaymentResponse>)> {
    let Json(submission) = payload?;
    let payment = state.ledger.submit(submission).await?;
    Ok((StatusCode::CREATED, Json(PaymentResponse { payment })))
}

/// GET /api/payments/:user_id
pub async fn list_payments(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<PaymentListResponse> {
    let user_id = user_id.trim().to_lowercase();
    let payments = state.ledger.for_user(&user_id).await;
    Json(PaymentListResponse { user_id, payments })
}

/// POST /api/payments/:id/verification
///
/// Outcome reported by the payment verification collaborator. Unknown ids are
/// a 404; a payment that is no longer pending is a 409.
pub async fn verify_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<VerificationOutcome>, JsonRejection>,
) -> ApiResult<Json<PaymentResponse>> {
    let Json(outcome) = payload?;
    let payment = state.ledger.apply_verification(&id, outcome).await?;
    Ok(Json(PaymentResponse { payment }))
}
