//! Payment ledger
//!
//! Records payment submissions and the verification outcomes reported by the
//! external payment collaborator. The ledger never decides whether a payment
//! is genuine; it only enforces the lifecycle:
//!
//! - submissions start as `pending_verification`
//! - only a pending payment can move to `verified` or `rejected`
//! - a settled payment, and its locked consumption, never change again

use patak_common::models::{Payment, PaymentStatus};
use patak_common::{time, Error, Result};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::{keys, Storage};
use crate::store::decode_list;

/// User-facing payment submission
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSubmission {
    pub user_id: String,
    pub amount: f64,
    pub billing_month: u32,
    pub billing_year: i32,
    pub reference_number: String,
    #[serde(default)]
    pub payment_date: Option<String>,
}

/// Outcome reported by the payment verification collaborator
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub status: PaymentStatus,
    /// Consumption billed for the period, frozen with the verification
    #[serde(default)]
    pub locked_consumption: Option<f64>,
}

pub struct PaymentLedger {
    storage: Arc<dyn Storage>,
    payments: RwLock<Vec<Payment>>,
}

impl PaymentLedger {
    /// Load persisted payments, skipping malformed records with a warning
    pub async fn load(storage: Arc<dyn Storage>) -> Result<Self> {
        let payments: Vec<Payment> = decode_list(storage.get(keys::PAYMENTS).await?, keys::PAYMENTS);
        info!("Payment ledger loaded: {} payments", payments.len());

        Ok(Self {
            storage,
            payments: RwLock::new(payments),
        })
    }

    /// Record a new submission as `pending_verification`
    pub async fn submit(&self, submission: PaymentSubmission) -> Result<Payment> {
        let user_id = submission.user_id.trim().to_lowercase();
        if user_id.is_empty() {
            return Err(Error::Validation("userId required".to_string()));
        }
        if !(1..=12).contains(&submission.billing_month) {
            return Err(Error::Validation(format!(
                "billingMonth must be 1-12, got {}",
                submission.billing_month
            )));
        }
        if !submission.amount.is_finite() || submission.amount <= 0.0 {
            return Err(Error::Validation("amount must be positive".to_string()));
        }
        let reference_number = submission.reference_number.trim().to_string();
        if reference_number.is_empty() {
            return Err(Error::Validation("referenceNumber required".to_string()));
        }

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            user_id,
            amount: submission.amount,
            billing_month: submission.billing_month,
            billing_year: submission.billing_year,
            reference_number,
            status: PaymentStatus::PendingVerification,
            locked_consumption: None,
            payment_date: submission.payment_date,
            created_at: time::format_timestamp(time::now()),
        };

        let mut payments = self.payments.write().await;
        let mut next = payments.clone();
        next.push(payment.clone());
        self.persist(&next).await?;
        *payments = next;

        info!(
            "Payment {} submitted for {} {}/{}",
            payment.id, payment.user_id, payment.billing_month, payment.billing_year
        );
        Ok(payment)
    }

    /// Apply the collaborator's verification outcome
    pub async fn apply_verification(
        &self,
        payment_id: &str,
        outcome: VerificationOutcome,
    ) -> Result<Payment> {
        if !matches!(outcome.status, PaymentStatus::Verified | PaymentStatus::Rejected) {
            return Err(Error::Validation(
                "status must be verified or rejected".to_string(),
            ));
        }
        if let Some(locked) = outcome.locked_consumption {
            if !locked.is_finite() || locked < 0.0 {
                return Err(Error::Validation(
                    "lockedConsumption must be a non-negative number".to_string(),
                ));
            }
        }

        let mut payments = self.payments.write().await;
        let index = payments
            .iter()
            .position(|p| p.id == payment_id)
            .ok_or_else(|| Error::NotFound(format!("payment {}", payment_id)))?;

        let current = &payments[index];
        if current.status != PaymentStatus::PendingVerification {
            warn!(
                "Refusing to move payment {} from {:?} to {:?}",
                payment_id, current.status, outcome.status
            );
            return Err(Error::Conflict(format!(
                "payment {} is no longer pending verification",
                payment_id
            )));
        }

        let mut updated = current.clone();
        updated.status = outcome.status;
        if outcome.status == PaymentStatus::Verified {
            updated.locked_consumption = outcome.locked_consumption;
        }

        let mut next = payments.clone();
        next[index] = updated.clone();
        self.persist(&next).await?;
        *payments = next;

        info!("Payment {} is now {:?}", payment_id, updated.status);
        Ok(updated)
    }

    /// Payments for one house account in submission order
    pub async fn for_user(&self, user_id: &str) -> Vec<Payment> {
        let user_id = user_id.to_lowercase();
        self.payments
            .read()
            .await
            .iter()
            .filter(|p| p.user_id.to_lowercase() == user_id)
            .cloned()
            .collect()
    }

    async fn persist(&self, payments: &[Payment]) -> Result<()> {
        self.storage
            .put(keys::PAYMENTS, &serde_json::to_value(payments)?)
            .await
    }
}
