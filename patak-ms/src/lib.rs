//! patak-ms library - Patak metering service
//!
//! Ingests readings from household water meters, keeps the per-house
//! summary and live log, streams updates to dashboards and reconciles
//! billing periods against payments.

use axum::Router;
use patak_common::config::TomlConfig;
use patak_common::Result;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod billing;
pub mod broadcaster;
pub mod error;
pub mod ingest;
pub mod payments;
pub mod projector;
pub mod storage;
pub mod store;

use broadcaster::Broadcaster;
use ingest::IngestFilter;
use payments::PaymentLedger;
use projector::SummaryProjector;
use storage::Storage;
use store::MeterStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MeterStore>,
    pub ledger: Arc<PaymentLedger>,
    pub broadcaster: Arc<Broadcaster>,
    pub ingest: Arc<IngestFilter>,
    pub projector: SummaryProjector,
    pub config: Arc<TomlConfig>,
}

impl AppState {
    /// Load persisted state from `storage` and wire the components together
    pub async fn load(storage: Arc<dyn Storage>, config: TomlConfig) -> Result<Self> {
        let store = Arc::new(MeterStore::load(Arc::clone(&storage)).await?);
        let ledger = Arc::new(PaymentLedger::load(storage).await?);
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&store), config.live.clone()));
        let ingest = Arc::new(IngestFilter::new(Arc::clone(&store), Arc::clone(&broadcaster)));

        Ok(Self {
            projector: SummaryProjector::new(config.live.online_window_secs),
            store,
            ledger,
            broadcaster,
            ingest,
            config: Arc::new(config),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let api = Router::new()
        .route("/api/readings", post(api::post_reading))
        .route("/api/readings/:house", get(api::get_device_history))
        .route("/api/houses", get(api::list_houses))
        .route("/api/houses/:house", get(api::get_house))
        .route("/api/stream", get(api::event_stream))
        .route("/api/billing/history/:house", get(api::billing_history))
        .route("/api/payments", post(api::submit_payment))
        .route("/api/payments/:id", get(api::list_payments))
        .route("/api/payments/:id/verification", post(api::verify_payment));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Dashboards are served from other origins
        .layer(CorsLayer::permissive())
}
