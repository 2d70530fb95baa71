//! HTTP API handlers for patak-ms

pub mod billing;
pub mod health;
pub mod houses;
pub mod payments;
pub mod readings;
pub mod sse;

pub use billing::billing_history;
pub use health::health_routes;
pub use houses::{get_house, list_houses};
pub use payments::{list_payments, submit_payment, verify_payment};
pub use readings::{get_device_history, post_reading};
pub use sse::event_stream;
