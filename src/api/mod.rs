//! Web API module for Eventscope
//!
//! Provides REST API endpoints for:
//! - Event listing, search, and live streaming
//! - Health and readiness probes
//! - Prometheus metrics

pub mod docs;
pub mod events;
pub mod health;

pub use docs::docs_routes;
pub use events::events_routes;
pub use health::health_routes;
