//! Server module
//!
//! Configuration loading and wiring of the ingestion pipeline behind the
//! HTTP surface.

pub mod config;
pub mod init;
pub mod loader;

pub use init::run;
