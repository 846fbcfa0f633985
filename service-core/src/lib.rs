//! service-core: shared infrastructure for the membership platform services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
