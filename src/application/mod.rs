//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Cache store (digest-keyed entries behind one lock)
//! - Dedup engine (hot-path decisions and lifecycle)
//! - Sweeper (periodic eviction and summary emission)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod config;
pub mod engine;
pub mod metrics;
pub mod ports;
pub(crate) mod store;
pub(crate) mod sweeper;
