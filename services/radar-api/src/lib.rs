//! MRMS reflectivity overlay service.
//!
//! Exposes the service internals for the binary and the integration tests.

pub mod config;
pub mod decompress;
pub mod handlers;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod source;
pub mod state;

pub use pipeline::{RadarService, RenderOutcome, Stage};
pub use server::create_router;
pub use source::{HttpSourceClient, SourceClient};
pub use state::AppState;
