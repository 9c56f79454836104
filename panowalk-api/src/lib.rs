//! Panowalk API - HTTP Adapter
//!
//! Thin Axum layer over the session engine, cache, and preloader. Handlers
//! translate between wire DTOs and engine transitions; all state lives in
//! the crates below. Engine transitions run on the blocking pool because
//! they do renderer CPU work and synchronous log writes.

#[macro_use]
mod macros;

pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult, ErrorKind};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
