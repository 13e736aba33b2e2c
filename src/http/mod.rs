//! HTTP surface: health, map and room lookup, WebSocket upgrade

pub mod routes;

pub use routes::{build_router, AppError};
