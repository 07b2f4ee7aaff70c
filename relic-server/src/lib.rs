//! # Relic Server
//!
//! HTTP surface for the Relic appraisal pipeline: photo upload and
//! appraisal, the public shop API over the listing store, and the uploaded
//! photos themselves. The `relic-server` binary also carries the `analyze`,
//! `watch` and `auto` command-line modes.
#![allow(missing_docs)]

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
pub use infra::errors::{AppError, AppResult};
pub use infra::runtime::Runtime;
pub use routes::create_app;
