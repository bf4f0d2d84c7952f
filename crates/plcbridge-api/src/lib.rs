//! `plcbridge-api` – HTTP surface over the bridge core.
//!
//! Boots an axum HTTP server (default port `8080`) that:
//!
//! 1. **Answers** latest/all temperature queries and the latest device status
//!    from the [`QueryService`].
//! 2. **Accepts** `POST /api/wago/control` and forwards the code through the
//!    [`CommandPublisher`].
//! 3. **Reports** store connectivity and counts at `/api/health`.
//!
//! [`routes`] builds the [`axum::Router`] (handlers, CORS, body limit) and is
//! tested in-process with `tower::ServiceExt::oneshot`; [`server`] binds the
//! listener and hands it to `axum::serve`.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use plcbridge_api::{ApiServer, ApiState};
//! # fn state() -> ApiState { unimplemented!() }
//!
//! #[tokio::main]
//! async fn main() {
//!     ApiServer::new(Arc::new(state()))
//!         .with_port(8080)
//!         .run()
//!         .await
//!         .expect("api server failed");
//! }
//! ```
//!
//! [`QueryService`]: plcbridge_core::QueryService
//! [`CommandPublisher`]: plcbridge_core::CommandPublisher

pub mod routes;
pub mod server;

pub use routes::{ApiState, MAX_BODY_BYTES, router};
pub use server::{ApiServer, DEFAULT_PORT, serve};
