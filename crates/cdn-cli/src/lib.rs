//! # CDN Gateway
//!
//! HTTP front for files stored in S3 and served through CloudFront.
//!
//! This crate provides:
//! - **File API**: create, replace, delete and read files by key
//! - **Configuration**: CLI flags with environment fallbacks
//! - **Middleware**: request ids, request logging, CORS and body limits
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP Clients                      │
//! │          (browsers, curl, upload scripts)           │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                    CDN Gateway                      │
//! ├─────────────────────────────────────────────────────┤
//! │  Request ID │ Request Logging │ CORS │ Body Limit   │
//! ├─────────────────────────────────────────────────────┤
//! │                  File Handlers                      │
//! │        (POST /, PUT, DELETE and GET /{key})         │
//! ├─────────────────────────────────────────────────────┤
//! │                    cdn-core                         │
//! │       (FileGateway, content sniffing, tokens)       │
//! ├─────────────────────────────────────────────────────┤
//! │                    cdn-store                        │
//! │             (S3, CloudFront, memory)                │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use server::{run_server_with_shutdown, serve};
pub use state::AppState;
