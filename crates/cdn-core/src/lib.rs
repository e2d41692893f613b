//! # CDN Core
//!
//! Write/read consistency orchestration for the CDN gateway.
//!
//! This crate provides:
//! - **FileGateway**: create, replace, delete and read files by key
//! - **Content sniffing**: media type detection from the first 512 bytes
//! - **Invalidation tokens**: process-unique caller references for the edge
//! - **Keys**: validated object keys and their edge paths
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! ├─────────────────────────────────────────┤
//! │              FileGateway                │
//! ├───────────────┬─────────────┬───────────┤
//! │ContentSniffer │ ObjectStore │ EdgeCache │
//! └───────────────┴─────────────┴───────────┘
//! ```
//!
//! Writes go to the object store first. Replace and Delete then invalidate
//! the key's edge path; a failed invalidation is reported on the result
//! but never undoes or fails the write.

pub mod error;
pub mod gateway;
pub mod key;
pub mod sniff;
pub mod token;

pub use error::{GatewayError, Result};
pub use gateway::{FileDownload, FileGateway, Invalidation, WriteOutcome};
pub use key::{Key, MAX_KEY_LEN};
pub use sniff::{ContentSniffer, Sniffed, OCTET_STREAM, SNIFF_LEN};
pub use token::next_invalidation_token;
