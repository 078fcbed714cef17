//! # vBase API
//!
//! A blocking Rust client for the vBase stamping service. A stamp binds the
//! SHA-256 digest of some content to a collection at a point in time, so the
//! content can later be shown to have existed, unchanged, at that time.
//!
//! ## Features
//!
//! - **Idempotent stamping**: re-submitting a (collection, digest) pair
//!   returns the original stamp instead of creating a duplicate
//! - **Verification**: check whether a digest is stamped in a collection
//! - **Typed results**: first-time and replayed stamps are distinct variants
//! - **Error Handling**: one closed error type with retryability and suggestions
//! - **Retry**: exponential backoff for transient failures
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use vbase_api::{config::ClientConfig, VBaseApiClient};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = VBaseApiClient::new(ClientConfig::from_env()?)?;
//!
//! let outcome = client.stamp_content("reports", std::fs::read("q3.pdf")?, None)?;
//! println!("stamp id: {}", outcome.receipt().stamp_id());
//!
//! let result = client.verify_stamp("reports", outcome.receipt().content_digest())?;
//! assert!(result.is_verified());
//! # Ok(())
//! # }
//! ```

/// API client, result types and error taxonomy
pub mod api;

/// Client configuration from code, environment or TOML
pub mod config;

/// SHA-256 content digests
pub mod digest;

/// HTTP failure details kept as error causes
pub mod errors;

pub use api::{
    AccountSettings, Collection, IdempotentStampResponse, StampCreatedResponse, VBaseApiClient,
    VBaseApiError, VerificationResult,
};
