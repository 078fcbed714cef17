// Re-export the API module components
pub use self::{
    client::VBaseApiClient,
    errors::{Cause, ErrorKind, VBaseApiError},
    models::{
        AccountSettings, Collection, IdempotentStampResponse, StampCreatedResponse,
        StampOutcome, StampReceipt, VerificationResult, DEFAULT_MISMATCH_REASON,
    },
    retry::RetryPolicy,
    types::{CollectionId, CollectionIdError, StampMetadata},
};

// Module declarations
mod client;
mod errors;
mod models;
mod retry;
mod types;
