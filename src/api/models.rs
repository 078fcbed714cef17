use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::types::{CollectionId, StampMetadata};
use crate::digest::ContentDigest;

/// Reason reported when the service says a digest doesn't verify but
/// doesn't say why.
pub const DEFAULT_MISMATCH_REASON: &str = "no stamp found for digest in collection";

#[derive(Debug, Deserialize)]
pub(crate) struct Error {
    pub error: String,
}

/// A named grouping of stamps owned by one account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Collection {
    id: CollectionId,
    name: String,
    #[serde(default)]
    description: Option<String>,
    owner_id: String,
    created_at: DateTime<Utc>,
}

impl Collection {
    pub const fn id(&self) -> &CollectionId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CollectionList {
    pub collections: Vec<Collection>,
}

/// Fields shared by every stamp the service reports.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StampReceipt {
    stamp_id: String,
    collection_id: CollectionId,
    content_digest: ContentDigest,
    created_at: DateTime<Utc>,
    #[serde(default)]
    metadata: Option<StampMetadata>,
}

impl StampReceipt {
    pub fn stamp_id(&self) -> &str {
        &self.stamp_id
    }

    pub const fn collection_id(&self) -> &CollectionId {
        &self.collection_id
    }

    pub const fn content_digest(&self) -> &ContentDigest {
        &self.content_digest
    }

    /// When the stamp was first recorded.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub const fn metadata(&self) -> Option<&StampMetadata> {
        self.metadata.as_ref()
    }
}

/// A stamp recorded for the first time by this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampCreatedResponse {
    receipt: StampReceipt,
}

impl StampCreatedResponse {
    pub const fn receipt(&self) -> &StampReceipt {
        &self.receipt
    }

    pub fn into_receipt(self) -> StampReceipt {
        self.receipt
    }
}

/// A stamp request that matched an earlier identical submission. The receipt
/// is the original record, including its original creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotentStampResponse {
    receipt: StampReceipt,
}

impl IdempotentStampResponse {
    pub const fn receipt(&self) -> &StampReceipt {
        &self.receipt
    }

    pub fn into_receipt(self) -> StampReceipt {
        self.receipt
    }
}

/// Outcome of `create_stamp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StampOutcome {
    Created(StampCreatedResponse),
    Idempotent(IdempotentStampResponse),
}

impl StampOutcome {
    pub const fn receipt(&self) -> &StampReceipt {
        match self {
            Self::Created(created) => created.receipt(),
            Self::Idempotent(existing) => existing.receipt(),
        }
    }

    pub fn into_receipt(self) -> StampReceipt {
        match self {
            Self::Created(created) => created.into_receipt(),
            Self::Idempotent(existing) => existing.into_receipt(),
        }
    }

    pub const fn is_idempotent(&self) -> bool {
        matches!(self, Self::Idempotent(_))
    }
}

/// Stamp body as sent by the service. `idempotent` is optional on the wire,
/// in which case the HTTP status decides: 200 replays an existing stamp and
/// 201 reports a new one.
#[derive(Debug, Deserialize)]
pub(crate) struct StampRecord {
    #[serde(flatten)]
    pub receipt: StampReceipt,
    #[serde(default)]
    pub idempotent: Option<bool>,
}

impl StampRecord {
    pub fn into_outcome(self, status: StatusCode) -> StampOutcome {
        let idempotent = self.idempotent.unwrap_or(status == StatusCode::OK);
        if idempotent {
            StampOutcome::Idempotent(IdempotentStampResponse {
                receipt: self.receipt,
            })
        } else {
            StampOutcome::Created(StampCreatedResponse {
                receipt: self.receipt,
            })
        }
    }
}

/// Answer to a verification query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "VerificationRecord")]
pub struct VerificationResult {
    verified: bool,
    stamp: Option<StampReceipt>,
    reason: Option<String>,
}

impl VerificationResult {
    pub const fn is_verified(&self) -> bool {
        self.verified
    }

    /// The stamp that matched, if any.
    pub const fn matched_stamp(&self) -> Option<&StampReceipt> {
        self.stamp.as_ref()
    }

    /// Why verification failed. Always present when `is_verified` is false.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct VerificationRecord {
    verified: bool,
    #[serde(default)]
    stamp: Option<StampReceipt>,
    #[serde(default)]
    reason: Option<String>,
}

impl From<VerificationRecord> for VerificationResult {
    fn from(record: VerificationRecord) -> Self {
        let reason = if record.verified {
            record.reason
        } else {
            record
                .reason
                .filter(|reason| !reason.trim().is_empty())
                .or_else(|| Some(DEFAULT_MISMATCH_REASON.to_owned()))
        };

        Self {
            verified: record.verified,
            stamp: record.stamp,
            reason,
        }
    }
}

/// Account level configuration, read-only from the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountSettings {
    account_id: String,
    #[serde(default)]
    api_key_scopes: Vec<String>,
    #[serde(default)]
    default_collection_id: Option<CollectionId>,
    #[serde(default)]
    rate_limit_per_minute: Option<u32>,
    #[serde(default)]
    stamp_quota_remaining: Option<u64>,
}

impl AccountSettings {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn api_key_scopes(&self) -> &[String] {
        &self.api_key_scopes
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.api_key_scopes.iter().any(|s| s == scope)
    }

    pub const fn default_collection_id(&self) -> Option<&CollectionId> {
        self.default_collection_id.as_ref()
    }

    pub const fn rate_limit_per_minute(&self) -> Option<u32> {
        self.rate_limit_per_minute
    }

    pub const fn stamp_quota_remaining(&self) -> Option<u64> {
        self.stamp_quota_remaining
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateCollectionRequest<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateStampRequest<'a> {
    pub collection_id: &'a CollectionId,
    pub content_digest: &'a ContentDigest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<&'a StampMetadata>,
}

#[derive(Debug, Serialize)]
pub(crate) struct VerifyStampRequest<'a> {
    pub collection_id: &'a CollectionId,
    pub content_digest: &'a ContentDigest,
}
