use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use thiserror::Error;

/// Opaque key/value metadata attached to a stamp.
pub type StampMetadata = serde_json::Map<String, serde_json::Value>;

lazy_static! {
    static ref COLLECTION_ID_REGEX: Result<Regex, regex::Error> =
        Regex::new(r"^[A-Za-z0-9_.:-]+$");
}

/// Identifier of a collection as assigned by the service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionId(String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionIdError {
    #[error("collection id is empty")]
    Empty,
    #[error("collection id is longer than {max} characters")]
    TooLong { max: usize },
    #[error("{0} is not a valid collection id, only letters, digits and `_.:-` are allowed")]
    Match(String),
    #[error("{0} is not a valid collection id, it can't consist of dots only")]
    DotsOnly(String),
    #[error("collection id regex error: {0}")]
    Regex(String),
}

impl CollectionId {
    pub const MAX_LENGTH: usize = 128;

    /// # Errors
    ///
    /// Will fail if `raw` is empty, too long, made of dots only, or contains
    /// characters that can't appear in a collection id.
    pub fn new(raw: &str) -> Result<Self, CollectionIdError> {
        if raw.is_empty() {
            return Err(CollectionIdError::Empty);
        }
        // `.` and `..` would be resolved away as URL path segments.
        if raw.chars().all(|c| c == '.') {
            return Err(CollectionIdError::DotsOnly(raw.to_string()));
        }
        if raw.len() > Self::MAX_LENGTH {
            return Err(CollectionIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let re = COLLECTION_ID_REGEX
            .as_ref()
            .map_err(|e| CollectionIdError::Regex(e.to_string()))?;
        if re.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(CollectionIdError::Match(raw.to_string()))
        }
    }
}

impl TryFrom<String> for CollectionId {
    type Error = CollectionIdError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(&raw)
    }
}

impl From<CollectionId> for String {
    fn from(id: CollectionId) -> Self {
        id.0
    }
}

impl Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CollectionId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}
