use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use thiserror::Error;

lazy_static! {
    static ref DIGEST_REGEX: Result<Regex, regex::Error> = Regex::new(r"^(0x|0X)?[a-fA-F0-9]+$");
}

/// SHA-256 content digest, normalized to `0x` followed by 64 lowercase hex
/// characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    #[error("content digest is empty")]
    Empty,
    #[error("{0} is not a hexadecimal digest")]
    Match(String),
    #[error("{raw} has {actual} hex digits, expected {expected}")]
    Length {
        raw: String,
        expected: usize,
        actual: usize,
    },
    #[error("digest regex error: {0}")]
    Regex(String),
}

impl ContentDigest {
    /// Number of hex digits in a SHA-256 digest.
    pub const HEX_LENGTH: usize = 64;

    /// # Errors
    ///
    /// Will fail if `raw` is empty, isn't hexadecimal (an optional `0x`
    /// prefix is allowed) or doesn't hold exactly 32 bytes.
    pub fn new(raw: &str) -> Result<Self, DigestError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DigestError::Empty);
        }

        let re = DIGEST_REGEX
            .as_ref()
            .map_err(|e| DigestError::Regex(e.to_string()))?;
        if !re.is_match(trimmed) {
            return Err(DigestError::Match(raw.to_string()));
        }

        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if hex.len() != Self::HEX_LENGTH {
            return Err(DigestError::Length {
                raw: raw.to_string(),
                expected: Self::HEX_LENGTH,
                actual: hex.len(),
            });
        }

        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    /// Digest of arbitrary content.
    pub fn of(content: impl AsRef<[u8]>) -> Self {
        Self(format!("0x{:x}", Sha256::digest(content.as_ref())))
    }

    /// Hex digits without the `0x` prefix.
    pub fn hex(&self) -> &str {
        &self.0[2..]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = DigestError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(&raw)
    }
}

impl From<ContentDigest> for String {
    fn from(digest: ContentDigest) -> Self {
        digest.0
    }
}

impl std::str::FromStr for ContentDigest {
    type Err = DigestError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::new(raw)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ContentDigest {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}
