//! Object identifiers and their derivation.
//!
//! Two identifier spaces exist and never overlap:
//! - **Named**: SHA-256 of a caller-supplied name, rendered as 64 lowercase hex
//!   characters. The same name always yields the same identifier.
//! - **Random**: a v4 UUID rendered in its 32-character simple form.
//!
//! The string form is what crosses the storage boundary and the wire.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

/// Domain separator mixed into every name hash.
const NAME_DOMAIN: &[u8] = b"durable-kv/object-name/v1:";

const NAMED_LEN: usize = 64;
const RANDOM_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectIdError {
    #[error("object id must be 32 or 64 lowercase hex characters, got {0} characters")]
    InvalidLength(usize),
    #[error("object id contains non-hex characters")]
    InvalidCharacters,
}

/// Opaque identifier naming one isolated key/value namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectId {
    Named([u8; 32]),
    Random(Uuid),
}

impl ObjectId {
    /// Derive an identifier: deterministic for a non-empty name, random otherwise.
    pub fn derive(name: Option<&str>) -> Self {
        match name {
            Some(name) if !name.is_empty() => Self::from_name(name),
            _ => Self::random(),
        }
    }

    pub fn from_name(name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(NAME_DOMAIN);
        hasher.update(name.as_bytes());
        Self::Named(hasher.finalize().into())
    }

    pub fn random() -> Self {
        Self::Random(Uuid::new_v4())
    }

    pub fn is_named(&self) -> bool {
        matches!(self, Self::Named(_))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(digest) => f.write_str(&hex::encode(digest)),
            Self::Random(uuid) => write!(f, "{}", uuid.simple()),
        }
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(ObjectIdError::InvalidCharacters);
        }
        match s.len() {
            NAMED_LEN => {
                let mut digest = [0u8; 32];
                hex::decode_to_slice(s, &mut digest)
                    .map_err(|_| ObjectIdError::InvalidCharacters)?;
                Ok(Self::Named(digest))
            }
            RANDOM_LEN => Uuid::try_parse(s)
                .map(Self::Random)
                .map_err(|_| ObjectIdError::InvalidCharacters),
            other => Err(ObjectIdError::InvalidLength(other)),
        }
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
