//! Key/value entries and range-query options.

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

pub const DEFAULT_LIST_LIMIT: usize = 100;

/// A single key/value pair inside one object's namespace.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Entry {
    pub key: String,
    pub value: Value,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Range query over one namespace, ordered bytewise by key.
///
/// - `start`: inclusive lower bound
/// - `start_after`: exclusive lower bound (cannot be combined with `start`)
/// - `end`: exclusive upper bound
/// - `prefix`: only keys beginning with this string
/// - `reverse`: descending order, defaults to `false`
/// - `limit`: maximum entries returned, defaults to 100; `0`, `null` and
///   numeric strings are accepted on the wire, `0` meaning the default
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub start_after: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default = "default_limit", deserialize_with = "deserialize_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

fn deserialize_limit<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawLimit {
        Number(usize),
        Text(String),
    }

    let limit = match Option::<RawLimit>::deserialize(deserializer)? {
        None => 0,
        Some(RawLimit::Number(n)) => n,
        Some(RawLimit::Text(text)) => text.trim().parse().map_err(de::Error::custom)?,
    };
    Ok(if limit == 0 { DEFAULT_LIST_LIMIT } else { limit })
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            start: None,
            start_after: None,
            end: None,
            prefix: None,
            reverse: false,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl ListOptions {
    /// Whether `key` falls inside every bound except `limit`.
    pub fn matches(&self, key: &str) -> bool {
        if let Some(start) = &self.start {
            if key < start.as_str() {
                return false;
            }
        }
        if let Some(after) = &self.start_after {
            if key <= after.as_str() {
                return false;
            }
        }
        if let Some(end) = &self.end {
            if key >= end.as_str() {
                return false;
            }
        }
        self.prefix
            .as_deref()
            .is_none_or(|prefix| key.starts_with(prefix))
    }
}
