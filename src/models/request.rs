//! Wire shape of a dispatch request and its typed form.

use super::{
    entry::{Entry, ListOptions},
    object_id::ObjectId,
};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Raw JSON body posted to the dispatch endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct DispatchRequest {
    pub method: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub entries: Option<Vec<Entry>>,
    #[serde(default)]
    pub keys: Option<Vec<String>>,
    #[serde(default)]
    pub options: Option<ListOptions>,
}

/// Why a request body could not be turned into a [`Command`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("missing method")]
    MissingMethod,
    #[error("unknown method `{0}`")]
    UnknownMethod(String),
    #[error("missing object id or name")]
    MissingTarget,
    #[error("invalid object id: {0}")]
    InvalidId(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
}

/// How a non-create request names its object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Name(String),
    Id(ObjectId),
}

impl Target {
    pub fn resolve(&self) -> ObjectId {
        match self {
            Self::Name(name) => ObjectId::from_name(name),
            Self::Id(id) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Single(Entry),
    Many(Vec<Entry>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOp {
    Single(String),
    Many(Vec<String>),
}

/// Operation against an existing object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectOp {
    Write(WriteOp),
    Read(String),
    List(ListOptions),
    Delete(DeleteOp),
    Purge,
}

impl ObjectOp {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Write(_) => "write",
            Self::Read(_) => "read",
            Self::List(_) => "list",
            Self::Delete(_) => "delete",
            Self::Purge => "purge",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create { name: Option<String> },
    Object { target: Target, op: ObjectOp },
}

impl TryFrom<DispatchRequest> for Command {
    type Error = RequestError;

    fn try_from(req: DispatchRequest) -> Result<Self, Self::Error> {
        let method = req.method.ok_or(RequestError::MissingMethod)?;

        if method == "create" {
            let name = req.name.filter(|name| !name.is_empty());
            return Ok(Command::Create { name });
        }

        let op = match method.as_str() {
            "write" => ObjectOp::Write(match req.entries {
                Some(entries) => WriteOp::Many(entries),
                None => {
                    let key = req.key.ok_or(RequestError::MissingField("key"))?;
                    let value = req
                        .value
                        .filter(|v| !v.is_null())
                        .ok_or(RequestError::MissingField("value"))?;
                    WriteOp::Single(Entry::new(key, value))
                }
            }),
            "read" => ObjectOp::Read(req.key.ok_or(RequestError::MissingField("key"))?),
            "list" => ObjectOp::List(req.options.unwrap_or_default()),
            "delete" => ObjectOp::Delete(match req.keys {
                Some(keys) => DeleteOp::Many(keys),
                None => DeleteOp::Single(req.key.ok_or(RequestError::MissingField("key"))?),
            }),
            "purge" => ObjectOp::Purge,
            _ => return Err(RequestError::UnknownMethod(method)),
        };

        let target = match (req.name.filter(|n| !n.is_empty()), req.id) {
            (Some(name), _) => Target::Name(name),
            (None, Some(id)) => Target::Id(
                id.parse()
                    .map_err(|err: super::object_id::ObjectIdError| {
                        RequestError::InvalidId(err.to_string())
                    })?,
            ),
            (None, None) => return Err(RequestError::MissingTarget),
        };

        Ok(Command::Object { target, op })
    }
}
