use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Requested breadth of a retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DagScope {
    /// The entire DAG under the root.
    All,
    /// The root block only. The cheapest existence probe.
    Block,
    /// The entity (file) under the root, optionally narrowed by `entity-bytes`.
    #[default]
    Entity,
}

impl DagScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            DagScope::All => "all",
            DagScope::Block => "block",
            DagScope::Entity => "entity",
        }
    }
}

impl fmt::Display for DagScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for DagScope {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(DagScope::All),
            "block" => Ok(DagScope::Block),
            "entity" => Ok(DagScope::Entity),
            other => Err(ParseError::DagScope(other.to_string())),
        }
    }
}

/// Retrieval transport advertised for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Graphsync,
    Bitswap,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Graphsync => "graphsync",
            Protocol::Bitswap => "bitswap",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Protocol {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "graphsync" => Ok(Protocol::Graphsync),
            "bitswap" => Ok(Protocol::Bitswap),
            other => Err(ParseError::Protocol(other.to_string())),
        }
    }
}

/// Byte range qualifier for `entity` scoped retrievals, rendered as
/// `<start>:<end>` or `<start>:*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityBytesRange {
    pub start: u64,
    /// Inclusive end; `None` reads to the end of the entity.
    pub end:   Option<u64>,
}

impl EntityBytesRange {
    pub fn new(start: u64, end: Option<u64>) -> Self { Self { start, end } }
}

impl Default for EntityBytesRange {
    fn default() -> Self { Self::new(0, Some(200)) }
}

impl fmt::Display for EntityBytesRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}:{}", self.start, end),
            None => write!(f, "{}:*", self.start),
        }
    }
}

impl FromStr for EntityBytesRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::EntityBytes(s.to_string());

        let (start, end) = s.split_once(':').ok_or_else(invalid)?;
        let start: u64 = start.parse().map_err(|_| invalid())?;
        let end = match end {
            "*" => None,
            end => Some(end.parse::<u64>().map_err(|_| invalid())?),
        };

        if end.is_some_and(|end| end < start) {
            return Err(invalid());
        }
        Ok(Self { start, end })
    }
}

impl TryFrom<String> for EntityBytesRange {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<EntityBytesRange> for String {
    fn from(range: EntityBytesRange) -> Self { range.to_string() }
}

/// Everything needed to address one retrieval attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub protocol:           Protocol,
    /// Provider multiaddr as advertised by the index.
    pub address:            String,
    pub cid:                String,
    pub dag_scope:          DagScope,
    /// Only sent when `dag_scope` is [`DagScope::Entity`].
    pub entity_bytes_range: Option<EntityBytesRange>,
}
