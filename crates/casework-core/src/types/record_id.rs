//! Record identity for optimistically created entities.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::{CaseworkError, Result};

/// Identity of a list record.
///
/// Placeholders created by an optimistic insert carry a `Local` id until the
/// reconciling refetch replaces them with server records. Decoded records are
/// always `Confirmed`. A `Local` id must never be sent to the server as a
/// foreign key; [`RecordId::require_confirmed`] enforces that at call sites.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordId {
    /// Client-fabricated placeholder id
    Local(String),
    /// Server-assigned id
    Confirmed(String),
}

static LOCAL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

impl RecordId {
    /// Placeholder id derived from a millisecond timestamp.
    ///
    /// A per-process counter suffix keeps placeholders created within the
    /// same millisecond distinct.
    pub fn local_from_timestamp(prefix: &str, timestamp_ms: i64) -> Self {
        let sequence = LOCAL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self::Local(format!("{prefix}{timestamp_ms}-{sequence}"))
    }

    /// Server id.
    pub fn confirmed(id: impl Into<String>) -> Self {
        Self::Confirmed(id.into())
    }

    /// Whether the server has assigned this id.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    /// Server id, if confirmed.
    pub fn as_confirmed(&self) -> Option<&str> {
        match self {
            Self::Confirmed(id) => Some(id),
            Self::Local(_) => None,
        }
    }

    /// Server id, or an `Invalid` error naming the pending placeholder.
    pub fn require_confirmed(&self) -> Result<&str> {
        match self {
            Self::Confirmed(id) => Ok(id),
            Self::Local(temp) => Err(CaseworkError::invalid(format!(
                "record {temp} has not been confirmed by the server yet"
            ))),
        }
    }

    /// Raw id string, regardless of state.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Local(id) | Self::Confirmed(id) => id,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<str> for RecordId {
    fn eq(&self, other: &str) -> bool {
        self.as_confirmed() == Some(other)
    }
}

impl PartialEq<&str> for RecordId {
    fn eq(&self, other: &&str) -> bool {
        self.as_confirmed() == Some(*other)
    }
}

impl Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Wire ids arrive as strings or integers; both become `Confirmed`.
impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WireId {
            Text(String),
            Number(i64),
        }

        Ok(match WireId::deserialize(deserializer)? {
            WireId::Text(id) => Self::Confirmed(id),
            WireId::Number(id) => Self::Confirmed(id.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_id_is_never_confirmed() {
        let id = RecordId::local_from_timestamp("temp-", 1_700_000_000_000);
        assert!(id.as_str().starts_with("temp-1700000000000-"));
        assert!(!id.is_confirmed());
        assert!(id.require_confirmed().is_err());
        assert!(id != id.as_str());
    }

    #[test]
    fn test_same_millisecond_placeholders_differ() {
        let first = RecordId::local_from_timestamp("temp-", 1_700_000_000_000);
        let second = RecordId::local_from_timestamp("temp-", 1_700_000_000_000);
        assert_ne!(first, second);
    }

    #[test]
    fn test_wire_ids_decode_as_confirmed() {
        let text: RecordId = serde_json::from_str("\"note-7\"").unwrap();
        let number: RecordId = serde_json::from_str("42").unwrap();
        assert_eq!(text, RecordId::confirmed("note-7"));
        assert_eq!(number, RecordId::confirmed("42"));
        assert_eq!(number.require_confirmed().unwrap(), "42");
    }
}
