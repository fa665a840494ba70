//! Analyst notes attached to a transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record_id::RecordId;

/// Category of an analyst note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteType {
    /// Untyped remark.
    #[default]
    #[serde(alias = "general")]
    General,
    /// Something the analyst noticed.
    #[serde(alias = "observation")]
    Observation,
    /// Supporting material.
    #[serde(alias = "evidence")]
    Evidence,
    /// Record of contact with the customer.
    #[serde(alias = "customer_contact")]
    CustomerContact,
    /// Why the review was escalated.
    #[serde(alias = "escalation")]
    Escalation,
    /// How the review was closed.
    #[serde(alias = "resolution")]
    Resolution,
}

/// A note written by an analyst on a transaction.
///
/// `analyst_id` is fixed at creation; no update path rewrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalystNote {
    /// Server id, or a placeholder while the create is in flight.
    pub id: RecordId,
    /// Transaction the note belongs to.
    pub transaction_id: String,
    /// Author.
    #[serde(alias = "created_by")]
    pub analyst_id: String,
    /// Author display name.
    #[serde(default)]
    pub analyst_name: Option<String>,
    /// Category.
    #[serde(default)]
    pub note_type: NoteType,
    /// Body text.
    #[serde(alias = "content")]
    pub note_content: String,
    /// Hidden from other analysts.
    #[serde(default)]
    pub is_private: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last edit time.
    pub updated_at: DateTime<Utc>,
}

/// Identity stamped onto notes created from this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteAuthor {
    /// Author id.
    pub analyst_id: String,
    /// Display name, when known.
    pub analyst_name: Option<String>,
}

impl NoteAuthor {
    /// Author with an id and no display name.
    pub fn new(analyst_id: impl Into<String>) -> Self {
        Self {
            analyst_id: analyst_id.into(),
            analyst_name: None,
        }
    }
}

/// Body of `POST /transactions/{id}/notes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNoteRequest {
    /// Category.
    pub note_type: NoteType,
    /// Body text; must not be blank.
    pub note_content: String,
    /// Hide from other analysts.
    #[serde(default)]
    pub is_private: bool,
}

impl CreateNoteRequest {
    /// Public note of the given type.
    pub fn new(note_type: NoteType, note_content: impl Into<String>) -> Self {
        Self {
            note_type,
            note_content: note_content.into(),
            is_private: false,
        }
    }
}

/// Body of `PATCH /transactions/{id}/notes/{note_id}`.
///
/// There is deliberately no ownership field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNoteRequest {
    /// New category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_type: Option<NoteType>,
    /// New body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_content: Option<String>,
    /// New visibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
}

impl AnalystNote {
    /// Placeholder shown while a create is in flight.
    pub fn placeholder(
        id: RecordId,
        transaction_id: &str,
        author: &NoteAuthor,
        request: &CreateNoteRequest,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            transaction_id: transaction_id.to_string(),
            analyst_id: author.analyst_id.clone(),
            analyst_name: author.analyst_name.clone(),
            note_type: request.note_type,
            note_content: request.note_content.clone(),
            is_private: request.is_private,
            created_at: now,
            updated_at: now,
        }
    }

    /// Optimistic result of an update.
    pub fn patched(&self, request: &UpdateNoteRequest, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if let Some(note_type) = request.note_type {
            next.note_type = note_type;
        }
        if let Some(content) = &request.note_content {
            next.note_content = content.clone();
        }
        if let Some(is_private) = request.is_private {
            next.is_private = is_private;
        }
        next.updated_at = next.updated_at.max(now);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_patch_preserves_ownership() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let note = AnalystNote::placeholder(
            RecordId::confirmed("n-1"),
            "txn-1",
            &NoteAuthor::new("analyst-1"),
            &CreateNoteRequest::new(NoteType::General, "first"),
            now,
        );
        let patched = note.patched(
            &UpdateNoteRequest {
                note_content: Some("edited".into()),
                ..UpdateNoteRequest::default()
            },
            now,
        );
        assert_eq!(patched.analyst_id, "analyst-1");
        assert_eq!(patched.note_content, "edited");
        assert_eq!(patched.note_type, NoteType::General);
    }

    #[test]
    fn test_decode_tolerates_legacy_field_names() {
        let note: AnalystNote = serde_json::from_value(serde_json::json!({
            "id": 12,
            "transaction_id": "txn-1",
            "created_by": "analyst-9",
            "content": "called cardholder",
            "note_type": "customer_contact",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(note.id, RecordId::confirmed("12"));
        assert_eq!(note.analyst_id, "analyst-9");
        assert_eq!(note.note_type, NoteType::CustomerContact);
        assert!(!note.is_private);
    }
}
