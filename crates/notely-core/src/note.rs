use serde::{Deserialize, Serialize};

/// A tag that notes refer to by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub label: String,
}

impl Tag {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// A note as persisted in the `NOTES` slot. Tags are kept as id references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNote {
    pub id: String,
    pub title: String,
    pub markdown: String,
    #[serde(rename = "tagIds", default)]
    pub tag_ids: Vec<String>,
}

impl StoredNote {
    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.tag_ids.iter().any(|id| id == tag_id)
    }
}

/// A note with its tag references resolved against the tag collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewNote {
    pub id: String,
    pub title: String,
    pub markdown: String,
    pub tags: Vec<Tag>,
}

/// Payload for creating or replacing a note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteData {
    pub title: String,
    pub markdown: String,
    pub tags: Vec<Tag>,
}

impl NoteData {
    /// Ids of the payload's tags, in payload order, duplicates kept.
    pub fn tag_ids(&self) -> Vec<String> {
        self.tags.iter().map(|tag| tag.id.clone()).collect()
    }
}

impl From<&ViewNote> for NoteData {
    fn from(note: &ViewNote) -> Self {
        Self {
            title: note.title.clone(),
            markdown: note.markdown.clone(),
            tags: note.tags.clone(),
        }
    }
}

/// Tag with the number of notes that resolve to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: Tag,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_note_uses_camel_case_tag_ids() {
        let note = StoredNote {
            id: "n1".to_string(),
            title: "Title".to_string(),
            markdown: "# Body".to_string(),
            tag_ids: vec!["t1".to_string()],
        };

        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "n1",
                "title": "Title",
                "markdown": "# Body",
                "tagIds": ["t1"],
            })
        );
    }

    #[test]
    fn test_stored_note_without_tag_ids_defaults_to_empty() {
        let note: StoredNote =
            serde_json::from_str(r#"{"id":"n1","title":"T","markdown":"M"}"#).unwrap();
        assert!(note.tag_ids.is_empty());
    }

    #[test]
    fn test_stored_note_without_title_is_rejected() {
        let parsed = serde_json::from_str::<StoredNote>(r#"{"id":"n1","markdown":"M","tagIds":[]}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_note_data_tag_ids_keep_order_and_duplicates() {
        let data = NoteData {
            title: "A".to_string(),
            markdown: String::new(),
            tags: vec![Tag::new("b", "B"), Tag::new("a", "A"), Tag::new("b", "B")],
        };
        assert_eq!(data.tag_ids(), vec!["b", "a", "b"]);
    }
}
