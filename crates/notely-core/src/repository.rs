//! Mutations over the note and tag collections.
//!
//! Every function borrows the previous collection and returns a new one.
//! An id that matches nothing leaves the collection unchanged.

use crate::{NoteData, StoredNote, Tag};

/// Append a note built from `data` under the given id.
pub fn create_note(notes: &[StoredNote], id: impl Into<String>, data: &NoteData) -> Vec<StoredNote> {
    let mut next = notes.to_vec();
    next.push(StoredNote {
        id: id.into(),
        title: data.title.clone(),
        markdown: data.markdown.clone(),
        tag_ids: data.tag_ids(),
    });
    next
}

/// Replace title, markdown and tag ids of the note with `id`, keeping its
/// position.
pub fn update_note(notes: &[StoredNote], id: &str, data: &NoteData) -> Vec<StoredNote> {
    notes
        .iter()
        .map(|note| {
            if note.id == id {
                StoredNote {
                    id: note.id.clone(),
                    title: data.title.clone(),
                    markdown: data.markdown.clone(),
                    tag_ids: data.tag_ids(),
                }
            } else {
                note.clone()
            }
        })
        .collect()
}

pub fn delete_note(notes: &[StoredNote], id: &str) -> Vec<StoredNote> {
    notes.iter().filter(|note| note.id != id).cloned().collect()
}

/// Append a tag. Id uniqueness is the caller's concern.
pub fn add_tag(tags: &[Tag], tag: Tag) -> Vec<Tag> {
    let mut next = tags.to_vec();
    next.push(tag);
    next
}

pub fn update_tag(tags: &[Tag], id: &str, label: &str) -> Vec<Tag> {
    tags.iter()
        .map(|tag| {
            if tag.id == id {
                Tag {
                    id: tag.id.clone(),
                    label: label.to_string(),
                }
            } else {
                tag.clone()
            }
        })
        .collect()
}

/// Remove a tag from the tag collection. Notes keep any reference to it.
pub fn delete_tag(tags: &[Tag], id: &str) -> Vec<Tag> {
    tags.iter().filter(|tag| tag.id != id).cloned().collect()
}
