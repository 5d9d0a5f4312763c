//! Notes joined with their tags, plus queries over the joined form.

use std::cell::RefCell;
use std::rc::Rc;

use regex::Regex;

use crate::{Error, StoredNote, Tag, TagCount, ViewNote};

/// Attach resolved tags to each note.
///
/// A note's tags come out in the order of `tags`, not of its `tag_ids`.
/// References to tags that no longer exist are dropped.
pub fn resolve(notes: &[StoredNote], tags: &[Tag]) -> Vec<ViewNote> {
    notes
        .iter()
        .map(|note| ViewNote {
            id: note.id.clone(),
            title: note.title.clone(),
            markdown: note.markdown.clone(),
            tags: tags
                .iter()
                .filter(|tag| note.has_tag(&tag.id))
                .cloned()
                .collect(),
        })
        .collect()
}

/// Memoized [`resolve`], keyed on the revisions of both collections.
#[derive(Debug, Default)]
pub struct JoinView {
    cached: RefCell<Option<Cached>>,
}

#[derive(Debug)]
struct Cached {
    key: (u64, u64),
    notes: Rc<Vec<ViewNote>>,
}

impl JoinView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the joined notes, recomputing only when `key` changed since the
    /// last call.
    pub fn get(&self, key: (u64, u64), notes: &[StoredNote], tags: &[Tag]) -> Rc<Vec<ViewNote>> {
        let mut cached = self.cached.borrow_mut();
        if let Some(hit) = cached.as_ref().filter(|c| c.key == key) {
            return Rc::clone(&hit.notes);
        }

        let notes = Rc::new(resolve(notes, tags));
        *cached = Some(Cached {
            key,
            notes: Rc::clone(&notes),
        });
        notes
    }
}

/// Note list filter: case-insensitive title substring, and every listed tag
/// must be attached.
#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    pub title: Option<String>,
    pub tag_ids: Vec<String>,
}

impl NoteFilter {
    pub fn matches(&self, note: &ViewNote) -> bool {
        let title_ok = match self.title.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(title) => note.title.to_lowercase().contains(&title.to_lowercase()),
        };

        title_ok
            && self
                .tag_ids
                .iter()
                .all(|id| note.tags.iter().any(|tag| &tag.id == id))
    }
}

pub fn filter_notes(notes: &[ViewNote], filter: &NoteFilter) -> Vec<ViewNote> {
    notes
        .iter()
        .filter(|note| filter.matches(note))
        .cloned()
        .collect()
}

/// Search title and markdown with a regular expression.
pub fn grep(notes: &[ViewNote], pattern: &str, case_sensitive: bool) -> Result<Vec<ViewNote>, Error> {
    let regex = if case_sensitive {
        Regex::new(pattern)
    } else {
        Regex::new(&format!("(?i){}", pattern))
    }
    .map_err(|e| Error::Validation(format!("invalid regex: {}", e)))?;

    Ok(notes
        .iter()
        .filter(|note| regex.is_match(&note.title) || regex.is_match(&note.markdown))
        .cloned()
        .collect())
}

/// Count, per tag, the notes that resolve to it. Tags keep collection order.
pub fn tag_counts(notes: &[ViewNote], tags: &[Tag]) -> Vec<TagCount> {
    tags.iter()
        .map(|tag| TagCount {
            tag: tag.clone(),
            count: notes
                .iter()
                .filter(|note| note.tags.iter().any(|t| t.id == tag.id))
                .count(),
        })
        .collect()
}
