use std::rc::Rc;

use log::{debug, info};
use uuid::Uuid;

use crate::{
    repository, Binding, Error, KeyValueStore, NoteData, StoredNote, Tag, TagCount, Update,
    ViewNote,
};
use crate::view::{self, JoinView, NoteFilter};

/// Slot holding the JSON array of stored notes.
pub const NOTES_KEY: &str = "NOTES";
/// Slot holding the JSON array of tags.
pub const TAGS_KEY: &str = "TAGS";

/// Notes and tags bound to a store, with the joined view on top.
/// Generic over the store implementation.
pub struct Notebook<S: KeyValueStore> {
    store: S,
    notes: Binding<Vec<StoredNote>>,
    tags: Binding<Vec<Tag>>,
    join: JoinView,
}

impl<S: KeyValueStore> Notebook<S> {
    /// Load both collections from `store`, starting empty where a slot was
    /// never written.
    pub fn open(store: S) -> Result<Self, Error> {
        let notes = Binding::bind(&store, NOTES_KEY, Vec::<StoredNote>::new())?;
        let tags = Binding::bind(&store, TAGS_KEY, Vec::<Tag>::new())?;
        info!(
            "event=notebook_open notes={} tags={}",
            notes.get().len(),
            tags.get().len()
        );

        Ok(Self {
            store,
            notes,
            tags,
            join: JoinView::new(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Stored notes, tag references unresolved.
    pub fn stored_notes(&self) -> &[StoredNote] {
        self.notes.get()
    }

    pub fn tags(&self) -> &[Tag] {
        self.tags.get()
    }

    /// Notes with their tags resolved. Repeated calls share one allocation
    /// until either collection changes.
    pub fn notes(&self) -> Rc<Vec<ViewNote>> {
        self.join.get(
            (self.notes.revision(), self.tags.revision()),
            self.notes.get(),
            self.tags.get(),
        )
    }

    pub fn note(&self, id: &str) -> Option<ViewNote> {
        self.notes().iter().find(|note| note.id == id).cloned()
    }

    pub fn tag(&self, id: &str) -> Option<&Tag> {
        self.tags.get().iter().find(|tag| tag.id == id)
    }

    pub fn tag_by_label(&self, label: &str) -> Option<&Tag> {
        self.tags.get().iter().find(|tag| tag.label == label)
    }

    /// Create a note under a fresh id and return that id.
    pub fn create_note(&mut self, data: NoteData) -> Result<String, Error> {
        let id = Uuid::new_v4().to_string();
        let new_id = id.clone();
        self.notes.update(&self.store, Update::with(move |prev: &Vec<StoredNote>| {
            repository::create_note(prev, new_id, &data)
        }))?;
        debug!("event=note_create id={}", id);
        Ok(id)
    }

    /// Replace a note's content. Unknown ids leave the notes unchanged.
    pub fn update_note(&mut self, id: &str, data: NoteData) -> Result<(), Error> {
        self.notes.update(&self.store, Update::with(|prev: &Vec<StoredNote>| {
            repository::update_note(prev, id, &data)
        }))?;
        debug!("event=note_update id={}", id);
        Ok(())
    }

    pub fn delete_note(&mut self, id: &str) -> Result<(), Error> {
        self.notes.update(&self.store, Update::with(|prev: &Vec<StoredNote>| {
            repository::delete_note(prev, id)
        }))?;
        debug!("event=note_delete id={}", id);
        Ok(())
    }

    /// Append a tag. The caller picks the id and is responsible for its
    /// uniqueness.
    pub fn add_tag(&mut self, tag: Tag) -> Result<(), Error> {
        let id = tag.id.clone();
        self.tags.update(&self.store, Update::with(move |prev: &Vec<Tag>| {
            repository::add_tag(prev, tag)
        }))?;
        debug!("event=tag_add id={}", id);
        Ok(())
    }

    pub fn update_tag(&mut self, id: &str, label: &str) -> Result<(), Error> {
        self.tags.update(&self.store, Update::with(|prev: &Vec<Tag>| {
            repository::update_tag(prev, id, label)
        }))?;
        debug!("event=tag_update id={}", id);
        Ok(())
    }

    /// Remove a tag. Notes referring to it keep the reference; it just stops
    /// resolving.
    pub fn delete_tag(&mut self, id: &str) -> Result<(), Error> {
        self.tags.update(&self.store, Update::with(|prev: &Vec<Tag>| {
            repository::delete_tag(prev, id)
        }))?;
        debug!("event=tag_delete id={}", id);
        Ok(())
    }

    /// Map labels to tags, creating a tag with a fresh id for each label not
    /// seen before. Output follows input order.
    pub fn ensure_tags(&mut self, labels: &[String]) -> Result<Vec<Tag>, Error> {
        let mut resolved = Vec::with_capacity(labels.len());
        for label in labels {
            let existing = self.tag_by_label(label).cloned();
            let tag = match existing {
                Some(tag) => tag,
                None => {
                    let tag = Tag::new(Uuid::new_v4().to_string(), label.as_str());
                    self.add_tag(tag.clone())?;
                    tag
                }
            };
            resolved.push(tag);
        }
        Ok(resolved)
    }

    pub fn filter_notes(&self, filter: &NoteFilter) -> Vec<ViewNote> {
        view::filter_notes(&self.notes(), filter)
    }

    pub fn grep(&self, pattern: &str, case_sensitive: bool) -> Result<Vec<ViewNote>, Error> {
        view::grep(&self.notes(), pattern, case_sensitive)
    }

    pub fn tag_counts(&self) -> Vec<TagCount> {
        view::tag_counts(&self.notes(), self.tags.get())
    }
}
