//! Notely core library - note and tag types, the store binding, repository
//! functions and the joined view.
//!
//! This crate does no I/O of its own; persistence goes through a
//! [`KeyValueStore`] implementation.

mod binding;
mod error;
mod note;
mod notebook;
mod store;

pub mod repository;
pub mod view;

pub use binding::{Binding, Initial, Update};
pub use error::Error;
pub use note::{NoteData, StoredNote, Tag, TagCount, ViewNote};
pub use notebook::{Notebook, NOTES_KEY, TAGS_KEY};
pub use store::{KeyValueStore, MemoryStore};
pub use view::{JoinView, NoteFilter};
