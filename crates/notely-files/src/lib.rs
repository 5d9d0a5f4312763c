//! File-based storage implementation for notely.
//!
//! Each slot is one JSON file named after its key:
//!
//! ```text
//! .notely/
//!   .lock           # Lock file for atomic writes
//!   NOTES.json
//!   TAGS.json
//! ```

use fs2::FileExt;
use log::{debug, error};
use notely_core::{Error, KeyValueStore};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Key-value store keeping one file per slot.
#[derive(Debug)]
pub struct FilesStore {
    root: PathBuf,
}

impl FilesStore {
    /// Open a store in the given directory, creating it if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(&root)
            .map_err(|e| Error::Storage(format!("Failed to create store dir: {}", e)))?;

        debug!("event=store_open backend=files root={}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Acquire an exclusive lock on the store.
    fn lock(&self) -> Result<FileLock, Error> {
        let lock_path = self.root.join(".lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| Error::Storage(format!("Failed to open lock file: {}", e)))?;

        file.lock_exclusive()
            .map_err(|e| Error::Storage(format!("Failed to acquire lock: {}", e)))?;

        Ok(FileLock { file })
    }

    /// Get the path to a slot file. Keys are restricted so they cannot
    /// escape the store directory.
    fn slot_path(&self, key: &str) -> Result<PathBuf, Error> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::Storage(format!("Invalid key: {:?}", key)));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

/// RAII guard for file locking.
struct FileLock {
    file: File,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl KeyValueStore for FilesStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let path = self.slot_path(key)?;

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Storage(format!("Failed to open {}: {}", key, e))),
        };

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| Error::Storage(format!("Failed to read {}: {}", key, e)))?;

        Ok(Some(contents))
    }

    /// Write a slot atomically: temp file, sync, rename.
    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let path = self.slot_path(key)?;
        let temp_path = self.root.join(format!("{}.json.tmp", key));

        let _lock = self.lock()?;

        let result = (|| -> Result<(), Error> {
            let mut file = File::create(&temp_path)
                .map_err(|e| Error::Storage(format!("Failed to create temp file: {}", e)))?;

            file.write_all(value.as_bytes())
                .map_err(|e| Error::Storage(format!("Failed to write temp file: {}", e)))?;

            file.sync_all()
                .map_err(|e| Error::Storage(format!("Failed to sync temp file: {}", e)))?;

            fs::rename(&temp_path, &path)
                .map_err(|e| Error::Storage(format!("Failed to rename temp file: {}", e)))
        })();

        if let Err(ref e) = result {
            error!("event=slot_write_failed backend=files key={} error={}", key, e);
            let _ = fs::remove_file(&temp_path);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notely_core::{NoteData, Notebook, Tag, NOTES_KEY};
    use tempfile::TempDir;

    fn setup() -> (TempDir, FilesStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesStore::open(temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_get_missing_slot() {
        let (_temp, store) = setup();
        assert_eq!(store.get("NOTES").unwrap(), None);
    }

    #[test]
    fn test_set_and_get() {
        let (temp, store) = setup();

        store.set("TAGS", r#"[{"id":"t1","label":"work"}]"#).unwrap();
        store.set("TAGS", "[]").unwrap();

        assert_eq!(store.get("TAGS").unwrap().as_deref(), Some("[]"));
        assert!(temp.path().join("TAGS.json").exists());
        assert!(!temp.path().join("TAGS.json.tmp").exists());
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let (_temp, store) = setup();
        assert!(matches!(store.set("../x", "[]"), Err(Error::Storage(_))));
        assert!(matches!(store.get(""), Err(Error::Storage(_))));
    }

    #[test]
    fn test_open_creates_nested_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("a").join("b");
        let store = FilesStore::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }

    #[test]
    fn test_notebook_survives_reopen() {
        let (temp, store) = setup();

        let id = {
            let mut notebook = Notebook::open(store).unwrap();
            notebook.add_tag(Tag::new("t1", "work")).unwrap();
            notebook
                .create_note(NoteData {
                    title: "Plan".to_string(),
                    markdown: "- one\n- two".to_string(),
                    tags: vec![Tag::new("t1", "work")],
                })
                .unwrap()
        };

        let notebook = Notebook::open(FilesStore::open(temp.path()).unwrap()).unwrap();
        let note = notebook.note(&id).unwrap();
        assert_eq!(note.title, "Plan");
        assert_eq!(note.markdown, "- one\n- two");
        assert_eq!(note.tags, vec![Tag::new("t1", "work")]);
    }

    #[test]
    fn test_corrupt_slot_fails_open() {
        let (temp, _store) = setup();
        fs::write(temp.path().join("NOTES.json"), "{oops").unwrap();

        let store = FilesStore::open(temp.path()).unwrap();
        let err = Notebook::open(store).err().unwrap();
        assert!(matches!(err, Error::Deserialization { ref key, .. } if key == NOTES_KEY));
    }
}
