//! JSON Lines message store
//!
//! One record per line, appended at the end of the file. Lines are never
//! reordered, so file order is insertion order. Removal rewrites the file
//! through a sibling temp file and a rename.

use super::record::ChatRecord;
use super::MessageStore;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File-backed message store
#[derive(Debug, Clone)]
pub struct JsonlMessageStore {
    path: PathBuf,
}

impl JsonlMessageStore {
    /// Open a store at `path`, creating the parent directory if needed.
    ///
    /// The file itself is created on first insert.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!("Opened message store at {}", path.display());
        Ok(Self { path })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_lines(&self) -> crate::Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl MessageStore for JsonlMessageStore {
    fn insert(&self, record: &ChatRecord) -> crate::Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        // A torn last line must not swallow the new record
        if file.metadata()?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                warn!(
                    "Store {} does not end with a newline, terminating partial line",
                    self.path.display()
                );
                line.insert(0, '\n');
            }
        }
        file.write_all(line.as_bytes())?;

        debug!(
            session_id = %record.session_id,
            role = %record.role,
            "Inserted record"
        );
        Ok(())
    }

    fn all(&self) -> crate::Result<Vec<ChatRecord>> {
        let mut records = Vec::new();
        for (index, line) in self.read_lines()?.iter().enumerate() {
            match serde_json::from_str::<ChatRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping malformed record on line {} of {}: {}",
                    index + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(records)
    }

    fn remove(&self, session_id: &str) -> crate::Result<usize> {
        let lines = self.read_lines()?;
        let mut kept = Vec::with_capacity(lines.len());
        let mut removed = 0;

        for line in lines {
            let matches = serde_json::from_str::<ChatRecord>(&line)
                .map(|record| record.session_id == session_id)
                .unwrap_or(false);
            if matches {
                removed += 1;
            } else {
                kept.push(line);
            }
        }

        if removed == 0 {
            debug!("No records to remove for session {}", session_id);
            return Ok(0);
        }

        let mut content = kept.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        let temp = self.temp_path();
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &self.path)?;

        info!("Removed {} records for session {}", removed, session_id);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Role;
    use tempfile::TempDir;

    fn pair(store: &JsonlMessageStore, session_id: &str, title: &str, answer: &str) {
        store
            .insert(&ChatRecord::new(session_id, title, Role::User, title))
            .unwrap();
        store
            .insert(&ChatRecord::new(session_id, title, Role::Assistant, answer))
            .unwrap();
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlMessageStore::open(temp_dir.path().join("db.jsonl")).unwrap();
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("db.jsonl");
        let store = JsonlMessageStore::open(&path).unwrap();

        pair(&store, "a", "Hello", "Salaam");
        assert!(path.exists());
    }

    #[test]
    fn test_all_preserves_insertion_order_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db.jsonl");
        let store = JsonlMessageStore::open(&path).unwrap();
        pair(&store, "a", "First", "one");
        pair(&store, "b", "Second", "two");
        pair(&store, "a", "First", "three");

        let reopened = JsonlMessageStore::open(&path).unwrap();
        let contents: Vec<String> = reopened
            .all()
            .unwrap()
            .into_iter()
            .map(|r| r.content)
            .collect();
        assert_eq!(
            contents,
            vec!["First", "one", "Second", "two", "First", "three"]
        );
    }

    #[test]
    fn test_remove_deletes_only_matching_session() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlMessageStore::open(temp_dir.path().join("db.jsonl")).unwrap();
        pair(&store, "a", "First", "one");
        pair(&store, "b", "Second", "two");
        pair(&store, "a", "First", "three");

        assert_eq!(store.remove("a").unwrap(), 4);

        let records = store.all().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.session_id == "b"));
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_remove_unknown_session_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlMessageStore::open(temp_dir.path().join("db.jsonl")).unwrap();
        pair(&store, "a", "First", "one");

        assert_eq!(store.remove("missing").unwrap(), 0);
        assert_eq!(store.all().unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_lines_are_skipped_and_survive_remove() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db.jsonl");
        let store = JsonlMessageStore::open(&path).unwrap();
        pair(&store, "a", "First", "one");
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"not json\n").unwrap();
        }
        pair(&store, "b", "Second", "two");

        assert_eq!(store.all().unwrap().len(), 4);
        assert_eq!(store.remove("b").unwrap(), 2);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("not json"));
        assert_eq!(store.all().unwrap().len(), 2);
    }

    #[test]
    fn test_insert_after_torn_line_keeps_new_record() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db.jsonl");
        let store = JsonlMessageStore::open(&path).unwrap();
        pair(&store, "a", "First", "one");
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(br#"{"session_id":"a","ti"#).unwrap();
        }

        pair(&store, "b", "Second", "two");

        let records = store.session_records("b").unwrap();
        let roles: Vec<Role> = records.iter().map(|r| r.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert_eq!(records[0].content, "Second");
        assert_eq!(store.all().unwrap().len(), 4);
    }

    #[test]
    fn test_session_records_filters_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlMessageStore::open(temp_dir.path().join("db.jsonl")).unwrap();
        pair(&store, "a", "First", "one");
        pair(&store, "b", "Second", "two");

        let records = store.session_records("b").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].role, Role::User);
        assert_eq!(records[1].content, "two");
    }
}
