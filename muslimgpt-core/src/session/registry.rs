//! Session registry derived from the message store

use crate::store::{ChatRecord, MessageStore};
use std::collections::HashSet;

/// One listed session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub session_id: String,
    pub title: String,
}

/// Session id → title index, in order of first appearance.
///
/// Built by scanning records once. The first record seen for a session
/// fixes its title; later records never change it.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    entries: Vec<SessionEntry>,
}

impl SessionRegistry {
    /// Fold records into a registry
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ChatRecord>,
    {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for record in records {
            if seen.insert(record.session_id.as_str()) {
                entries.push(SessionEntry {
                    session_id: record.session_id.clone(),
                    title: record.title.clone(),
                });
            }
        }

        Self { entries }
    }

    /// Scan a store
    pub fn load(store: &dyn MessageStore) -> crate::Result<Self> {
        let records = store.all()?;
        Ok(Self::from_records(&records))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.entries.iter().any(|e| e.session_id == session_id)
    }

    pub fn title(&self, session_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.session_id == session_id)
            .map(|e| e.title.as_str())
    }

    /// Sessions whose title contains `query`, ignoring case, newest first.
    ///
    /// An empty query lists every session.
    pub fn search(&self, query: &str) -> Vec<&SessionEntry> {
        let needle = query.to_lowercase();
        self.entries
            .iter()
            .rev()
            .filter(|e| query.is_empty() || e.title.to_lowercase().contains(&needle))
            .collect()
    }

    /// Look up a session by full id or unambiguous id prefix
    pub fn find(&self, selector: &str) -> crate::Result<&SessionEntry> {
        if let Some(entry) = self.entries.iter().find(|e| e.session_id == selector) {
            return Ok(entry);
        }

        let matches: Vec<&SessionEntry> = self
            .entries
            .iter()
            .filter(|e| !selector.is_empty() && e.session_id.starts_with(selector))
            .collect();

        match matches.as_slice() {
            [entry] => Ok(*entry),
            [] => Err(crate::Error::NotFound(format!("session {}", selector))),
            _ => Err(crate::Error::Session(format!(
                "session id prefix {} is ambiguous ({} matches)",
                selector,
                matches.len()
            ))),
        }
    }
}
