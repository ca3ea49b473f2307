//! The progress document: next page number plus a log of processed scenes.
//!
//! Every operation is a whole-file read-modify-write without locking, so a
//! store must only ever have one writer.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::DEFAULT_TITLE;
use crate::error::MangaError;

/// How many characters of a scene are kept in the log.
pub const SNIPPET_CHARS: usize = 50;

/// One processed scene.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StoryLog {
    /// Page the scene became
    pub page: u32,
    /// Start of the scene text
    pub scene_snippet: String,
    /// When the page was finished, RFC 3339 local time
    pub timestamp: String,
}

/// The persisted progress document.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProgressContext {
    /// Story title
    #[serde(default = "default_title")]
    pub title: String,
    /// Next page number to produce
    #[serde(default = "first_page")]
    pub current_page: u32,
    /// Log of finished pages, oldest first
    #[serde(default)]
    pub story_logs: Vec<StoryLog>,
}

impl ProgressContext {
    /// A fresh document starting at page one.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            current_page: first_page(),
            story_logs: Vec::new(),
        }
    }
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn first_page() -> u32 {
    1
}

/// Shortens a scene for the log: the first [`SNIPPET_CHARS`] characters and
/// an ellipsis, or the whole scene if it's short enough.
pub fn snippet(scene: &str) -> String {
    if scene.chars().count() > SNIPPET_CHARS {
        let head: String = scene.chars().take(SNIPPET_CHARS).collect();
        format!("{head}...")
    } else {
        scene.to_string()
    }
}

/// File-backed [`ProgressContext`].
#[derive(Clone, Debug)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    /// Store backed by the JSON file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the document with `title` unless it already exists.
    pub fn initialize(&self, title: &str) -> Result<(), MangaError> {
        if self.path.exists() {
            info!("Loaded existing {}", self.path.display());
            return Ok(());
        }
        self.save(&ProgressContext::new(title))?;
        info!("Initialized {} for '{title}'", self.path.display());
        Ok(())
    }

    /// Reads the document, creating a default one first if it's missing.
    pub fn load(&self) -> Result<ProgressContext, MangaError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.initialize(DEFAULT_TITLE)?;
                let bytes = std::fs::read(&self.path)?;
                Ok(serde_json::from_slice(&bytes)?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Overwrites the document.
    pub fn save(&self, context: &ProgressContext) -> Result<(), MangaError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut bytes = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
        context.serialize(&mut serializer)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }

    /// Records `page_number` as done: the next page becomes
    /// `page_number + 1` and the scene is appended to the log.
    pub fn update(&self, page_number: u32, scene: &str) -> Result<ProgressContext, MangaError> {
        let mut context = self.load()?;
        context.current_page = page_number.saturating_add(1);
        context.story_logs.push(StoryLog {
            page: page_number,
            scene_snippet: snippet(scene),
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        });
        self.save(&context)?;
        info!("Context updated: Page {page_number} complete");
        Ok(context)
    }

    /// The next page number to produce.
    pub fn current_page(&self) -> Result<u32, MangaError> {
        Ok(self.load()?.current_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ProgressStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ProgressStore::new(dir.path().join("context.json"));
        (dir, store)
    }

    #[test]
    fn load_creates_a_default_document() {
        let (_dir, store) = store();
        assert!(!store.path().exists());
        let context = store.load().expect("load");
        assert_eq!(context, ProgressContext::new(DEFAULT_TITLE));
        assert!(store.path().exists());
        assert_eq!(store.current_page().expect("page"), 1);
    }

    #[test]
    fn initialize_keeps_existing_documents() {
        let (_dir, store) = store();
        store.initialize("Berserk Homage").expect("init");
        store.update(3, "short").expect("update");
        store.initialize("Something Else").expect("init again");
        let context = store.load().expect("load");
        assert_eq!(context.title, "Berserk Homage");
        assert_eq!(context.current_page, 4);
    }

    #[test]
    fn update_advances_and_logs() {
        let (_dir, store) = store();
        let scene = "The rain had not stopped for three days when the swordsman reached the gate.";
        store.update(5, scene).expect("update");

        assert_eq!(store.current_page().expect("page"), 6);
        let context = store.load().expect("load");
        assert_eq!(context.story_logs.len(), 1);
        let entry = &context.story_logs[0];
        assert_eq!(entry.page, 5);
        assert_eq!(entry.scene_snippet, format!("{}...", &scene[..50]));
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());

        store.update(6, "some scene").expect("update");
        let context = store.load().expect("load");
        assert_eq!(context.story_logs.len(), 2);
        assert_eq!(context.story_logs[1].scene_snippet, "some scene");
        assert_eq!(context.current_page, 7);
    }

    #[test]
    fn snippet_counts_characters_not_bytes() {
        let scene = "ア".repeat(60);
        assert_eq!(snippet(&scene), format!("{}...", "ア".repeat(50)));
        assert_eq!(snippet(&"x".repeat(50)), "x".repeat(50));
    }

    #[test]
    fn missing_fields_get_defaults() {
        let (_dir, store) = store();
        std::fs::write(store.path(), r#"{"title": "Old"}"#).expect("write");
        assert_eq!(store.current_page().expect("page"), 1);
        assert!(store.load().expect("load").story_logs.is_empty());
    }

    #[test]
    fn saved_document_uses_four_space_indent() {
        let (_dir, store) = store();
        store.save(&ProgressContext::new("Indented")).expect("save");
        let raw = std::fs::read_to_string(store.path()).expect("read");
        assert!(raw.contains("\n    \"title\": \"Indented\""), "{raw}");
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let (_dir, store) = store();
        std::fs::write(store.path(), "{not json").expect("write");
        assert!(matches!(store.load(), Err(MangaError::Json(_))));
    }
}
