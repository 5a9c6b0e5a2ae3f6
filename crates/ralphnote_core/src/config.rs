//! Corpus location and contract configuration.
//!
//! # Responsibility
//! - Hold the corpus root and the values the schema contracts compare against.
//! - Derive every path the registrar, auditor and sampler touch.
//!
//! # Invariants
//! - Notes live directly in `notes/`, questions in `notes/questions/`.
//! - A canonical document path is `{kind dir}/{id}.md`.

use crate::model::id::{EntryId, EntryKind};
use crate::model::schema::SchemaContract;
use std::path::{Path, PathBuf};

/// Default prefix every note `source` must start with.
pub const DEFAULT_DOCS_PREFIX: &str = "docs/";
/// Default `source` sentinel of questions.
pub const DEFAULT_QUESTION_SOURCE: &str = "asker";

const NOTES_DIR_NAME: &str = "notes";
const QUESTIONS_DIR_NAME: &str = "questions";
const INDEX_FILE_NAME: &str = "_index.md";
const LOCK_FILE_NAME: &str = ".ralphnote.lock";

/// Explicit corpus configuration threaded into every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusConfig {
    root: PathBuf,
    docs_prefix: String,
    question_source: String,
}

impl CorpusConfig {
    /// Creates a configuration rooted at `root` with default contract values.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            docs_prefix: DEFAULT_DOCS_PREFIX.to_string(),
            question_source: DEFAULT_QUESTION_SOURCE.to_string(),
        }
    }

    /// Overrides the docs-root prefix. A trailing `/` is appended when missing.
    pub fn with_docs_prefix(mut self, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        self.docs_prefix = prefix;
        self
    }

    pub fn with_question_source(mut self, source: impl Into<String>) -> Self {
        self.question_source = source.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn docs_prefix(&self) -> &str {
        &self.docs_prefix
    }

    pub fn question_source(&self) -> &str {
        &self.question_source
    }

    pub fn notes_dir(&self) -> PathBuf {
        self.root.join(NOTES_DIR_NAME)
    }

    pub fn questions_dir(&self) -> PathBuf {
        self.notes_dir().join(QUESTIONS_DIR_NAME)
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE_NAME)
    }

    /// Advisory lock file guarding registration.
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE_NAME)
    }

    /// Directory holding canonical documents of `kind`.
    pub fn dir_for(&self, kind: EntryKind) -> PathBuf {
        match kind {
            EntryKind::Note => self.notes_dir(),
            EntryKind::Question => self.questions_dir(),
        }
    }

    /// Canonical location of the document identified by `id`.
    pub fn canonical_path(&self, id: &EntryId) -> PathBuf {
        self.dir_for(id.kind()).join(id.file_name())
    }

    /// Contract values for draft validation.
    pub fn contract(&self) -> SchemaContract {
        SchemaContract {
            docs_prefix: self.docs_prefix.clone(),
            question_source: self.question_source.clone(),
        }
    }

    /// Path relative to the root for reporting; unchanged when outside it.
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
