//! Corpus-wide structural and referential audit.
//!
//! # Responsibility
//! - Build the ID -> path map of every persisted document.
//! - Report frontmatter, filename/layout, wikilink and index defects.
//! - Optionally delete dangling `[[ID]]` wikilinks from document text.
//!
//! # Invariants
//! - Documents are visited in sorted path order; on a duplicate ID the first
//!   visited document stays canonical and later ones are reported.
//! - Only dangling wikilinks in documents are ever repaired. Duplicate IDs,
//!   filename mismatches and index defects have no safe unilateral fix.
//! - Independent of registrar state: everything is read from disk.
//! - A fixing run holds the corpus lock from the first read to the last
//!   write, so it never rewrites a draft a registrar has just moved.

use crate::config::CorpusConfig;
use crate::model::document::Document;
use crate::model::id::{EntryId, PLACEHOLDER};
use crate::repo::corpus::{file_name_str, list_corpus_documents, write_replacing, CorpusLock};
use crate::repo::index_file::{IndexError, IndexFile};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

static WIKILINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[((?:NOTE|Q)-\d{8}-\d{6}-\d{3})\]\]").expect("valid wikilink regex")
});

/// Audit run failure (not a corpus defect).
#[derive(Debug)]
pub enum AuditError {
    /// Notes directory is absent.
    CorpusMissing(PathBuf),
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Index(IndexError),
    /// Corpus lock could not be acquired for a fixing run.
    Lock(io::Error),
}

impl Display for AuditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CorpusMissing(path) => {
                write!(f, "corpus directory not found: {}", path.display())
            }
            Self::Io { path, source } => write!(f, "I/O failed on {}: {source}", path.display()),
            Self::Index(err) => write!(f, "{err}"),
            Self::Lock(err) => write!(f, "failed to acquire corpus lock: {err}"),
        }
    }
}

impl Error for AuditError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CorpusMissing(_) => None,
            Self::Io { source, .. } => Some(source),
            Self::Index(err) => Some(err),
            Self::Lock(err) => Some(err),
        }
    }
}

impl From<IndexError> for AuditError {
    fn from(value: IndexError) -> Self {
        Self::Index(value)
    }
}

/// One defect kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Problem {
    /// Frontmatter absent or unparseable.
    InvalidFrontmatter { reason: String },
    /// `id` missing or still `PLACEHOLDER`.
    PlaceholderId,
    /// `id` present but not a canonical ID.
    MalformedId { id: String },
    /// Another document, visited earlier, claims the same ID.
    DuplicateId { id: EntryId, first: PathBuf },
    /// File name differs from `{id}.md`.
    FilenameMismatch { id: EntryId, expected: String },
    /// Document stored outside the directory of its kind.
    WrongDirectory { id: EntryId, expected: PathBuf },
    /// `[[ID]]` names no document.
    DanglingReference { id: String },
    /// The index file does not exist.
    IndexMissing,
    /// Canonical document without an index row.
    UnindexedDocument { id: EntryId },
    /// Index wikilink naming no document.
    DanglingIndexLink { id: String },
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFrontmatter { reason } => {
                write!(f, "missing or invalid frontmatter ({reason})")
            }
            Self::PlaceholderId => write!(f, "id is missing or still {PLACEHOLDER}"),
            Self::MalformedId { id } => write!(f, "id `{id}` is not a canonical ID"),
            Self::DuplicateId { id, first } => {
                write!(f, "duplicate ID {id} (also in {})", first.display())
            }
            Self::FilenameMismatch { id, expected } => {
                write!(f, "filename should be {expected} (id: {id})")
            }
            Self::WrongDirectory { id, expected } => {
                write!(f, "{id} belongs in {}", expected.display())
            }
            Self::DanglingReference { id } => {
                write!(f, "broken reference [[{id}]]: no file with this ID")
            }
            Self::IndexMissing => write!(f, "index file not found"),
            Self::UnindexedDocument { id } => write!(f, "{id} has no index row"),
            Self::DanglingIndexLink { id } => {
                write!(f, "index references [[{id}]] but no file has this ID")
            }
        }
    }
}

/// A defect located in one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Path relative to the corpus root.
    pub path: PathBuf,
    pub problem: Problem,
}

impl Display for Finding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.problem)
    }
}

/// Categorized audit result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub documents_scanned: usize,
    pub frontmatter_errors: Vec<Finding>,
    pub filename_errors: Vec<Finding>,
    pub reference_errors: Vec<Finding>,
    pub index_errors: Vec<Finding>,
    /// Dangling wikilinks deleted from documents.
    pub fixed_references: usize,
    pub fix_applied: bool,
    /// Resolved ID -> canonical path (relative to root).
    pub ids: BTreeMap<EntryId, PathBuf>,
}

impl AuditReport {
    /// No structural defect and no unresolved reference remains.
    pub fn is_all_clear(&self) -> bool {
        self.frontmatter_errors.is_empty()
            && self.filename_errors.is_empty()
            && self.index_errors.is_empty()
            && (self.reference_errors.is_empty() || self.fix_applied)
    }

    pub fn issue_count(&self) -> usize {
        self.frontmatter_errors.len()
            + self.filename_errors.len()
            + self.reference_errors.len()
            + self.index_errors.len()
    }

    /// Reference findings for one document path (relative to root).
    pub fn references_in(&self, path: &Path) -> Vec<&Finding> {
        self.reference_errors
            .iter()
            .filter(|finding| finding.path == path)
            .collect()
    }
}

struct ScannedDocument {
    path: PathBuf,
    text: String,
}

/// Auditor over one corpus.
pub struct Auditor {
    config: CorpusConfig,
}

impl Auditor {
    pub fn new(config: CorpusConfig) -> Self {
        Self { config }
    }

    /// Audits the whole persisted corpus.
    ///
    /// With `fix_dangling_links`, every dangling `[[ID]]` occurrence is
    /// deleted from its document; all other text is left unchanged.
    ///
    /// # Errors
    /// `CorpusMissing` when `notes/` is absent; `Lock` when a fixing run
    /// cannot take the corpus lock; `Io`/`Index` on read or write failures.
    pub fn audit(&self, fix_dangling_links: bool) -> Result<AuditReport, AuditError> {
        let started_at = Instant::now();
        let notes_dir = self.config.notes_dir();
        if !notes_dir.is_dir() {
            return Err(AuditError::CorpusMissing(notes_dir));
        }
        let _lock = if fix_dangling_links {
            Some(CorpusLock::acquire(&self.config.lock_path()).map_err(AuditError::Lock)?)
        } else {
            None
        };

        let documents = self.load_documents()?;
        let mut report = AuditReport {
            documents_scanned: documents.len(),
            fix_applied: fix_dangling_links,
            ..AuditReport::default()
        };

        let mut ids: BTreeMap<EntryId, PathBuf> = BTreeMap::new();
        let mut located: Vec<(&Path, EntryId)> = Vec::new();
        for document in &documents {
            if let Some(id) = self.resolve_id(document, &ids, &mut report) {
                ids.entry(id.clone())
                    .or_insert_with(|| document.path.clone());
                located.push((document.path.as_path(), id));
            }
        }

        for (path, id) in &located {
            self.check_layout(path, id, &mut report);
        }

        for document in &documents {
            self.check_references(document, &ids, &mut report)?;
        }

        self.check_index(&ids, &mut report)?;

        report.ids = ids
            .into_iter()
            .map(|(id, path)| (id, self.config.relative(&path)))
            .collect();

        info!(
            "event=audit module=auditor status=ok documents={} frontmatter_errors={} filename_errors={} reference_errors={} index_errors={} fixed={} duration_ms={}",
            report.documents_scanned,
            report.frontmatter_errors.len(),
            report.filename_errors.len(),
            report.reference_errors.len(),
            report.index_errors.len(),
            report.fixed_references,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    fn load_documents(&self) -> Result<Vec<ScannedDocument>, AuditError> {
        let paths = list_corpus_documents(&self.config).map_err(|source| AuditError::Io {
            path: self.config.notes_dir(),
            source,
        })?;
        paths
            .into_iter()
            .map(|path| {
                fs::read_to_string(&path)
                    .map(|text| ScannedDocument {
                        path: path.clone(),
                        text,
                    })
                    .map_err(|source| AuditError::Io { path, source })
            })
            .collect()
    }

    fn finding(&self, path: &Path, problem: Problem) -> Finding {
        Finding {
            path: self.config.relative(path),
            problem,
        }
    }

    /// Returns the document's ID, or records why it has none.
    fn resolve_id(
        &self,
        document: &ScannedDocument,
        ids: &BTreeMap<EntryId, PathBuf>,
        report: &mut AuditReport,
    ) -> Option<EntryId> {
        let parsed = match Document::parse(&document.text) {
            Ok(parsed) => parsed,
            Err(err) => {
                report.frontmatter_errors.push(self.finding(
                    &document.path,
                    Problem::InvalidFrontmatter {
                        reason: err.to_string(),
                    },
                ));
                return None;
            }
        };

        let raw_id = match parsed.frontmatter().id_str() {
            Some(raw_id) if raw_id != PLACEHOLDER => raw_id,
            _ => {
                report
                    .frontmatter_errors
                    .push(self.finding(&document.path, Problem::PlaceholderId));
                return None;
            }
        };

        let Some(id) = EntryId::parse(raw_id) else {
            report.frontmatter_errors.push(self.finding(
                &document.path,
                Problem::MalformedId {
                    id: raw_id.to_string(),
                },
            ));
            return None;
        };

        if let Some(first) = ids.get(&id) {
            report.frontmatter_errors.push(self.finding(
                &document.path,
                Problem::DuplicateId {
                    id: id.clone(),
                    first: self.config.relative(first),
                },
            ));
        }
        Some(id)
    }

    fn check_layout(&self, path: &Path, id: &EntryId, report: &mut AuditReport) {
        let expected_name = id.file_name();
        if file_name_str(path) != expected_name {
            report.filename_errors.push(self.finding(
                path,
                Problem::FilenameMismatch {
                    id: id.clone(),
                    expected: expected_name,
                },
            ));
        }

        let expected_dir = self.config.dir_for(id.kind());
        if path.parent() != Some(expected_dir.as_path()) {
            report.filename_errors.push(self.finding(
                path,
                Problem::WrongDirectory {
                    id: id.clone(),
                    expected: self.config.relative(&expected_dir),
                },
            ));
        }
    }

    fn check_references(
        &self,
        document: &ScannedDocument,
        ids: &BTreeMap<EntryId, PathBuf>,
        report: &mut AuditReport,
    ) -> Result<(), AuditError> {
        let is_known = |raw: &str| EntryId::parse(raw).is_some_and(|id| ids.contains_key(&id));

        let mut dangling = 0;
        for caps in WIKILINK_RE.captures_iter(&document.text) {
            if !is_known(&caps[1]) {
                dangling += 1;
                report.reference_errors.push(self.finding(
                    &document.path,
                    Problem::DanglingReference {
                        id: caps[1].to_string(),
                    },
                ));
            }
        }

        if dangling == 0 || !report.fix_applied {
            return Ok(());
        }

        let repaired = WIKILINK_RE.replace_all(&document.text, |caps: &Captures<'_>| {
            if is_known(&caps[1]) {
                caps[0].to_string()
            } else {
                String::new()
            }
        });
        write_replacing(&document.path, &repaired).map_err(|source| AuditError::Io {
            path: document.path.clone(),
            source,
        })?;
        report.fixed_references += dangling;
        info!(
            "event=audit_fix module=auditor status=ok path={} removed={}",
            self.config.relative(&document.path).display(),
            dangling
        );
        Ok(())
    }

    /// Cross-checks the index against the resolved documents.
    fn check_index(
        &self,
        ids: &BTreeMap<EntryId, PathBuf>,
        report: &mut AuditReport,
    ) -> Result<(), AuditError> {
        let index_path = self.config.index_path();
        if !index_path.is_file() {
            warn!(
                "event=audit module=auditor status=skip reason=index_missing path={}",
                index_path.display()
            );
            report
                .index_errors
                .push(self.finding(&index_path, Problem::IndexMissing));
            return Ok(());
        }

        let index = IndexFile::load(&index_path)?;
        let indexed: BTreeSet<EntryId> = index
            .question_rows()
            .into_iter()
            .map(|row| row.id)
            .chain(index.note_rows().into_iter().map(|row| row.id))
            .collect();

        for (id, path) in ids {
            if !indexed.contains(id) {
                report.index_errors.push(
                    self.finding(path, Problem::UnindexedDocument { id: id.clone() }),
                );
            }
        }

        let rendered = index.render();
        let mut seen = BTreeSet::new();
        for caps in WIKILINK_RE.captures_iter(&rendered) {
            let raw = &caps[1];
            let known = EntryId::parse(raw).is_some_and(|id| ids.contains_key(&id));
            if !known && seen.insert(raw.to_string()) {
                report.index_errors.push(self.finding(
                    &index_path,
                    Problem::DanglingIndexLink { id: raw.to_string() },
                ));
            }
        }
        Ok(())
    }
}
