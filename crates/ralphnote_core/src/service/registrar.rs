//! Draft registration use-case.
//!
//! # Responsibility
//! - Validate a draft, assign its canonical identity and commit it into the
//!   corpus under `{kind dir}/{id}.md`.
//! - Append the matching index row and back-link answered questions.
//! - Register every not-yet-canonical file of the corpus in one batch.
//!
//! # Invariants
//! - Commit order is: placeholder substitution -> canonical move -> index
//!   append. A failure before the move leaves the draft exactly as found.
//! - The whole span runs under the corpus lock.
//! - Files already named `{canonical id}.md` are never registered again.
//!
//! # Recovery
//! A crash after the move but before the index write leaves a canonical file
//! without an index row. Rerunning the batch skips it; the auditor reports it
//! as an unindexed document.

use crate::config::CorpusConfig;
use crate::model::document::{Document, FrontmatterError};
use crate::model::id::{
    is_canonical_file_name, Clock, EntryId, EntryKind, IdGenerator, IssuedId, SystemClock,
};
use crate::model::schema::{validate_draft, DraftRecord, SchemaError};
use crate::repo::corpus::{file_name_str, list_markdown_files, CorpusLock};
use crate::repo::index_file::{BackLink, IndexError, IndexFile, NoteRow, QuestionRow};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

const MAX_ID_ATTEMPTS: usize = 16;

/// Registration failure for one document.
#[derive(Debug)]
pub enum RegisterError {
    /// Draft path does not exist or is not a file.
    NotFound(PathBuf),
    /// Draft lives outside the notes directory.
    OutsideCorpus(PathBuf),
    /// Notes directory is absent.
    CorpusMissing(PathBuf),
    Io {
        path: PathBuf,
        source: io::Error,
    },
    /// Corpus lock could not be acquired.
    Lock(io::Error),
    Frontmatter(FrontmatterError),
    Schema(SchemaError),
    /// Every candidate canonical destination was already taken.
    Collision(PathBuf),
    /// Document is committed under `id`, but the index update failed.
    Index {
        id: EntryId,
        path: PathBuf,
        source: IndexError,
    },
}

impl Display for RegisterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "file not found: {}", path.display()),
            Self::OutsideCorpus(path) => {
                write!(f, "file must be inside notes/: {}", path.display())
            }
            Self::CorpusMissing(path) => {
                write!(f, "corpus directory not found: {}", path.display())
            }
            Self::Io { path, source } => write!(f, "I/O failed on {}: {source}", path.display()),
            Self::Lock(err) => write!(f, "failed to acquire corpus lock: {err}"),
            Self::Frontmatter(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::Collision(path) => {
                write!(f, "canonical destination already exists: {}", path.display())
            }
            Self::Index { id, path, source } => write!(
                f,
                "registered {id} at {} but index update failed: {source}",
                path.display()
            ),
        }
    }
}

impl Error for RegisterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Lock(err) => Some(err),
            Self::Frontmatter(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::Index { source, .. } => Some(source),
            Self::NotFound(_)
            | Self::OutsideCorpus(_)
            | Self::CorpusMissing(_)
            | Self::Collision(_) => None,
        }
    }
}

impl From<FrontmatterError> for RegisterError {
    fn from(value: FrontmatterError) -> Self {
        Self::Frontmatter(value)
    }
}

impl From<SchemaError> for RegisterError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

/// Index step outcome of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexUpdate {
    /// Row appended; notes also report the back-link outcome.
    Appended { back_link: Option<BackLink> },
    /// Index file absent; the document is registered without a row.
    SkippedMissingIndex,
}

/// A committed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub id: EntryId,
    pub created: String,
    pub kind: EntryKind,
    /// Draft location before the move.
    pub source_path: PathBuf,
    /// Canonical location.
    pub path: PathBuf,
    pub index: IndexUpdate,
}

/// One skipped file of a batch.
#[derive(Debug)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub error: RegisterError,
}

/// Aggregate result of `scan_and_register_all`.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub registered: Vec<Registration>,
    pub failures: Vec<BatchFailure>,
}

impl BatchSummary {
    pub fn success_count(&self) -> usize {
        self.registered.len()
    }

    pub fn error_count(&self) -> usize {
        self.failures.len()
    }

    /// Registrations that skipped the index because it was missing.
    pub fn warning_count(&self) -> usize {
        self.registered
            .iter()
            .filter(|r| r.index == IndexUpdate::SkippedMissingIndex)
            .count()
    }
}

/// Registrar over one corpus.
pub struct Registrar<C: Clock = SystemClock> {
    config: CorpusConfig,
    ids: IdGenerator<C>,
}

impl Registrar<SystemClock> {
    /// Creates a registrar using the wall clock.
    pub fn new(config: CorpusConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Registrar<C> {
    /// Creates a registrar using `clock` for identity assignment.
    pub fn with_clock(config: CorpusConfig, clock: C) -> Self {
        Self {
            config,
            ids: IdGenerator::new(clock),
        }
    }

    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    /// Registers one draft.
    ///
    /// Relative paths resolve against the corpus root.
    ///
    /// # Errors
    /// - `NotFound`/`OutsideCorpus`/`CorpusMissing` when the path is unusable.
    /// - `Frontmatter`/`Schema` when the draft is rejected; nothing is touched.
    /// - `Collision` when no free canonical destination was found.
    /// - `Index` when the document was committed but the index write failed.
    pub fn register(&self, path: &Path) -> Result<Registration, RegisterError> {
        let started_at = Instant::now();
        match self.register_inner(path) {
            Ok(registration) => {
                info!(
                    "event=register module=registrar status=ok id={} kind={} path={} duration_ms={}",
                    registration.id,
                    registration.kind,
                    self.config.relative(&registration.path).display(),
                    started_at.elapsed().as_millis()
                );
                Ok(registration)
            }
            Err(err) => {
                error!(
                    "event=register module=registrar status=error path={} duration_ms={} error={}",
                    path.display(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Registers every draft in `notes/` and `notes/questions/`.
    ///
    /// Files whose name already matches `{canonical id}.md` are skipped.
    /// Per-file failures are collected; the batch always continues.
    ///
    /// # Errors
    /// Returns `CorpusMissing` when `notes/` is absent, `Io` when a directory
    /// cannot be listed.
    pub fn scan_and_register_all(&self) -> Result<BatchSummary, RegisterError> {
        let notes_dir = self.config.notes_dir();
        if !notes_dir.is_dir() {
            return Err(RegisterError::CorpusMissing(notes_dir));
        }

        let drafts = self.discover_drafts()?;
        info!(
            "event=register_batch module=registrar status=start drafts={}",
            drafts.len()
        );

        let mut summary = BatchSummary::default();
        for draft in drafts {
            match self.register(&draft) {
                Ok(registration) => summary.registered.push(registration),
                Err(error) => summary.failures.push(BatchFailure { path: draft, error }),
            }
        }

        info!(
            "event=register_batch module=registrar status=ok registered={} errors={} warnings={}",
            summary.success_count(),
            summary.error_count(),
            summary.warning_count()
        );
        Ok(summary)
    }

    fn discover_drafts(&self) -> Result<Vec<PathBuf>, RegisterError> {
        let mut drafts = Vec::new();
        for dir in [self.config.notes_dir(), self.config.questions_dir()] {
            let files = list_markdown_files(&dir).map_err(|source| RegisterError::Io {
                path: dir.clone(),
                source,
            })?;
            drafts.extend(
                files
                    .into_iter()
                    .filter(|path| !is_canonical_file_name(file_name_str(path))),
            );
        }
        drafts.sort();
        Ok(drafts)
    }

    fn register_inner(&self, path: &Path) -> Result<Registration, RegisterError> {
        let source_path = self.resolve_draft(path)?;
        let _lock =
            CorpusLock::acquire(&self.config.lock_path()).map_err(RegisterError::Lock)?;

        let original = fs::read_to_string(&source_path).map_err(|source| RegisterError::Io {
            path: source_path.clone(),
            source,
        })?;
        let document = Document::parse(&original)?;
        let record = validate_draft(document.frontmatter(), &self.config.contract())?;
        let kind = record.kind();

        let (issued, destination) = self.issue_free_id(kind)?;
        let updated = document.with_identity(&issued)?;
        self.commit(&source_path, &destination, &original, &updated)?;

        let index = self
            .update_index(&record, &issued)
            .map_err(|source| RegisterError::Index {
                id: issued.id.clone(),
                path: destination.clone(),
                source,
            })?;

        Ok(Registration {
            id: issued.id,
            created: issued.created,
            kind,
            source_path,
            path: destination,
            index,
        })
    }

    fn resolve_draft(&self, path: &Path) -> Result<PathBuf, RegisterError> {
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.root().join(path)
        };
        if !candidate.is_file() {
            return Err(RegisterError::NotFound(candidate));
        }

        let notes_dir = self.config.notes_dir();
        let notes_dir = notes_dir
            .canonicalize()
            .map_err(|_| RegisterError::CorpusMissing(notes_dir))?;
        let resolved = candidate
            .canonicalize()
            .map_err(|source| RegisterError::Io {
                path: candidate.clone(),
                source,
            })?;
        if !resolved.starts_with(&notes_dir) {
            return Err(RegisterError::OutsideCorpus(candidate));
        }
        Ok(candidate)
    }

    /// Issues IDs until one whose canonical destination is free.
    fn issue_free_id(&self, kind: EntryKind) -> Result<(IssuedId, PathBuf), RegisterError> {
        let mut last_taken = None;
        for _ in 0..MAX_ID_ATTEMPTS {
            let issued = self.ids.issue(kind);
            let destination = self.config.canonical_path(&issued.id);
            if !destination.exists() {
                return Ok((issued, destination));
            }
            warn!(
                "event=register module=registrar status=retry reason=id_taken id={}",
                issued.id
            );
            last_taken = Some(destination);
        }
        Err(RegisterError::Collision(last_taken.unwrap_or_default()))
    }

    /// Writes the stamped text in place, then moves it to `destination`.
    ///
    /// A failed move restores the original text.
    fn commit(
        &self,
        source_path: &Path,
        destination: &Path,
        original: &str,
        updated: &str,
    ) -> Result<(), RegisterError> {
        if let Some(dir) = destination.parent() {
            fs::create_dir_all(dir).map_err(|source| RegisterError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        fs::write(source_path, updated).map_err(|source| RegisterError::Io {
            path: source_path.to_path_buf(),
            source,
        })?;

        if let Err(source) = fs::rename(source_path, destination) {
            if let Err(restore) = fs::write(source_path, original) {
                error!(
                    "event=register module=registrar status=error reason=restore_failed path={} error={}",
                    source_path.display(),
                    restore
                );
            }
            return Err(RegisterError::Io {
                path: destination.to_path_buf(),
                source,
            });
        }
        Ok(())
    }

    fn update_index(
        &self,
        record: &DraftRecord,
        issued: &IssuedId,
    ) -> Result<IndexUpdate, IndexError> {
        let index_path = self.config.index_path();
        if !index_path.is_file() {
            warn!(
                "event=index_update module=registrar status=skip reason=index_missing id={} path={}",
                issued.id,
                index_path.display()
            );
            return Ok(IndexUpdate::SkippedMissingIndex);
        }

        let mut index = IndexFile::load(&index_path)?;
        let back_link = match record {
            DraftRecord::Question(question) => {
                index.append_question(&QuestionRow {
                    id: issued.id.clone(),
                    status: question.status.as_str().to_string(),
                    question: question.question.clone(),
                    source: question.source.clone(),
                    answered_by: None,
                })?;
                None
            }
            DraftRecord::Note(note) => {
                index.append_note(&NoteRow {
                    id: issued.id.clone(),
                    title: note.title.clone(),
                    answers: Some(note.answers.clone()),
                    source: note.source.clone(),
                    created: issued.created.clone(),
                })?;
                let link = index.mark_answered(&note.answers, &issued.id);
                log_back_link(&link, &note.answers, &issued.id);
                Some(link)
            }
        };
        index.set_last_updated(&issued.created);
        index.save(&index_path)?;

        info!(
            "event=index_update module=registrar status=ok id={}",
            issued.id
        );
        Ok(IndexUpdate::Appended { back_link })
    }
}

fn log_back_link(link: &BackLink, question: &EntryId, note: &EntryId) {
    match link {
        BackLink::Linked => info!(
            "event=back_link module=registrar status=ok question={question} note={note}"
        ),
        BackLink::AlreadyAnswered(existing) => warn!(
            "event=back_link module=registrar status=skip reason=already_answered question={question} note={note} answered_by={}",
            existing.as_ref().map(EntryId::as_str).unwrap_or("-")
        ),
        BackLink::QuestionNotIndexed => warn!(
            "event=back_link module=registrar status=skip reason=question_not_indexed question={question} note={note}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{RegisterError, Registrar};
    use crate::config::CorpusConfig;
    use crate::model::id::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::fs;
    use std::path::Path;

    fn registrar(root: &Path) -> Registrar<FixedClock> {
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap());
        Registrar::with_clock(CorpusConfig::new(root), clock)
    }

    #[test]
    fn rejects_missing_and_outside_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("notes")).unwrap();
        fs::write(dir.path().join("draft.md"), "---\ntype: note\n---\n").unwrap();
        let registrar = registrar(dir.path());

        let err = registrar.register(Path::new("notes/absent.md")).unwrap_err();
        assert!(matches!(err, RegisterError::NotFound(_)));

        let err = registrar.register(Path::new("draft.md")).unwrap_err();
        assert!(matches!(err, RegisterError::OutsideCorpus(_)));
    }

    #[test]
    fn scan_requires_notes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = registrar(dir.path()).scan_and_register_all().unwrap_err();
        assert!(matches!(err, RegisterError::CorpusMissing(_)));
    }

    #[test]
    fn taken_destination_advances_to_next_millisecond() {
        let dir = tempfile::tempdir().unwrap();
        let questions = dir.path().join("notes/questions");
        fs::create_dir_all(&questions).unwrap();
        fs::write(questions.join("Q-20250101-120000-000.md"), "taken").unwrap();
        fs::write(
            questions.join("draft.md"),
            "---\ntype: question\nid: PLACEHOLDER\nquestion: Why?\nsource: asker\nstatus: open\ncreated: PLACEHOLDER\n---\n",
        )
        .unwrap();

        let registration = registrar(dir.path())
            .register(Path::new("notes/questions/draft.md"))
            .unwrap();
        assert_eq!(registration.id.as_str(), "Q-20250101-120000-001");
        assert_eq!(
            fs::read_to_string(questions.join("Q-20250101-120000-000.md")).unwrap(),
            "taken"
        );
    }
}
