//! Registry and validator core for the Ralph research-note corpus.
//! This crate is the single source of truth for corpus invariants: canonical
//! identity, draft schema, canonical placement, index tables and references.

pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{CorpusConfig, DEFAULT_DOCS_PREFIX, DEFAULT_QUESTION_SOURCE};
pub use logging::{default_log_level, init_logging, logging_status, LogSink};
pub use model::document::{Document, FrontmatterError, RawFrontmatter};
pub use model::id::{
    Clock, EntryId, EntryKind, FixedClock, IdGenerator, IssuedId, SystemClock, PLACEHOLDER,
};
pub use model::schema::{
    validate_draft, DraftRecord, NoteRecord, QuestionRecord, QuestionStatus, SchemaContract,
    SchemaError, SchemaViolation,
};
pub use repo::index_file::{BackLink, IndexError, IndexFile};
pub use service::auditor::{AuditError, AuditReport, Auditor, Finding, Problem};
pub use service::bootstrap::{init_corpus, InitOutcome};
pub use service::registrar::{
    BatchFailure, BatchSummary, IndexUpdate, RegisterError, Registrar, Registration,
};
pub use service::sampler::{sample_notes, DEFAULT_BATCH_SIZE};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
