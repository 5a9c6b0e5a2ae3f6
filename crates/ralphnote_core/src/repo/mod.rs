//! Flat-file persistence for the corpus and its master index.
//!
//! # Responsibility
//! - Isolate directory listing, locking and index table editing from the
//!   registrar/auditor orchestration.
//!
//! # Invariants
//! - Index rewrites go through a temporary file and rename.
//! - Corpus mutations happen under `CorpusLock`.

pub mod corpus;
pub mod index_file;
