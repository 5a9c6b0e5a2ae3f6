//! Document model for the note/question corpus.
//!
//! # Responsibility
//! - Define canonical identifiers and their generator.
//! - Extract and decode document frontmatter.
//! - Hold the per-kind field contracts for drafts.
//!
//! # Invariants
//! - Every canonical document is identified by a stable `EntryId`.
//! - `id` and `created` are assigned once, at registration.

pub mod document;
pub mod id;
pub mod schema;
