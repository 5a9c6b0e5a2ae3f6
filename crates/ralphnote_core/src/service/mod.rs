//! Corpus use-case services.
//!
//! # Responsibility
//! - Orchestrate model validation and repo access into registration,
//!   auditing, sampling and layout bootstrap.
//! - Keep the CLI decoupled from file layout details.

pub mod auditor;
pub mod bootstrap;
pub mod registrar;
pub mod sampler;
