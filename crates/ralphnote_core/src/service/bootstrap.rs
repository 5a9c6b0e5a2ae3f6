//! Fresh corpus layout creation.
//!
//! # Invariants
//! - Never overwrites an existing index; existing documents are untouched.

use crate::config::CorpusConfig;
use crate::repo::index_file::IndexFile;
use log::info;
use std::fs;
use std::io;

/// What `init_corpus` created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitOutcome {
    pub index_created: bool,
}

/// Creates `notes/`, `notes/questions/` and an empty index when absent.
pub fn init_corpus(config: &CorpusConfig) -> io::Result<InitOutcome> {
    fs::create_dir_all(config.questions_dir())?;

    let index_path = config.index_path();
    let index_created = if index_path.exists() {
        false
    } else {
        fs::write(&index_path, IndexFile::fresh_template())?;
        true
    };

    info!(
        "event=corpus_init module=bootstrap status=ok root={} index_created={}",
        config.root().display(),
        index_created
    );
    Ok(InitOutcome { index_created })
}
