//! Flat-file corpus access: directory listing and the registration lock.
//!
//! # Responsibility
//! - List markdown documents of the two canonical directories.
//! - Serialize corpus mutations across processes with an advisory lock.
//!
//! # Invariants
//! - Listings are sorted by path so discovery order is deterministic.
//! - The lock is released when `CorpusLock` drops.

use crate::config::CorpusConfig;
use fs2::FileExt;
use log::debug;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Lists `*.md` files directly inside `dir`, sorted by path.
///
/// A missing directory yields an empty list.
pub fn list_markdown_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) == Some("md") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Lists every document of both canonical directories, sorted by path.
pub fn list_corpus_documents(config: &CorpusConfig) -> io::Result<Vec<PathBuf>> {
    let mut files = list_markdown_files(&config.notes_dir())?;
    files.extend(list_markdown_files(&config.questions_dir())?);
    files.sort();
    Ok(files)
}

/// Returns the file name of `path` as UTF-8, or an empty string.
pub fn file_name_str(path: &Path) -> &str {
    path.file_name().and_then(|name| name.to_str()).unwrap_or("")
}

/// Writes `contents` to a sibling temporary file, then renames it over `path`.
pub fn write_replacing(path: &Path, contents: &str) -> io::Result<()> {
    let mut tmp_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)
}

/// Exclusive advisory lock over corpus mutations.
///
/// Held by the registrar for the whole read-validate-move-index span of one
/// document, so concurrent registrars never interleave index updates.
#[derive(Debug)]
pub struct CorpusLock {
    file: File,
    path: PathBuf,
}

impl CorpusLock {
    /// Blocks until the exclusive lock on `path` is acquired.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        FileExt::lock_exclusive(&file)?;
        debug!(
            "event=corpus_lock module=repo status=acquired path={}",
            path.display()
        );
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for CorpusLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(
            "event=corpus_lock module=repo status=released path={}",
            self.path.display()
        );
    }
}
