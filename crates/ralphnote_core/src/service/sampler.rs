//! Random batch selection of registered notes.
//!
//! Hands a connector a few canonical notes to cross-link. Only the naming
//! convention is consulted; frontmatter is not read.

use crate::config::CorpusConfig;
use crate::model::id::is_note_file_name;
use crate::repo::corpus::{file_name_str, list_markdown_files};
use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use std::io;
use std::path::PathBuf;

/// Default batch size of the CLI.
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Picks up to `size` registered notes at random.
///
/// Returns paths relative to the corpus root, in selection order. The batch
/// is clamped to the number of registered notes.
pub fn sample_notes<R: Rng + ?Sized>(
    config: &CorpusConfig,
    size: usize,
    rng: &mut R,
) -> io::Result<Vec<PathBuf>> {
    let notes: Vec<PathBuf> = list_markdown_files(&config.notes_dir())?
        .into_iter()
        .filter(|path| is_note_file_name(file_name_str(path)))
        .collect();

    let batch: Vec<PathBuf> = notes
        .choose_multiple(rng, size.min(notes.len()))
        .map(|path| config.relative(path))
        .collect();

    info!(
        "event=sample module=sampler status=ok population={} selected={}",
        notes.len(),
        batch.len()
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::sample_notes;
    use crate::config::CorpusConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn samples_only_registered_notes_without_repeats() {
        let dir = tempfile::tempdir().unwrap();
        let config = CorpusConfig::new(dir.path());
        fs::create_dir_all(config.questions_dir()).unwrap();
        for name in [
            "NOTE-20250101-120000-000.md",
            "NOTE-20250101-120000-001.md",
            "NOTE-20250101-120000-002.md",
            "draft.md",
        ] {
            fs::write(config.notes_dir().join(name), "").unwrap();
        }
        fs::write(config.questions_dir().join("Q-20250101-120000-000.md"), "").unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        let batch = sample_notes(&config, 2, &mut rng).unwrap();
        assert_eq!(batch.len(), 2);
        let unique: HashSet<&PathBuf> = batch.iter().collect();
        assert_eq!(unique.len(), 2);
        for path in &batch {
            assert!(path.starts_with("notes"));
            assert!(path.file_name().unwrap().to_string_lossy().starts_with("NOTE-"));
        }

        let all = sample_notes(&config, 10, &mut rng).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn empty_corpus_yields_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let config = CorpusConfig::new(dir.path());
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample_notes(&config, 3, &mut rng).unwrap().is_empty());
    }
}
