use chrono::{TimeZone, Utc};
use ralphnote_core::{
    init_corpus, Auditor, BackLink, CorpusConfig, EntryKind, FixedClock, FrontmatterError,
    IndexFile, IndexUpdate, RegisterError, Registrar,
};
use std::fs;
use std::path::Path;

const QUESTION_DRAFT: &str = "---\ntype: question\nid: PLACEHOLDER\nquestion: \"What is X?\"\nsource: asker\nstatus: open\ncreated: PLACEHOLDER\n---\n\nBody of the question.\n";

fn registrar(root: &Path) -> Registrar<FixedClock> {
    let clock = FixedClock(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap());
    Registrar::with_clock(CorpusConfig::new(root), clock)
}

fn note_draft(answers: &str) -> String {
    format!(
        "---\ntype: note\nid: PLACEHOLDER\ntitle: Why X matters\nanswers: {answers}\nsource: docs/x.md\ntags:\n  - x\n  - research\ncreated: PLACEHOLDER\n---\n\nSee [[{answers}]].\n"
    )
}

#[test]
fn question_draft_lands_at_canonical_path_with_index_row() {
    let dir = tempfile::tempdir().unwrap();
    let config = CorpusConfig::new(dir.path());
    init_corpus(&config).unwrap();
    fs::write(dir.path().join("notes/draft.md"), QUESTION_DRAFT).unwrap();

    let registration = registrar(dir.path())
        .register(Path::new("notes/draft.md"))
        .unwrap();

    assert_eq!(registration.id.as_str(), "Q-20250101-120000-000");
    assert_eq!(registration.kind, EntryKind::Question);
    assert_eq!(registration.created, "2025-01-01T12:00:00.000Z");
    assert_eq!(
        registration.path,
        dir.path().join("notes/questions/Q-20250101-120000-000.md")
    );
    assert!(!dir.path().join("notes/draft.md").exists());

    let stored = fs::read_to_string(&registration.path).unwrap();
    assert!(stored.contains("id: Q-20250101-120000-000\n"));
    assert!(stored.contains("created: 2025-01-01T12:00:00.000Z\n"));
    assert!(!stored.contains("PLACEHOLDER"));
    assert!(stored.ends_with("\nBody of the question.\n"));

    let index = fs::read_to_string(config.index_path()).unwrap();
    assert!(index
        .lines()
        .any(|line| line == "| [[Q-20250101-120000-000]] | open | What is X? | asker | |"));
    assert!(index.contains("Last Updated: 2025-01-01T12:00:00.000Z"));
    assert_eq!(
        registration.index,
        IndexUpdate::Appended { back_link: None }
    );
}

#[test]
fn registered_corpus_audits_clean() {
    let dir = tempfile::tempdir().unwrap();
    let config = CorpusConfig::new(dir.path());
    init_corpus(&config).unwrap();
    fs::write(dir.path().join("notes/questions/q.md"), QUESTION_DRAFT).unwrap();
    fs::write(
        dir.path().join("notes/n.md"),
        note_draft("Q-20250101-120000-000"),
    )
    .unwrap();

    let summary = registrar(dir.path()).scan_and_register_all().unwrap();
    assert_eq!(summary.success_count(), 2);
    assert_eq!(summary.error_count(), 0);

    let report = Auditor::new(config).audit(false).unwrap();
    assert!(report.is_all_clear(), "unexpected findings: {report:?}");
    assert_eq!(report.documents_scanned, 2);
    assert_eq!(report.ids.len(), 2);
}

#[test]
fn note_answering_question_flips_only_that_row() {
    let dir = tempfile::tempdir().unwrap();
    let config = CorpusConfig::new(dir.path());
    init_corpus(&config).unwrap();
    let registrar = registrar(dir.path());

    fs::write(dir.path().join("notes/questions/a.md"), QUESTION_DRAFT).unwrap();
    fs::write(
        dir.path().join("notes/questions/b.md"),
        QUESTION_DRAFT.replace("What is X?", "What is Y?"),
    )
    .unwrap();
    let first = registrar
        .register(Path::new("notes/questions/a.md"))
        .unwrap();
    let second = registrar
        .register(Path::new("notes/questions/b.md"))
        .unwrap();
    let before = IndexFile::load(&config.index_path()).unwrap();

    fs::write(
        dir.path().join("notes/answer.md"),
        note_draft(first.id.as_str()),
    )
    .unwrap();
    let note = registrar.register(Path::new("notes/answer.md")).unwrap();
    assert_eq!(note.id.as_str(), "NOTE-20250101-120000-002");
    assert_eq!(
        note.index,
        IndexUpdate::Appended {
            back_link: Some(BackLink::Linked)
        }
    );

    let after = IndexFile::load(&config.index_path()).unwrap();
    let rows = after.question_rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, first.id);
    assert_eq!(rows[0].status, "answered");
    assert_eq!(rows[0].answered_by.as_ref(), Some(&note.id));
    assert_eq!(rows[1], before.question_rows()[1]);
    assert_eq!(rows[1].id, second.id);
    assert_eq!(rows[1].status, "open");

    let notes = after.note_rows();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].answers.as_ref(), Some(&first.id));
    assert_eq!(notes[0].created, "2025-01-01T12:00:00.002Z");
}

#[test]
fn second_answer_leaves_answered_question_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let config = CorpusConfig::new(dir.path());
    init_corpus(&config).unwrap();
    let registrar = registrar(dir.path());

    fs::write(dir.path().join("notes/questions/q.md"), QUESTION_DRAFT).unwrap();
    let question = registrar
        .register(Path::new("notes/questions/q.md"))
        .unwrap();

    fs::write(dir.path().join("notes/one.md"), note_draft(question.id.as_str())).unwrap();
    let first_note = registrar.register(Path::new("notes/one.md")).unwrap();
    fs::write(dir.path().join("notes/two.md"), note_draft(question.id.as_str())).unwrap();
    let second_note = registrar.register(Path::new("notes/two.md")).unwrap();

    assert_eq!(
        second_note.index,
        IndexUpdate::Appended {
            back_link: Some(BackLink::AlreadyAnswered(Some(first_note.id.clone())))
        }
    );
    let rows = IndexFile::load(&config.index_path()).unwrap().question_rows();
    assert_eq!(rows[0].answered_by.as_ref(), Some(&first_note.id));
}

#[test]
fn note_for_unindexed_question_is_still_registered() {
    let dir = tempfile::tempdir().unwrap();
    let config = CorpusConfig::new(dir.path());
    init_corpus(&config).unwrap();
    fs::write(
        dir.path().join("notes/n.md"),
        note_draft("Q-20240101-000000-000"),
    )
    .unwrap();

    let note = registrar(dir.path())
        .register(Path::new("notes/n.md"))
        .unwrap();
    assert_eq!(
        note.index,
        IndexUpdate::Appended {
            back_link: Some(BackLink::QuestionNotIndexed)
        }
    );
    assert!(note.path.is_file());
}

#[test]
fn schema_failure_leaves_draft_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let config = CorpusConfig::new(dir.path());
    init_corpus(&config).unwrap();
    let draft = "---\ntype: note\nid: PLACEHOLDER\ntitle: one two three four five six seven eight nine ten eleven\nanswers: not-a-question\nsource: elsewhere/x.md\ntags: []\ncreated: PLACEHOLDER\n---\n";
    let path = dir.path().join("notes/bad.md");
    fs::write(&path, draft).unwrap();
    let index_before = fs::read_to_string(config.index_path()).unwrap();

    let err = registrar(dir.path())
        .register(Path::new("notes/bad.md"))
        .unwrap_err();
    let RegisterError::Schema(schema) = err else {
        panic!("expected a schema error");
    };
    for field in ["title", "answers", "source", "tags"] {
        assert!(schema.has_field(field), "missing violation for {field}");
    }

    assert_eq!(fs::read_to_string(&path).unwrap(), draft);
    assert_eq!(
        fs::read_to_string(config.index_path()).unwrap(),
        index_before
    );
    assert!(fs::read_dir(config.questions_dir()).unwrap().next().is_none());
}

#[test]
fn missing_frontmatter_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    init_corpus(&CorpusConfig::new(dir.path())).unwrap();
    fs::write(dir.path().join("notes/plain.md"), "just text\n").unwrap();

    let err = registrar(dir.path())
        .register(Path::new("notes/plain.md"))
        .unwrap_err();
    assert!(matches!(err, RegisterError::Frontmatter(_)));
    assert!(dir.path().join("notes/plain.md").is_file());
}

#[test]
fn missing_index_registers_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    let config = CorpusConfig::new(dir.path());
    fs::create_dir_all(config.notes_dir()).unwrap();
    fs::write(dir.path().join("notes/q.md"), QUESTION_DRAFT).unwrap();

    let summary = registrar(dir.path()).scan_and_register_all().unwrap();
    assert_eq!(summary.success_count(), 1);
    assert_eq!(summary.warning_count(), 1);
    assert_eq!(summary.registered[0].index, IndexUpdate::SkippedMissingIndex);
    assert!(summary.registered[0].path.is_file());
    assert!(!config.index_path().exists());
}

#[test]
fn batch_continues_past_failures_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = CorpusConfig::new(dir.path());
    init_corpus(&config).unwrap();
    fs::write(dir.path().join("notes/a-bad.md"), "no frontmatter\n").unwrap();
    fs::write(dir.path().join("notes/b-good.md"), QUESTION_DRAFT).unwrap();
    let registrar = registrar(dir.path());

    let first = registrar.scan_and_register_all().unwrap();
    assert_eq!(first.success_count(), 1);
    assert_eq!(first.error_count(), 1);
    assert_eq!(first.failures[0].path, dir.path().join("notes/a-bad.md"));
    let index_after_first = fs::read_to_string(config.index_path()).unwrap();

    let second = registrar.scan_and_register_all().unwrap();
    assert_eq!(second.success_count(), 0);
    assert_eq!(second.error_count(), 1);
    assert_eq!(
        fs::read_to_string(config.index_path()).unwrap(),
        index_after_first
    );
    assert_eq!(
        IndexFile::load(&config.index_path())
            .unwrap()
            .question_rows()
            .len(),
        1
    );
}

#[test]
fn commented_placeholders_are_stamped_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let config = CorpusConfig::new(dir.path());
    init_corpus(&config).unwrap();
    let draft = QUESTION_DRAFT
        .replace("id: PLACEHOLDER", "id: PLACEHOLDER # assigned on register")
        .replace("created: PLACEHOLDER", "created: \"PLACEHOLDER\"");
    fs::write(dir.path().join("notes/questions/q.md"), draft).unwrap();

    let registration = registrar(dir.path())
        .register(Path::new("notes/questions/q.md"))
        .unwrap();

    let stored = fs::read_to_string(&registration.path).unwrap();
    assert!(stored.contains("\nid: Q-20250101-120000-000 # assigned on register\n"));
    assert!(stored.contains("\ncreated: 2025-01-01T12:00:00.000Z\n"));
    assert!(!stored.contains("PLACEHOLDER"));

    let report = Auditor::new(config).audit(false).unwrap();
    assert!(report.is_all_clear(), "unexpected findings: {report:?}");
}

#[test]
fn flow_mapping_draft_is_rejected_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let config = CorpusConfig::new(dir.path());
    init_corpus(&config).unwrap();
    let draft = "---\n{type: question, id: PLACEHOLDER, question: What is Y, source: asker, status: open, created: PLACEHOLDER}\n---\n";
    let path = dir.path().join("notes/questions/flow.md");
    fs::write(&path, draft).unwrap();
    let index_before = fs::read_to_string(config.index_path()).unwrap();

    let err = registrar(dir.path())
        .register(Path::new("notes/questions/flow.md"))
        .unwrap_err();
    assert!(matches!(
        err,
        RegisterError::Frontmatter(FrontmatterError::Unstamped("id"))
    ));

    assert_eq!(fs::read_to_string(&path).unwrap(), draft);
    assert!(!config
        .questions_dir()
        .join("Q-20250101-120000-000.md")
        .exists());
    assert_eq!(
        fs::read_to_string(config.index_path()).unwrap(),
        index_before
    );
}

#[test]
fn back_link_survives_pipes_in_question_text() {
    let dir = tempfile::tempdir().unwrap();
    let config = CorpusConfig::new(dir.path());
    init_corpus(&config).unwrap();
    let registrar = registrar(dir.path());
    fs::write(
        dir.path().join("notes/questions/q.md"),
        QUESTION_DRAFT.replace("\"What is X?\"", "\"A | B?\""),
    )
    .unwrap();
    let question = registrar
        .register(Path::new("notes/questions/q.md"))
        .unwrap();

    fs::write(dir.path().join("notes/n.md"), note_draft(question.id.as_str())).unwrap();
    let note = registrar.register(Path::new("notes/n.md")).unwrap();
    assert_eq!(
        note.index,
        IndexUpdate::Appended {
            back_link: Some(BackLink::Linked)
        }
    );

    let index_text = fs::read_to_string(config.index_path()).unwrap();
    assert!(index_text.lines().any(|line| line
        == "| [[Q-20250101-120000-000]] | answered | A \\| B? | asker | [[NOTE-20250101-120000-001]] |"));

    let rows = IndexFile::load(&config.index_path()).unwrap().question_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].question, "A | B?");
    assert_eq!(rows[0].answered_by.as_ref(), Some(&note.id));

    let report = Auditor::new(config).audit(false).unwrap();
    assert!(report.is_all_clear(), "unexpected findings: {report:?}");
}
