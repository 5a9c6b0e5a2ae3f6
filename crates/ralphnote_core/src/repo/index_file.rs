//! Master index file: two append-only markdown tables.
//!
//! # Responsibility
//! - Insert question/note rows right before their table sentinel.
//! - Flip an open question row to answered with a back-link.
//! - Rewrite the `Last Updated:` line.
//! - Read rows back for the auditor's cross-check.
//!
//! # Invariants
//! - Rows are only ever appended; the sole in-place row mutation is the
//!   `open -> answered` flip of one question row.
//! - Insertion order is chronological order.
//! - IDs are written as `[[ID]]` wikilinks.

use crate::model::id::EntryId;
use crate::repo::corpus::write_replacing;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::Path;

/// Sentinel closing the Questions table.
pub const QUESTIONS_SENTINEL: &str = "<!-- END QUESTIONS -->";
/// Sentinel closing the Notes table.
pub const NOTES_SENTINEL: &str = "<!-- END NOTES -->";

const LAST_UPDATED_PREFIX: &str = "Last Updated:";

const FRESH_INDEX: &str = "\
# Research Index

Last Updated: \u{2014}

## Questions

| ID | Status | Question | Source | Answered By |
|----|--------|----------|--------|-------------|
<!-- END QUESTIONS -->

## Notes

| ID | Title | Answers | Source Doc | Created |
|----|-------|---------|-----------|---------|
<!-- END NOTES -->
";

/// Index read/update failure.
#[derive(Debug)]
pub enum IndexError {
    Io(io::Error),
    /// The table sentinel the row belongs before is absent.
    MissingSentinel(&'static str),
}

impl Display for IndexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "index I/O failed: {err}"),
            Self::MissingSentinel(sentinel) => {
                write!(f, "index is missing the `{sentinel}` sentinel")
            }
        }
    }
}

impl Error for IndexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::MissingSentinel(_) => None,
        }
    }
}

impl From<io::Error> for IndexError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// One row of the Questions table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRow {
    pub id: EntryId,
    pub status: String,
    pub question: String,
    pub source: String,
    /// Answering note, once answered.
    pub answered_by: Option<EntryId>,
}

impl QuestionRow {
    fn render(&self) -> String {
        render_row(&[
            self.id.wikilink(),
            self.status.clone(),
            escape_cell(&self.question),
            escape_cell(&self.source),
            self.answered_by
                .as_ref()
                .map(EntryId::wikilink)
                .unwrap_or_default(),
        ])
    }
}

/// One row of the Notes table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRow {
    pub id: EntryId,
    pub title: String,
    pub answers: Option<EntryId>,
    pub source: String,
    pub created: String,
}

impl NoteRow {
    fn render(&self) -> String {
        render_row(&[
            self.id.wikilink(),
            escape_cell(&self.title),
            self.answers
                .as_ref()
                .map(EntryId::wikilink)
                .unwrap_or_default(),
            escape_cell(&self.source),
            self.created.clone(),
        ])
    }
}

/// Result of flipping a question row to answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackLink {
    /// Row flipped `open -> answered` and now links the note.
    Linked,
    /// Row was already answered by the given note and was left untouched.
    AlreadyAnswered(Option<EntryId>),
    /// No Questions row names the question.
    QuestionNotIndexed,
}

/// In-memory index document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFile {
    lines: Vec<String>,
    trailing_newline: bool,
}

impl IndexFile {
    /// Template of an empty index.
    pub fn fresh_template() -> &'static str {
        FRESH_INDEX
    }

    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            trailing_newline: text.ends_with('\n'),
        }
    }

    pub fn load(path: &Path) -> Result<Self, IndexError> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    /// Persists through a temporary sibling file and rename.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        write_replacing(path, &self.render())?;
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }

    /// Inserts a question row immediately before the Questions sentinel.
    pub fn append_question(&mut self, row: &QuestionRow) -> Result<(), IndexError> {
        let at = self
            .sentinel_position(QUESTIONS_SENTINEL)
            .ok_or(IndexError::MissingSentinel(QUESTIONS_SENTINEL))?;
        self.lines.insert(at, row.render());
        Ok(())
    }

    /// Inserts a note row immediately before the Notes sentinel.
    pub fn append_note(&mut self, row: &NoteRow) -> Result<(), IndexError> {
        let at = self
            .sentinel_position(NOTES_SENTINEL)
            .ok_or(IndexError::MissingSentinel(NOTES_SENTINEL))?;
        self.lines.insert(at, row.render());
        Ok(())
    }

    /// Marks `question` answered by `note`, touching only that row.
    pub fn mark_answered(&mut self, question: &EntryId, note: &EntryId) -> BackLink {
        let end = self
            .sentinel_position(QUESTIONS_SENTINEL)
            .unwrap_or(self.lines.len());

        for line in self.lines[..end].iter_mut() {
            let Some(mut row) = parse_question_row(line) else {
                continue;
            };
            if &row.id != question {
                continue;
            }
            if row.status != "open" {
                return BackLink::AlreadyAnswered(row.answered_by);
            }
            row.status = "answered".to_string();
            row.answered_by = Some(note.clone());
            *line = row.render();
            return BackLink::Linked;
        }

        BackLink::QuestionNotIndexed
    }

    /// Rewrites every `Last Updated:` line to `timestamp`.
    pub fn set_last_updated(&mut self, timestamp: &str) {
        for line in self
            .lines
            .iter_mut()
            .filter(|line| line.starts_with(LAST_UPDATED_PREFIX))
        {
            *line = format!("{LAST_UPDATED_PREFIX} {timestamp}");
        }
    }

    /// Rows of the Questions table, in file order.
    pub fn question_rows(&self) -> Vec<QuestionRow> {
        let end = self
            .sentinel_position(QUESTIONS_SENTINEL)
            .unwrap_or(self.lines.len());
        self.lines[..end]
            .iter()
            .filter_map(|line| parse_question_row(line))
            .collect()
    }

    /// Rows of the Notes table, in file order.
    pub fn note_rows(&self) -> Vec<NoteRow> {
        let start = self
            .sentinel_position(QUESTIONS_SENTINEL)
            .map(|at| at + 1)
            .unwrap_or(0);
        let end = self
            .sentinel_position(NOTES_SENTINEL)
            .unwrap_or(self.lines.len())
            .max(start);
        self.lines[start..end]
            .iter()
            .filter_map(|line| parse_note_row(line))
            .collect()
    }

    fn sentinel_position(&self, sentinel: &str) -> Option<usize> {
        self.lines.iter().position(|line| line.trim() == sentinel)
    }
}

fn render_row(cells: &[String]) -> String {
    let mut out = String::from("|");
    for cell in cells {
        if cell.is_empty() {
            out.push_str(" |");
        } else {
            out.push(' ');
            out.push_str(cell);
            out.push_str(" |");
        }
    }
    out
}

fn escape_cell(value: &str) -> String {
    value
        .replace(['\r', '\n'], " ")
        .replace('|', "\\|")
        .trim()
        .to_string()
}

/// Splits a `| a | b |` table line on unescaped pipes.
///
/// `\|` inside a cell decodes to a literal `|`, so parsed cells re-render
/// through `escape_cell` unchanged.
fn split_cells(line: &str) -> Option<Vec<String>> {
    let inner = line.trim().strip_prefix('|')?.strip_suffix('|')?;
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    cells.push(current.trim().to_string());
    Some(cells)
}

/// Reads an ID cell written as `[[ID]]` or a bare `ID`.
fn parse_id_cell(cell: &str) -> Option<EntryId> {
    let bare = cell
        .strip_prefix("[[")
        .and_then(|rest| rest.strip_suffix("]]"))
        .unwrap_or(cell);
    EntryId::parse(bare.trim())
}

fn parse_question_row(line: &str) -> Option<QuestionRow> {
    let cells = split_cells(line)?;
    if cells.len() != 5 {
        return None;
    }
    let id = parse_id_cell(&cells[0]).filter(|id| id.as_str().starts_with("Q-"))?;
    Some(QuestionRow {
        id,
        status: cells[1].clone(),
        question: cells[2].clone(),
        source: cells[3].clone(),
        answered_by: parse_id_cell(&cells[4]),
    })
}

fn parse_note_row(line: &str) -> Option<NoteRow> {
    let cells = split_cells(line)?;
    if cells.len() != 5 {
        return None;
    }
    let id = parse_id_cell(&cells[0]).filter(|id| id.as_str().starts_with("NOTE-"))?;
    Some(NoteRow {
        id,
        title: cells[1].clone(),
        answers: parse_id_cell(&cells[2]),
        source: cells[3].clone(),
        created: cells[4].clone(),
    })
}
