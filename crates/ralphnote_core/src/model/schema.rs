//! Draft frontmatter contracts for notes and questions.
//!
//! # Responsibility
//! - Turn a decoded field set into a kind-tagged record, or list every
//!   violated field contract.
//!
//! # Invariants
//! - Pure: no I/O, no clock, no global state.
//! - A draft still carries `id: PLACEHOLDER` and `created: PLACEHOLDER`.
//! - A question can only be authored as `open`.

use crate::model::document::RawFrontmatter;
use crate::model::id::{EntryId, EntryKind, PLACEHOLDER};
use serde_yaml::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

const TITLE_MAX_CHARS: usize = 80;
const TITLE_MAX_WORDS: usize = 10;

/// Values the contracts compare against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaContract {
    /// Prefix every note `source` must start with, e.g. `docs/`.
    pub docs_prefix: String,
    /// Exact `source` value of questions.
    pub question_source: String,
}

/// Status of a question row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStatus {
    Open,
    Answered,
}

impl QuestionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Answered => "answered",
        }
    }
}

/// Validated draft note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRecord {
    pub title: String,
    pub answers: EntryId,
    pub source: String,
    pub tags: Vec<String>,
}

/// Validated draft question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    pub question: String,
    pub parent: Option<EntryId>,
    pub source: String,
    pub status: QuestionStatus,
}

/// Kind-tagged validated draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftRecord {
    Note(NoteRecord),
    Question(QuestionRecord),
}

impl DraftRecord {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Note(_) => EntryKind::Note,
            Self::Question(_) => EntryKind::Question,
        }
    }
}

/// One violated field contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub field: &'static str,
    pub message: String,
}

/// Every violated field contract of one draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub violations: Vec<SchemaViolation>,
}

impl SchemaError {
    /// Returns whether `field` is among the violations.
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "schema validation failed:")?;
        for violation in &self.violations {
            write!(f, " {}: {};", violation.field, violation.message)?;
        }
        Ok(())
    }
}

impl Error for SchemaError {}

#[derive(Default)]
struct Violations(Vec<SchemaViolation>);

impl Violations {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(SchemaViolation {
            field,
            message: message.into(),
        });
    }

    /// Reads a required string field, recording a violation when absent.
    fn string<'v>(&mut self, field: &'static str, value: Option<&'v Value>) -> Option<&'v str> {
        match value {
            None => {
                self.push(field, "field is required");
                None
            }
            Some(Value::String(text)) => Some(text.as_str()),
            Some(_) => {
                self.push(field, "must be a string");
                None
            }
        }
    }

    fn placeholder(&mut self, field: &'static str, value: Option<&Value>) {
        if let Some(text) = self.string(field, value) {
            if text != PLACEHOLDER {
                self.push(field, format!("must be `{PLACEHOLDER}` before registration"));
            }
        }
    }
}

/// Validates a draft's frontmatter against the contract of its declared kind.
///
/// # Errors
/// Returns `SchemaError` listing every violated field; a missing or unknown
/// `type` is reported alone since no contract applies.
pub fn validate_draft(
    raw: &RawFrontmatter,
    contract: &SchemaContract,
) -> Result<DraftRecord, SchemaError> {
    let mut violations = Violations::default();

    let kind = match violations.string("type", raw.kind.as_ref()) {
        Some(value) => match EntryKind::parse(value) {
            Some(kind) => kind,
            None => {
                violations.push("type", format!("unknown document type `{value}`"));
                return Err(SchemaError {
                    violations: violations.0,
                });
            }
        },
        None => {
            return Err(SchemaError {
                violations: violations.0,
            })
        }
    };

    violations.placeholder("id", raw.id.as_ref());
    violations.placeholder("created", raw.created.as_ref());

    let record = match kind {
        EntryKind::Note => validate_note(raw, contract, &mut violations).map(DraftRecord::Note),
        EntryKind::Question => {
            validate_question(raw, contract, &mut violations).map(DraftRecord::Question)
        }
    };

    match record {
        Some(record) if violations.0.is_empty() => Ok(record),
        _ => Err(SchemaError {
            violations: violations.0,
        }),
    }
}

fn validate_note(
    raw: &RawFrontmatter,
    contract: &SchemaContract,
    violations: &mut Violations,
) -> Option<NoteRecord> {
    let title = violations.string("title", raw.title.as_ref()).and_then(|title| {
        let chars = title.chars().count();
        if chars == 0 || chars > TITLE_MAX_CHARS {
            violations.push(
                "title",
                format!("must be 1-{TITLE_MAX_CHARS} characters, got {chars}"),
            );
            return None;
        }
        let words = title.split_whitespace().count();
        if words == 0 || words > TITLE_MAX_WORDS {
            violations.push(
                "title",
                format!("must be 1-{TITLE_MAX_WORDS} words, got {words}"),
            );
            return None;
        }
        Some(title.to_string())
    });

    let answers = violations
        .string("answers", raw.answers.as_ref())
        .and_then(|value| {
            let parsed = EntryId::parse_question(value);
            if parsed.is_none() {
                violations.push(
                    "answers",
                    format!("must be a question ID (Q-YYYYMMDD-HHMMSS-mmm), got `{value}`"),
                );
            }
            parsed
        });

    let source = violations
        .string("source", raw.source.as_ref())
        .and_then(|value| {
            if value.starts_with(contract.docs_prefix.as_str()) && value != contract.docs_prefix {
                Some(value.to_string())
            } else {
                violations.push(
                    "source",
                    format!("must reference a file under `{}`", contract.docs_prefix),
                );
                None
            }
        });

    let tags = match raw.tags.as_ref() {
        None => {
            violations.push("tags", "field is required");
            None
        }
        Some(Value::Sequence(items)) if items.is_empty() => {
            violations.push("tags", "must contain at least one tag");
            None
        }
        Some(Value::Sequence(items)) => {
            let tags: Vec<String> = items
                .iter()
                .filter_map(|item| item.as_str())
                .filter(|tag| !tag.trim().is_empty())
                .map(str::to_string)
                .collect();
            if tags.len() == items.len() {
                Some(tags)
            } else {
                violations.push("tags", "every tag must be a non-empty string");
                None
            }
        }
        Some(_) => {
            violations.push("tags", "must be a list of strings");
            None
        }
    };

    Some(NoteRecord {
        title: title?,
        answers: answers?,
        source: source?,
        tags: tags?,
    })
}

fn validate_question(
    raw: &RawFrontmatter,
    contract: &SchemaContract,
    violations: &mut Violations,
) -> Option<QuestionRecord> {
    let question = violations
        .string("question", raw.question.as_ref())
        .and_then(|text| {
            if text.trim().is_empty() {
                violations.push("question", "must not be empty");
                None
            } else {
                Some(text.to_string())
            }
        });

    let parent = match raw.parent.as_ref() {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(value)) => match EntryId::parse_question(value) {
            Some(id) => Some(Some(id)),
            None => {
                violations.push(
                    "parent",
                    format!("must be a question ID (Q-YYYYMMDD-HHMMSS-mmm), got `{value}`"),
                );
                None
            }
        },
        Some(_) => {
            violations.push("parent", "must be a string");
            None
        }
    };

    let source = violations
        .string("source", raw.source.as_ref())
        .and_then(|value| {
            if value == contract.question_source {
                Some(value.to_string())
            } else {
                violations.push(
                    "source",
                    format!("must be `{}`, got `{value}`", contract.question_source),
                );
                None
            }
        });

    let status = violations
        .string("status", raw.status.as_ref())
        .and_then(|value| {
            if value == QuestionStatus::Open.as_str() {
                Some(QuestionStatus::Open)
            } else {
                violations.push("status", format!("must be `open`, got `{value}`"));
                None
            }
        });

    Some(QuestionRecord {
        question: question?,
        parent: parent?,
        source: source?,
        status: status?,
    })
}
