//! Canonical entry identifiers and their generator.
//!
//! # Responsibility
//! - Parse and format `{PREFIX}-{YYYYMMDD}-{HHMMSS}-{mmm}` identifiers.
//! - Issue `(id, created)` pairs derived from one UTC instant.
//!
//! # Invariants
//! - `id` and `created` of one `IssuedId` always describe the same millisecond.
//! - One `IdGenerator` never issues the same millisecond twice; calls landing
//!   in an already issued millisecond advance to the next free one.
//! - Lexicographic order of IDs of one kind equals creation order.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};

/// Literal value carried by `id` and `created` before registration.
pub const PLACEHOLDER: &str = "PLACEHOLDER";

const NOTE_PREFIX: &str = "NOTE";
const QUESTION_PREFIX: &str = "Q";

static ENTRY_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(NOTE|Q)-\d{8}-\d{6}-\d{3}$").expect("valid entry id regex")
});
static QUESTION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Q-\d{8}-\d{6}-\d{3}$").expect("valid question id regex"));
static CANONICAL_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(NOTE|Q)-\d{8}-\d{6}-\d{3}\.md$").expect("valid canonical file regex")
});
static NOTE_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^NOTE-\d{8}-\d{6}-\d{3}\.md$").expect("valid note file regex"));

/// Document kind declared by the frontmatter `type` discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Answer to a research question.
    Note,
    /// Open research question.
    Question,
}

impl EntryKind {
    /// Parses the frontmatter `type` value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "note" => Some(Self::Note),
            "question" => Some(Self::Question),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Question => "question",
        }
    }

    /// ID prefix used for this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Note => NOTE_PREFIX,
            Self::Question => QUESTION_PREFIX,
        }
    }
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated canonical identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(String);

impl EntryId {
    /// Parses a canonical ID of either kind.
    ///
    /// Returns `None` for anything that does not match the exact pattern,
    /// including `PLACEHOLDER`.
    pub fn parse(value: &str) -> Option<Self> {
        if ENTRY_ID_RE.is_match(value) {
            Some(Self(value.to_string()))
        } else {
            None
        }
    }

    /// Parses a canonical question ID (`Q-...`) only.
    pub fn parse_question(value: &str) -> Option<Self> {
        if QUESTION_ID_RE.is_match(value) {
            Some(Self(value.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Kind encoded by the prefix.
    pub fn kind(&self) -> EntryKind {
        if self.0.starts_with("NOTE-") {
            EntryKind::Note
        } else {
            EntryKind::Question
        }
    }

    /// Canonical file name, `{id}.md`.
    pub fn file_name(&self) -> String {
        format!("{}.md", self.0)
    }

    /// Inline wikilink form, `[[{id}]]`.
    pub fn wikilink(&self) -> String {
        format!("[[{}]]", self.0)
    }
}

impl Display for EntryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for EntryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Returns whether `name` is `{canonical id}.md` for either kind.
pub fn is_canonical_file_name(name: &str) -> bool {
    CANONICAL_FILE_RE.is_match(name)
}

/// Returns whether `name` is `{NOTE id}.md`.
pub fn is_note_file_name(name: &str) -> bool {
    NOTE_FILE_RE.is_match(name)
}

/// Identity assigned to a document at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedId {
    pub id: EntryId,
    /// ISO-8601 UTC timestamp with millisecond precision.
    pub created: String,
}

impl IssuedId {
    /// Formats the identity for `kind` at `instant`, truncated to milliseconds.
    pub fn at(kind: EntryKind, instant: DateTime<Utc>) -> Self {
        // Leap seconds surface as 1000..=1999 ms.
        let millis = instant.timestamp_subsec_millis().min(999);
        let id = format!(
            "{}-{}-{:03}",
            kind.prefix(),
            instant.format("%Y%m%d-%H%M%S"),
            millis
        );
        let created = format!("{}.{:03}Z", instant.format("%Y-%m-%dT%H:%M:%S"), millis);
        Self {
            id: EntryId(id),
            created,
        }
    }
}

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant. Used by tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Monotonic canonical ID generator.
///
/// Same-millisecond calls are disambiguated by advancing to the next unused
/// millisecond, so the output keeps the canonical shape. Cross-process
/// uniqueness additionally relies on the registrar's corpus lock.
pub struct IdGenerator<C: Clock> {
    clock: C,
    last_issued_ms: AtomicI64,
}

impl<C: Clock> IdGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            last_issued_ms: AtomicI64::new(i64::MIN),
        }
    }

    /// Issues the next identity for `kind`.
    pub fn issue(&self, kind: EntryKind) -> IssuedId {
        let now = self.clock.now();
        let candidate = now.timestamp_millis();
        let previous = self
            .last_issued_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(candidate.max(last.saturating_add(1)))
            })
            .unwrap_or(candidate);
        let issued_ms = candidate.max(previous.saturating_add(1));
        let instant = DateTime::<Utc>::from_timestamp_millis(issued_ms).unwrap_or(now);
        IssuedId::at(kind, instant)
    }
}
