//! Markdown document frontmatter extraction and decoding.
//!
//! # Responsibility
//! - Split a document into its `---` delimited frontmatter block and body.
//! - Decode the block into a loosely typed field set for schema checks.
//! - Substitute assigned identity into the block without touching the body.
//!
//! # Invariants
//! - The opening delimiter must be the very first line, exactly `---`.
//! - The block ends at the next line that is exactly `---`.
//! - Identity substitution rewrites only `id:` / `created:` lines inside the
//!   block whose value is still `PLACEHOLDER`, and the stamped block must
//!   decode to the issued identity.

use crate::model::id::{IssuedId, PLACEHOLDER};
use serde::Deserialize;
use serde_yaml::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DELIMITER: &str = "---";

/// Structural frontmatter failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontmatterError {
    /// First line is not `---`.
    MissingOpening,
    /// No closing `---` line after the opening one.
    Unterminated,
    /// Block contains no key/value pairs.
    Empty,
    /// Block is not valid YAML.
    Yaml(String),
    /// Block is valid YAML but not a key/value mapping.
    NotMapping,
    /// The placeholder of this field could not be rewritten in place.
    Unstamped(&'static str),
}

impl Display for FrontmatterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingOpening => write!(f, "no frontmatter (expected a leading `---` line)"),
            Self::Unterminated => write!(f, "frontmatter block is not closed by a `---` line"),
            Self::Empty => write!(f, "frontmatter block is empty"),
            Self::Yaml(message) => write!(f, "frontmatter is not valid YAML: {message}"),
            Self::NotMapping => write!(f, "frontmatter must be a key/value mapping"),
            Self::Unstamped(field) => write!(
                f,
                "`{field}: PLACEHOLDER` must be on its own frontmatter line to be assigned"
            ),
        }
    }
}

impl Error for FrontmatterError {}

/// Byte layout of a document with a frontmatter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontmatterBlock<'a> {
    /// Raw block text between the delimiters.
    pub yaml: &'a str,
    /// Everything after the closing delimiter line.
    pub body: &'a str,
    yaml_start: usize,
}

/// Locates the frontmatter block by its delimiter lines.
pub fn extract_block(text: &str) -> Result<FrontmatterBlock<'_>, FrontmatterError> {
    let mut offset = 0;
    let mut lines = text.split_inclusive('\n');

    let first = lines.next().ok_or(FrontmatterError::MissingOpening)?;
    if trim_line_ending(first) != DELIMITER {
        return Err(FrontmatterError::MissingOpening);
    }
    offset += first.len();
    let yaml_start = offset;

    for line in lines {
        if trim_line_ending(line) == DELIMITER {
            return Ok(FrontmatterBlock {
                yaml: &text[yaml_start..offset],
                body: &text[offset + line.len()..],
                yaml_start,
            });
        }
        offset += line.len();
    }

    Err(FrontmatterError::Unterminated)
}

/// Frontmatter fields of both document kinds, undecided in type.
///
/// Values stay as raw YAML so the schema layer can report every wrong field
/// instead of failing on the first type mismatch. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawFrontmatter {
    /// Kind discriminant (`note` | `question`).
    #[serde(rename = "type")]
    pub kind: Option<Value>,
    pub id: Option<Value>,
    pub created: Option<Value>,
    pub title: Option<Value>,
    pub answers: Option<Value>,
    pub source: Option<Value>,
    pub tags: Option<Value>,
    pub question: Option<Value>,
    pub parent: Option<Value>,
    pub status: Option<Value>,
}

impl RawFrontmatter {
    /// Decodes a frontmatter block.
    pub fn decode(yaml: &str) -> Result<Self, FrontmatterError> {
        if yaml.trim().is_empty() {
            return Err(FrontmatterError::Empty);
        }
        let value: Value =
            serde_yaml::from_str(yaml).map_err(|err| FrontmatterError::Yaml(err.to_string()))?;
        if !value.is_mapping() {
            return Err(FrontmatterError::NotMapping);
        }
        serde_yaml::from_value(value).map_err(|err| FrontmatterError::Yaml(err.to_string()))
    }

    /// Returns the `id` value when it is a string.
    pub fn id_str(&self) -> Option<&str> {
        self.id.as_ref().and_then(Value::as_str)
    }
}

/// Parsed document: raw text plus its decoded frontmatter.
#[derive(Debug, Clone)]
pub struct Document<'a> {
    text: &'a str,
    block: FrontmatterBlock<'a>,
    frontmatter: RawFrontmatter,
}

impl<'a> Document<'a> {
    /// Extracts and decodes the frontmatter of `text`.
    pub fn parse(text: &'a str) -> Result<Self, FrontmatterError> {
        let block = extract_block(text)?;
        let frontmatter = RawFrontmatter::decode(block.yaml)?;
        Ok(Self {
            text,
            block,
            frontmatter,
        })
    }

    pub fn frontmatter(&self) -> &RawFrontmatter {
        &self.frontmatter
    }

    /// Returns the full text with `id` and `created` placeholders replaced.
    ///
    /// Trailing `# comments` on the rewritten lines are kept.
    ///
    /// # Errors
    /// Returns `FrontmatterError::Unstamped` when a placeholder is not on its
    /// own `key: value` line (for example a flow mapping), so the stamped
    /// text would not decode to the issued identity.
    pub fn with_identity(&self, issued: &IssuedId) -> Result<String, FrontmatterError> {
        let mut out = String::with_capacity(self.text.len() + 32);
        out.push_str(&self.text[..self.block.yaml_start]);

        let mut id_done = false;
        let mut created_done = false;
        for line in self.block.yaml.split_inclusive('\n') {
            let ending = &line[trim_line_ending(line).len()..];
            if let Some(comment) = placeholder_comment(line, "id").filter(|_| !id_done) {
                push_field(&mut out, "id", issued.id.as_str(), comment, ending);
                id_done = true;
            } else if let Some(comment) =
                placeholder_comment(line, "created").filter(|_| !created_done)
            {
                push_field(&mut out, "created", &issued.created, comment, ending);
                created_done = true;
            } else {
                out.push_str(line);
            }
        }
        out.push_str(&self.text[self.block.yaml_start + self.block.yaml.len()..]);

        verify_identity(&out, issued)?;
        Ok(out)
    }
}

/// Checks that `stamped` decodes to exactly the issued identity.
fn verify_identity(stamped: &str, issued: &IssuedId) -> Result<(), FrontmatterError> {
    let document = Document::parse(stamped)?;
    let frontmatter = document.frontmatter();
    if frontmatter.id_str() != Some(issued.id.as_str()) {
        return Err(FrontmatterError::Unstamped("id"));
    }
    if frontmatter.created.as_ref().and_then(Value::as_str) != Some(issued.created.as_str()) {
        return Err(FrontmatterError::Unstamped("created"));
    }
    Ok(())
}

fn push_field(out: &mut String, key: &str, value: &str, comment: &str, ending: &str) {
    out.push_str(key);
    out.push_str(": ");
    out.push_str(value);
    if !comment.is_empty() {
        out.push(' ');
        out.push_str(comment);
    }
    out.push_str(ending);
}

/// Returns the trailing comment (possibly empty) of a `key: PLACEHOLDER` line.
fn placeholder_comment<'l>(line: &'l str, key: &str) -> Option<&'l str> {
    let rest = trim_line_ending(line).strip_prefix(key)?;
    let rest = rest.strip_prefix(':')?;
    let (value, comment) = split_comment(rest);
    let value = value.trim();
    let is_placeholder = value == PLACEHOLDER
        || value == format!("\"{PLACEHOLDER}\"")
        || value == format!("'{PLACEHOLDER}'");
    is_placeholder.then(|| comment.trim_end())
}

/// Splits a YAML value from its `#` comment; `#` must follow whitespace.
fn split_comment(value: &str) -> (&str, &str) {
    let bytes = value.as_bytes();
    for (at, ch) in value.char_indices() {
        if ch == '#' && (at == 0 || bytes[at - 1].is_ascii_whitespace()) {
            return (&value[..at], &value[at..]);
        }
    }
    (value, "")
}

fn trim_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|rest| rest.strip_suffix('\r').unwrap_or(rest))
        .unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::{extract_block, Document, FrontmatterError, RawFrontmatter};
    use crate::model::id::{EntryKind, IssuedId};
    use chrono::{TimeZone, Utc};

    const DRAFT: &str = "---\ntype: question\nid: PLACEHOLDER\nquestion: \"What is X?\"\nsource: asker\nstatus: open\ncreated: PLACEHOLDER\n---\n\nBody mentions id: PLACEHOLDER too.\n";

    #[test]
    fn extract_block_splits_yaml_and_body() {
        let block = extract_block("---\na: 1\n---\nbody\n").unwrap();
        assert_eq!(block.yaml, "a: 1\n");
        assert_eq!(block.body, "body\n");
    }

    #[test]
    fn extract_block_rejects_missing_and_unterminated_blocks() {
        assert_eq!(
            extract_block("# title\n---\n").unwrap_err(),
            FrontmatterError::MissingOpening
        );
        assert_eq!(
            extract_block("---\na: 1\nbody\n").unwrap_err(),
            FrontmatterError::Unterminated
        );
        assert_eq!(
            extract_block("----\na: 1\n---\n").unwrap_err(),
            FrontmatterError::MissingOpening
        );
    }

    #[test]
    fn decode_rejects_empty_and_non_mapping_blocks() {
        assert_eq!(RawFrontmatter::decode("\n").unwrap_err(), FrontmatterError::Empty);
        assert_eq!(
            RawFrontmatter::decode("- a\n- b\n").unwrap_err(),
            FrontmatterError::NotMapping
        );
        assert!(matches!(
            RawFrontmatter::decode("a: [unclosed\n").unwrap_err(),
            FrontmatterError::Yaml(_)
        ));
    }

    #[test]
    fn decode_reads_list_values_and_ignores_unknown_keys() {
        let raw = RawFrontmatter::decode("type: note\ntags:\n  - a\n  - b\nextra: 1\n").unwrap();
        assert_eq!(raw.kind.as_ref().and_then(|v| v.as_str()), Some("note"));
        assert_eq!(raw.tags.as_ref().and_then(|v| v.as_sequence()).map(Vec::len), Some(2));
    }

    #[test]
    fn with_identity_rewrites_only_frontmatter_placeholders() {
        let document = Document::parse(DRAFT).unwrap();
        let instant = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let issued = IssuedId::at(EntryKind::Question, instant);

        let updated = document.with_identity(&issued).unwrap();
        assert!(updated.contains("\nid: Q-20250101-120000-000\n"));
        assert!(updated.contains("\ncreated: 2025-01-01T12:00:00.000Z\n"));
        assert!(updated.ends_with("\nBody mentions id: PLACEHOLDER too.\n"));
        assert_eq!(updated.matches("PLACEHOLDER").count(), 1);
    }

    #[test]
    fn with_identity_preserves_crlf_line_endings() {
        let text = "---\r\nid: PLACEHOLDER\r\ncreated: PLACEHOLDER\r\n---\r\nbody\r\n";
        let document = Document::parse(text).unwrap();
        let instant = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let issued = IssuedId::at(EntryKind::Note, instant);
        assert_eq!(
            document.with_identity(&issued).unwrap(),
            "---\r\nid: NOTE-20250101-120000-000\r\ncreated: 2025-01-01T12:00:00.000Z\r\n---\r\nbody\r\n"
        );
    }

    #[test]
    fn with_identity_keeps_trailing_comments() {
        let text = "---\ntype: note\nid: PLACEHOLDER # assigned on register\ncreated: 'PLACEHOLDER'\n---\nbody\n";
        let document = Document::parse(text).unwrap();
        let instant = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let issued = IssuedId::at(EntryKind::Note, instant);
        assert_eq!(
            document.with_identity(&issued).unwrap(),
            "---\ntype: note\nid: NOTE-20250101-120000-000 # assigned on register\ncreated: 2025-01-01T12:00:00.000Z\n---\nbody\n"
        );
    }

    #[test]
    fn with_identity_rejects_flow_mapping_frontmatter() {
        let text = "---\n{type: note, id: PLACEHOLDER, created: PLACEHOLDER}\n---\n";
        let document = Document::parse(text).unwrap();
        let instant = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let issued = IssuedId::at(EntryKind::Note, instant);
        assert_eq!(
            document.with_identity(&issued).unwrap_err(),
            FrontmatterError::Unstamped("id")
        );
    }
}
