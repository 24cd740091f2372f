use crate::errors::{EditError, PatternError};
use aho_corasick::{AhoCorasick, Input, MatchKind};
use regex::bytes::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Whether the search text is taken verbatim or as a regular expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    #[default]
    Literal,
    Regex,
}

/// Per-pattern matching switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatternFlags {
    /// Match regardless of case. Literal mode folds ASCII only.
    #[serde(default)]
    pub ignore_case: bool,
    /// Only accept matches not touching a word character on either side.
    #[serde(default)]
    pub whole_word: bool,
    /// `^` and `$` match at line boundaries (regex mode only).
    #[serde(default)]
    pub multiline: bool,
}

/// One search definition supplied for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSpec {
    pub find: String,
    /// Replacement template. In regex mode `$1` / `${name}` refer to captures.
    pub replace: String,
    pub kind: PatternKind,
    pub flags: PatternFlags,
}

impl PatternSpec {
    /// An exact-substring search.
    pub fn literal(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
            kind: PatternKind::Literal,
            flags: PatternFlags::default(),
        }
    }

    /// A regular expression search.
    pub fn regex(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            kind: PatternKind::Regex,
            ..Self::literal(find, replace)
        }
    }

    pub fn with_flags(mut self, flags: PatternFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Builds the matcher for this pattern, failing fast on a malformed pattern.
    pub fn compile(&self) -> Result<Box<dyn Matcher>, PatternError> {
        Ok(match self.kind {
            PatternKind::Literal => Box::new(LiteralMatcher::new(&self.find, &self.replace, self.flags)?),
            PatternKind::Regex => Box::new(RegexMatcher::new(&self.find, &self.replace, self.flags)?),
        })
    }
}

/// A half-open byte range `[start, end)` of the original content and what replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
    pub replacement: Vec<u8>,
}

/// The ordered spans for one file. Computed once, consumed once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSet {
    spans: Vec<MatchSpan>,
}

impl EditSet {
    pub fn new(spans: Vec<MatchSpan>) -> Self {
        Self { spans }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn spans(&self) -> &[MatchSpan] {
        &self.spans
    }

    /// Checks the span contract against content of length `len`: every span is
    /// non-empty and in bounds, and spans are sorted ascending without overlap.
    pub fn validate(&self, len: usize) -> Result<(), EditError> {
        let mut previous_end = 0;
        for (i, span) in self.spans.iter().enumerate() {
            if span.start >= span.end {
                return Err(EditError::EmptySpan {
                    start: span.start,
                    end: span.end,
                });
            }
            if span.end > len {
                return Err(EditError::OutOfBounds {
                    start: span.start,
                    end: span.end,
                    len,
                });
            }
            if i > 0 && span.start < previous_end {
                return Err(EditError::Overlap {
                    start: span.start,
                    end: span.end,
                    previous_end,
                });
            }
            previous_end = span.end;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a EditSet {
    type Item = &'a MatchSpan;
    type IntoIter = std::slice::Iter<'a, MatchSpan>;

    fn into_iter(self) -> Self::IntoIter {
        self.spans.iter()
    }
}

/// Finds leftmost-first, non-overlapping matches in a buffer and computes
/// their replacements.
///
/// Implementations never emit zero-length spans; a match that would be empty
/// is treated as no match.
pub trait Matcher: Send + Sync {
    fn find_edits(&self, content: &[u8]) -> EditSet;
}

/// Exact substring search backed by Aho-Corasick.
pub struct LiteralMatcher {
    searcher: AhoCorasick,
    replacement: Vec<u8>,
    whole_word: bool,
}

impl LiteralMatcher {
    pub fn new(find: &str, replace: &str, flags: PatternFlags) -> Result<Self, PatternError> {
        if find.is_empty() {
            return Err(PatternError::Empty);
        }
        let searcher = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostFirst)
            .ascii_case_insensitive(flags.ignore_case)
            .build([find])?;
        Ok(Self {
            searcher,
            replacement: replace.as_bytes().to_vec(),
            whole_word: flags.whole_word,
        })
    }
}

impl Matcher for LiteralMatcher {
    fn find_edits(&self, content: &[u8]) -> EditSet {
        let mut spans = Vec::new();
        let mut pos = 0;
        while pos < content.len() {
            let Some(m) = self.searcher.find(Input::new(content).span(pos..content.len())) else {
                break;
            };
            if m.is_empty() {
                pos = m.end() + 1;
                continue;
            }
            if self.whole_word && !is_word_bounded(content, m.start(), m.end()) {
                pos = m.start() + 1;
                continue;
            }
            spans.push(MatchSpan {
                start: m.start(),
                end: m.end(),
                replacement: self.replacement.clone(),
            });
            pos = m.end();
        }
        EditSet::new(spans)
    }
}

/// Regular expression search over raw bytes with capture-aware replacement.
pub struct RegexMatcher {
    regex: Regex,
    template: Vec<u8>,
    whole_word: bool,
}

impl RegexMatcher {
    pub fn new(find: &str, replace: &str, flags: PatternFlags) -> Result<Self, PatternError> {
        if find.is_empty() {
            return Err(PatternError::Empty);
        }
        let regex = RegexBuilder::new(find)
            .case_insensitive(flags.ignore_case)
            .multi_line(flags.multiline)
            .build()?;
        Ok(Self {
            regex,
            template: replace.as_bytes().to_vec(),
            whole_word: flags.whole_word,
        })
    }
}

impl Matcher for RegexMatcher {
    fn find_edits(&self, content: &[u8]) -> EditSet {
        let mut spans = Vec::new();
        let mut pos = 0;
        while pos < content.len() {
            let Some(caps) = self.regex.captures_at(content, pos) else {
                break;
            };
            let Some(m) = caps.get(0) else {
                break;
            };
            if m.is_empty() {
                pos = m.end() + 1;
                continue;
            }
            if self.whole_word && !is_word_bounded(content, m.start(), m.end()) {
                pos = m.start() + 1;
                continue;
            }
            let mut replacement = Vec::new();
            caps.expand(&self.template, &mut replacement);
            spans.push(MatchSpan {
                start: m.start(),
                end: m.end(),
                replacement,
            });
            pos = m.end();
        }
        EditSet::new(spans)
    }
}

/// Word bytes are ASCII alphanumerics, `_`, and any non-ASCII byte (part of a
/// multi-byte character, which in practice is almost always a letter).
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

fn is_word_bounded(content: &[u8], start: usize, end: usize) -> bool {
    let before = start == 0 || !is_word_byte(content[start - 1]);
    let after = end >= content.len() || !is_word_byte(content[end]);
    before && after
}
