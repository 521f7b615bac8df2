//! Record data model
//!
//! Question and answer records extracted from exam-bank documents, plus the
//! page-range type they share.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::str::FromStr;

/// Placeholder answer used when no answer pattern matched
pub const ANSWER_PLACEHOLDER: &str = "??";

/// Delimiter between page numbers in the textual page encoding
pub const PAGE_DELIMITER: char = '_';

/// Difficulty tier of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Easy,
    Medium,
    Hard,
}

impl Tier {
    /// All tiers in ascending order
    pub const ALL: [Tier; 3] = [Tier::Easy, Tier::Medium, Tier::Hard];

    /// Map a marker count to a tier (`1 -> easy`, `2 -> medium`, `3 -> hard`)
    pub fn from_marker_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(Tier::Easy),
            2 => Some(Tier::Medium),
            3 => Some(Tier::Hard),
            _ => None,
        }
    }

    /// Position of this tier in `[easy, medium, hard]` vectors
    pub fn index(self) -> usize {
        match self {
            Tier::Easy => 0,
            Tier::Medium => 1,
            Tier::Hard => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Easy => "easy",
            Tier::Medium => "medium",
            Tier::Hard => "hard",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "easy" => Ok(Tier::Easy),
            "medium" => Ok(Tier::Medium),
            "hard" => Ok(Tier::Hard),
            other => Err(format!("unknown difficulty tier: '{}'", other)),
        }
    }
}

/// Inclusive, zero-based page range of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    /// Range covering a single page
    pub fn single(page: usize) -> Self {
        Self {
            start: page,
            end: page,
        }
    }

    /// Range covering `start..=end`; `None` if `end < start`
    pub fn new(start: usize, end: usize) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Grow the range so it ends at `page`
    pub fn extend_to(&mut self, page: usize) {
        self.end = self.end.max(page);
        self.start = self.start.min(page);
    }

    /// Build from a one- or two-element index list
    pub fn from_indices(indices: &[usize]) -> Option<Self> {
        match *indices {
            [page] => Some(Self::single(page)),
            [start, end] => Self::new(start, end),
            _ => None,
        }
    }

    /// One element for single-page records, two otherwise
    pub fn indices(&self) -> Vec<usize> {
        if self.start == self.end {
            vec![self.start]
        } else {
            vec![self.start, self.end]
        }
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    /// Number of pages covered, blank ones included
    pub fn span(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, page: usize) -> bool {
        (self.start..=self.end).contains(&page)
    }

    pub fn pages(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }

    /// 1-based page numbers joined with [`PAGE_DELIMITER`]
    pub fn encode(&self) -> String {
        self.indices()
            .iter()
            .map(|i| (i + 1).to_string())
            .collect::<Vec<_>>()
            .join(&PAGE_DELIMITER.to_string())
    }

    /// Inverse of [`PageRange::encode`]
    pub fn decode(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let mut indices = Vec::with_capacity(2);
        for part in text.split(PAGE_DELIMITER) {
            let number: usize = part.trim().parse().ok()?;
            if number == 0 {
                return None;
            }
            indices.push(number - 1);
        }
        Self::from_indices(&indices)
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "page {}", self.start + 1)
        } else {
            write!(f, "pages {}-{}", self.start + 1, self.end + 1)
        }
    }
}

/// One exam question extracted from a source document
///
/// Equality and hashing use the identifier only.
#[derive(Debug, Clone)]
pub struct QuestionRecord {
    /// 8-character lowercase hexadecimal identifier
    pub id: String,
    /// Test/subject label (e.g. "Math")
    pub test: String,
    pub domain: String,
    pub skill: String,
    pub tier: Tier,
    pub source: PathBuf,
    pub pages: PageRange,
    /// Whether the record came from an excluded source batch
    pub excluded: bool,
}

impl PartialEq for QuestionRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for QuestionRecord {}

impl Hash for QuestionRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Correct answer for one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub id: String,
    pub answer: String,
    pub source: PathBuf,
    pub pages: PageRange,
}

impl AnswerRecord {
    /// Whether the answer text is the unmatched placeholder
    pub fn is_placeholder(&self) -> bool {
        self.answer == ANSWER_PLACEHOLDER
    }
}
