//! Answer extraction
//!
//! Answer documents use the same `Question ID` anchors as question documents.
//! The text of every page of a record is accumulated, then an ordered cascade
//! of answer phrasings is tried against it. The first phrasing with exactly
//! one match supplies the answer; otherwise the placeholder is kept.

use crate::classifier;
use crate::document::{DocumentError, SourceDocument};
use crate::record::{AnswerRecord, PageRange, ANSWER_PLACEHOLDER};
use crate::segmenter::{find_anchor, Anchor};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Instant;

pub type Result<T> = std::result::Result<T, DocumentError>;

/// Answer phrasings, most specific first
static ANSWER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Shared by multiple-choice and free-response records
        r"Correct Answer:\s([A-Za-z0-9./-]+)",
        // Multiple choice
        r"Choice ([ABCDE]) is correct\.",
        // Free response
        r"The correct answer is ([A-Za-z0-9./-]+)\.",
        // Free response with several accepted values
        r"The correct answer is either ([A-Za-z0-9./, -]+)\.",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid regex"))
    .collect()
});

/// Answer found by the cascade, if any
pub fn match_answer(text: &str) -> Option<String> {
    ANSWER_PATTERNS.iter().find_map(|pattern| {
        let mut found = pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()));
        match (found.next(), found.next()) {
            (Some(answer), None) => Some(answer),
            _ => None,
        }
    })
}

#[derive(Debug, Clone)]
struct OpenAnswer {
    id: String,
    text: String,
    pages: PageRange,
}

/// In-progress answer state for one document
#[derive(Debug, Clone)]
pub struct AnswerAccumulator {
    source: PathBuf,
    open: Option<OpenAnswer>,
}

impl AnswerAccumulator {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            open: None,
        }
    }

    /// Apply one non-blank page; returns the updated state and any closed record
    pub fn step(mut self, page: usize, text: &str) -> (Self, Option<AnswerRecord>) {
        match find_anchor(text) {
            Anchor::Start(id) => {
                let closed = self.open.take().map(|open| self.close(open));
                self.open = Some(OpenAnswer {
                    id,
                    text: text.to_string(),
                    pages: PageRange::single(page),
                });
                (self, closed)
            }
            anchor => {
                if let Anchor::Ambiguous(count) = anchor {
                    tracing::warn!(
                        "{}, page {}: {} record anchors on one page, not a record start",
                        self.source.display(),
                        page + 1,
                        count
                    );
                }
                match self.open.as_mut() {
                    Some(open) => {
                        open.pages.extend_to(page);
                        open.text.push('\n');
                        open.text.push_str(text);
                    }
                    None => tracing::warn!(
                        "{}, page {}: page before the first record, skipped",
                        self.source.display(),
                        page + 1
                    ),
                }
                (self, None)
            }
        }
    }

    pub fn finish(mut self) -> Option<AnswerRecord> {
        self.open.take().map(|open| self.close(open))
    }

    fn close(&self, open: OpenAnswer) -> AnswerRecord {
        let answer = match_answer(&open.text).unwrap_or_else(|| {
            tracing::warn!(
                "{}: no answer found for {} ({})",
                self.source.display(),
                open.id,
                open.pages
            );
            ANSWER_PLACEHOLDER.to_string()
        });

        AnswerRecord {
            id: open.id,
            answer,
            source: self.source.clone(),
            pages: open.pages,
        }
    }
}

/// Extract answer records from an answer document
pub fn extract_answers<D: SourceDocument + ?Sized>(doc: &D) -> Result<Vec<AnswerRecord>> {
    let started = Instant::now();
    let mut records = Vec::new();
    let mut acc = AnswerAccumulator::new(doc.path());

    for page in 0..doc.page_count() {
        if classifier::is_blank(doc, page)? {
            continue;
        }
        let text = doc.page_text(page)?;
        let (next, closed) = acc.step(page, &text);
        acc = next;
        records.extend(closed);
    }
    records.extend(acc.finish());

    tracing::info!(
        "{}: {} answer records in {:.2?}",
        doc.path().display(),
        records.len(),
        started.elapsed()
    );
    Ok(records)
}
