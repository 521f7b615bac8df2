//! Record segmentation
//!
//! Walks a question document page by page and cuts it into question records.
//! A page whose text contains exactly one `Question ID xxxxxxxx` anchor starts
//! a new record; following pages without an anchor continue it. Blank pages
//! are ignored entirely.
//!
//! The in-progress record lives in an [`Accumulator`] that is threaded by value
//! through [`Accumulator::step`], which hands back any record it closed.

use crate::classifier;
use crate::difficulty::{DifficultyDetector, DifficultyError};
use crate::document::{DocumentError, SourceDocument};
use crate::labels::{self, LabelError, Labels};
use crate::record::{PageRange, QuestionRecord, Tier};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Instant;
use thiserror::Error;

static ANCHOR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Question ID ([0-9a-f]{8})").expect("Invalid regex"));

/// Segmentation error types
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error(transparent)]
    Difficulty(#[from] DifficultyError),

    #[error("{path}, page {page}: {source}")]
    Label {
        path: PathBuf,
        page: usize,
        #[source]
        source: LabelError,
    },

    #[error(transparent)]
    Document(#[from] DocumentError),
}

pub type Result<T> = std::result::Result<T, SegmentError>;

/// Result of searching a page for the record anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Exactly one identifier on the page
    Start(String),
    /// No identifier
    Absent,
    /// More than one identifier
    Ambiguous(usize),
}

/// Search page text for the record anchor
pub fn find_anchor(text: &str) -> Anchor {
    let ids: Vec<&str> = ANCHOR_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    match ids.as_slice() {
        [] => Anchor::Absent,
        [id] => Anchor::Start(id.to_string()),
        many => Anchor::Ambiguous(many.len()),
    }
}

/// What a single non-blank page contributes
#[derive(Debug, Clone)]
pub enum PageEvent {
    /// The page opens record `id`
    Start {
        page: usize,
        id: String,
        tier: Tier,
        labels: Option<Labels>,
    },
    /// The page belongs to whatever record is open
    Continue {
        page: usize,
        labels: Option<Labels>,
    },
}

#[derive(Debug, Clone)]
struct OpenRecord {
    id: String,
    tier: Tier,
    labels: Option<Labels>,
    pages: PageRange,
}

/// In-progress record state for one document
#[derive(Debug, Clone)]
pub struct Accumulator {
    source: PathBuf,
    excluded: bool,
    open: Option<OpenRecord>,
}

impl Accumulator {
    pub fn new(source: impl Into<PathBuf>, excluded: bool) -> Self {
        Self {
            source: source.into(),
            excluded,
            open: None,
        }
    }

    /// Whether a record is currently being accumulated
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Identifier of the open record
    pub fn current_id(&self) -> Option<&str> {
        self.open.as_ref().map(|r| r.id.as_str())
    }

    /// Apply one page; returns the updated state and the record closed by it
    pub fn step(mut self, event: PageEvent) -> (Self, Option<QuestionRecord>) {
        match event {
            PageEvent::Start {
                page,
                id,
                tier,
                labels,
            } => {
                let closed = self.open.take().map(|open| self.close(open));
                self.open = Some(OpenRecord {
                    id,
                    tier,
                    labels,
                    pages: PageRange::single(page),
                });
                (self, closed)
            }
            PageEvent::Continue { page, labels } => {
                match self.open.as_mut() {
                    Some(open) => {
                        open.pages.extend_to(page);
                        if labels.is_some() {
                            open.labels = labels;
                        }
                    }
                    None => {
                        tracing::warn!(
                            "{}, page {}: page before the first record, skipped",
                            self.source.display(),
                            page + 1
                        );
                    }
                }
                (self, None)
            }
        }
    }

    /// Close the open record at end of document
    pub fn finish(mut self) -> Option<QuestionRecord> {
        self.open.take().map(|open| self.close(open))
    }

    fn close(&self, open: OpenRecord) -> QuestionRecord {
        let labels = open.labels.unwrap_or_else(|| {
            tracing::warn!(
                "{}: record {} ({}) has no label block",
                self.source.display(),
                open.id,
                open.pages
            );
            Labels::default()
        });

        QuestionRecord {
            id: open.id,
            test: labels.test,
            domain: labels.domain,
            skill: labels.skill,
            tier: open.tier,
            source: self.source.clone(),
            pages: open.pages,
            excluded: self.excluded,
        }
    }
}

/// Cuts question documents into records
#[derive(Debug, Clone, Default)]
pub struct RecordSegmenter {
    detector: DifficultyDetector,
}

impl RecordSegmenter {
    pub fn new(detector: DifficultyDetector) -> Self {
        Self { detector }
    }

    /// Classify one page; `None` for blank pages
    pub fn observe<D: SourceDocument + ?Sized>(
        &self,
        doc: &D,
        page: usize,
        open: bool,
    ) -> Result<Option<PageEvent>> {
        if classifier::is_blank(doc, page)? {
            return Ok(None);
        }

        let text = doc.page_text(page)?;
        let anchor = find_anchor(&text);
        if !open && !matches!(anchor, Anchor::Start(_)) {
            tracing::warn!(
                "{}, page {}: page before the first record, skipped",
                doc.path().display(),
                page + 1
            );
            return Ok(None);
        }

        let labels = labels::extract(&text).map_err(|source| SegmentError::Label {
            path: doc.path().to_path_buf(),
            page,
            source,
        })?;

        let event = match anchor {
            Anchor::Start(id) => {
                let tier = self.detector.detect_tier(doc, page)?;
                PageEvent::Start {
                    page,
                    id,
                    tier,
                    labels,
                }
            }
            Anchor::Absent => PageEvent::Continue { page, labels },
            Anchor::Ambiguous(count) => {
                tracing::warn!(
                    "{}, page {}: {} record anchors on one page, treated as continuation",
                    doc.path().display(),
                    page + 1,
                    count
                );
                PageEvent::Continue { page, labels }
            }
        };
        Ok(Some(event))
    }

    /// Segment a whole document into question records
    pub fn segment<D: SourceDocument + ?Sized>(
        &self,
        doc: &D,
        excluded: bool,
    ) -> Result<Vec<QuestionRecord>> {
        let started = Instant::now();
        let mut records = Vec::new();
        let mut acc = Accumulator::new(doc.path(), excluded);

        for page in 0..doc.page_count() {
            let Some(event) = self.observe(doc, page, acc.is_open())? else {
                continue;
            };
            let (next, closed) = acc.step(event);
            acc = next;
            records.extend(closed);
        }
        records.extend(acc.finish());

        tracing::info!(
            "{}: {} question records from {} pages in {:.2?}",
            display_name(doc.path()),
            records.len(),
            doc.page_count(),
            started.elapsed()
        );
        Ok(records)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
