//! Cross-batch merging
//!
//! Question batches are merged with last-writer-wins semantics so that an
//! excluded batch parsed after the general one overrides its records.
//! Answer batches keep the first answer seen for each identifier.

use crate::record::{AnswerRecord, QuestionRecord};
use std::collections::HashMap;

/// Canonical, deduplicated question collection
///
/// Insertion order is preserved; a re-inserted identifier moves to the end.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    records: Vec<QuestionRecord>,
}

impl QuestionBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any existing one with the same identifier
    ///
    /// Returns the replaced record.
    pub fn insert(&mut self, record: QuestionRecord) -> Option<QuestionRecord> {
        let replaced = self
            .records
            .iter()
            .position(|r| r.id == record.id)
            .map(|pos| self.records.remove(pos));
        if let Some(old) = &replaced {
            tracing::debug!(
                "Record {} from {} replaced by {}",
                old.id,
                old.source.display(),
                record.source.display()
            );
        }
        self.records.push(record);
        replaced
    }

    /// Merge a whole batch in order
    pub fn merge_batch(mut self, batch: Vec<QuestionRecord>) -> Self {
        for record in batch {
            self.insert(record);
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<&QuestionRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[QuestionRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QuestionRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<QuestionRecord> {
        self.records
    }
}

impl FromIterator<QuestionRecord> for QuestionBank {
    fn from_iter<I: IntoIterator<Item = QuestionRecord>>(iter: I) -> Self {
        let mut bank = QuestionBank::new();
        for record in iter {
            bank.insert(record);
        }
        bank
    }
}

/// Merge per-source question batches, in source order
pub fn merge_question_batches<I>(batches: I) -> QuestionBank
where
    I: IntoIterator<Item = Vec<QuestionRecord>>,
{
    batches
        .into_iter()
        .fold(QuestionBank::new(), QuestionBank::merge_batch)
}

/// Answer collection keyed by identifier, first record wins
#[derive(Debug, Clone, Default)]
pub struct AnswerBank {
    records: Vec<AnswerRecord>,
    index: HashMap<String, usize>,
}

impl AnswerBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the identifier is already present; returns whether it was kept
    pub fn insert(&mut self, record: AnswerRecord) -> bool {
        if let Some(&pos) = self.index.get(&record.id) {
            tracing::debug!(
                "Duplicate answer for {} in {} dropped (kept {})",
                record.id,
                record.source.display(),
                self.records[pos].source.display()
            );
            return false;
        }
        self.index.insert(record.id.clone(), self.records.len());
        self.records.push(record);
        true
    }

    pub fn merge_batch(mut self, batch: Vec<AnswerRecord>) -> Self {
        for record in batch {
            self.insert(record);
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<&AnswerRecord> {
        self.index.get(id).map(|&pos| &self.records[pos])
    }

    /// Answer text for an identifier
    pub fn answer(&self, id: &str) -> Option<&str> {
        self.get(id).map(|r| r.answer.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[AnswerRecord] {
        &self.records
    }
}

impl FromIterator<AnswerRecord> for AnswerBank {
    fn from_iter<I: IntoIterator<Item = AnswerRecord>>(iter: I) -> Self {
        let mut bank = AnswerBank::new();
        for record in iter {
            bank.insert(record);
        }
        bank
    }
}

/// Merge per-source answer batches, in source order
pub fn merge_answer_batches<I>(batches: I) -> AnswerBank
where
    I: IntoIterator<Item = Vec<AnswerRecord>>,
{
    batches
        .into_iter()
        .fold(AnswerBank::new(), AnswerBank::merge_batch)
}
