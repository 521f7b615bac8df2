//! Record store module
//!
//! Provides CSV persistence for question and answer collections, plus the
//! JSON parse manifests written alongside them.
//!
//! Question columns: `ID, Pages, Difficulty, Excluded, Test, Domain, Skill, Source_PDF`.
//! Answer columns: `ID, Answer, Pages, Answer_PDF`.

use crate::record::{AnswerRecord, PageRange, QuestionRecord, Tier};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default manifest name for question parses
pub const QUESTION_MANIFEST: &str = "q_meta_infos.json";

/// Default manifest name for answer parses
pub const ANSWER_MANIFEST: &str = "a_meta_infos.json";

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Row {row}: invalid page list '{value}'")]
    InvalidPages { row: usize, value: String },

    #[error("Row {row}: invalid difficulty '{value}'")]
    InvalidTier { row: usize, value: String },

    #[error("Row {row}: invalid boolean '{value}'")]
    InvalidBool { row: usize, value: String },

    #[error("Store file not found: {0}")]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Serialize, Deserialize)]
struct QuestionRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Pages")]
    pages: String,
    #[serde(rename = "Difficulty")]
    difficulty: String,
    #[serde(rename = "Excluded")]
    excluded: String,
    #[serde(rename = "Test")]
    test: String,
    #[serde(rename = "Domain")]
    domain: String,
    #[serde(rename = "Skill")]
    skill: String,
    #[serde(rename = "Source_PDF")]
    source_pdf: String,
}

impl QuestionRow {
    fn from_record(record: &QuestionRecord) -> Self {
        Self {
            id: record.id.clone(),
            pages: record.pages.encode(),
            difficulty: record.tier.to_string(),
            excluded: encode_bool(record.excluded).to_string(),
            test: record.test.clone(),
            domain: record.domain.clone(),
            skill: record.skill.clone(),
            source_pdf: record.source.display().to_string(),
        }
    }

    fn into_record(self, row: usize) -> Result<QuestionRecord> {
        let pages = decode_pages(row, &self.pages)?;
        let tier: Tier = self.difficulty.parse().map_err(|_| StoreError::InvalidTier {
            row,
            value: self.difficulty.clone(),
        })?;
        let excluded = decode_bool(&self.excluded).ok_or_else(|| StoreError::InvalidBool {
            row,
            value: self.excluded.clone(),
        })?;

        Ok(QuestionRecord {
            id: self.id,
            test: self.test,
            domain: self.domain,
            skill: self.skill,
            tier,
            source: PathBuf::from(self.source_pdf),
            pages,
            excluded,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AnswerRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Answer")]
    answer: String,
    #[serde(rename = "Pages")]
    pages: String,
    #[serde(rename = "Answer_PDF")]
    answer_pdf: String,
}

/// `True`/`False`, the spelling existing stores use
fn encode_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn decode_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn decode_pages(row: usize, text: &str) -> Result<PageRange> {
    PageRange::decode(text).ok_or_else(|| StoreError::InvalidPages {
        row,
        value: text.to_string(),
    })
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(StoreError::NotFound(path.to_path_buf()))
    }
}

/// Write a question collection as CSV, in collection order
pub fn write_questions(path: &Path, records: &[QuestionRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in records {
        wtr.serialize(QuestionRow::from_record(record))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read a question collection written by [`write_questions`]
///
/// Row numbers in errors are 1-based and exclude the header.
pub fn read_questions(path: &Path) -> Result<Vec<QuestionRecord>> {
    ensure_exists(path)?;
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut records = Vec::new();
    for (index, row) in rdr.deserialize::<QuestionRow>().enumerate() {
        records.push(row?.into_record(index + 1)?);
    }
    Ok(records)
}

/// Write an answer collection as CSV
pub fn write_answers(path: &Path, records: &[AnswerRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in records {
        wtr.serialize(AnswerRow {
            id: record.id.clone(),
            answer: record.answer.clone(),
            pages: record.pages.encode(),
            answer_pdf: record.source.display().to_string(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read an answer collection written by [`write_answers`]
pub fn read_answers(path: &Path) -> Result<Vec<AnswerRecord>> {
    ensure_exists(path)?;
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut records = Vec::new();
    for (index, row) in rdr.deserialize::<AnswerRow>().enumerate() {
        let row = row?;
        let pages = decode_pages(index + 1, &row.pages)?;
        records.push(AnswerRecord {
            id: row.id,
            answer: row.answer,
            source: PathBuf::from(row.answer_pdf),
            pages,
        });
    }
    Ok(records)
}

/// One parsed source document in a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Local timestamp of the parse
    pub parsed_at: String,
    pub source_pdf: PathBuf,
    pub excluded: bool,
}

impl ManifestEntry {
    /// Entry stamped with the current local time
    pub fn now(source_pdf: impl Into<PathBuf>, excluded: bool) -> Self {
        Self {
            parsed_at: Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            source_pdf: source_pdf.into(),
            excluded,
        }
    }
}

/// Write a manifest as pretty-printed JSON
pub fn write_manifest(path: &Path, entries: &[ManifestEntry]) -> Result<()> {
    let content = serde_json::to_string_pretty(entries)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    ensure_exists(path)?;
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
