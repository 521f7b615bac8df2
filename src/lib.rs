//! qbank-pdf - exam question bank extractor and question-set builder
//!
//! Cuts exam question-bank PDFs into question records, classifies each record
//! by difficulty and category, and assembles new question sets (with an
//! optional answer key) from the merged collection.
//!
//! # Features
//!
//! - **Segmentation** ([`segmenter`]) - Cut question documents into records at `Question ID` anchors
//! - **Difficulty** ([`difficulty`]) - Count difficulty markers, vector drawings first, raster images second
//! - **Labels** ([`labels`]) - Parse the test / domain / skill label block
//! - **Answers** ([`answers`]) - Extract correct answers from answer documents
//! - **Selection** ([`selection`]) - Quota and proportion sampling from the merged bank
//! - **Composition** ([`composer`]) - Copy selected pages into a new PDF
//! - **Answer key** ([`answer_key`], [`pdf_writer`]) - Lay out and render an answer key page
//! - **Stores** ([`store`], [`skill_tree`]) - CSV persistence and JSON exports
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use qbank_pdf::{LopdfSource, RecordSegmenter};
//!
//! let doc = LopdfSource::open("alls/questions/math.pdf").unwrap();
//! let records = RecordSegmenter::default().segment(&doc, false).unwrap();
//! println!("{} questions", records.len());
//! ```
//!
//! ## Using Builder Patterns
//!
//! ```rust
//! use qbank_pdf::{AnswerKeyOptions, PipelineConfig};
//!
//! let key = AnswerKeyOptions::builder()
//!     .font_size(11.0)
//!     .margin(36.0)
//!     .build();
//!
//! let config = PipelineConfig::default()
//!     .with_seed(Some(42))
//!     .with_shuffle(false);
//! ```
//!
//! # Architecture
//!
//! ```text
//! Question PDFs -> Segmenter (difficulty + labels) -> Merge -> Question store
//! Answer PDFs   -> Answer extractor               -> Merge -> Answer store
//! Selection spec + stores -> Set assembler -> Composer (+ answer key) -> Question set PDF
//! ```

pub mod answer_key;
pub mod answers;
pub mod classifier;
pub mod cli;
pub mod composer;
pub mod config;
pub mod difficulty;
pub mod document;
pub mod labels;
pub mod merge;
pub mod pdf_reader;
pub mod pdf_writer;
pub mod pipeline;
pub mod record;
pub mod segmenter;
pub mod selection;
pub mod skill_tree;
pub mod store;
pub mod util;

// Re-exports for convenience
pub use answer_key::{
    AnswerEntry, AnswerKeyError, AnswerKeyOptions, AnswerKeyOptionsBuilder, AnswerKeyPage,
};
pub use cli::{
    create_progress_bar, create_spinner, AnswerKeyArgs, Cli, Commands, ExitCode, ExportArgs,
    ParseArgs, QsetArgs, SkillTreeArgs,
};
pub use composer::{compose, ComposeError, ComposeStats, OutputDocument, OutputSink};
pub use config::{CliOverrides, Config, ConfigError};
pub use difficulty::{DifficultyDetector, DifficultyError, MarkerSpec, Strategy};
pub use document::{
    DocumentError, Drawing, MemoryDocument, MemoryPage, PageImage, SourceDocument,
};
pub use labels::{LabelError, Labels};
pub use merge::{AnswerBank, QuestionBank};
pub use pdf_reader::LopdfSource;
pub use pdf_writer::{AnswerKeyWriter, PdfWriterError};
pub use pipeline::{
    PipelineConfig, PipelineError, ProgressCallback, QbankPipeline, SilentProgress,
};
pub use record::{AnswerRecord, PageRange, QuestionRecord, Tier};
pub use segmenter::{RecordSegmenter, SegmentError};
pub use selection::{
    SelectionError, SelectionMode, SelectionSpec, SetAssembler, TierProbabilities,
};
pub use skill_tree::{AllIds, SkillCount, SkillTree};
pub use store::{ManifestEntry, StoreError};
