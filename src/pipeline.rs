//! Pipeline processing module
//!
//! Provides a clean API for the question-bank workflow, separating
//! business logic from CLI handling.
//!
//! ## Processing Steps
//!
//! 1. Parse question documents (general batch, then excluded batch) into the question store
//! 2. Parse answer documents into the answer store
//! 3. Assemble a question set from a selection spec
//! 4. Compose the selected pages, optionally followed by an answer key page

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

use crate::answer_key::{self, AnswerKeyError, AnswerKeyOptions};
use crate::answers;
use crate::cli::ExitCode;
use crate::composer::{self, ComposeError, OutputDocument};
use crate::document::DocumentError;
use crate::merge::{merge_answer_batches, merge_question_batches, AnswerBank, QuestionBank};
use crate::pdf_reader::LopdfSource;
use crate::pdf_writer::{AnswerKeyWriter, PdfWriterError};
use crate::record::{AnswerRecord, QuestionRecord};
use crate::segmenter::{RecordSegmenter, SegmentError};
use crate::selection::{
    SelectionError, SelectionMode, SelectionSpec, SetAssembler, TierProbabilities,
};
use crate::skill_tree::{self, AllIds, SkillTree};
use crate::store::{self, ManifestEntry, StoreError};
use crate::util::collect_pdf_files;

/// Progress callback for pipeline steps
pub trait ProgressCallback: Send + Sync {
    /// Called when a new step starts
    fn on_step_start(&self, step: &str);
    /// Called to report progress within a step
    fn on_step_progress(&self, current: usize, total: usize);
    /// Called when a step completes
    fn on_step_complete(&self, step: &str, message: &str);
    /// Called for debug/verbose messages
    fn on_debug(&self, message: &str);
}

/// No-op progress callback (silent mode)
pub struct SilentProgress;

impl ProgressCallback for SilentProgress {
    fn on_step_start(&self, _step: &str) {}
    fn on_step_progress(&self, _current: usize, _total: usize) {}
    fn on_step_complete(&self, _step: &str, _message: &str) {}
    fn on_debug(&self, _message: &str) {}
}

/// Pipeline processing error
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("No source PDFs found in {}", .0.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    NoSources(Vec<PathBuf>),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Segment(#[from] SegmentError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    AnswerKey(#[from] AnswerKeyError),

    #[error(transparent)]
    PdfWriter(#[from] PdfWriterError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// CLI exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        fn document(err: &DocumentError) -> ExitCode {
            match err {
                DocumentError::FileNotFound(_) => ExitCode::InputNotFound,
                _ => ExitCode::ProcessingError,
            }
        }

        match self {
            PipelineError::InputNotFound(_) | PipelineError::NoSources(_) => ExitCode::InputNotFound,
            PipelineError::Document(e) => document(e),
            PipelineError::Segment(SegmentError::Document(e)) => document(e),
            PipelineError::Segment(_) => ExitCode::ProcessingError,
            PipelineError::Selection(SelectionError::NotFound(_)) => ExitCode::InputNotFound,
            PipelineError::Selection(SelectionError::IoError(_)) => ExitCode::GeneralError,
            PipelineError::Selection(_) => ExitCode::InvalidArgs,
            PipelineError::Compose(ComposeError::Document(e)) => document(e),
            PipelineError::Compose(ComposeError::InvalidRange { .. }) => ExitCode::ProcessingError,
            PipelineError::Compose(_) => ExitCode::OutputError,
            PipelineError::AnswerKey(_) => ExitCode::InvalidArgs,
            PipelineError::PdfWriter(_) => ExitCode::OutputError,
            PipelineError::Store(StoreError::NotFound(_)) => ExitCode::InputNotFound,
            PipelineError::Store(StoreError::Io(_)) => ExitCode::OutputError,
            PipelineError::Store(_) => ExitCode::ProcessingError,
            PipelineError::Io(_) => ExitCode::OutputError,
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// General question documents
    pub question_dir: PathBuf,
    /// Excluded question documents, parsed after the general batch
    pub excluded_question_dir: PathBuf,
    /// General answer documents
    pub answer_dir: PathBuf,
    /// Excluded answer documents
    pub excluded_answer_dir: PathBuf,
    /// Question store (CSV)
    pub question_store: PathBuf,
    /// Answer store (CSV)
    pub answer_store: PathBuf,
    pub question_manifest: PathBuf,
    pub answer_manifest: PathBuf,
    /// Shuffle assembled sets
    pub shuffle: bool,
    /// Seed for reproducible sampling (None = thread RNG)
    pub seed: Option<u64>,
    /// Proportion-mode override of the spec's own mode
    pub probabilities: Option<TierProbabilities>,
    pub answer_key: AnswerKeyOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            question_dir: PathBuf::from("alls/questions"),
            excluded_question_dir: PathBuf::from("excludeds/questions"),
            answer_dir: PathBuf::from("alls/answers"),
            excluded_answer_dir: PathBuf::from("excludeds/answers"),
            question_store: PathBuf::from("all-q-parsed.csv"),
            answer_store: PathBuf::from("all-a-parsed.csv"),
            question_manifest: PathBuf::from(store::QUESTION_MANIFEST),
            answer_manifest: PathBuf::from(store::ANSWER_MANIFEST),
            shuffle: true,
            seed: None,
            probabilities: None,
            answer_key: AnswerKeyOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Builder pattern: set shuffle
    pub fn with_shuffle(mut self, enabled: bool) -> Self {
        self.shuffle = enabled;
        self
    }

    /// Builder pattern: set RNG seed
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Builder pattern: force proportion mode
    pub fn with_probabilities(mut self, probabilities: Option<TierProbabilities>) -> Self {
        self.probabilities = probabilities;
        self
    }

    /// Builder pattern: read question documents from `general` and `excluded`
    pub fn with_question_dirs(mut self, general: impl Into<PathBuf>, excluded: impl Into<PathBuf>) -> Self {
        self.question_dir = general.into();
        self.excluded_question_dir = excluded.into();
        self
    }

    /// Builder pattern: read answer documents from `general` and `excluded`
    pub fn with_answer_dirs(mut self, general: impl Into<PathBuf>, excluded: impl Into<PathBuf>) -> Self {
        self.answer_dir = general.into();
        self.excluded_answer_dir = excluded.into();
        self
    }

    /// Builder pattern: set both store paths
    pub fn with_stores(mut self, questions: impl Into<PathBuf>, answers: impl Into<PathBuf>) -> Self {
        self.question_store = questions.into();
        self.answer_store = answers.into();
        self
    }

    /// Builder pattern: set both manifest paths
    pub fn with_manifests(mut self, questions: impl Into<PathBuf>, answers: impl Into<PathBuf>) -> Self {
        self.question_manifest = questions.into();
        self.answer_manifest = answers.into();
        self
    }
}

/// Result of a parse run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSummary {
    /// Source documents parsed
    pub documents: usize,
    /// Records written after merging
    pub records: usize,
    pub store: PathBuf,
}

/// Result of assembling and writing a question set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetSummary {
    pub questions: usize,
    /// Pages in the output, answer key included
    pub pages: usize,
    pub answer_key: bool,
    pub output_path: PathBuf,
}

/// Parse question documents, one batch per source
///
/// Sources are `(path, excluded)` pairs; callers list general sources before
/// excluded ones so that excluded versions win the merge.
pub fn parse_question_batches<P: ProgressCallback>(
    sources: &[(PathBuf, bool)],
    segmenter: &RecordSegmenter,
    progress: &P,
) -> Result<(Vec<Vec<QuestionRecord>>, Vec<ManifestEntry>)> {
    let mut batches = Vec::with_capacity(sources.len());
    let mut manifest = Vec::with_capacity(sources.len());

    for (i, (path, excluded)) in sources.iter().enumerate() {
        manifest.push(ManifestEntry::now(path, *excluded));
        progress.on_debug(&format!("Parsing {}", path.display()));

        let doc = LopdfSource::open(path)?;
        batches.push(segmenter.segment(&doc, *excluded)?);
        progress.on_step_progress(i + 1, sources.len());
    }
    Ok((batches, manifest))
}

/// Parse answer documents, one batch per source
pub fn parse_answer_batches<P: ProgressCallback>(
    sources: &[(PathBuf, bool)],
    progress: &P,
) -> Result<(Vec<Vec<AnswerRecord>>, Vec<ManifestEntry>)> {
    let mut batches = Vec::with_capacity(sources.len());
    let mut manifest = Vec::with_capacity(sources.len());

    for (i, (path, excluded)) in sources.iter().enumerate() {
        manifest.push(ManifestEntry::now(path, *excluded));
        progress.on_debug(&format!("Parsing {}", path.display()));

        let started = Instant::now();
        let doc = LopdfSource::open(path)?;
        let batch = answers::extract_answers(&doc)?;
        tracing::info!(
            "{}: {} answer records in {:.2?}",
            path.display(),
            batch.len(),
            started.elapsed()
        );
        batches.push(batch);
        progress.on_step_progress(i + 1, sources.len());
    }
    Ok((batches, manifest))
}

/// Question-bank pipeline
pub struct QbankPipeline {
    config: PipelineConfig,
    segmenter: RecordSegmenter,
}

impl QbankPipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            segmenter: RecordSegmenter::default(),
        }
    }

    /// Get the pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// `(path, excluded)` pairs from a general and an excluded directory
    ///
    /// A missing directory contributes nothing; finding no PDF at all is an error.
    fn sources(general: &Path, excluded: &Path) -> Result<Vec<(PathBuf, bool)>> {
        let mut sources = Vec::new();
        for (dir, flag) in [(general, false), (excluded, true)] {
            if !dir.is_dir() {
                tracing::warn!("Source directory {} does not exist, skipped", dir.display());
                continue;
            }
            sources.extend(collect_pdf_files(dir)?.into_iter().map(|p| (p, flag)));
        }

        if sources.is_empty() {
            return Err(PipelineError::NoSources(vec![
                general.to_path_buf(),
                excluded.to_path_buf(),
            ]));
        }
        Ok(sources)
    }

    pub fn question_sources(&self) -> Result<Vec<(PathBuf, bool)>> {
        Self::sources(&self.config.question_dir, &self.config.excluded_question_dir)
    }

    pub fn answer_sources(&self) -> Result<Vec<(PathBuf, bool)>> {
        Self::sources(&self.config.answer_dir, &self.config.excluded_answer_dir)
    }

    /// Parse every question document into the question store (silent mode)
    pub fn parse_questions(&self) -> Result<ParseSummary> {
        self.parse_questions_with_progress(&SilentProgress)
    }

    /// Parse every question document into the question store
    pub fn parse_questions_with_progress<P: ProgressCallback>(
        &self,
        progress: &P,
    ) -> Result<ParseSummary> {
        let sources = self.question_sources()?;

        progress.on_step_start("Parsing question documents...");
        let (batches, manifest) = parse_question_batches(&sources, &self.segmenter, progress)?;
        let bank = merge_question_batches(batches);
        progress.on_step_complete(
            "Parsing question documents",
            &format!("{} questions from {} documents", bank.len(), sources.len()),
        );

        store::write_questions(&self.config.question_store, bank.records())?;
        store::write_manifest(&self.config.question_manifest, &manifest)?;

        Ok(ParseSummary {
            documents: sources.len(),
            records: bank.len(),
            store: self.config.question_store.clone(),
        })
    }

    /// Parse every answer document into the answer store (silent mode)
    pub fn parse_answers(&self) -> Result<ParseSummary> {
        self.parse_answers_with_progress(&SilentProgress)
    }

    /// Parse every answer document into the answer store
    pub fn parse_answers_with_progress<P: ProgressCallback>(
        &self,
        progress: &P,
    ) -> Result<ParseSummary> {
        let sources = self.answer_sources()?;

        progress.on_step_start("Parsing answer documents...");
        let (batches, manifest) = parse_answer_batches(&sources, progress)?;
        let bank = merge_answer_batches(batches);
        let placeholders = bank.records().iter().filter(|r| r.is_placeholder()).count();
        progress.on_step_complete(
            "Parsing answer documents",
            &format!(
                "{} answers from {} documents ({} without a match)",
                bank.len(),
                sources.len(),
                placeholders
            ),
        );

        store::write_answers(&self.config.answer_store, bank.records())?;
        store::write_manifest(&self.config.answer_manifest, &manifest)?;

        Ok(ParseSummary {
            documents: sources.len(),
            records: bank.len(),
            store: self.config.answer_store.clone(),
        })
    }

    /// Load the question store
    pub fn load_bank(&self) -> Result<QuestionBank> {
        Ok(store::read_questions(&self.config.question_store)?
            .into_iter()
            .collect())
    }

    /// Load the answer store
    pub fn load_answers(&self) -> Result<AnswerBank> {
        Ok(store::read_answers(&self.config.answer_store)?
            .into_iter()
            .collect())
    }

    /// Mode used for `spec`: the configured probabilities win over the spec's own
    pub fn selection_mode(&self, spec: &SelectionSpec) -> SelectionMode {
        match self.config.probabilities {
            Some(probs) => SelectionMode::Proportion(probs),
            None => spec.mode(),
        }
    }

    /// Select the records of a question set, in final order
    pub fn assemble(&self, spec: &SelectionSpec, bank: &QuestionBank) -> Result<Vec<QuestionRecord>> {
        let mut seeded_rng;
        let mut thread_rng;
        let rng: &mut dyn RngCore = match self.config.seed {
            Some(seed) => {
                seeded_rng = StdRng::seed_from_u64(seed);
                &mut seeded_rng
            }
            None => {
                thread_rng = rand::rng();
                &mut thread_rng
            }
        };

        let records = SetAssembler::new(bank)
            .with_shuffle(self.config.shuffle)
            .assemble(spec, self.selection_mode(spec), rng)?;
        Ok(records)
    }

    /// Assemble and write the question set described by a spec file (silent mode)
    pub fn build_question_set(&self, spec_path: &Path) -> Result<SetSummary> {
        self.build_question_set_with_progress(spec_path, &SilentProgress)
    }

    /// Assemble and write the question set described by a spec file
    pub fn build_question_set_with_progress<P: ProgressCallback>(
        &self,
        spec_path: &Path,
        progress: &P,
    ) -> Result<SetSummary> {
        let spec = SelectionSpec::load(spec_path)?;
        let bank = self.load_bank()?;

        progress.on_step_start("Selecting questions...");
        let records = self.assemble(&spec, &bank)?;
        progress.on_step_complete(
            "Selecting questions",
            &format!("{} of {} requested", records.len(), spec.total_questions),
        );
        if records.is_empty() {
            tracing::warn!("Selection for {} is empty", spec.output_path.display());
        }

        self.write_question_set(&spec, &records, progress)
    }

    /// Compose `records` (plus the answer key when requested) into the spec's output
    pub fn write_question_set<P: ProgressCallback>(
        &self,
        spec: &SelectionSpec,
        records: &[QuestionRecord],
        progress: &P,
    ) -> Result<SetSummary> {
        progress.on_step_start("Composing question set...");
        let mut output = OutputDocument::new();
        let stats = composer::compose(records, &mut output)?;
        progress.on_debug(&format!(
            "{} pages copied from {} sources, {} blank pages skipped",
            stats.pages_copied, stats.sources_opened, stats.blank_pages_skipped
        ));

        if spec.include_ans_key {
            let answers = self.load_answers()?;
            let entries = answer_key::entries_for(records, &answers);
            let page = answer_key::layout(&entries, &self.config.answer_key)?;
            let bytes = AnswerKeyWriter::render(&page)?;
            let key = LopdfSource::from_bytes("answer-key.pdf", &bytes)?;
            output.copy_page(&key, 0)?;
        }

        let pages = output.page_count();
        output.save(&spec.output_path)?;
        progress.on_step_complete(
            "Composing question set",
            &format!("{} pages -> {}", pages, spec.output_path.display()),
        );

        Ok(SetSummary {
            questions: records.len(),
            pages,
            answer_key: spec.include_ans_key,
            output_path: spec.output_path.clone(),
        })
    }

    /// Write a standalone answer key for an existing question document
    ///
    /// Returns the number of keyed questions.
    pub fn write_answer_key(&self, question_pdf: &Path, output: &Path) -> Result<usize> {
        if !question_pdf.exists() {
            return Err(PipelineError::InputNotFound(question_pdf.to_path_buf()));
        }
        let doc = LopdfSource::open(question_pdf)?;
        let records = self.segmenter.segment(&doc, false)?;
        let answers = self.load_answers()?;

        let entries = answer_key::entries_for(&records, &answers);
        let page = answer_key::layout(&entries, &self.config.answer_key)?;
        AnswerKeyWriter::write(&page, output)?;
        Ok(entries.len())
    }

    /// Write the skill tree of the question store
    pub fn export_skill_tree(&self, output: &Path, by_tier: bool) -> Result<SkillTree> {
        let bank = self.load_bank()?;
        let tree = skill_tree::build(bank.records(), by_tier);
        skill_tree::write_skill_tree(output, &tree)?;
        Ok(tree)
    }

    /// Write every identifier of the question store
    pub fn export_all_ids(&self, output: &Path) -> Result<AllIds> {
        let bank = self.load_bank()?;
        let ids = skill_tree::all_ids(bank.records());
        skill_tree::write_all_ids(output, &ids)?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf_reader::fixtures::{self, FixturePage};
    use crate::record::Tier;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn question_page(id: &str, skill: &str, markers: usize) -> FixturePage {
        let lines = fixtures::question_lines(id, skill);
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        FixturePage::text(&lines).markers(markers)
    }

    fn answer_page(id: &str, answer: &str) -> FixturePage {
        FixturePage::text(&[
            &format!("Question ID {}", id),
            &format!("Correct Answer: {}", answer),
        ])
    }

    /// Workspace with general and excluded question/answer batches
    fn workspace() -> (TempDir, PipelineConfig) {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        for dir in ["alls/questions", "excludeds/questions", "alls/answers", "excludeds/answers"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }

        fixtures::write(
            &[
                question_page("0000000a", "Linear equations", 1),
                FixturePage::text(&["Which of the following is equivalent to 2x + 4?"]),
                FixturePage::blank(),
                question_page("0000000b", "Linear equations", 2),
                question_page("0000000c", "Systems of equations", 3),
            ],
            &root.join("alls/questions/math.pdf"),
        );
        fixtures::write(
            &[question_page("0000000b", "Linear equations", 2)],
            &root.join("excludeds/questions/math.pdf"),
        );
        fixtures::write(
            &[
                answer_page("0000000a", "B"),
                answer_page("0000000b", "C"),
                FixturePage::text(&["Question ID 0000000c", "No usable rationale"]),
            ],
            &root.join("alls/answers/math.pdf"),
        );

        let config = PipelineConfig::default()
            .with_question_dirs(root.join("alls/questions"), root.join("excludeds/questions"))
            .with_answer_dirs(root.join("alls/answers"), root.join("excludeds/answers"))
            .with_stores(root.join("q.csv"), root.join("a.csv"))
            .with_manifests(root.join("q.json"), root.join("a.json"))
            .with_seed(Some(7));
        (temp_dir, config)
    }

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.question_dir, PathBuf::from("alls/questions"));
        assert_eq!(config.excluded_question_dir, PathBuf::from("excludeds/questions"));
        assert_eq!(config.question_store, PathBuf::from("all-q-parsed.csv"));
        assert_eq!(config.answer_manifest, PathBuf::from("a_meta_infos.json"));
        assert!(config.shuffle);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_pipeline_config_builder() {
        let probs = TierProbabilities::new(0.1, 0.5, 0.4).unwrap();
        let config = PipelineConfig::default()
            .with_shuffle(false)
            .with_seed(Some(42))
            .with_probabilities(Some(probs));

        assert!(!config.shuffle);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.probabilities, Some(probs));
    }

    #[test]
    fn test_parse_questions_merges_excluded_batch() {
        let (_dir, config) = workspace();
        let pipeline = QbankPipeline::new(config.clone());

        let summary = pipeline.parse_questions().unwrap();
        assert_eq!(summary.documents, 2);
        assert_eq!(summary.records, 3);

        let bank = pipeline.load_bank().unwrap();
        let ids: Vec<_> = bank.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["0000000a", "0000000c", "0000000b"]);

        let b = bank.get("0000000b").unwrap();
        assert!(b.excluded);
        assert_eq!(b.tier, Tier::Medium);

        let a = bank.get("0000000a").unwrap();
        assert_eq!(a.pages.indices(), vec![0, 1]);
        assert_eq!(a.domain, "Algebra");

        let manifest = store::read_manifest(&config.question_manifest).unwrap();
        assert_eq!(manifest.len(), 2);
        assert!(!manifest[0].excluded);
        assert!(manifest[1].excluded);
    }

    #[test]
    fn test_parse_answers_with_placeholder() {
        let (_dir, config) = workspace();
        let pipeline = QbankPipeline::new(config);

        let summary = pipeline.parse_answers().unwrap();
        assert_eq!(summary.documents, 1);
        assert_eq!(summary.records, 3);

        let answers = pipeline.load_answers().unwrap();
        assert_eq!(answers.answer("0000000a"), Some("B"));
        assert_eq!(answers.answer("0000000c"), Some("??"));
    }

    #[test]
    fn test_no_sources() {
        let temp_dir = tempdir().unwrap();
        let config = PipelineConfig::default()
            .with_question_dirs(temp_dir.path().join("a"), temp_dir.path().join("b"));
        let result = QbankPipeline::new(config).parse_questions();
        assert!(matches!(result, Err(PipelineError::NoSources(_))));
    }

    #[test]
    fn test_build_question_set_with_answer_key() {
        let (dir, config) = workspace();
        let pipeline = QbankPipeline::new(config);
        pipeline.parse_questions().unwrap();
        pipeline.parse_answers().unwrap();

        let output = dir.path().join("set.pdf");
        let spec = serde_json::json!({
            "outputPath": output,
            "totalQuestions": 3,
            "chosenIds": ["0000000c"],
            "includeAnsKey": true,
            "Math": { "Algebra": { "Linear equations": 1 } }
        });
        let spec_path = dir.path().join("qset.json");
        fs::write(&spec_path, spec.to_string()).unwrap();

        let summary = pipeline.build_question_set(&spec_path).unwrap();
        assert_eq!(summary.questions, 2);
        assert!(summary.answer_key);

        let doc = lopdf::Document::load(&output).unwrap();
        assert_eq!(doc.get_pages().len(), summary.pages);
        let last = summary.pages as u32;
        let key_text = doc.extract_text(&[last]).unwrap();
        assert!(key_text.contains("Answer key"));
        assert!(key_text.contains("0000000c"));
    }

    #[test]
    fn test_build_question_set_exceeding_total() {
        let (dir, config) = workspace();
        let pipeline = QbankPipeline::new(config);
        pipeline.parse_questions().unwrap();

        let spec = serde_json::json!({
            "outputPath": dir.path().join("set.pdf"),
            "totalQuestions": 1,
            "chosenIds": ["0000000a", "0000000c"],
            "includeAnsKey": false,
        });
        let spec_path = dir.path().join("qset.json");
        fs::write(&spec_path, spec.to_string()).unwrap();

        let result = pipeline.build_question_set(&spec_path);
        assert!(matches!(
            result,
            Err(PipelineError::Selection(SelectionError::ExceedsTotal { chosen: 2, total: 1 }))
        ));
        assert!(!dir.path().join("set.pdf").exists());
    }

    #[test]
    fn test_seeded_assembly_is_reproducible() {
        let (_dir, config) = workspace();
        let pipeline = QbankPipeline::new(config);
        pipeline.parse_questions().unwrap();
        let bank = pipeline.load_bank().unwrap();

        let spec = SelectionSpec::from_json(
            r#"{"outputPath": "x.pdf", "totalQuestions": 10, "chosenIds": ["0000000a", "0000000b", "0000000c"]}"#,
        )
        .unwrap();
        let first: Vec<_> = pipeline.assemble(&spec, &bank).unwrap().into_iter().map(|r| r.id).collect();
        let second: Vec<_> = pipeline.assemble(&spec, &bank).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_selection_mode_override() {
        let probs = TierProbabilities::new(0.2, 0.3, 0.5).unwrap();
        let spec = SelectionSpec::default();

        let pipeline = QbankPipeline::new(PipelineConfig::default());
        assert_eq!(pipeline.selection_mode(&spec), SelectionMode::Quota);

        let pipeline = QbankPipeline::new(PipelineConfig::default().with_probabilities(Some(probs)));
        assert_eq!(pipeline.selection_mode(&spec), SelectionMode::Proportion(probs));
    }

    #[test]
    fn test_write_answer_key_for_question_pdf() {
        let (dir, config) = workspace();
        let pipeline = QbankPipeline::new(config);
        pipeline.parse_answers().unwrap();

        let output = dir.path().join("key.pdf");
        let count = pipeline
            .write_answer_key(&dir.path().join("alls/questions/math.pdf"), &output)
            .unwrap();
        assert_eq!(count, 3);

        let doc = lopdf::Document::load(&output).unwrap();
        let text = doc.extract_text(&[1]).unwrap();
        assert!(text.contains("0000000b"));
    }

    #[test]
    fn test_write_answer_key_missing_input() {
        let pipeline = QbankPipeline::new(PipelineConfig::default());
        let result = pipeline.write_answer_key(Path::new("/nonexistent/q.pdf"), Path::new("key.pdf"));
        assert!(matches!(result, Err(PipelineError::InputNotFound(_))));
    }

    #[test]
    fn test_exports() {
        let (dir, config) = workspace();
        let pipeline = QbankPipeline::new(config);
        pipeline.parse_questions().unwrap();

        let ids = pipeline.export_all_ids(&dir.path().join("ids.json")).unwrap();
        assert_eq!(ids.q_ids.len(), 3);

        let tree = pipeline
            .export_skill_tree(&dir.path().join("tree.json"), true)
            .unwrap();
        assert_eq!(
            tree["Math"]["Algebra"]["Linear equations"],
            skill_tree::SkillCount::ByTier([1, 1, 0])
        );
    }

    #[test]
    fn test_pipeline_error_exit_codes() {
        let missing = PipelineError::Store(StoreError::NotFound(PathBuf::from("q.csv")));
        assert_eq!(missing.exit_code(), ExitCode::InputNotFound);

        let total = PipelineError::Selection(SelectionError::ExceedsTotal { chosen: 5, total: 4 });
        assert_eq!(total.exit_code(), ExitCode::InvalidArgs);

        let parse = PipelineError::Document(DocumentError::Encrypted(PathBuf::from("q.pdf")));
        assert_eq!(parse.exit_code(), ExitCode::ProcessingError);

        let open = PipelineError::Compose(ComposeError::Document(DocumentError::FileNotFound(
            PathBuf::from("q.pdf"),
        )));
        assert_eq!(open.exit_code(), ExitCode::InputNotFound);

        let write = PipelineError::Compose(ComposeError::Pdf {
            path: PathBuf::from("/readonly/set.pdf"),
            message: "permission denied".to_string(),
        });
        assert_eq!(write.exit_code(), ExitCode::OutputError);
    }

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::InputNotFound(PathBuf::from("/test/q.pdf"));
        assert!(err.to_string().contains("/test/q.pdf"));

        let err = PipelineError::NoSources(vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(err.to_string(), "No source PDFs found in a, b");
    }
}
