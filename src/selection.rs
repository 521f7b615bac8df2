//! Question set selection
//!
//! A [`SelectionSpec`] describes the set to build: per-skill quotas or global
//! difficulty proportions, a list of identifiers that must be included, and a
//! hard upper bound on the total. [`SetAssembler`] turns it into an ordered
//! list of records.

use crate::labels::canonical_skill;
use crate::merge::QuestionBank;
use crate::record::{QuestionRecord, Tier};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Allowed deviation of the tier probability sum from 1.0
pub const PROBABILITY_EPSILON: f64 = 1e-6;

/// Selection error types
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Selection spec not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid selection spec {path}: {source}")]
    InvalidSpec {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "Invalid tier probabilities (easy {easy}, medium {medium}, hard {hard}): \
         each must be non-negative and they must sum to 1.0"
    )]
    InvalidProbabilities { easy: f64, medium: f64, hard: f64 },

    #[error("Selected {chosen} questions but only {total} were requested; adjust quotas or probabilities")]
    ExceedsTotal { chosen: usize, total: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SelectionError>;

/// Requested quantities: domain -> skill -> quantity
pub type DomainQuotas = BTreeMap<String, BTreeMap<String, Option<usize>>>;

/// Share of each difficulty tier in proportion mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierProbabilities {
    pub easy: f64,
    pub medium: f64,
    pub hard: f64,
}

impl TierProbabilities {
    /// Validated probabilities
    pub fn new(easy: f64, medium: f64, hard: f64) -> Result<Self> {
        let probs = Self { easy, medium, hard };
        probs.validate()?;
        Ok(probs)
    }

    pub fn validate(&self) -> Result<()> {
        let values = [self.easy, self.medium, self.hard];
        let well_formed = values.iter().all(|p| p.is_finite() && *p >= 0.0);
        let sum: f64 = values.iter().sum();
        if !well_formed || (sum - 1.0).abs() > PROBABILITY_EPSILON {
            return Err(SelectionError::InvalidProbabilities {
                easy: self.easy,
                medium: self.medium,
                hard: self.hard,
            });
        }
        Ok(())
    }

    pub fn get(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Easy => self.easy,
            Tier::Medium => self.medium,
            Tier::Hard => self.hard,
        }
    }
}

/// Description of a question set to assemble
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSpec {
    /// Where the assembled document is written
    pub output_path: PathBuf,
    /// Upper bound on the number of selected questions
    pub total_questions: usize,
    /// Identifiers that are always included
    #[serde(default)]
    pub chosen_ids: Vec<String>,
    /// Append an answer key page
    #[serde(default)]
    pub include_ans_key: bool,
    /// Proportion mode distribution; quota mode when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_probabilities: Option<TierProbabilities>,
    /// Subject group (e.g. "RW", "Math") -> domain -> skill -> quantity
    #[serde(flatten)]
    pub subjects: BTreeMap<String, DomainQuotas>,
}

impl SelectionSpec {
    /// Parse a JSON selection spec
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a selection spec from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SelectionError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|source| SelectionError::InvalidSpec {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Mode implied by the spec itself
    pub fn mode(&self) -> SelectionMode {
        match self.tier_probabilities {
            Some(probs) => SelectionMode::Proportion(probs),
            None => SelectionMode::Quota,
        }
    }

    /// All (domain, skill, quantity) entries, grouped by subject
    pub fn entries(&self) -> impl Iterator<Item = QuotaEntry<'_>> {
        self.subjects.iter().flat_map(|(subject, domains)| {
            domains.iter().flat_map(move |(domain, skills)| {
                skills.iter().map(move |(skill, quantity)| QuotaEntry {
                    subject,
                    domain,
                    skill,
                    quantity: *quantity,
                })
            })
        })
    }
}

/// One leaf of the selection spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaEntry<'a> {
    pub subject: &'a str,
    pub domain: &'a str,
    pub skill: &'a str,
    pub quantity: Option<usize>,
}

impl QuotaEntry<'_> {
    pub fn matches(&self, record: &QuestionRecord) -> bool {
        record.domain == self.domain && canonical_skill(&record.skill) == canonical_skill(self.skill)
    }
}

/// How quota entries turn into draws
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionMode {
    /// Draw each entry's quantity from its own pool
    Quota,
    /// Pool all matching records and draw per difficulty tier
    Proportion(TierProbabilities),
}

/// Builds question sets from a merged bank
#[derive(Debug, Clone)]
pub struct SetAssembler<'a> {
    bank: &'a QuestionBank,
    shuffle: bool,
}

impl<'a> SetAssembler<'a> {
    pub fn new(bank: &'a QuestionBank) -> Self {
        Self {
            bank,
            shuffle: true,
        }
    }

    /// Shuffle the final order (default: on)
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Select, overlay required identifiers, check the total and order
    pub fn assemble<R: Rng + ?Sized>(
        &self,
        spec: &SelectionSpec,
        mode: SelectionMode,
        rng: &mut R,
    ) -> Result<Vec<QuestionRecord>> {
        let mut chosen = match mode {
            SelectionMode::Quota => self.select_quota(spec, rng),
            SelectionMode::Proportion(probs) => self.select_proportion(spec, probs, rng)?,
        };

        self.overlay_required(&mut chosen, &spec.chosen_ids);

        if chosen.len() > spec.total_questions {
            return Err(SelectionError::ExceedsTotal {
                chosen: chosen.len(),
                total: spec.total_questions,
            });
        }

        if self.shuffle {
            chosen.shuffle(rng);
        }
        Ok(chosen)
    }

    /// Indices of bank records matching an entry
    fn pool(&self, entry: &QuotaEntry<'_>) -> Vec<usize> {
        self.bank
            .iter()
            .enumerate()
            .filter(|(_, record)| entry.matches(record))
            .map(|(i, _)| i)
            .collect()
    }

    fn draw<R: Rng + ?Sized>(&self, pool: &[usize], count: usize, rng: &mut R) -> Vec<QuestionRecord> {
        let records = self.bank.records();
        (0..count)
            .map(|_| records[pool[rng.random_range(0..pool.len())]].clone())
            .collect()
    }

    /// Quota mode
    pub fn select_quota<R: Rng + ?Sized>(&self, spec: &SelectionSpec, rng: &mut R) -> Vec<QuestionRecord> {
        let mut chosen = Vec::new();

        for entry in spec.entries() {
            let Some(quantity) = entry.quantity else {
                tracing::warn!(
                    "{} / {} / {}: no quantity given, skipped",
                    entry.subject,
                    entry.domain,
                    entry.skill
                );
                continue;
            };

            let pool = self.pool(&entry);
            if quantity >= pool.len() {
                tracing::warn!(
                    "For skill ({}), requested {} but only {} questions satisfy the requirement, skipped",
                    entry.skill,
                    quantity,
                    pool.len()
                );
                continue;
            }

            chosen.extend(self.draw(&pool, quantity, rng));
        }
        chosen
    }

    /// Proportion mode
    pub fn select_proportion<R: Rng + ?Sized>(
        &self,
        spec: &SelectionSpec,
        probs: TierProbabilities,
        rng: &mut R,
    ) -> Result<Vec<QuestionRecord>> {
        probs.validate()?;

        let mut by_tier: [BTreeSet<usize>; 3] = Default::default();
        for entry in spec.entries() {
            for i in self.pool(&entry) {
                by_tier[self.bank.records()[i].tier.index()].insert(i);
            }
        }

        let budget = spec.total_questions.saturating_sub(spec.chosen_ids.len());
        let mut chosen = Vec::new();

        for tier in Tier::ALL {
            let p = probs.get(tier);
            if p == 0.0 {
                continue;
            }
            let pool: Vec<usize> = by_tier[tier.index()].iter().copied().collect();
            if pool.is_empty() {
                tracing::warn!("No {} questions match the selection, tier skipped", tier);
                continue;
            }
            let count = ((budget as f64 * p).floor() as usize).max(1);
            chosen.extend(self.draw(&pool, count, rng));
        }
        Ok(chosen)
    }

    /// Append required records not already chosen, in bank order
    pub fn overlay_required(&self, chosen: &mut Vec<QuestionRecord>, required: &[String]) {
        let required: HashSet<&str> = required.iter().map(String::as_str).collect();
        let mut present: HashSet<String> = chosen.iter().map(|r| r.id.clone()).collect();

        for record in self.bank.iter() {
            if required.contains(record.id.as_str()) && present.insert(record.id.clone()) {
                chosen.push(record.clone());
            }
        }

        for id in required {
            if !self.bank.contains(id) {
                tracing::warn!("Required question {} is not in the question bank", id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PageRange;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(id: usize, domain: &str, skill: &str, tier: Tier) -> QuestionRecord {
        QuestionRecord {
            id: format!("{:08x}", id),
            test: "Math".to_string(),
            domain: domain.to_string(),
            skill: skill.to_string(),
            tier,
            source: PathBuf::from("bank.pdf"),
            pages: PageRange::single(id),
            excluded: false,
        }
    }

    /// Five records for each of three skills, tiers cycling
    fn bank() -> QuestionBank {
        let mut id = 0;
        let mut records = Vec::new();
        for skill in ["Systems", "Ratios", "Circles"] {
            for _ in 0..5 {
                records.push(record(id, "Algebra", skill, Tier::ALL[id % 3]));
                id += 1;
            }
        }
        records.into_iter().collect()
    }

    fn spec(quotas: &[(&str, Option<usize>)], total: usize) -> SelectionSpec {
        let skills = quotas
            .iter()
            .map(|(skill, qty)| (skill.to_string(), *qty))
            .collect();
        let mut domains = BTreeMap::new();
        domains.insert("Algebra".to_string(), skills);
        let mut subjects = BTreeMap::new();
        subjects.insert("Math".to_string(), domains);
        SelectionSpec {
            output_path: PathBuf::from("out.pdf"),
            total_questions: total,
            subjects,
            ..Default::default()
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_parse_spec_json() {
        let json = r#"{
            "outputPath": "set.pdf",
            "totalQuestions": 20,
            "chosenIds": ["0000000a"],
            "includeAnsKey": true,
            "RW": { "Craft and Structure": { "Words in Context": 3 } },
            "Math": { "Algebra": { "Systems": 2, "Ratios": null } }
        }"#;
        let spec = SelectionSpec::from_json(json).unwrap();
        assert_eq!(spec.output_path, PathBuf::from("set.pdf"));
        assert_eq!(spec.total_questions, 20);
        assert!(spec.include_ans_key);
        assert_eq!(spec.mode(), SelectionMode::Quota);
        assert_eq!(spec.subjects["RW"]["Craft and Structure"]["Words in Context"], Some(3));
        assert_eq!(spec.subjects["Math"]["Algebra"]["Ratios"], None);
        assert_eq!(spec.entries().count(), 3);
    }

    #[test]
    fn test_parse_spec_with_probabilities() {
        let json = r#"{
            "outputPath": "set.pdf",
            "totalQuestions": 10,
            "tierProbabilities": { "easy": 0.1, "medium": 0.5, "hard": 0.4 },
            "Math": { "Algebra": { "Systems": null } }
        }"#;
        let spec = SelectionSpec::from_json(json).unwrap();
        assert!(spec.chosen_ids.is_empty());
        assert!(!spec.include_ans_key);
        assert!(matches!(spec.mode(), SelectionMode::Proportion(p) if p.medium == 0.5));
    }

    #[test]
    fn test_load_missing_spec() {
        let err = SelectionSpec::load(Path::new("/nonexistent/input.json")).unwrap_err();
        assert!(matches!(err, SelectionError::NotFound(_)));
    }

    #[test]
    fn test_quota_skips_oversized_entry() {
        let bank = bank();
        let spec = spec(&[("Systems", Some(2)), ("Ratios", Some(2)), ("Circles", Some(10))], 20);
        let chosen = SetAssembler::new(&bank).select_quota(&spec, &mut rng());
        assert_eq!(chosen.len(), 4);
        assert!(chosen.iter().all(|r| r.skill != "Circles"));
    }

    #[test]
    fn test_quota_equal_to_pool_is_skipped() {
        let bank = bank();
        let spec = spec(&[("Systems", Some(5))], 20);
        let chosen = SetAssembler::new(&bank).select_quota(&spec, &mut rng());
        assert!(chosen.is_empty());
    }

    #[test]
    fn test_quota_missing_leaf_is_skipped() {
        let bank = bank();
        let spec = spec(&[("Systems", None), ("Ratios", Some(1))], 20);
        let chosen = SetAssembler::new(&bank).select_quota(&spec, &mut rng());
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen[0].skill, "Ratios");
    }

    #[test]
    fn test_quota_matches_canonical_skill() {
        let bank: QuestionBank = vec![
            record(1, "Craft and Structure", "Cross-text Connections", Tier::Easy),
            record(2, "Craft and Structure", "Cross-Text Connections", Tier::Easy),
        ]
        .into_iter()
        .collect();
        let mut spec = spec(&[], 10);
        spec.subjects.clear();
        let mut skills = BTreeMap::new();
        skills.insert("Cross-Text Connections".to_string(), Some(1));
        let mut domains = BTreeMap::new();
        domains.insert("Craft and Structure".to_string(), skills);
        spec.subjects.insert("RW".to_string(), domains);

        let assembler = SetAssembler::new(&bank);
        let entry = spec.entries().next().unwrap();
        assert_eq!(assembler.pool(&entry).len(), 2);
    }

    #[test]
    fn test_overlay_appends_missing_required() {
        let bank = bank();
        let assembler = SetAssembler::new(&bank);
        let mut chosen = vec![bank.records()[0].clone()];
        let required = vec![
            bank.records()[0].id.clone(),
            bank.records()[7].id.clone(),
            "ffffffff".to_string(),
        ];
        assembler.overlay_required(&mut chosen, &required);
        let ids: Vec<_> = chosen.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["00000000", "00000007"]);
    }

    #[test]
    fn test_assemble_exceeds_total() {
        let bank = bank();
        let mut spec = spec(&[("Systems", Some(3))], 3);
        spec.chosen_ids = vec![bank.records()[14].id.clone()];
        let err = SetAssembler::new(&bank)
            .assemble(&spec, SelectionMode::Quota, &mut rng())
            .unwrap_err();
        assert!(matches!(err, SelectionError::ExceedsTotal { chosen: 4, total: 3 }));
    }

    #[test]
    fn test_assemble_never_exceeds_total() {
        let bank = bank();
        for seed in 0..20 {
            let spec = spec(&[("Systems", Some(2)), ("Ratios", Some(3))], 6);
            let chosen = SetAssembler::new(&bank)
                .assemble(&spec, SelectionMode::Quota, &mut StdRng::seed_from_u64(seed))
                .unwrap();
            assert!(chosen.len() <= spec.total_questions);
            assert_eq!(chosen.len(), 5);
        }
    }

    #[test]
    fn test_assemble_is_deterministic_with_seed() {
        let bank = bank();
        let spec = spec(&[("Systems", Some(2)), ("Ratios", Some(3))], 10);
        let a = SetAssembler::new(&bank)
            .assemble(&spec, SelectionMode::Quota, &mut rng())
            .unwrap();
        let b = SetAssembler::new(&bank)
            .assemble(&spec, SelectionMode::Quota, &mut rng())
            .unwrap();
        let ids = |v: &[QuestionRecord]| v.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn test_proportion_counts_per_tier() {
        let bank = bank();
        let spec = spec(&[("Systems", None), ("Ratios", None), ("Circles", None)], 10);
        let probs = TierProbabilities::new(0.1, 0.5, 0.4).unwrap();
        let chosen = SetAssembler::new(&bank)
            .select_proportion(&spec, probs, &mut rng())
            .unwrap();

        let count = |tier: Tier| chosen.iter().filter(|r| r.tier == tier).count();
        assert_eq!(count(Tier::Easy), 1);
        assert_eq!(count(Tier::Medium), 5);
        assert_eq!(count(Tier::Hard), 4);
    }

    #[test]
    fn test_proportion_floor_of_one() {
        let bank = bank();
        let spec = spec(&[("Systems", None)], 4);
        let probs = TierProbabilities::new(0.05, 0.05, 0.9).unwrap();
        let chosen = SetAssembler::new(&bank)
            .select_proportion(&spec, probs, &mut rng())
            .unwrap();
        let count = |tier: Tier| chosen.iter().filter(|r| r.tier == tier).count();
        assert_eq!(count(Tier::Easy), 1);
        assert_eq!(count(Tier::Medium), 1);
        assert_eq!(count(Tier::Hard), 3);
    }

    #[test]
    fn test_proportion_budget_excludes_required() {
        let bank = bank();
        let mut spec = spec(&[("Systems", None)], 10);
        spec.chosen_ids = vec!["00000000".into(), "00000001".into()];
        let probs = TierProbabilities::new(0.0, 0.0, 1.0).unwrap();
        let chosen = SetAssembler::new(&bank)
            .select_proportion(&spec, probs, &mut rng())
            .unwrap();
        assert_eq!(chosen.len(), 8);
        assert!(chosen.iter().all(|r| r.tier == Tier::Hard));
    }

    #[test]
    fn test_invalid_probabilities() {
        assert!(TierProbabilities::new(0.5, 0.5, 0.5).is_err());
        assert!(TierProbabilities::new(-0.1, 0.6, 0.5).is_err());
        assert!(TierProbabilities::new(f64::NAN, 0.5, 0.5).is_err());
        assert!(TierProbabilities::new(0.1, 0.2, 0.7).is_ok());
    }

    #[test]
    fn test_no_shuffle_keeps_overlay_order() {
        let bank = bank();
        let mut spec = spec(&[], 10);
        spec.chosen_ids = vec!["00000003".into(), "00000001".into()];
        let chosen = SetAssembler::new(&bank)
            .with_shuffle(false)
            .assemble(&spec, SelectionMode::Quota, &mut rng())
            .unwrap();
        let ids: Vec<_> = chosen.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["00000001", "00000003"]);
    }
}
