//! Skill tree module
//!
//! Read-only aggregate views over a question collection, exported as JSON:
//! the test → domain → skill tree and the flat identifier list.

use crate::labels::canonical_skill;
use crate::record::QuestionRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Skill tree leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SkillCount {
    /// Total number of questions
    Total(usize),
    /// Counts per tier, `[easy, medium, hard]`
    ByTier([usize; 3]),
}

/// test → domain → skill → count
pub type SkillTree = BTreeMap<String, BTreeMap<String, BTreeMap<String, SkillCount>>>;

/// Build the skill tree; with `by_tier` the leaves are per-tier count vectors
pub fn build<'a, I>(records: I, by_tier: bool) -> SkillTree
where
    I: IntoIterator<Item = &'a QuestionRecord>,
{
    let mut tree = SkillTree::new();
    for record in records {
        let leaf = tree
            .entry(record.test.clone())
            .or_default()
            .entry(record.domain.clone())
            .or_default()
            .entry(canonical_skill(&record.skill).to_string())
            .or_insert(if by_tier {
                SkillCount::ByTier([0; 3])
            } else {
                SkillCount::Total(0)
            });

        match leaf {
            SkillCount::Total(n) => *n += 1,
            SkillCount::ByTier(counts) => counts[record.tier.index()] += 1,
        }
    }
    tree
}

pub fn write_skill_tree(path: &Path, tree: &SkillTree) -> std::io::Result<()> {
    let content = serde_json::to_string_pretty(tree)?;
    fs::write(path, content)
}

/// `{"qIds": [...]}` export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllIds {
    #[serde(rename = "qIds")]
    pub q_ids: Vec<String>,
}

/// Every identifier, in collection order
pub fn all_ids<'a, I>(records: I) -> AllIds
where
    I: IntoIterator<Item = &'a QuestionRecord>,
{
    AllIds {
        q_ids: records.into_iter().map(|r| r.id.clone()).collect(),
    }
}

pub fn write_all_ids(path: &Path, ids: &AllIds) -> std::io::Result<()> {
    let content = serde_json::to_string_pretty(ids)?;
    fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PageRange, Tier};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn record(id: &str, test: &str, domain: &str, skill: &str, tier: Tier) -> QuestionRecord {
        QuestionRecord {
            id: id.to_string(),
            test: test.to_string(),
            domain: domain.to_string(),
            skill: skill.to_string(),
            tier,
            source: PathBuf::from("q.pdf"),
            pages: PageRange::single(0),
            excluded: false,
        }
    }

    fn sample() -> Vec<QuestionRecord> {
        vec![
            record("00000001", "Math", "Algebra", "Linear equations", Tier::Easy),
            record("00000002", "Math", "Algebra", "Linear equations", Tier::Hard),
            record("00000003", "Math", "Geometry", "Circles", Tier::Medium),
            record(
                "00000004",
                "Reading and Writing",
                "Craft and Structure",
                "Cross-text Connections",
                Tier::Easy,
            ),
            record(
                "00000005",
                "Reading and Writing",
                "Craft and Structure",
                "Cross-Text Connections",
                Tier::Hard,
            ),
        ]
    }

    #[test]
    fn test_build_counts() {
        let records = sample();
        let tree = build(&records, false);

        assert_eq!(tree["Math"]["Algebra"]["Linear equations"], SkillCount::Total(2));
        assert_eq!(tree["Math"]["Geometry"]["Circles"], SkillCount::Total(1));
    }

    #[test]
    fn test_build_canonicalises_skills() {
        let records = sample();
        let tree = build(&records, false);

        let craft = &tree["Reading and Writing"]["Craft and Structure"];
        assert_eq!(craft.len(), 1);
        assert_eq!(craft["Cross-Text Connections"], SkillCount::Total(2));
    }

    #[test]
    fn test_build_by_tier() {
        let records = sample();
        let tree = build(&records, true);

        assert_eq!(
            tree["Math"]["Algebra"]["Linear equations"],
            SkillCount::ByTier([1, 0, 1])
        );
        assert_eq!(tree["Math"]["Geometry"]["Circles"], SkillCount::ByTier([0, 1, 0]));
    }

    #[test]
    fn test_skill_tree_json_shape() {
        let records = sample();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("skill-tree.json");

        write_skill_tree(&path, &build(&records, true)).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            value["Math"]["Algebra"]["Linear equations"],
            serde_json::json!([1, 0, 1])
        );
    }

    #[test]
    fn test_all_ids() {
        let records = sample();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("all-ids.json");

        let ids = all_ids(&records);
        assert_eq!(ids.q_ids.len(), 5);
        assert_eq!(ids.q_ids[0], "00000001");

        write_all_ids(&path, &ids).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"qIds\""));
        let loaded: AllIds = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded, ids);
    }
}
