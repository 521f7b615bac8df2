//! Label block parsing
//!
//! Question pages carry a free-text block of the form
//! `Assessment SAT Test Math Domain Algebra Skill Linear equations D...`.
//! The block is flattened to single spaces before matching.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Substring marking the start of the label block
pub const LABEL_ANCHOR: &str = "Assessment";

/// The only assessment this document family carries
pub const EXPECTED_ASSESSMENT: &str = "SAT";

static LABEL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Assessment (\w*) Test ([\w\s]*) Domain ([\w\s-]*) Skill ([\w\s,:-]*) D")
        .expect("Invalid regex")
});

/// Upstream skill spellings and their canonical form
const SKILL_ALIASES: &[(&str, &str)] = &[("Cross-text Connections", "Cross-Text Connections")];

/// Label parsing error types
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("unexpected assessment '{found}' in label block (expected '{}')", EXPECTED_ASSESSMENT)]
    UnexpectedAssessment { found: String },
}

pub type Result<T> = std::result::Result<T, LabelError>;

/// Categorical metadata of one question
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Labels {
    pub test: String,
    pub domain: String,
    pub skill: String,
}

/// Canonical spelling of a skill name
pub fn canonical_skill(skill: &str) -> &str {
    SKILL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == skill)
        .map_or(skill, |(_, canonical)| canonical)
}

/// Parse the label block of a page
///
/// Returns `Ok(None)` when the page has no block or the block is ambiguous.
pub fn extract(text: &str) -> Result<Option<Labels>> {
    let Some(start) = text.find(LABEL_ANCHOR) else {
        return Ok(None);
    };
    let flattened = text[start..].split_whitespace().collect::<Vec<_>>().join(" ");

    let mut matches = LABEL_PATTERN.captures_iter(&flattened);
    let (Some(caps), None) = (matches.next(), matches.next()) else {
        return Ok(None);
    };

    let assessment = &caps[1];
    if assessment != EXPECTED_ASSESSMENT {
        return Err(LabelError::UnexpectedAssessment {
            found: assessment.to_string(),
        });
    }

    Ok(Some(Labels {
        test: caps[2].to_string(),
        domain: caps[3].to_string(),
        skill: canonical_skill(&caps[4]).to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = "Question ID 0a1b2c3d\nAssessment\nSAT\nTest\nMath\nDomain\nAlgebra\nSkill\nLinear equations in one variable\nDifficulty\n";

    #[test]
    fn test_extract_multiline_block() {
        let labels = extract(BLOCK).unwrap().unwrap();
        assert_eq!(labels.test, "Math");
        assert_eq!(labels.domain, "Algebra");
        assert_eq!(labels.skill, "Linear equations in one variable");
    }

    #[test]
    fn test_extract_without_anchor() {
        assert_eq!(extract("Question ID 0a1b2c3d\nSome continuation text").unwrap(), None);
    }

    #[test]
    fn test_extract_incomplete_block() {
        assert_eq!(extract("Assessment SAT Test Math").unwrap(), None);
    }

    #[test]
    fn test_extract_duplicate_block_is_ambiguous() {
        let text = format!("{}. {}", BLOCK, BLOCK);
        assert_eq!(extract(&text).unwrap(), None);
    }

    #[test]
    fn test_extract_hyphenated_domain_and_skill() {
        let text = "Assessment SAT Test Reading and Writing Domain Craft and Structure \
                    Skill Cross-text Connections Difficulty";
        let labels = extract(text).unwrap().unwrap();
        assert_eq!(labels.test, "Reading and Writing");
        assert_eq!(labels.domain, "Craft and Structure");
        assert_eq!(labels.skill, "Cross-Text Connections");
    }

    #[test]
    fn test_extract_wrong_assessment() {
        let text = "Assessment PSAT Test Math Domain Algebra Skill Systems D";
        let err = extract(text).unwrap_err();
        assert!(matches!(err, LabelError::UnexpectedAssessment { ref found } if found == "PSAT"));
    }

    #[test]
    fn test_canonical_skill() {
        assert_eq!(canonical_skill("Cross-text Connections"), "Cross-Text Connections");
        assert_eq!(canonical_skill("Boundaries"), "Boundaries");
    }
}
