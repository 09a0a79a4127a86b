//! Quality rules and vote weight.

use serde::{Deserialize, Serialize};

use crate::governor::MAX_LEVEL;

/// Thresholds a post must meet, plus the skip-list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityRules {
    pub word_min: usize,
    pub image_min: usize,
    /// Alternative standard rule; the default is effectively disabled
    pub second_word_min: usize,
    pub second_image_min: usize,
    /// Lowered thresholds for followed authors
    pub fast_word_min: usize,
    pub fast_image_min: usize,
    /// Base vote weight, 1..=10000
    pub base_weight: u16,
    /// Lower-cased tags that reject a post, in configured order
    pub tags_to_skip: Vec<String>,
}

impl Default for QualityRules {
    fn default() -> Self {
        Self {
            word_min: 100,
            image_min: 1,
            second_word_min: 99_999,
            second_image_min: 99_999,
            fast_word_min: 50,
            fast_image_min: 1,
            base_weight: 5_000,
            tags_to_skip: Vec::new(),
        }
    }
}

/// Which rules a post satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    pub followed: bool,
    pub passed_standard: bool,
    /// Only ever true for followed authors
    pub passed_fast: bool,
}

impl Eligibility {
    pub fn accepted(&self) -> bool {
        self.passed_standard || self.passed_fast
    }
}

impl QualityRules {
    /// First skip-list entry present in `tags`
    pub fn skip_tag(&self, tags: &[String]) -> Option<&str> {
        self.tags_to_skip
            .iter()
            .find(|skip| tags.iter().any(|t| t == *skip))
            .map(|s| s.as_str())
    }

    pub fn eligibility(&self, words: usize, images: usize, followed: bool) -> Eligibility {
        let passed_standard = (words >= self.word_min && images >= self.image_min)
            || (words >= self.second_word_min && images >= self.second_image_min);
        let passed_fast =
            followed && words >= self.fast_word_min && images >= self.fast_image_min;

        Eligibility {
            followed,
            passed_standard,
            passed_fast,
        }
    }

    /// Base weight, doubled and capped when the fast-track rule passed
    pub fn weight(&self, eligibility: &Eligibility) -> u16 {
        if eligibility.passed_fast {
            (self.base_weight as u32 * 2).min(MAX_LEVEL) as u16
        } else {
            self.base_weight
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_rule_thresholds() {
        let rules = QualityRules::default();

        assert!(!rules.eligibility(99, 1, false).accepted());
        assert!(!rules.eligibility(100, 0, false).accepted());

        let ok = rules.eligibility(100, 1, false);
        assert!(ok.accepted());
        assert_eq!(rules.weight(&ok), 5_000);
    }

    #[test]
    fn test_second_standard_rule() {
        let rules = QualityRules {
            second_word_min: 300,
            second_image_min: 0,
            ..QualityRules::default()
        };
        assert!(rules.eligibility(300, 0, false).accepted());
        assert!(!rules.eligibility(299, 0, false).accepted());
    }

    #[test]
    fn test_fast_track_only_for_followed() {
        let rules = QualityRules::default();

        let unfollowed = rules.eligibility(60, 2, false);
        assert!(!unfollowed.passed_fast);
        assert!(!unfollowed.accepted());

        let followed = rules.eligibility(60, 2, true);
        assert!(followed.passed_fast);
        assert_eq!(rules.weight(&followed), 10_000);

        assert!(!rules.eligibility(40, 0, true).accepted());
    }

    #[test]
    fn test_weight_doubles_even_when_standard_passes() {
        let rules = QualityRules {
            base_weight: 3_000,
            ..QualityRules::default()
        };
        let both = rules.eligibility(500, 5, true);
        assert!(both.passed_standard && both.passed_fast);
        assert_eq!(rules.weight(&both), 6_000);
    }

    #[test]
    fn test_skip_tag_reports_first_configured() {
        let rules = QualityRules {
            tags_to_skip: vec!["nsfw".to_string(), "spam".to_string()],
            ..QualityRules::default()
        };
        let tags = vec!["spam".to_string(), "nsfw".to_string()];
        assert_eq!(rules.skip_tag(&tags), Some("nsfw"));
        assert_eq!(rules.skip_tag(&["life".to_string()]), None);
    }
}
