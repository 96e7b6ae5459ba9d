use crate::config::{ClassificationRule, ClassifierConfig, SourceCondition};
use crate::model::{Classification, SimilarityScores, Verdict};

/// Ordered rule table; the first rule whose bounds all hold decides.
///
/// Default table (tightest first):
/// 1. merge: item ≥ 0.95, instruction ≥ 0.90
/// 2. merge: same source, item ≥ 0.85, instruction ≥ 0.85
/// 3. merge: exact ≥ 0.90, item ≥ 0.60, instruction ≥ 0.70
/// 4. variant: item ≥ 0.80, exact < 0.85
/// 5. variant: item ≥ 0.70, instruction ≥ 0.80
/// 6. variant: different source, item ≥ 0.60, instruction ≥ 0.60
/// 7. different
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassificationRule>,
    fallback_reason: String,
}

impl Classifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            rules: config.rules.clone(),
            fallback_reason: config.fallback_reason.clone(),
        }
    }

    pub fn classify(&self, scores: &SimilarityScores) -> Classification {
        for (i, rule) in self.rules.iter().enumerate() {
            if rule_matches(rule, scores) {
                return Classification {
                    verdict: rule.verdict,
                    reason: rule.reason.clone(),
                    rule: Some(i + 1),
                };
            }
        }
        Classification {
            verdict: Verdict::Different,
            reason: self.fallback_reason.clone(),
            rule: None,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

fn rule_matches(rule: &ClassificationRule, s: &SimilarityScores) -> bool {
    let source_ok = match rule.source {
        SourceCondition::Any => true,
        SourceCondition::Same => s.same_source,
        SourceCondition::Different => !s.same_source,
    };
    source_ok
        && s.item_ingredient_score >= rule.min_item
        && s.exact_ingredient_score >= rule.min_exact
        && rule.below_exact.map_or(true, |limit| s.exact_ingredient_score < limit)
        && s.instruction_similarity >= rule.min_instruction
}
