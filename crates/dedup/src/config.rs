use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DedupError;
use crate::model::Verdict;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Every table the pipeline consults. Loaded once, validated, then handed to
/// the component constructors; nothing mutates it afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub priority: PriorityConfig,
    #[serde(default)]
    pub grouping: GroupingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

// ---------------------------------------------------------------------------
// Normalization tables
// ---------------------------------------------------------------------------

/// An ordered `(pattern, replacement)` substitution. Replacements use the
/// `regex` crate's `$1` capture syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewriteRule {
    pub pattern: String,
    pub replacement: String,
}

impl RewriteRule {
    pub fn new(pattern: &str, replacement: &str) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NormalizeConfig {
    /// Source-tag suffixes, matched against the hyphenated title and anchored
    /// at its end. Stripped repeatedly until none applies.
    pub title_suffixes: Vec<String>,
    /// Leading qualifiers dropped from ingredient item names.
    pub ingredient_prefixes: Vec<String>,
    /// Unit spelling → canonical short unit. Single hop, never chained.
    pub unit_synonyms: BTreeMap<String, String>,
    /// Whole-string decimal quantities rewritten as fractions.
    pub decimal_fractions: BTreeMap<String, String>,
    pub quantity_rules: Vec<RewriteRule>,
    pub instruction_rules: Vec<RewriteRule>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        let title_suffixes = [
            r"-bhg",
            r"-handwritten",
            r"-variant",
            r"-copy",
            r"-ocr",
            r"-\d+",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let unit_synonyms = [
            ("tablespoon", "tbsp"),
            ("tablespoons", "tbsp"),
            ("tbs", "tbsp"),
            ("tbsps", "tbsp"),
            ("teaspoon", "tsp"),
            ("teaspoons", "tsp"),
            ("tsps", "tsp"),
            ("cups", "cup"),
            ("c", "cup"),
            ("ounce", "oz"),
            ("ounces", "oz"),
            ("pound", "lb"),
            ("pounds", "lb"),
            ("lbs", "lb"),
            ("quarts", "qt"),
            ("quart", "qt"),
            ("pints", "pt"),
            ("pint", "pt"),
            ("packages", "pkg"),
            ("package", "pkg"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let decimal_fractions = [
            ("0.125", "1/8"),
            ("0.25", "1/4"),
            ("0.33", "1/3"),
            ("0.333", "1/3"),
            ("0.5", "1/2"),
            ("0.66", "2/3"),
            ("0.67", "2/3"),
            ("0.666", "2/3"),
            ("0.75", "3/4"),
            ("1.25", "1 1/4"),
            ("1.5", "1 1/2"),
            ("1.75", "1 3/4"),
            ("2.5", "2 1/2"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            title_suffixes,
            ingredient_prefixes: vec!["all-purpose".into(), "all purpose".into()],
            unit_synonyms,
            decimal_fractions,
            quantity_rules: vec![
                // "1 to 2" / "1 – 2" → "1-2"
                RewriteRule::new(r"(\d)\s+to\s+(\d)", "$1-$2"),
                RewriteRule::new(r"(\d)\s*[-–—]\s*(\d)", "$1-$2"),
                // "1-1/2" → "1 1/2"
                RewriteRule::new(r"\b(\d+)-(\d+/\d+)", "$1 $2"),
            ],
            instruction_rules: vec![
                RewriteRule::new(r"\bmix well\b", "stir"),
                RewriteRule::new(r"\bstir well\b", "stir"),
                RewriteRule::new(r"\bcombine\b", "mix"),
                RewriteRule::new(r"\bblend\b", "mix"),
                RewriteRule::new(r"\bpreheat(?:ed)?\b", "heat"),
                RewriteRule::new(r"\bminutes\b", "min"),
                RewriteRule::new(r"\bminute\b", "min"),
                RewriteRule::new(r"\bmins\b", "min"),
                RewriteRule::new(r"\bhours\b", "hr"),
                RewriteRule::new(r"\bhour\b", "hr"),
                RewriteRule::new(r"\s*\bdegrees\b", "°"),
                RewriteRule::new(r"\bfahrenheit\b", "f"),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Source priority
// ---------------------------------------------------------------------------

/// A provenance token looked for inside recipe ids and `source` fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceToken {
    pub token: String,
    /// Resolved source name; defaults to the token itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub priority: u32,
}

impl SourceToken {
    pub fn source_name(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.token)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PriorityConfig {
    /// Exact collection name → priority. Lower is kept preferentially.
    pub collections: BTreeMap<String, u32>,
    /// Checked in order; first token found wins.
    pub tokens: Vec<SourceToken>,
    pub default_priority: u32,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        let token = |token: &str, source: Option<&str>, priority: u32| SourceToken {
            token: token.into(),
            source: source.map(String::from),
            priority,
        };

        Self {
            collections: [
                ("grandma-baker", 1),
                ("mommom-baker", 2),
                ("granny-hudson", 3),
            ]
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect(),
            tokens: vec![
                token("grandma", Some("grandma-baker"), 1),
                token("mommom", Some("mommom-baker"), 2),
                token("granny", Some("granny-hudson"), 3),
                token("handwritten", None, 4),
                token("bhg", None, 5),
                token("allrecipes", None, 6),
                token("foodnetwork", None, 6),
            ],
            default_priority: 99,
        }
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GroupingConfig {
    /// Categories holding non-recipe content; compared case-insensitively.
    pub excluded_categories: Vec<String>,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            excluded_categories: vec!["tips".into(), "reference".into()],
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCondition {
    #[default]
    Any,
    Same,
    Different,
}

/// One row of the ordered classification table. All bounds are inclusive
/// minimums except `below_exact`, which is a strict upper bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassificationRule {
    pub verdict: Verdict,
    pub reason: String,
    #[serde(default)]
    pub min_exact: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below_exact: Option<f64>,
    #[serde(default)]
    pub min_item: f64,
    #[serde(default)]
    pub min_instruction: f64,
    #[serde(default)]
    pub source: SourceCondition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClassifierConfig {
    pub rules: Vec<ClassificationRule>,
    pub fallback_reason: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let rule = |verdict, reason: &str| ClassificationRule {
            verdict,
            reason: reason.into(),
            min_exact: 0.0,
            below_exact: None,
            min_item: 0.0,
            min_instruction: 0.0,
            source: SourceCondition::Any,
        };

        Self {
            rules: vec![
                ClassificationRule {
                    min_item: 0.95,
                    min_instruction: 0.90,
                    ..rule(Verdict::Merge, "near-identical recipe (transcription variation)")
                },
                ClassificationRule {
                    min_item: 0.85,
                    min_instruction: 0.85,
                    source: SourceCondition::Same,
                    ..rule(Verdict::Merge, "same-source duplicate (import/OCR variation)")
                },
                ClassificationRule {
                    min_exact: 0.90,
                    min_item: 0.60,
                    min_instruction: 0.70,
                    ..rule(Verdict::Merge, "high ingredient and instruction match")
                },
                ClassificationRule {
                    min_item: 0.80,
                    below_exact: Some(0.85),
                    ..rule(Verdict::Variant, "same ingredients, different quantities")
                },
                ClassificationRule {
                    min_item: 0.70,
                    min_instruction: 0.80,
                    ..rule(Verdict::Variant, "similar recipe with variations")
                },
                ClassificationRule {
                    min_item: 0.60,
                    min_instruction: 0.60,
                    source: SourceCondition::Different,
                    ..rule(Verdict::Variant, "cross-source variant")
                },
            ],
            fallback_reason: "insufficient similarity".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl DedupConfig {
    pub fn from_toml(input: &str) -> Result<Self, DedupError> {
        let config: DedupConfig =
            toml::from_str(input).map_err(|e| DedupError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, DedupError> {
        toml::to_string_pretty(self).map_err(|e| DedupError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), DedupError> {
        let patterns = self
            .normalize
            .title_suffixes
            .iter()
            .chain(self.normalize.quantity_rules.iter().map(|r| &r.pattern))
            .chain(self.normalize.instruction_rules.iter().map(|r| &r.pattern));
        for pattern in patterns {
            regex::Regex::new(pattern).map_err(|e| DedupError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        }

        if let Some((key, _)) = self
            .normalize
            .unit_synonyms
            .iter()
            .find(|(k, v)| k.trim().is_empty() || v.trim().is_empty())
        {
            return Err(DedupError::ConfigValidation(format!(
                "unit synonym '{key}' has an empty side"
            )));
        }

        if self.priority.collections.keys().any(|k| k.trim().is_empty()) {
            return Err(DedupError::ConfigValidation(
                "priority collection names must not be empty".into(),
            ));
        }
        if self.priority.tokens.iter().any(|t| t.token.trim().is_empty()) {
            return Err(DedupError::ConfigValidation(
                "priority tokens must not be empty".into(),
            ));
        }

        if self.classifier.rules.is_empty() {
            return Err(DedupError::ConfigValidation(
                "at least one classifier rule is required".into(),
            ));
        }
        for (i, rule) in self.classifier.rules.iter().enumerate() {
            let bounds = [
                ("min_exact", Some(rule.min_exact)),
                ("below_exact", rule.below_exact),
                ("min_item", Some(rule.min_item)),
                ("min_instruction", Some(rule.min_instruction)),
            ];
            for (field, value) in bounds {
                if let Some(v) = value {
                    if !(0.0..=1.0).contains(&v) {
                        return Err(DedupError::ConfigValidation(format!(
                            "classifier rule {}: {field} must be within [0, 1], got {v}",
                            i + 1
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
