//! Text canonicalization for titles, quantities, ingredients and instructions.
//!
//! Every function here is pure and total: empty input gives empty output, and
//! re-normalizing a normalized value returns it unchanged.

use std::collections::BTreeMap;

use regex::Regex;

use crate::config::{NormalizeConfig, RewriteRule};
use crate::error::DedupError;
use crate::model::Ingredient;

/// Unicode vulgar fractions and their ASCII spelling.
const VULGAR_FRACTIONS: &[(char, &str)] = &[
    ('½', "1/2"),
    ('⅓', "1/3"),
    ('⅔', "2/3"),
    ('¼', "1/4"),
    ('¾', "3/4"),
    ('⅕', "1/5"),
    ('⅖', "2/5"),
    ('⅗', "3/5"),
    ('⅘', "4/5"),
    ('⅙', "1/6"),
    ('⅚', "5/6"),
    ('⅐', "1/7"),
    ('⅛', "1/8"),
    ('⅜', "3/8"),
    ('⅝', "5/8"),
    ('⅞', "7/8"),
    ('⅑', "1/9"),
    ('⅒', "1/10"),
];

/// Exact-match key for one ingredient line: `(item, quantity, unit)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IngredientKey {
    pub item: String,
    pub quantity: String,
    pub unit: String,
}

#[derive(Debug)]
struct CompiledRule {
    pattern: Regex,
    replacement: String,
}

fn compile_rules(rules: &[RewriteRule]) -> Result<Vec<CompiledRule>, DedupError> {
    rules
        .iter()
        .map(|r| {
            Ok(CompiledRule {
                pattern: compile(&r.pattern)?,
                replacement: r.replacement.clone(),
            })
        })
        .collect()
}

fn compile(pattern: &str) -> Result<Regex, DedupError> {
    Regex::new(pattern).map_err(|e| DedupError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Upper bound on rewrite passes; guards against rule tables that cycle.
const MAX_REWRITE_PASSES: usize = 8;

/// Apply the ordered table, repeating whole passes until the text stops
/// changing. A later rule can produce text an earlier rule matches
/// ("combine well" → "mix well"), so one pass is not idempotent.
fn apply_rules(rules: &[CompiledRule], text: String) -> String {
    let mut current = text;
    for _ in 0..MAX_REWRITE_PASSES {
        let next = rules.iter().fold(current.clone(), |acc, rule| {
            collapse_whitespace(&rule.pattern.replace_all(&acc, rule.replacement.as_str()))
        });
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug)]
pub struct Normalizer {
    title_suffixes: Vec<Regex>,
    ingredient_prefixes: Vec<String>,
    unit_synonyms: BTreeMap<String, String>,
    decimal_fractions: BTreeMap<String, String>,
    quantity_rules: Vec<CompiledRule>,
    instruction_rules: Vec<CompiledRule>,
}

impl Normalizer {
    pub fn new(config: &NormalizeConfig) -> Result<Self, DedupError> {
        let title_suffixes = config
            .title_suffixes
            .iter()
            .map(|s| compile(&format!("(?:{s})$")))
            .collect::<Result<Vec<_>, _>>()?;

        let mut ingredient_prefixes: Vec<String> = config
            .ingredient_prefixes
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        // Longest first so "all purpose" is not shadowed by a shorter prefix.
        ingredient_prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        Ok(Self {
            title_suffixes,
            ingredient_prefixes,
            unit_synonyms: config
                .unit_synonyms
                .iter()
                .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_lowercase()))
                .collect(),
            decimal_fractions: config.decimal_fractions.clone(),
            quantity_rules: compile_rules(&config.quantity_rules)?,
            instruction_rules: compile_rules(&config.instruction_rules)?,
        })
    }

    /// Title → group key, e.g. `"Apple Pie (BHG) - 2"` → `"apple-pie"`.
    ///
    /// Punctuation other than hyphens is dropped and whitespace becomes
    /// hyphens before suffixes are stripped, so suffix patterns only ever see
    /// the final hyphenated form. Stripping repeats to a fixpoint, which keeps
    /// the function idempotent.
    pub fn title(&self, title: &str) -> String {
        let lowered = title.to_lowercase();
        let kept: String = lowered
            .chars()
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .filter(|c| c.is_alphanumeric() || *c == '-' || *c == ' ')
            .collect();

        let mut key = hyphenate(&kept);
        loop {
            let before = key.len();
            for suffix in &self.title_suffixes {
                let stripped = suffix.replace(&key, "");
                key = stripped.trim_matches('-').to_string();
            }
            if key.len() == before {
                break;
            }
        }
        key
    }

    /// Quantity canonicalization: ASCII fractions, decimal → fraction table,
    /// hyphenated ranges and `N n/d` mixed numbers. Output is lowercase.
    pub fn quantity(&self, quantity: &str) -> String {
        let mut out = String::with_capacity(quantity.len());
        for c in quantity.trim().to_lowercase().chars() {
            if c == '⁄' {
                out.push('/');
            } else if let Some((_, ascii)) = VULGAR_FRACTIONS.iter().find(|(g, _)| *g == c) {
                if out.chars().last().is_some_and(|p| p.is_ascii_digit()) {
                    out.push(' ');
                }
                out.push_str(ascii);
            } else {
                out.push(c);
            }
        }

        let collapsed = collapse_whitespace(&out);
        if let Some(fraction) = self.decimal_fractions.get(&collapsed) {
            return fraction.clone();
        }
        apply_rules(&self.quantity_rules, collapsed)
    }

    pub fn unit(&self, unit: &str) -> String {
        let unit = unit.trim().trim_end_matches('.').to_lowercase();
        match self.unit_synonyms.get(&unit) {
            Some(canonical) => canonical.clone(),
            None => unit,
        }
    }

    pub fn item(&self, item: &str) -> String {
        let mut current = collapse_whitespace(&item.to_lowercase());
        while let Some(rest) = self
            .ingredient_prefixes
            .iter()
            .find_map(|prefix| current.strip_prefix(prefix.as_str()))
        {
            current = rest.trim().to_string();
        }
        current
    }

    pub fn ingredient(&self, ingredient: &Ingredient) -> IngredientKey {
        IngredientKey {
            item: self.item(&ingredient.item),
            quantity: self.quantity(&ingredient.quantity),
            unit: self.unit(&ingredient.unit),
        }
    }

    /// Lowercase, collapse whitespace, then apply the phrase-equivalence
    /// table in order.
    pub fn instruction(&self, text: &str) -> String {
        let base = collapse_whitespace(&text.to_lowercase());
        if base.is_empty() {
            return base;
        }
        apply_rules(&self.instruction_rules, base)
    }
}

fn hyphenate(text: &str) -> String {
    text.split(|c: char| c == ' ' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
