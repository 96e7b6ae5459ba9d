//! Title grouping and star-topology analysis.
//!
//! Each multi-member title group gets one canonical (lowest source priority,
//! then id). Every other member is scored against the canonical only; members
//! are never compared with each other.

use std::collections::BTreeMap;

use tracing::debug;

use crate::classify::Classifier;
use crate::config::GroupingConfig;
use crate::model::{CandidateEntry, CanonicalRef, GroupAnalysis, Recipe, Verdict};
use crate::normalize::Normalizer;
use crate::priority::SourcePriorityResolver;
use crate::similarity::{score_profiles, SimilarityScorer};

/// Recipes sharing a normalized title, sorted so the canonical is first.
#[derive(Debug)]
pub struct TitleGroup<'r> {
    pub key: String,
    pub members: Vec<&'r Recipe>,
}

impl<'r> TitleGroup<'r> {
    pub fn canonical(&self) -> &'r Recipe {
        self.members[0]
    }
}

pub struct GroupBuilder<'a> {
    normalizer: &'a Normalizer,
    resolver: &'a SourcePriorityResolver,
    classifier: &'a Classifier,
    excluded_categories: Vec<String>,
}

impl<'a> GroupBuilder<'a> {
    pub fn new(
        normalizer: &'a Normalizer,
        resolver: &'a SourcePriorityResolver,
        classifier: &'a Classifier,
        config: &GroupingConfig,
    ) -> Self {
        Self {
            normalizer,
            resolver,
            classifier,
            excluded_categories: config
                .excluded_categories
                .iter()
                .map(|c| c.trim().to_lowercase())
                .collect(),
        }
    }

    pub fn is_excluded(&self, recipe: &Recipe) -> bool {
        let category = recipe.category.trim().to_lowercase();
        self.excluded_categories.iter().any(|c| *c == category)
    }

    /// Partition into title groups with more than one member, in key order.
    /// Recipes with an empty normalized title are never grouped.
    pub fn build<'r>(&self, recipes: &'r [Recipe]) -> Vec<TitleGroup<'r>> {
        let mut by_title: BTreeMap<String, Vec<&'r Recipe>> = BTreeMap::new();
        for recipe in recipes {
            if self.is_excluded(recipe) {
                continue;
            }
            let key = self.normalizer.title(&recipe.title);
            if key.is_empty() {
                continue;
            }
            by_title.entry(key).or_default().push(recipe);
        }

        by_title
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(key, mut members)| {
                members.sort_by_cached_key(|r| self.resolver.sort_key(*r));
                TitleGroup { key, members }
            })
            .collect()
    }

    pub fn analyze_group(&self, group: &TitleGroup<'_>) -> GroupAnalysis {
        let scorer = SimilarityScorer::new(self.normalizer, self.resolver);
        let canonical = group.canonical();
        let canonical_profile = scorer.profile(canonical);

        let mut merge_into_canonical = Vec::new();
        let mut keep_as_variants = Vec::new();

        for member in &group.members[1..] {
            let profile = scorer.profile(member);
            let scores = score_profiles(&canonical_profile, &profile);
            let classification = self.classifier.classify(&scores);
            debug!(
                group = %group.key,
                canonical = %canonical.id,
                candidate = %member.id,
                exact = scores.exact_ingredient_score,
                item = scores.item_ingredient_score,
                instruction = scores.instruction_similarity,
                verdict = %classification.verdict,
                "classified pair"
            );

            let entry = CandidateEntry {
                id: member.id.clone(),
                collection: member.collection.clone(),
                title: member.title.clone(),
                source: profile.source.name,
                exact_ingredient_score: scores.exact_ingredient_score,
                item_ingredient_score: scores.item_ingredient_score,
                instruction_similarity: scores.instruction_similarity,
                reason: classification.reason,
            };
            match classification.verdict {
                Verdict::Merge => merge_into_canonical.push(entry),
                Verdict::Variant => keep_as_variants.push(entry),
                Verdict::Different => {}
            }
        }

        GroupAnalysis {
            title_key: group.key.clone(),
            member_count: group.members.len(),
            canonical: CanonicalRef {
                id: canonical.id.clone(),
                collection: canonical.collection.clone(),
                title: canonical.title.clone(),
                source: canonical_profile.source.name,
                priority: canonical_profile.source.priority,
            },
            merge_into_canonical,
            keep_as_variants,
        }
    }

    pub fn analyze(&self, recipes: &[Recipe]) -> Vec<GroupAnalysis> {
        self.build(recipes)
            .iter()
            .map(|group| self.analyze_group(group))
            .collect()
    }
}
