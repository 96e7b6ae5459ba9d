//! Merge execution — applies an analysis report to a recipe set.
//!
//! Three phases over the whole report:
//! 1. every `merge_into_canonical` entry of every group folds the candidate's
//!    provenance into its canonical and marks the candidate for removal;
//! 2. every `keep_as_variants` entry sets `variant_of` / `variant_note`;
//! 3. pre-existing `variant_of` values that point at a merged-away id are
//!    re-targeted at the recipe that absorbed it, or dropped when that is the
//!    recipe holding the link.
//!
//! Problems with individual entries are logged in `MergeLog.errors` and
//! skipped; they never abort the run.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::model::{
    AnalysisReport, CandidateEntry, GroupAnalysis, MergeEntry, MergeError, MergeErrorKind, MergeLog,
    MergeSummary, Recipe, RedirectEntry, VariantLinkEntry,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Compute the log without touching the caller's recipes.
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub recipes: Vec<Recipe>,
    pub log: MergeLog,
}

pub struct MergeExecutor<'r> {
    report: &'r AnalysisReport,
}

impl<'r> MergeExecutor<'r> {
    pub fn new(report: &'r AnalysisReport) -> Self {
        Self { report }
    }

    /// Run all phases. In dry-run mode the phases run on a scratch copy, so the
    /// log is the one a real run would produce and `recipes` comes back as-is.
    pub fn execute(&self, recipes: Vec<Recipe>, options: ExecuteOptions) -> ExecutionOutcome {
        if options.dry_run {
            let mut scratch = recipes.clone();
            let mut log = self.apply(&mut scratch);
            log.dry_run = true;
            return ExecutionOutcome { recipes, log };
        }

        let mut recipes = recipes;
        let log = self.apply(&mut recipes);
        ExecutionOutcome { recipes, log }
    }

    /// Mutate `recipes` in place and return the audit log.
    pub fn apply(&self, recipes: &mut Vec<Recipe>) -> MergeLog {
        let recipes_before = recipes.len();
        let index = RecipeIndex::build(recipes);
        let protected: HashSet<usize> = self
            .report
            .groups
            .iter()
            .filter_map(|g| index.locate(&g.canonical.id, &g.canonical.collection))
            .collect();

        let mut state = ExecutionState {
            index,
            protected,
            merged_into: HashMap::new(),
            linked: HashSet::new(),
            merges: Vec::new(),
            variants_linked: Vec::new(),
            redirects: Vec::new(),
            errors: Vec::new(),
        };

        for group in &self.report.groups {
            for candidate in &group.merge_into_canonical {
                state.merge(recipes, group, candidate);
            }
        }
        for group in &self.report.groups {
            for candidate in &group.keep_as_variants {
                state.link_variant(recipes, group, candidate);
            }
        }
        state.redirect_dangling(recipes);

        let deleted = state.merged_into.len();
        let mut position = 0;
        recipes.retain(|_| {
            let keep = !state.merged_into.contains_key(&position);
            position += 1;
            keep
        });

        let summary = MergeSummary {
            recipes_before,
            recipes_after: recipes.len(),
            merged: state.merges.len(),
            deleted,
            variants_linked: state.variants_linked.len(),
            redirects: state.redirects.len(),
            errors: state.errors.len(),
        };
        info!(
            before = summary.recipes_before,
            after = summary.recipes_after,
            merged = summary.merged,
            variants = summary.variants_linked,
            redirects = summary.redirects,
            errors = summary.errors,
            "merge execution finished"
        );

        MergeLog {
            timestamp: chrono::Utc::now().to_rfc3339(),
            dry_run: false,
            merges: state.merges,
            variants_linked: state.variants_linked,
            redirects: state.redirects,
            errors: state.errors,
            summary,
        }
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Positions by `(id, collection)`, falling back to the first recipe with a
/// matching id when the report's collection does not match.
struct RecipeIndex {
    by_key: HashMap<(String, String), usize>,
    by_id: HashMap<String, usize>,
}

impl RecipeIndex {
    fn build(recipes: &[Recipe]) -> Self {
        let mut by_key = HashMap::new();
        let mut by_id = HashMap::new();
        for (pos, recipe) in recipes.iter().enumerate() {
            by_key
                .entry((recipe.id.clone(), recipe.collection.clone()))
                .or_insert(pos);
            by_id.entry(recipe.id.clone()).or_insert(pos);
        }
        Self { by_key, by_id }
    }

    fn locate(&self, id: &str, collection: &str) -> Option<usize> {
        self.by_key
            .get(&(id.to_string(), collection.to_string()))
            .or_else(|| self.by_id.get(id))
            .copied()
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

struct ExecutionState {
    index: RecipeIndex,
    /// Positions of every report canonical; never merged away.
    protected: HashSet<usize>,
    /// Removed position → position that absorbed it.
    merged_into: HashMap<usize, usize>,
    linked: HashSet<usize>,
    merges: Vec<MergeEntry>,
    variants_linked: Vec<VariantLinkEntry>,
    redirects: Vec<RedirectEntry>,
    errors: Vec<MergeError>,
}

impl ExecutionState {
    fn merge(&mut self, recipes: &mut [Recipe], group: &GroupAnalysis, candidate: &CandidateEntry) {
        let Some((canonical_pos, candidate_pos)) = self.resolve_pair(group, candidate) else {
            return;
        };
        if self.merged_into.contains_key(&candidate_pos) {
            self.reject(
                group,
                candidate,
                MergeErrorKind::AlreadyMerged,
                "candidate was already merged into another recipe",
            );
            return;
        }

        let incoming_sources = recipes[candidate_pos].sources.clone();
        let incoming_images = recipes[candidate_pos].image_refs.clone();
        let canonical = &mut recipes[canonical_pos];

        if canonical.sources.is_empty() && !group.canonical.source.is_empty() {
            canonical.sources.push(group.canonical.source.clone());
        }
        push_unique(&mut canonical.sources, &candidate.source);
        for source in &incoming_sources {
            push_unique(&mut canonical.sources, source);
        }
        for image in &incoming_images {
            push_unique(&mut canonical.image_refs, image);
        }
        dedup_in_order(&mut canonical.sources);
        dedup_in_order(&mut canonical.image_refs);
        canonical.source_notes = Some(source_notes(&canonical.sources));

        debug!(
            group = %group.title_key,
            canonical = %group.canonical.id,
            merged = %candidate.id,
            "merged duplicate"
        );
        self.merged_into.insert(candidate_pos, canonical_pos);
        self.merges.push(MergeEntry {
            canonical_id: group.canonical.id.clone(),
            merged_id: candidate.id.clone(),
            source: candidate.source.clone(),
            reason: candidate.reason.clone(),
        });
    }

    fn link_variant(&mut self, recipes: &mut [Recipe], group: &GroupAnalysis, candidate: &CandidateEntry) {
        let Some((canonical_pos, candidate_pos)) = self.resolve_pair(group, candidate) else {
            return;
        };
        if self.merged_into.contains_key(&candidate_pos) {
            self.reject(
                group,
                candidate,
                MergeErrorKind::AlreadyMerged,
                "variant was merged away earlier in this run",
            );
            return;
        }
        if !self.linked.insert(candidate_pos) {
            self.reject(
                group,
                candidate,
                MergeErrorKind::AlreadyLinked,
                "variant was already linked earlier in this run",
            );
            return;
        }

        let canonical_id = recipes[canonical_pos].id.clone();
        let variant = &mut recipes[candidate_pos];
        variant.variant_of = Some(canonical_id.clone());
        variant.variant_note = Some(candidate.reason.clone());

        debug!(
            group = %group.title_key,
            canonical = %canonical_id,
            variant = %candidate.id,
            "linked variant"
        );
        self.variants_linked.push(VariantLinkEntry {
            variant_id: candidate.id.clone(),
            canonical_id,
            reason: candidate.reason.clone(),
        });
    }

    /// Re-target surviving `variant_of` values whose target id no longer exists.
    fn redirect_dangling(&mut self, recipes: &mut [Recipe]) {
        let removed: HashMap<&str, &str> = self
            .merged_into
            .iter()
            .map(|(&gone, &into)| (recipes[gone].id.as_str(), recipes[into].id.as_str()))
            .collect();
        if removed.is_empty() {
            return;
        }
        let surviving: HashSet<&str> = recipes
            .iter()
            .enumerate()
            .filter(|(pos, _)| !self.merged_into.contains_key(pos))
            .map(|(_, r)| r.id.as_str())
            .collect();

        let mut rewrites = Vec::new();
        for (pos, recipe) in recipes.iter().enumerate() {
            if self.merged_into.contains_key(&pos) || self.linked.contains(&pos) {
                continue;
            }
            let Some(target) = recipe.variant_of.as_deref() else {
                continue;
            };
            if surviving.contains(target) {
                continue;
            }
            let mut to = target;
            let mut hops = 0;
            while let Some(&next) = removed.get(to) {
                to = next;
                hops += 1;
                if surviving.contains(to) || hops > removed.len() {
                    break;
                }
            }
            if to != target && surviving.contains(to) {
                let to = (to != recipe.id).then(|| to.to_string());
                rewrites.push((pos, target.to_string(), to));
            }
        }

        for (pos, from, to) in rewrites {
            let recipe = &mut recipes[pos];
            match &to {
                Some(to) => {
                    debug!(recipe = %recipe.id, from = %from, to = %to, "redirected variant_of");
                    recipe.variant_of = Some(to.clone());
                }
                None => {
                    debug!(recipe = %recipe.id, from = %from, "dropped variant_of on the absorbing recipe");
                    recipe.variant_of = None;
                    recipe.variant_note = None;
                }
            }
            self.redirects.push(RedirectEntry {
                recipe_id: recipe.id.clone(),
                from,
                to,
            });
        }
    }

    /// Locate both sides of an entry, logging the first problem found.
    fn resolve_pair(&mut self, group: &GroupAnalysis, candidate: &CandidateEntry) -> Option<(usize, usize)> {
        let Some(canonical_pos) = self
            .index
            .locate(&group.canonical.id, &group.canonical.collection)
        else {
            self.reject(
                group,
                candidate,
                MergeErrorKind::CanonicalNotFound,
                "canonical not present in the corpus",
            );
            return None;
        };
        let Some(candidate_pos) = self.index.locate(&candidate.id, &candidate.collection) else {
            self.reject(
                group,
                candidate,
                MergeErrorKind::CandidateNotFound,
                "candidate not present in the corpus",
            );
            return None;
        };
        if candidate_pos == canonical_pos {
            self.reject(
                group,
                candidate,
                MergeErrorKind::SelfReference,
                "candidate resolves to the canonical itself",
            );
            return None;
        }
        if self.protected.contains(&candidate_pos) {
            self.reject(
                group,
                candidate,
                MergeErrorKind::CandidateIsCanonical,
                "candidate is the canonical of another group",
            );
            return None;
        }
        Some((canonical_pos, candidate_pos))
    }

    fn reject(&mut self, group: &GroupAnalysis, candidate: &CandidateEntry, kind: MergeErrorKind, message: &str) {
        warn!(
            group = %group.title_key,
            canonical = %group.canonical.id,
            candidate = %candidate.id,
            "{message}"
        );
        self.errors.push(MergeError {
            kind,
            group: group.title_key.clone(),
            canonical_id: group.canonical.id.clone(),
            candidate_id: candidate.id.clone(),
            message: message.to_string(),
        });
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

fn dedup_in_order(list: &mut Vec<String>) {
    let mut seen = HashSet::new();
    list.retain(|v| seen.insert(v.clone()));
}

fn source_notes(sources: &[String]) -> String {
    let noun = if sources.len() == 1 { "source" } else { "sources" };
    format!("Combined from {} {noun}: {}", sources.len(), sources.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalysisSummary, CanonicalRef, ReportMeta};

    fn canonical(id: &str, collection: &str, source: &str) -> CanonicalRef {
        CanonicalRef {
            id: id.into(),
            collection: collection.into(),
            title: "Pie".into(),
            source: source.into(),
            priority: 1,
        }
    }

    fn candidate(id: &str, collection: &str, source: &str, reason: &str) -> CandidateEntry {
        CandidateEntry {
            id: id.into(),
            collection: collection.into(),
            title: "Pie".into(),
            source: source.into(),
            exact_ingredient_score: 1.0,
            item_ingredient_score: 1.0,
            instruction_similarity: 1.0,
            reason: reason.into(),
        }
    }

    fn group(
        key: &str,
        canonical: CanonicalRef,
        merges: Vec<CandidateEntry>,
        variants: Vec<CandidateEntry>,
    ) -> GroupAnalysis {
        GroupAnalysis {
            title_key: key.into(),
            member_count: 1 + merges.len() + variants.len(),
            canonical,
            merge_into_canonical: merges,
            keep_as_variants: variants,
        }
    }

    fn report(groups: Vec<GroupAnalysis>) -> AnalysisReport {
        AnalysisReport {
            meta: ReportMeta {
                engine_version: "test".into(),
                generated_at: "2026-01-01T00:00:00Z".into(),
                config_name: None,
            },
            summary: AnalysisSummary::default(),
            groups,
        }
    }

    fn corpus() -> Vec<Recipe> {
        let mut pie = Recipe::new("pie", "grandma-baker", "Apple Pie");
        pie.image_refs = vec!["a.jpg".into()];
        let mut pie_bhg = Recipe::new("pie-bhg", "imports", "Apple Pie (BHG)");
        pie_bhg.image_refs = vec!["a.jpg".into(), "b.jpg".into()];
        let pie_ocr = Recipe::new("pie-ocr", "imports", "Apple Pie");
        let pie_dutch = Recipe::new("pie-dutch", "imports", "Apple Pie 2");
        vec![pie, pie_bhg, pie_ocr, pie_dutch]
    }

    fn pie_report() -> AnalysisReport {
        report(vec![group(
            "apple-pie",
            canonical("pie", "grandma-baker", "grandma-baker"),
            vec![
                candidate("pie-bhg", "imports", "bhg", "near-identical recipe (transcription variation)"),
                candidate("pie-ocr", "imports", "imports", "high ingredient and instruction match"),
            ],
            vec![candidate("pie-dutch", "imports", "imports", "similar recipe with variations")],
        )])
    }

    #[test]
    fn merge_folds_provenance_and_removes_candidates() {
        let report = pie_report();
        let outcome = MergeExecutor::new(&report).execute(corpus(), ExecuteOptions::default());

        let ids: Vec<_> = outcome.recipes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["pie", "pie-dutch"]);

        let pie = &outcome.recipes[0];
        assert_eq!(pie.sources, vec!["grandma-baker", "bhg", "imports"]);
        assert_eq!(pie.image_refs, vec!["a.jpg", "b.jpg"]);
        assert_eq!(
            pie.source_notes.as_deref(),
            Some("Combined from 3 sources: grandma-baker, bhg, imports")
        );

        let dutch = &outcome.recipes[1];
        assert_eq!(dutch.variant_of.as_deref(), Some("pie"));
        assert_eq!(dutch.variant_note.as_deref(), Some("similar recipe with variations"));

        let s = &outcome.log.summary;
        assert_eq!((s.recipes_before, s.recipes_after), (4, 2));
        assert_eq!((s.merged, s.deleted, s.variants_linked, s.errors), (2, 2, 1, 0));
        assert!(!outcome.log.dry_run);
    }

    #[test]
    fn existing_sources_are_not_duplicated() {
        let report = pie_report();
        let mut recipes = corpus();
        recipes[0].sources = vec!["bhg".into()];
        recipes[1].sources = vec!["bhg".into(), "church-book".into()];
        let outcome = MergeExecutor::new(&report).execute(recipes, ExecuteOptions::default());
        assert_eq!(outcome.recipes[0].sources, vec!["bhg", "church-book", "imports"]);
    }

    #[test]
    fn duplicate_provenance_on_canonical_is_collapsed() {
        let report = pie_report();
        let mut recipes = corpus();
        recipes[0].sources = vec!["grandma-baker".into(), "grandma-baker".into()];
        recipes[0].image_refs = vec!["a.jpg".into(), "a.jpg".into()];
        let outcome = MergeExecutor::new(&report).execute(recipes, ExecuteOptions::default());
        assert_eq!(outcome.recipes[0].sources, vec!["grandma-baker", "bhg", "imports"]);
        assert_eq!(outcome.recipes[0].image_refs, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn dry_run_leaves_recipes_untouched_with_same_summary() {
        let report = pie_report();
        let before = corpus();
        let dry = MergeExecutor::new(&report).execute(before.clone(), ExecuteOptions { dry_run: true });
        let real = MergeExecutor::new(&report).execute(before.clone(), ExecuteOptions::default());

        assert!(dry.log.dry_run);
        assert_eq!(dry.recipes, before);
        assert_eq!(dry.log.summary, real.log.summary);
        assert_eq!(dry.log.merges, real.log.merges);
        assert_eq!(dry.log.variants_linked, real.log.variants_linked);
    }

    #[test]
    fn missing_references_are_logged_and_skipped() {
        let report = report(vec![
            group(
                "ghost",
                canonical("ghost", "nowhere", "nowhere"),
                vec![candidate("pie-bhg", "imports", "bhg", "r")],
                vec![],
            ),
            group(
                "apple-pie",
                canonical("pie", "grandma-baker", "grandma-baker"),
                vec![candidate("missing", "imports", "imports", "r")],
                vec![candidate("pie-dutch", "imports", "imports", "v")],
            ),
        ]);
        let outcome = MergeExecutor::new(&report).execute(corpus(), ExecuteOptions::default());
        let kinds: Vec<_> = outcome.log.errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![MergeErrorKind::CanonicalNotFound, MergeErrorKind::CandidateNotFound]
        );
        assert_eq!(outcome.log.errors[0].group, "ghost");
        assert_eq!(outcome.log.summary.merged, 0);
        assert_eq!(outcome.log.summary.variants_linked, 1);
        assert_eq!(outcome.recipes.len(), 4);
    }

    #[test]
    fn canonical_of_another_group_is_never_deleted() {
        let report = report(vec![
            group(
                "apple-pie",
                canonical("pie", "grandma-baker", "grandma-baker"),
                vec![candidate("pie-ocr", "imports", "imports", "r")],
                vec![],
            ),
            group(
                "apple-pie-ocr",
                canonical("pie-ocr", "imports", "imports"),
                vec![candidate("pie-bhg", "imports", "bhg", "r")],
                vec![],
            ),
        ]);
        let outcome = MergeExecutor::new(&report).execute(corpus(), ExecuteOptions::default());
        assert_eq!(outcome.log.errors[0].kind, MergeErrorKind::CandidateIsCanonical);
        assert!(outcome.recipes.iter().any(|r| r.id == "pie-ocr"));
        assert!(outcome.recipes.iter().all(|r| r.id != "pie-bhg"));
    }

    #[test]
    fn self_reference_and_repeat_entries_are_errors() {
        let report = report(vec![group(
            "apple-pie",
            canonical("pie", "grandma-baker", "grandma-baker"),
            vec![
                candidate("pie", "grandma-baker", "grandma-baker", "r"),
                candidate("pie-bhg", "imports", "bhg", "r"),
                candidate("pie-bhg", "imports", "bhg", "r"),
            ],
            vec![
                candidate("pie-bhg", "imports", "bhg", "v"),
                candidate("pie-dutch", "imports", "imports", "v"),
                candidate("pie-dutch", "imports", "imports", "v"),
            ],
        )]);
        let outcome = MergeExecutor::new(&report).execute(corpus(), ExecuteOptions::default());
        let kinds: Vec<_> = outcome.log.errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MergeErrorKind::SelfReference,
                MergeErrorKind::AlreadyMerged,
                MergeErrorKind::AlreadyMerged,
                MergeErrorKind::AlreadyLinked,
            ]
        );
        assert_eq!(outcome.log.summary.merged, 1);
        assert_eq!(outcome.log.summary.variants_linked, 1);
    }

    #[test]
    fn dangling_variant_of_is_redirected_to_survivor() {
        let mut recipes = corpus();
        let mut old_variant = Recipe::new("pie-crumble", "imports", "Crumble Pie");
        old_variant.variant_of = Some("pie-bhg".into());
        recipes.push(old_variant);

        let report = pie_report();
        let outcome = MergeExecutor::new(&report).execute(recipes, ExecuteOptions::default());
        let crumble = outcome
            .recipes
            .iter()
            .find(|r| r.id == "pie-crumble")
            .unwrap();
        assert_eq!(crumble.variant_of.as_deref(), Some("pie"));
        assert_eq!(
            outcome.log.redirects,
            vec![RedirectEntry {
                recipe_id: "pie-crumble".into(),
                from: "pie-bhg".into(),
                to: Some("pie".into()),
            }]
        );
        assert_eq!(outcome.log.summary.redirects, 1);
    }

    #[test]
    fn canonical_never_becomes_a_variant_of_itself() {
        let mut recipes = corpus();
        recipes[0].variant_of = Some("pie-bhg".into());
        recipes[0].variant_note = Some("older copy".into());

        let report = pie_report();
        let outcome = MergeExecutor::new(&report).execute(recipes, ExecuteOptions::default());
        let pie = &outcome.recipes[0];
        assert_eq!(pie.id, "pie");
        assert_eq!(pie.variant_of, None);
        assert_eq!(pie.variant_note, None);
        assert_eq!(
            outcome.log.redirects,
            vec![RedirectEntry {
                recipe_id: "pie".into(),
                from: "pie-bhg".into(),
                to: None,
            }]
        );
        assert!(outcome.recipes.iter().all(|r| r.variant_of.as_deref() != Some(r.id.as_str())));
    }

    #[test]
    fn collection_mismatch_falls_back_to_id() {
        let report = report(vec![group(
            "apple-pie",
            canonical("pie", "renamed-collection", "grandma-baker"),
            vec![candidate("pie-bhg", "imports", "bhg", "r")],
            vec![],
        )]);
        let outcome = MergeExecutor::new(&report).execute(corpus(), ExecuteOptions::default());
        assert!(outcome.log.errors.is_empty());
        assert_eq!(outcome.log.summary.merged, 1);
    }
}
