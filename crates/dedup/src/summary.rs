use crate::model::{AnalysisSummary, GroupAnalysis};

/// Compute report counts from per-group analyses.
pub fn compute_summary(total_recipes: usize, groups: &[GroupAnalysis]) -> AnalysisSummary {
    let mut summary = AnalysisSummary {
        total_recipes,
        title_groups_analyzed: groups.len(),
        ..AnalysisSummary::default()
    };

    for g in groups {
        let merges = g.merge_into_canonical.len();
        let variants = g.keep_as_variants.len();

        if merges > 0 {
            summary.groups_with_merges += 1;
        }
        match (merges > 0, variants > 0) {
            (true, true) => summary.groups_with_both += 1,
            (false, true) => summary.groups_with_variants_only += 1,
            _ => {}
        }

        summary.total_recipes_to_merge += merges;
        summary.total_variants_to_link += variants;
    }

    summary
}
