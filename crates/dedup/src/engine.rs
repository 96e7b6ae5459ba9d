use tracing::info;

use crate::classify::Classifier;
use crate::config::DedupConfig;
use crate::error::DedupError;
use crate::group::GroupBuilder;
use crate::merge::{ExecuteOptions, ExecutionOutcome, MergeExecutor};
use crate::model::{AnalysisReport, Recipe, ReportMeta};
use crate::normalize::Normalizer;
use crate::priority::SourcePriorityResolver;
use crate::summary::compute_summary;

/// Run the analysis phase per config. Returns per-group results + summary.
pub fn analyze(config: &DedupConfig, recipes: &[Recipe]) -> Result<AnalysisReport, DedupError> {
    config.validate()?;

    let normalizer = Normalizer::new(&config.normalize)?;
    let resolver = SourcePriorityResolver::new(&config.priority);
    let classifier = Classifier::new(&config.classifier);
    let builder = GroupBuilder::new(&normalizer, &resolver, &classifier, &config.grouping);

    let groups = builder.analyze(recipes);
    let summary = compute_summary(recipes.len(), &groups);
    info!(
        recipes = summary.total_recipes,
        groups = summary.title_groups_analyzed,
        to_merge = summary.total_recipes_to_merge,
        to_link = summary.total_variants_to_link,
        "analysis finished"
    );

    Ok(AnalysisReport {
        meta: ReportMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            config_name: config.name.clone(),
        },
        summary,
        groups,
    })
}

/// Run the execution phase. The report is validated first; per-entry problems
/// land in the returned log rather than failing the call.
pub fn execute(
    report: &AnalysisReport,
    recipes: Vec<Recipe>,
    options: ExecuteOptions,
) -> Result<ExecutionOutcome, DedupError> {
    report.validate()?;
    Ok(MergeExecutor::new(report).execute(recipes, options))
}
