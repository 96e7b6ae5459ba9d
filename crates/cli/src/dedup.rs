//! `larder analyze` / `larder execute` / `larder config` — file plumbing around
//! the dedup engine.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use larder_dedup::corpus::{aggregate, parse_corpus, to_json};
use larder_dedup::{AnalysisReport, DedupConfig, ExecuteOptions, Recipe};
use tracing::info;

use crate::exit_codes::{EXIT_CONFIG_INVALID, EXIT_CORPUS, EXIT_EXECUTION_ERRORS, EXIT_REPORT, EXIT_WRITE};
use crate::CliError;

#[derive(Subcommand)]
pub enum DedupCommands {
    /// Group recipes by title and classify duplicates against each canonical
    #[command(after_help = "\
Examples:
  larder analyze recipes.json
  larder analyze grandma.json imports.json --output report.json
  larder analyze recipes.json --config family.toml --json | jq .summary")]
    Analyze {
        /// Corpus JSON files (array of recipes or {\"recipes\": [...]}), merged in order
        #[arg(required = true)]
        corpus: Vec<PathBuf>,

        /// Dedup config TOML (defaults to the built-in tables)
        #[arg(long, env = "LARDER_CONFIG")]
        config: Option<PathBuf>,

        /// Write the analysis report to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print the analysis report to stdout
        #[arg(long)]
        json: bool,
    },

    /// Apply a prior analysis report: merge duplicates and link variants
    #[command(after_help = "\
Examples:
  larder execute recipes.json --report report.json --dry-run
  larder execute recipes.json --report report.json --output merged.json --log merge-log.json
  larder execute recipes.json --report report.json --output merged.json --strict")]
    Execute {
        /// Corpus JSON files, merged in order (must match what was analyzed)
        #[arg(required = true)]
        corpus: Vec<PathBuf>,

        /// Analysis report produced by `larder analyze`
        #[arg(long)]
        report: PathBuf,

        /// Compute the merge log without writing the corpus
        #[arg(long)]
        dry_run: bool,

        /// Write the updated corpus to file (required unless --dry-run)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the merge log to file
        #[arg(long)]
        log: Option<PathBuf>,

        /// Print the merge log to stdout
        #[arg(long)]
        json: bool,

        /// Exit non-zero when any report entry could not be applied
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    #[command(after_help = "\
Examples:
  larder config show > family.toml
  larder config show --config family.toml")]
    Show {
        /// Config file to load instead of the built-in tables
        #[arg(long, env = "LARDER_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Validate a config file without running anything
    #[command(after_help = "\
Examples:
  larder config validate family.toml")]
    Validate {
        /// Path to the config TOML
        config: PathBuf,
    },
}

pub fn cmd_dedup(cmd: DedupCommands) -> Result<(), CliError> {
    match cmd {
        DedupCommands::Analyze { corpus, config, output, json } => {
            cmd_analyze(&corpus, config.as_deref(), output.as_deref(), json)
        }
        DedupCommands::Execute { corpus, report, dry_run, output, log, json, strict } => cmd_execute(
            &corpus,
            &report,
            ExecuteOptions { dry_run },
            output.as_deref(),
            log.as_deref(),
            json,
            strict,
        ),
    }
}

pub fn cmd_config(cmd: ConfigCommands) -> Result<(), CliError> {
    match cmd {
        ConfigCommands::Show { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
        ConfigCommands::Validate { config } => {
            let config = load_config(Some(config.as_path()))?;
            eprintln!(
                "valid: config '{}' with {} classifier rule(s), {} source token(s), {} title suffix(es)",
                config.name.as_deref().unwrap_or("unnamed"),
                config.classifier.rules.len(),
                config.priority.tokens.len(),
                config.normalize.title_suffixes.len(),
            );
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_analyze(
    corpus_paths: &[PathBuf],
    config_path: Option<&Path>,
    output_file: Option<&Path>,
    json_output: bool,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let recipes = load_corpora(corpus_paths)?;

    let report = larder_dedup::analyze(&config, &recipes)?;
    let json_str = report.to_json()?;

    if let Some(path) = output_file {
        write_output(path, &json_str)?;
        eprintln!("wrote {}", path.display());
    }
    if json_output {
        println!("{json_str}");
    }

    let s = &report.summary;
    eprintln!(
        "analyzed {} recipes: {} title groups, {} to merge, {} variants to link ({} groups with merges, {} variants only, {} both)",
        s.total_recipes,
        s.title_groups_analyzed,
        s.total_recipes_to_merge,
        s.total_variants_to_link,
        s.groups_with_merges,
        s.groups_with_variants_only,
        s.groups_with_both,
    );
    Ok(())
}

fn cmd_execute(
    corpus_paths: &[PathBuf],
    report_path: &Path,
    options: ExecuteOptions,
    output_file: Option<&Path>,
    log_file: Option<&Path>,
    json_output: bool,
    strict: bool,
) -> Result<(), CliError> {
    if !options.dry_run && output_file.is_none() {
        return Err(CliError::usage("execute needs --output to write the updated corpus")
            .with_hint("pass --output FILE, or --dry-run to preview the merge log"));
    }

    let recipes = load_corpora(corpus_paths)?;
    let report = load_report(report_path)?;

    let outcome = larder_dedup::execute(&report, recipes, options)?;
    let log_json = outcome.log.to_json()?;

    if let (false, Some(path)) = (options.dry_run, output_file) {
        write_output(path, &to_json(&outcome.recipes)?)?;
        eprintln!("wrote {}", path.display());
    }
    if let Some(path) = log_file {
        write_output(path, &log_json)?;
        eprintln!("wrote {}", path.display());
    }
    if json_output {
        println!("{log_json}");
    }

    let s = &outcome.log.summary;
    eprintln!(
        "{}{} → {} recipes: {} merged, {} deleted, {} variants linked, {} redirected, {} errors",
        if options.dry_run { "dry run: " } else { "" },
        s.recipes_before,
        s.recipes_after,
        s.merged,
        s.deleted,
        s.variants_linked,
        s.redirects,
        s.errors,
    );
    for err in &outcome.log.errors {
        eprintln!("  {} in '{}': {} ({})", err.kind, err.group, err.candidate_id, err.message);
    }

    if strict && s.errors > 0 {
        return Err(CliError::new(
            EXIT_EXECUTION_ERRORS,
            format!("{} report entries could not be applied", s.errors),
        )
        .with_hint("re-run `larder analyze` against the current corpus"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Loading + writing
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<DedupConfig, CliError> {
    let Some(path) = path else {
        return Ok(DedupConfig::default());
    };
    let config_str = std::fs::read_to_string(path).map_err(|e| {
        CliError::new(EXIT_CONFIG_INVALID, format!("cannot read config {}: {e}", path.display()))
    })?;
    DedupConfig::from_toml(&config_str).map_err(|e| {
        CliError::new(EXIT_CONFIG_INVALID, format!("{}: {e}", path.display()))
    })
}

/// Load every corpus file before anything is written, so a bad input never
/// leaves partial output behind.
fn load_corpora(paths: &[PathBuf]) -> Result<Vec<Recipe>, CliError> {
    let mut collections = Vec::with_capacity(paths.len());
    for path in paths {
        let json = std::fs::read_to_string(path).map_err(|e| {
            CliError::new(EXIT_CORPUS, format!("cannot read corpus {}: {e}", path.display()))
        })?;
        let recipes = parse_corpus(&json).map_err(|e| {
            CliError::new(EXIT_CORPUS, format!("{}: {e}", path.display()))
        })?;
        info!(path = %path.display(), recipes = recipes.len(), "loaded corpus");
        collections.push(recipes);
    }

    let outcome = aggregate(collections);
    if !outcome.suppressed.is_empty() {
        eprintln!(
            "suppressed {} exact duplicate(s) across input files",
            outcome.suppressed.len()
        );
    }
    Ok(outcome.recipes)
}

fn load_report(path: &Path) -> Result<AnalysisReport, CliError> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        CliError::new(EXIT_REPORT, format!("cannot read report {}: {e}", path.display()))
    })?;
    AnalysisReport::from_json(&json)
        .map_err(|e| CliError::new(EXIT_REPORT, format!("{}: {e}", path.display())))
}

fn write_output(path: &Path, contents: &str) -> Result<(), CliError> {
    std::fs::write(path, contents).map_err(|e| {
        CliError::new(EXIT_WRITE, format!("cannot write {}: {e}", path.display()))
    })
}
