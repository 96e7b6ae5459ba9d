//! `larder-dedup` — Recipe duplicate detection, classification and merge execution.
//!
//! Pure engine crate: receives pre-loaded recipes, returns analysis reports
//! and merge logs. No CLI or IO dependencies.

pub mod classify;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod group;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod priority;
pub mod report;
pub mod similarity;
pub mod summary;

pub use config::DedupConfig;
pub use engine::{analyze, execute};
pub use error::DedupError;
pub use merge::{ExecuteOptions, ExecutionOutcome, MergeExecutor};
pub use model::{AnalysisReport, GroupAnalysis, MergeLog, Recipe};
