//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Codes
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success                                                  |
//! | 1    | General error (unspecified)                              |
//! | 2    | CLI usage error (bad args, missing required option)      |
//! | 3    | Config file unreadable or invalid                        |
//! | 4    | Corpus unreadable, malformed or empty (nothing written)  |
//! | 5    | Analysis report unreadable or invalid                    |
//! | 6    | Output file could not be written                         |
//! | 7    | Execution logged errors and `--strict` was set           |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `dedup_exit_code` or the relevant command

use larder_dedup::DedupError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Config file could not be read, parsed or validated.
pub const EXIT_CONFIG_INVALID: u8 = 3;

/// Corpus file could not be read or decoded, or holds no recipes.
/// Fatal: raised before analysis starts, no output is written.
pub const EXIT_CORPUS: u8 = 4;

/// Report file could not be read, decoded or failed validation.
pub const EXIT_REPORT: u8 = 5;

/// Writing an output file (report, corpus, log) failed.
pub const EXIT_WRITE: u8 = 6;

/// Execution finished but logged unresolved entries, and `--strict` is set.
pub const EXIT_EXECUTION_ERRORS: u8 = 7;

/// Map a library error to its exit code.
pub fn dedup_exit_code(err: &DedupError) -> u8 {
    match err {
        DedupError::ConfigParse(_)
        | DedupError::ConfigValidation(_)
        | DedupError::InvalidPattern { .. } => EXIT_CONFIG_INVALID,
        DedupError::CorpusParse(_) | DedupError::EmptyCorpus => EXIT_CORPUS,
        DedupError::ReportParse(_) | DedupError::ReportValidation(_) => EXIT_REPORT,
        DedupError::Serialize(_) => EXIT_ERROR,
    }
}
