use thiserror::Error;

#[derive(Debug, Error)]
pub enum DedupError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (threshold out of range, empty token, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A rewrite or suffix pattern failed to compile.
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
    /// Corpus JSON could not be decoded.
    #[error("corpus parse error: {0}")]
    CorpusParse(String),
    /// Corpus decoded but holds no recipes.
    #[error("corpus is empty")]
    EmptyCorpus,
    /// Analysis report JSON could not be decoded.
    #[error("report parse error: {0}")]
    ReportParse(String),
    /// Report decoded but violates a structural invariant.
    #[error("report validation error: {0}")]
    ReportValidation(String),
    /// Serialization of an output document failed.
    #[error("serialization error: {0}")]
    Serialize(String),
}
