use thiserror::Error;

/// Errors surfaced by the analysis pipeline.
///
/// Every variant is fatal: the pipeline runs to completion or aborts on the
/// first unrecoverable error, with no partial-result mode.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport stream error: {0}")]
    Ts(#[from] mpegts::TsError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
