//! Error types shared by the library modules.
//!
//! Command handlers wrap these in `anyhow::Error` with extra context; the
//! only error the pre-filter itself can raise is [`DoxprepError::LineCountMismatch`].

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DoxprepError {
    /// A rewritten line does not carry exactly one newline.
    ///
    /// Doxygen correlates warnings with source line numbers, so the filter
    /// refuses to continue once the output drifts from the input.
    #[error(
        "line count changed while filtering\nFile: {file}\nLine Number: {line_number}\nOriginal Line:\n\"{original}\"\nMassaged Line:\n\"{massaged}\""
    )]
    LineCountMismatch {
        file: String,
        line_number: usize,
        original: String,
        massaged: String,
    },

    #[error("no Arduino FQBN known for PlatformIO board `{0}`")]
    UnknownBoard(String),

    #[error("no tool list known for PlatformIO platform `{0}`")]
    MissingPlatformTools(String),

    #[error("environment `{env}` in platformio.ini has no `{key}` key")]
    MissingEnvironmentKey { env: String, key: String },

    #[error("failed to parse doxprep.toml: {0}")]
    ConfigParse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DoxprepError>;
