//! Error taxonomy for a generation call.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
    #[error("media conversion failed: {0}")]
    Conversion(String),
    #[error("inference exited with {status}: {detail}")]
    ExternalProcess { status: String, detail: String },
    #[error("{0}")]
    Unclassified(String),
}

impl GenerateError {
    /// Short machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerateError::Synthesis(_) => "synthesis",
            GenerateError::Conversion(_) => "conversion",
            GenerateError::ExternalProcess { .. } => "external_process",
            GenerateError::Unclassified(_) => "unclassified",
        }
    }

    /// Message shown to whoever triggered the generation.
    pub fn user_message(&self) -> String {
        match self {
            GenerateError::ExternalProcess { .. } => format!("Video processing failed: {self}"),
            _ => format!("An error occurred: {self}"),
        }
    }
}
