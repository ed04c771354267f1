//! Report renderer trait and output errors

use crate::audit::AuditResult;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to format output: {0}")]
    Format(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// One document of the per-run deliverable set
///
/// Renderers are pure: the same result always renders to the same text.
pub trait ReportRenderer {
    /// File name inside the output directory
    fn file_name(&self) -> &'static str;

    /// Renders the document
    ///
    /// # Arguments
    ///
    /// * `result` - The finished audit
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Document contents
    /// * `Err(OutputError)` - The result could not be rendered
    fn render(&self, result: &AuditResult) -> OutputResult<String>;
}
