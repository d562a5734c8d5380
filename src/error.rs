use std::path::PathBuf;
use thiserror::Error;

use crate::vision::geometry::Region;

/// A specialized `Result` type for automation operations.
pub type AutomationResult<T> = Result<T, AutomationError>;

/// The error type for all automation operations.
///
/// "Element not found" is never an error at the vision layer; searches
/// return `None` or an empty list instead. These variants cover genuinely
/// exceptional states only.
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Required UI element not visible: {description}")]
    Visibility { description: String },

    #[error("Automation stopped by user")]
    Stopped,

    #[error("Fast apply cannot proceed safely: {description}")]
    FastApply { description: String },

    #[error("Invalid capture region with non-positive dimensions: {region}")]
    InvalidCaptureRegion { region: Region },

    #[error("Screen capture failed: {description}")]
    CaptureFailed { description: String },

    #[error("Template asset not found at {path:?}")]
    AssetMissing { path: PathBuf },

    #[error("Failed to load template asset {path:?}: {source}")]
    AssetLoadFailed {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Input simulation failed: {description}")]
    InputFailed { description: String },

    #[error("Clipboard access failed: {description}")]
    ClipboardFailed { description: String },

    #[error(
        "'tesseract' binary not found in PATH. Install Tesseract OCR (https://tesseract-ocr.github.io) or add it to PATH."
    )]
    OcrUnavailable,

    #[error("OCR invocation failed: {description}")]
    OcrFailed { description: String },
}

impl AutomationError {
    /// Build a visibility error for an element that never appeared within
    /// its wait budget.
    pub fn wait_timeout(template_name: &str, timeout: std::time::Duration) -> Self {
        AutomationError::Visibility {
            description: format!(
                "Timed out after {:.1}s waiting for '{}'",
                timeout.as_secs_f64(),
                template_name
            ),
        }
    }

    /// Check if this error is the cooperative stop signal.
    pub fn is_stop(&self) -> bool {
        matches!(self, AutomationError::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn wait_timeout_names_the_element_and_budget() {
        let err = AutomationError::wait_timeout("more_button", Duration::from_secs(2));
        let text = err.to_string();
        assert!(text.contains("more_button"));
        assert!(text.contains("2.0s"));
    }

    #[test]
    fn stop_classification() {
        assert!(AutomationError::Stopped.is_stop());
        assert!(
            !AutomationError::Visibility {
                description: "x".into()
            }
            .is_stop()
        );
    }
}
