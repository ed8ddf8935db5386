use thiserror::Error;

use crate::llm::GatewayError;
use crate::response::ResponseError;

/// Failures of one user action. Each is turned into a message at the action
/// boundary and goes no further.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Rejected before any model call was made.
    #[error("{0}")]
    Validation(String),
    #[error("model call failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    MalformedResponse(#[from] ResponseError),
    #[error("text extraction failed: {0}")]
    Extraction(String),
}

impl ActionError {
    pub fn user_message(&self) -> String {
        match self {
            ActionError::Validation(msg) => msg.clone(),
            ActionError::Gateway(e) => format!("Analysis failed: {}", e),
            ActionError::MalformedResponse(_) => {
                "AI returned malformed response. Please try again.".to_string()
            }
            ActionError::Extraction(msg) => format!("Could not extract text: {}", msg),
        }
    }
}
