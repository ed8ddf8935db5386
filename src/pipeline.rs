//! Action handlers. Each one validates, calls the gateway at most once,
//! decodes and post-processes; every failure comes back as an
//! [`ActionError`] for the caller to show.

use std::path::Path;

use crate::config::{DetectionSettings, RedactionSettings};
use crate::error::ActionError;
use crate::extract::{self, Extracted, TextExtractor};
use crate::llm::ModelGateway;
use crate::prompt::{self, RedactionRequest};
use crate::redaction::{FallbackRedactor, RedactionResult};
use crate::response;
use crate::session::SessionContext;
use crate::verdict::ClassificationResult;

const MIN_INPUT_CHARS: usize = 5;

pub fn validate_input(text: &str) -> Result<(), ActionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ActionError::Validation(
            "Please enter a message to analyze.".to_string(),
        ));
    }
    if trimmed.chars().count() < MIN_INPUT_CHARS {
        return Err(ActionError::Validation(
            "Message is too short to analyze meaningfully.".to_string(),
        ));
    }
    Ok(())
}

pub async fn classify(
    gateway: &dyn ModelGateway,
    settings: &DetectionSettings,
    text: &str,
) -> Result<ClassificationResult, ActionError> {
    validate_input(text)?;

    let request = settings.request(text);
    let prompt = request.prompt();
    tracing::info!(
        chars = request.text().chars().count(),
        format = ?settings.format,
        mode = settings.sensitivity.as_str(),
        "classifying"
    );

    let raw = gateway
        .complete(&prompt.system, &prompt.user, prompt.options())
        .await?;
    let result = response::parse_classification(&raw, settings.format)?
        .apply_threshold(settings.threshold);

    tracing::info!(
        verdict = result.verdict.as_str(),
        confidence = result.confidence,
        "classified"
    );
    Ok(result)
}

/// Classifies and, on success, records the outcome in the session.
pub async fn classify_in_session(
    gateway: &dyn ModelGateway,
    settings: &DetectionSettings,
    session: &mut SessionContext,
    text: &str,
) -> Result<ClassificationResult, ActionError> {
    let result = classify(gateway, settings, text).await?;
    session.record(&result, text, settings.content_type);
    Ok(result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactionStage {
    /// Model redaction reinforced by the regex pass.
    AiWithFallback,
    /// Regex pass alone: AI disabled or unavailable, nothing to redact, or
    /// the model call failed.
    FallbackOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedactionOutcome {
    pub result: RedactionResult,
    pub stage: RedactionStage,
}

/// Redacts `text`. Model failures never surface: the regex pass takes over.
pub async fn redact(
    gateway: Option<&dyn ModelGateway>,
    settings: &RedactionSettings,
    text: &str,
) -> Result<RedactionOutcome, ActionError> {
    validate_input(text)?;

    let request = RedactionRequest::new(text, settings.rules.clone(), settings.placeholder);
    let fallback = FallbackRedactor::new(settings.rules.clone(), settings.placeholder);

    let gateway = match gateway {
        Some(gateway) if settings.use_ai && !settings.rules.is_empty() => gateway,
        _ => {
            tracing::info!(chars = request.text().chars().count(), "redacting with patterns only");
            return Ok(RedactionOutcome {
                result: fallback.redact(request.text()),
                stage: RedactionStage::FallbackOnly,
            });
        }
    };

    let prompt = request.prompt();
    tracing::info!(chars = request.text().chars().count(), "redacting");

    let ai = match gateway
        .complete(&prompt.system, &prompt.user, prompt.options())
        .await
    {
        Ok(raw) => response::parse_redaction(&raw, request.text()).map_err(ActionError::from),
        Err(e) => Err(ActionError::from(e)),
    };

    match ai {
        Ok(ai) => Ok(RedactionOutcome {
            result: fallback.reinforce(ai),
            stage: RedactionStage::AiWithFallback,
        }),
        Err(e) => {
            tracing::warn!(error = %e, "AI redaction failed, using pattern fallback");
            Ok(RedactionOutcome {
                result: fallback.redact(request.text()),
                stage: RedactionStage::FallbackOnly,
            })
        }
    }
}

/// Pulls text out of a document. Images, and documents whose structured
/// extraction came back empty, are read by the vision model, which needs a
/// gateway.
pub async fn extract_document(
    gateway: Option<&dyn ModelGateway>,
    extractor: &dyn TextExtractor,
    path: &Path,
) -> Result<String, ActionError> {
    let (kind, bytes) =
        extract::load_document(path).map_err(|e| ActionError::Extraction(format!("{:#}", e)))?;
    tracing::info!(path = %path.display(), kind = ?kind, bytes = bytes.len(), "extracting");

    let extracted = extractor
        .extract(kind, &bytes)
        .map_err(|e| ActionError::Extraction(format!("{:#}", e)))?;

    let image = match extracted {
        Extracted::Text(text) if extract::is_usable(&text) => return Ok(text.trim().to_string()),
        Extracted::Image(image) => image,
        Extracted::Text(_) | Extracted::Nothing => {
            let Some(image) = extractor.render_image(kind, &bytes) else {
                return Err(ActionError::Extraction(format!(
                    "no readable text found in this {:?} file",
                    kind
                )));
            };
            tracing::info!(kind = ?kind, "no text layer, falling back to the vision model");
            image
        }
    };

    let Some(gateway) = gateway else {
        return Err(ActionError::Extraction(
            "reading images requires an API key".to_string(),
        ));
    };
    let prompt = prompt::image_to_text_prompt();
    let raw = gateway
        .complete(&prompt.system, &prompt.user, prompt.options().with_image(image))
        .await?;
    let text = response::parse_extracted_text(&raw);

    if !extract::is_usable(&text) {
        return Err(ActionError::Extraction(
            "no readable text found in the document".to_string(),
        ));
    }
    Ok(text.trim().to_string())
}

/// Extracts a document and redacts what it says.
pub async fn redact_document(
    gateway: Option<&dyn ModelGateway>,
    extractor: &dyn TextExtractor,
    settings: &RedactionSettings,
    path: &Path,
) -> Result<RedactionOutcome, ActionError> {
    let text = extract_document(gateway, extractor, path).await?;
    redact(gateway, settings, &text).await
}
