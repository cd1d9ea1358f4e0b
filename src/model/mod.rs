//! Vision-model abstraction.
//!
//! [`VisionModel`] is the capability seam between the extraction pipeline
//! and the external vision LLM: a schema-constrained structured call for
//! page analysis and a freeform call for markdown generation. Exactly one
//! backing provider exists today (Gemini over REST); the name-to-provider
//! registry keeps the orchestrator ignorant of which one it is, so adding a
//! provider never touches the pipeline.

pub mod gemini;
pub mod retry;

use crate::config::ConversionConfig;
use crate::error::VisionMdError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Capability interface to the external vision LLM.
///
/// Both calls run under the shared retry policy; callers see only the final
/// outcome. Implementations must be cheap to share (`Arc<dyn VisionModel>`)
/// since concurrent page tasks call them simultaneously.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Model identifier, for logging.
    fn name(&self) -> &str;

    /// Schema-constrained analysis call. Runs at temperature 0 with a fixed
    /// top-p regardless of configuration. A response that does not decode
    /// into [`StructuredDescription`] is an error, never a panic.
    async fn structured_call(
        &self,
        png_base64: &str,
        prompt: &str,
    ) -> Result<StructuredDescription, ModelError>;

    /// Free-text call at the configured temperature/top-p. Enclosing fenced
    /// code-block markers are stripped from the returned text.
    async fn freeform_call(&self, png_base64: &str, prompt: &str) -> Result<String, ModelError>;
}

/// Yes/No answer in a structured analysis response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Detected {
    Yes,
    No,
}

impl Detected {
    pub fn is_yes(self) -> bool {
        self == Detected::Yes
    }
}

impl fmt::Display for Detected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Detected::Yes => "Yes",
            Detected::No => "No",
        })
    }
}

/// Result of the structured analysis pass over one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredDescription {
    pub text_detected: Detected,
    pub tables_detected: Detected,
    pub images_detected: Detected,
    pub latex_detected: Detected,
    pub extracted_text: String,
    pub confidence_score: f32,
}

impl StructuredDescription {
    /// Fixed defaults used when the analysis pass is disabled or has
    /// failed: assume tables, skip LaTeX, trust nothing.
    pub fn fallback() -> Self {
        Self {
            text_detected: Detected::Yes,
            tables_detected: Detected::Yes,
            images_detected: Detected::No,
            latex_detected: Detected::No,
            extracted_text: String::new(),
            confidence_score: 0.0,
        }
    }

    /// Decode and validate a raw structured response.
    pub(crate) fn decode(raw: &str) -> Result<Self, ModelError> {
        let description: Self =
            serde_json::from_str(raw).map_err(|e| ModelError::SchemaValidation {
                detail: e.to_string(),
            })?;
        if !(0.0..=1.0).contains(&description.confidence_score) {
            return Err(ModelError::SchemaValidation {
                detail: format!(
                    "confidence_score {} outside [0, 1]",
                    description.confidence_score
                ),
            });
        }
        Ok(description)
    }
}

/// Failure of a single external model call.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The call failed on every attempt; wraps the last underlying error.
    #[error("model call failed after {attempts} attempt(s): {source}")]
    CallFailed {
        attempts: u32,
        #[source]
        source: ApiCallError,
    },

    /// The structured response did not match the expected shape. Recovered
    /// by the orchestrator via the fallback path, never retried.
    #[error("structured response did not match the expected schema: {detail}")]
    SchemaValidation { detail: String },
}

/// A single failed attempt against the model API.
#[derive(Debug, Error)]
pub enum ApiCallError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("response contained no usable candidate text")]
    EmptyResponse,
}

impl ApiCallError {
    /// Transient failures worth retrying: transport errors, rate limiting,
    /// and server-side errors. Client errors fail fast.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiCallError::Transport(_) => true,
            ApiCallError::Status { status, .. } => *status == 429 || *status >= 500,
            ApiCallError::EmptyResponse => true,
        }
    }
}

// ── Registry ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Provider {
    Gemini,
}

/// Fixed allow-list of supported model names.
pub(crate) const SUPPORTED_MODELS: &[(&str, Provider)] = &[
    ("gemini-1.5-flash", Provider::Gemini),
    ("gemini-2.0-flash-exp", Provider::Gemini),
    ("gemini-1.5-pro", Provider::Gemini),
];

pub(crate) fn provider_for(model: &str) -> Result<Provider, VisionMdError> {
    SUPPORTED_MODELS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, provider)| *provider)
        .ok_or_else(|| VisionMdError::UnsupportedModel {
            model: model.to_string(),
            supported: SUPPORTED_MODELS
                .iter()
                .map(|(name, _)| format!("'{name}'"))
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Resolve the vision model for a run.
///
/// A pre-built model in the config takes precedence; otherwise the
/// configured name is validated against the allow-list and a provider
/// client is constructed. This is the construction-time gate: an unknown
/// name fails here, before any file or network is touched.
pub(crate) fn resolve(config: &ConversionConfig) -> Result<Arc<dyn VisionModel>, VisionMdError> {
    if let Some(ref model) = config.vision_model {
        return Ok(Arc::clone(model));
    }
    match provider_for(&config.model)? {
        Provider::Gemini => Ok(Arc::new(gemini::GeminiModel::new(config)?)),
    }
}
