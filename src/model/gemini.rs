//! Gemini REST client.
//!
//! Talks to the `generateContent` endpoint directly over reqwest. The
//! request carries the page PNG as inline data plus the instruction text;
//! structured calls additionally pin temperature/top-p and attach a JSON
//! response schema so the reply decodes into
//! [`StructuredDescription`](super::StructuredDescription) without prompt
//! gymnastics.

use super::retry::{retry, RetryPolicy};
use super::{ApiCallError, ModelError, StructuredDescription, VisionModel};
use crate::config::ConversionConfig;
use crate::error::VisionMdError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, warn};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Structured calls always run with this fixed nucleus-sampling value.
const STRUCTURED_TOP_P: f32 = 0.4;

/// Environment variable consulted when no API key is configured.
const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub struct GeminiModel {
    client: reqwest::Client,
    model: String,
    api_key: String,
    temperature: f32,
    top_p: f32,
    max_output_tokens: Option<u32>,
    retry_policy: RetryPolicy,
}

impl GeminiModel {
    pub fn new(config: &ConversionConfig) -> Result<Self, VisionMdError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .unwrap_or_default();
        if api_key.is_empty() {
            warn!("no Gemini API key configured ({API_KEY_ENV} unset); calls will be rejected");
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.api_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| VisionMdError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
            retry_policy: RetryPolicy::from_config(config),
        })
    }

    async fn call(&self, png_base64: &str, prompt: &str, structured: bool) -> Result<String, ModelError> {
        let body = request_body(
            png_base64,
            prompt,
            structured,
            self.temperature,
            self.top_p,
            self.max_output_tokens,
        );
        let url = format!("{API_BASE}/{}:generateContent", self.model);

        let text = retry(&self.retry_policy, ApiCallError::is_retryable, || {
            self.attempt(&url, &body)
        })
        .await
        .map_err(|(attempts, source)| ModelError::CallFailed { attempts, source })?;

        Ok(strip_code_fences(&text))
    }

    async fn attempt(&self, url: &str, body: &Value) -> Result<String, ApiCallError> {
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiCallError::Status {
                status: status.as_u16(),
                message: truncate(&message, 300),
            });
        }

        let payload: Value = response.json().await?;
        let text = candidate_text(&payload).ok_or(ApiCallError::EmptyResponse)?;
        debug!(model = %self.model, response_len = text.len(), "model call succeeded");
        Ok(text)
    }
}

#[async_trait]
impl VisionModel for GeminiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn structured_call(
        &self,
        png_base64: &str,
        prompt: &str,
    ) -> Result<StructuredDescription, ModelError> {
        let raw = self.call(png_base64, prompt, true).await?;
        StructuredDescription::decode(&raw)
    }

    async fn freeform_call(&self, png_base64: &str, prompt: &str) -> Result<String, ModelError> {
        self.call(png_base64, prompt, false).await
    }
}

/// Build the `generateContent` request body.
fn request_body(
    png_base64: &str,
    prompt: &str,
    structured: bool,
    temperature: f32,
    top_p: f32,
    max_output_tokens: Option<u32>,
) -> Value {
    let temperature = if structured { 0.0 } else { temperature };
    let top_p = if structured { STRUCTURED_TOP_P } else { top_p };

    let mut body = json!({
        "contents": [{
            "parts": [
                { "inline_data": { "mime_type": "image/png", "data": png_base64 } },
                { "text": prompt },
            ]
        }],
        "generationConfig": {
            "temperature": temperature,
            "topP": top_p,
        }
    });

    if let Some(max) = max_output_tokens {
        body["generationConfig"]["maxOutputTokens"] = json!(max);
    }
    if structured {
        body["generationConfig"]["responseMimeType"] = json!("application/json");
        body["generationConfig"]["responseSchema"] = description_schema();
    }
    body
}

/// Response schema constraining structured analysis replies.
fn description_schema() -> Value {
    let yes_no = || json!({ "type": "STRING", "enum": ["Yes", "No"] });
    json!({
        "type": "OBJECT",
        "properties": {
            "text_detected": yes_no(),
            "tables_detected": yes_no(),
            "images_detected": yes_no(),
            "latex_detected": yes_no(),
            "extracted_text": { "type": "STRING" },
            "confidence_score": { "type": "NUMBER" },
        },
        "required": [
            "text_detected",
            "tables_detected",
            "images_detected",
            "latex_detected",
            "extracted_text",
            "confidence_score",
        ],
    })
}

/// Concatenate the text parts of the first candidate, if any.
fn candidate_text(payload: &Value) -> Option<String> {
    let parts = payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

static RE_CODE_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:markdown|json)?\n(.*?)\n```").unwrap());

/// Unwrap fenced code blocks the model sometimes emits despite the prompt.
fn strip_code_fences(text: &str) -> String {
    RE_CODE_FENCES.replace_all(text, "${1}").into_owned()
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_body_pins_sampling_and_attaches_schema() {
        let body = request_body("AAAA", "analyze", true, 0.7, 0.7, Some(8192));
        let gen = &body["generationConfig"];
        assert_eq!(gen["temperature"], json!(0.0));
        assert_eq!(gen["topP"], json!(0.4f32));
        assert_eq!(gen["responseMimeType"], json!("application/json"));
        assert_eq!(gen["responseSchema"]["type"], json!("OBJECT"));
        assert_eq!(gen["maxOutputTokens"], json!(8192));
    }

    #[test]
    fn freeform_body_uses_configured_sampling() {
        let body = request_body("AAAA", "transcribe", false, 0.2, 0.9, None);
        let gen = &body["generationConfig"];
        assert_eq!(gen["temperature"], json!(0.2f32));
        assert_eq!(gen["topP"], json!(0.9f32));
        assert!(gen.get("responseSchema").is_none());
        assert!(gen.get("maxOutputTokens").is_none());
    }

    #[test]
    fn body_carries_image_then_prompt() {
        let body = request_body("cGln", "read this", false, 0.7, 0.7, None);
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts[0]["inline_data"]["mime_type"], json!("image/png"));
        assert_eq!(parts[0]["inline_data"]["data"], json!("cGln"));
        assert_eq!(parts[1]["text"], json!("read this"));
    }

    #[test]
    fn candidate_text_joins_parts() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "# Title\n" }, { "text": "Body" }] }
            }]
        });
        assert_eq!(candidate_text(&payload).unwrap(), "# Title\nBody");
    }

    #[test]
    fn candidate_text_rejects_empty_payloads() {
        assert!(candidate_text(&json!({})).is_none());
        assert!(candidate_text(&json!({ "candidates": [] })).is_none());
        let no_text = json!({
            "candidates": [{ "content": { "parts": [{ "inline_data": {} }] } }]
        });
        assert!(candidate_text(&no_text).is_none());
    }

    #[test]
    fn fences_are_stripped_from_wrapped_output() {
        let wrapped = "```markdown\n# Hello\n\nWorld\n```";
        assert_eq!(strip_code_fences(wrapped), "# Hello\n\nWorld");
        let json_wrapped = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(json_wrapped), "{\"a\": 1}");
        assert_eq!(strip_code_fences("no fences"), "no fences");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 300), "short");
        let truncated = truncate(&"é".repeat(300), 5);
        assert!(truncated.ends_with('…'));
    }
}
