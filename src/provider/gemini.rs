//! Native multimodal provider: Google Gemini `generateContent`.

use super::{send_json, ProviderKind, ProviderOptions, VisionProvider};
use crate::error::ProviderError;
use crate::pipeline::encode::to_base64_png;
use crate::pipeline::SlideImage;
use crate::prompts::speaker_notes_prompt;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;

/// Gemini client. The image travels as `inline_data` next to the prompt.
pub struct GeminiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    options: ProviderOptions,
}

impl GeminiProvider {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        api_key: SecretString,
        model: String,
        options: ProviderOptions,
    ) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model,
            options,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    async fn analyze_slide(
        &self,
        image: &SlideImage,
        context: Option<&str>,
    ) -> Result<String, ProviderError> {
        let png_b64 =
            to_base64_png(&image.image).map_err(|e| ProviderError::Encode(e.to_string()))?;
        let prompt = speaker_notes_prompt(context, self.options.language.as_deref());
        let body = build_request_body(&prompt, &png_b64, &self.options);

        debug!(
            "Gemini request: slide {} model={} image={} bytes b64",
            image.slide_num(),
            self.model,
            png_b64.len()
        );

        let request = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body);

        parse_response(&send_json(request).await?)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// JSON body for one `generateContent` call.
pub(crate) fn build_request_body(prompt: &str, png_b64: &str, options: &ProviderOptions) -> Value {
    let mut generation_config = json!({ "maxOutputTokens": options.max_tokens });
    if let Some(t) = options.temperature {
        generation_config["temperature"] = json!(t);
    }

    json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "text": prompt },
                { "inline_data": { "mime_type": "image/png", "data": png_b64 } }
            ]
        }],
        "generationConfig": generation_config
    })
}

/// Concatenate the text parts of the first candidate.
pub(crate) fn parse_response(body: &Value) -> Result<String, ProviderError> {
    if let Some(reason) = body.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
        return Err(ProviderError::Api {
            status: 200,
            message: format!("prompt blocked: {reason}"),
        });
    }

    let candidate = body
        .pointer("/candidates/0")
        .ok_or_else(|| ProviderError::Malformed("no candidates in response".into()))?;

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str) {
            debug!("Gemini returned no text, finishReason={reason}");
        }
        return Err(ProviderError::EmptyResponse);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_puts_prompt_before_image() {
        let body = build_request_body("describe", "AAAA", &ProviderOptions::default());
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "describe");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "AAAA");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2000);
        assert!(body["generationConfig"].get("temperature").is_none());
    }

    #[test]
    fn request_body_carries_temperature_when_set() {
        let options = ProviderOptions {
            temperature: Some(0.5),
            max_tokens: 512,
            ..Default::default()
        };
        let body = build_request_body("p", "b", &options);
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
    }

    #[test]
    fn response_parts_are_concatenated() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "- Key message: " }, { "text": "growth" }] },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(parse_response(&body).unwrap(), "- Key message: growth");
    }

    #[test]
    fn empty_candidate_is_an_error() {
        let body = json!({ "candidates": [{ "content": { "parts": [] }, "finishReason": "SAFETY" }] });
        assert!(matches!(parse_response(&body), Err(ProviderError::EmptyResponse)));

        let body = json!({ "candidates": [] });
        assert!(matches!(parse_response(&body), Err(ProviderError::Malformed(_))));
    }

    #[test]
    fn blocked_prompt_is_reported() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_response(&body).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }
}
