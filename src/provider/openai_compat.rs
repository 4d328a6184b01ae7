//! OpenAI-compatible chat-completions provider.
//!
//! OpenAI, Anthropic and xAI all accept the same request shape on
//! `{base}/chat/completions`: one user message whose content is a text part
//! followed by an `image_url` part carrying a PNG data URI.

use super::{send_json, ProviderKind, ProviderOptions, VisionProvider};
use crate::error::ProviderError;
use crate::pipeline::encode::to_data_uri;
use crate::pipeline::SlideImage;
use crate::prompts::speaker_notes_prompt;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;

pub struct OpenAiCompatProvider {
    kind: ProviderKind,
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    options: ProviderOptions,
}

impl OpenAiCompatProvider {
    pub fn new(
        kind: ProviderKind,
        http: reqwest::Client,
        base_url: String,
        api_key: SecretString,
        model: String,
        options: ProviderOptions,
    ) -> Self {
        Self {
            kind,
            http,
            base_url,
            api_key,
            model,
            options,
        }
    }
}

#[async_trait]
impl VisionProvider for OpenAiCompatProvider {
    async fn analyze_slide(
        &self,
        image: &SlideImage,
        context: Option<&str>,
    ) -> Result<String, ProviderError> {
        let data_uri = to_data_uri(&image.image).map_err(|e| ProviderError::Encode(e.to_string()))?;
        let body = build_request_body(
            &self.model,
            &speaker_notes_prompt(context, self.options.language.as_deref()),
            &data_uri,
            &self.options,
        );

        debug!(
            "{} request: slide {} model={}",
            self.kind,
            image.slide_num(),
            self.model
        );

        let request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body);

        parse_response(&send_json(request).await?)
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        &self.model
    }
}

pub(crate) fn build_request_body(
    model: &str,
    prompt: &str,
    data_uri: &str,
    options: &ProviderOptions,
) -> Value {
    let mut body = json!({
        "model": model,
        "max_tokens": options.max_tokens,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                { "type": "image_url", "image_url": { "url": data_uri } }
            ]
        }]
    });
    if let Some(t) = options.temperature {
        body["temperature"] = json!(t);
    }
    body
}

/// Text of `choices[0].message.content`.
///
/// Some gateways return content as an array of typed parts; text parts are
/// joined in that case.
pub(crate) fn parse_response(body: &Value) -> Result<String, ProviderError> {
    let choice = body
        .pointer("/choices/0")
        .ok_or_else(|| ProviderError::Malformed("no choices in response".into()))?;

    let content = choice.pointer("/message/content");
    let text = match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect(),
        Some(Value::Null) | None => String::new(),
        Some(other) => {
            return Err(ProviderError::Malformed(format!(
                "unexpected content type: {other}"
            )))
        }
    };

    if text.trim().is_empty() {
        let finish = choice.get("finish_reason").and_then(Value::as_str);
        if finish == Some("content_filter") {
            return Err(ProviderError::Api {
                status: 200,
                message: "response withheld by content filter".into(),
            });
        }
        return Err(ProviderError::EmptyResponse);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_has_text_then_image_part() {
        let body = build_request_body(
            "gpt-4o",
            "write notes",
            "data:image/png;base64,AAAA",
            &ProviderOptions::default(),
        );
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 2000);
        let content = &body["messages"][0]["content"];
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "write notes");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,AAAA");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn string_content_is_returned() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Notes here" }, "finish_reason": "stop" }]
        });
        assert_eq!(parse_response(&body).unwrap(), "Notes here");
    }

    #[test]
    fn array_content_is_joined() {
        let body = json!({
            "choices": [{ "message": { "content": [{ "type": "text", "text": "a" }, { "type": "text", "text": "b" }] } }]
        });
        assert_eq!(parse_response(&body).unwrap(), "ab");
    }

    #[test]
    fn missing_or_filtered_content_is_an_error() {
        assert!(matches!(
            parse_response(&json!({ "choices": [] })),
            Err(ProviderError::Malformed(_))
        ));
        assert!(matches!(
            parse_response(&json!({ "choices": [{ "message": { "content": null } }] })),
            Err(ProviderError::EmptyResponse)
        ));
        let filtered = json!({ "choices": [{ "message": { "content": "" }, "finish_reason": "content_filter" }] });
        assert!(matches!(
            parse_response(&filtered),
            Err(ProviderError::Api { .. })
        ));
    }
}
