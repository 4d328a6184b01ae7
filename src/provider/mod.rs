//! AI vision providers: turn one slide image into speaker notes.
//!
//! Four backends are supported, in two request families:
//!
//! | Kind | Family | Endpoint |
//! |------|--------|----------|
//! | `gemini` | native multimodal | `generativelanguage.googleapis.com` `generateContent` |
//! | `openai` | OpenAI-compatible | `api.openai.com/v1/chat/completions` |
//! | `anthropic` (`claude`) | OpenAI-compatible | `api.anthropic.com/v1/chat/completions` |
//! | `grok` (`xai`) | OpenAI-compatible | `api.x.ai/v1/chat/completions` |
//!
//! Model catalogs, defaults, fallback-key variables and endpoints are static
//! data in [`CATALOG`]; behaviour lives behind the [`VisionProvider`] trait.

pub mod gemini;
pub mod openai_compat;

use crate::config::ConversionConfig;
use crate::error::{NotePptError, ProviderError};
use crate::pipeline::SlideImage;
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;

// ── Provider kinds and catalog ───────────────────────────────────────────

/// The supported AI vision backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Anthropic,
    Grok,
}

/// How a provider expects the image and prompt to be shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    /// Image handed to the backend's own multimodal call next to the prompt.
    NativeMultimodal,
    /// Image embedded as a base64 data URI in a chat-completions message.
    OpenAiCompatible,
}

/// Static description of one provider.
#[derive(Debug)]
pub struct ProviderInfo {
    pub kind: ProviderKind,
    /// Canonical identifier, also the key used in stored key records.
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// Deployment variables holding the fallback key, in lookup order.
    pub env_vars: &'static [&'static str],
    pub default_model: &'static str,
    /// Supported model identifiers, recommended first.
    pub models: &'static [&'static str],
    pub family: ProviderFamily,
    pub base_url: &'static str,
}

/// Provider catalog, one entry per [`ProviderKind`] in declaration order.
pub static CATALOG: [ProviderInfo; 4] = [
    ProviderInfo {
        kind: ProviderKind::Gemini,
        name: "gemini",
        aliases: &[],
        env_vars: &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        default_model: "gemini-2.5-flash",
        models: &[
            "gemini-2.5-flash",
            "gemini-2.0-flash",
            "gemini-1.5-flash",
            "gemini-1.5-pro",
        ],
        family: ProviderFamily::NativeMultimodal,
        base_url: "https://generativelanguage.googleapis.com/v1beta",
    },
    ProviderInfo {
        kind: ProviderKind::OpenAi,
        name: "openai",
        aliases: &[],
        env_vars: &["OPENAI_API_KEY"],
        default_model: "gpt-4o",
        models: &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo"],
        family: ProviderFamily::OpenAiCompatible,
        base_url: "https://api.openai.com/v1",
    },
    ProviderInfo {
        kind: ProviderKind::Anthropic,
        name: "anthropic",
        aliases: &["claude"],
        env_vars: &["ANTHROPIC_API_KEY"],
        default_model: "claude-3-5-sonnet-20241022",
        models: &[
            "claude-3-5-sonnet-20241022",
            "claude-3-5-haiku-20241022",
            "claude-3-opus-20240229",
        ],
        family: ProviderFamily::OpenAiCompatible,
        base_url: "https://api.anthropic.com/v1",
    },
    ProviderInfo {
        kind: ProviderKind::Grok,
        name: "grok",
        aliases: &["xai"],
        env_vars: &["XAI_API_KEY", "GROK_API_KEY"],
        default_model: "grok-2-1212",
        models: &[
            "grok-2-1212",
            "grok-2-vision-1212",
            "grok-4.1-fast",
            "grok-4.1",
        ],
        family: ProviderFamily::OpenAiCompatible,
        base_url: "https://api.x.ai/v1",
    },
];

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Gemini,
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Grok,
    ];

    pub fn info(self) -> &'static ProviderInfo {
        &CATALOG[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.info().name
    }

    pub fn aliases(self) -> &'static [&'static str] {
        self.info().aliases
    }

    pub fn default_model(self) -> &'static str {
        self.info().default_model
    }

    pub fn models(self) -> &'static [&'static str] {
        self.info().models
    }

    pub fn fallback_env_vars(self) -> &'static [&'static str] {
        self.info().env_vars
    }

    pub fn family(self) -> ProviderFamily {
        self.info().family
    }

    pub fn base_url(self) -> &'static str {
        self.info().base_url
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = NotePptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        CATALOG
            .iter()
            .find(|entry| entry.name == wanted || entry.aliases.contains(&wanted.as_str()))
            .map(|entry| entry.kind)
            .ok_or_else(|| NotePptError::UnsupportedProvider {
                provider: s.to_string(),
            })
    }
}

// ── Per-job provider configuration ───────────────────────────────────────

/// Resolved provider, key and model for one job.
///
/// Lives only for the duration of the job. `Debug` never prints the key.
#[derive(Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: SecretString,
    pub model: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// Request-shaping options shared by every provider.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Per-call transport timeout.
    pub timeout: Duration,
    /// Response token ceiling.
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Replaces the catalog base URL when set.
    pub base_url: Option<String>,
    /// Notes language; `None` follows the slide.
    pub language: Option<String>,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_tokens: 2000,
            temperature: None,
            base_url: None,
            language: None,
        }
    }
}

impl From<&ConversionConfig> for ProviderOptions {
    fn from(c: &ConversionConfig) -> Self {
        Self {
            timeout: Duration::from_secs(c.api_timeout_secs),
            max_tokens: c.max_tokens,
            temperature: c.temperature,
            base_url: c.base_url.clone(),
            language: c.notes_language.clone(),
        }
    }
}

// ── The capability ───────────────────────────────────────────────────────

/// One AI vision backend able to write speaker notes for a slide image.
///
/// Errors are returned, never swallowed: the orchestrator decides whether a
/// failure is fatal (it never is, for a single slide).
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Generate speaker notes for `image`, optionally enriched by `context`.
    async fn analyze_slide(
        &self,
        image: &SlideImage,
        context: Option<&str>,
    ) -> Result<String, ProviderError>;

    fn kind(&self) -> ProviderKind;

    fn model(&self) -> &str;

    /// Supported model identifiers. Static; no network call.
    fn list_models(&self) -> &'static [&'static str] {
        self.kind().models()
    }
}

/// Constructs providers for a job. Swappable so tests can inject fakes.
pub trait ProviderFactory: Send + Sync {
    fn create(
        &self,
        config: &ProviderConfig,
        options: &ProviderOptions,
    ) -> Result<Arc<dyn VisionProvider>, NotePptError>;
}

/// Factory for the real HTTP-backed providers.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpProviderFactory;

impl ProviderFactory for HttpProviderFactory {
    fn create(
        &self,
        config: &ProviderConfig,
        options: &ProviderOptions,
    ) -> Result<Arc<dyn VisionProvider>, NotePptError> {
        create_provider(config, options)
    }
}

/// Build the provider for `config`.
///
/// Everything that can be checked without a network call is checked here:
/// the HTTP client must build and the base URL must parse. Failures surface as
/// [`NotePptError::ProviderUnavailable`] before any slide is processed.
pub fn create_provider(
    config: &ProviderConfig,
    options: &ProviderOptions,
) -> Result<Arc<dyn VisionProvider>, NotePptError> {
    let unavailable = |reason: String| NotePptError::ProviderUnavailable {
        provider: config.kind.to_string(),
        reason,
    };

    let base_url = options
        .base_url
        .as_deref()
        .unwrap_or(config.kind.base_url())
        .trim_end_matches('/')
        .to_string();
    reqwest::Url::parse(&base_url)
        .map_err(|e| unavailable(format!("invalid base URL '{base_url}': {e}")))?;

    let http = reqwest::Client::builder()
        .timeout(options.timeout)
        .build()
        .map_err(|e| unavailable(format!("HTTP client could not be built: {e}")))?;

    debug!(
        "Provider ready: {} model={} base={}",
        config.kind, config.model, base_url
    );

    let provider: Arc<dyn VisionProvider> = match config.kind.family() {
        ProviderFamily::NativeMultimodal => Arc::new(GeminiProvider::new(
            http,
            base_url,
            config.api_key.clone(),
            config.model.clone(),
            options.clone(),
        )),
        ProviderFamily::OpenAiCompatible => Arc::new(OpenAiCompatProvider::new(
            config.kind,
            http,
            base_url,
            config.api_key.clone(),
            config.model.clone(),
            options.clone(),
        )),
    };
    Ok(provider)
}

// ── Shared HTTP handling ─────────────────────────────────────────────────

/// Send a JSON request and return the parsed JSON body of a 2xx response.
///
/// Non-2xx responses are classified into [`ProviderError`] variants; the raw
/// body is logged at debug level only.
pub(crate) async fn send_json(
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value, ProviderError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        debug!("Provider returned HTTP {}: {}", status.as_u16(), body);
        let message = error_message(&body);
        return Err(match status.as_u16() {
            401 | 403 => ProviderError::Auth {
                status: status.as_u16(),
                message,
            },
            429 => ProviderError::RateLimited { message },
            code => ProviderError::Api {
                status: code,
                message,
            },
        });
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(e.to_string()))
}

/// Best-effort human-readable message from an error body.
///
/// Both families use `{"error": {"message": ...}}`; some gateways send a bare
/// string instead.
fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.get("error"))
            .or_else(|| v.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    });
    from_json.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.chars().count() > 200 {
            format!("{}…", trimmed.chars().take(199).collect::<String>())
        } else if trimmed.is_empty() {
            "no response body".to_string()
        } else {
            trimmed.to_string()
        }
    })
}
