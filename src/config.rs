//! Configuration types for PDF-to-deck conversion.
//!
//! Two kinds of configuration exist and they have different lifetimes:
//!
//! * [`ConversionConfig`]: per job. Everything the caller asks for: which
//!   provider, which model, DPI, watermark removal, notes on/off. Built via
//!   [`ConversionConfigBuilder`] and borrowed immutably for the whole job.
//!
//! * [`DeploymentConfig`]: per process. The master encryption secret and one
//!   fallback API key per provider, read once at startup and never mutated.

use crate::error::NotePptError;
use crate::progress::ProgressCallback;
use crate::provider::ProviderKind;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Configuration for one PDF-to-deck conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use noteppt::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .provider("openai")
///     .dpi(200)
///     .context("Quarterly review for the platform team")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Provider identifier: `gemini`, `openai`, `anthropic`/`claude`,
    /// `grok`/`xai`. Default: `gemini`.
    ///
    /// Kept as the raw string the caller sent; it is parsed at job start so an
    /// unknown name fails before any rendering happens.
    pub provider: String,

    /// API key supplied with the request. Wins over stored and fallback keys.
    pub api_key: Option<SecretString>,

    /// Model identifier. If None, uses the provider's catalog default.
    pub model: Option<String>,

    /// Free-text background material the notes should draw on.
    pub context: Option<String>,

    /// Language the notes are written in, e.g. `"Korean"`. Default: None,
    /// meaning the language used on the slide.
    pub notes_language: Option<String>,

    /// Rendering DPI used when rasterising each PDF page. Default: 144.
    ///
    /// Pages are rendered at `dpi / 72` times their point size. 144 DPI gives
    /// a 1920 × 1080-class image for a 16:9 page, sharp enough for a vision
    /// model to read small captions.
    pub dpi: u32,

    /// Mask the bottom-right watermark before notes and assembly. Default: true.
    pub remove_watermark: bool,

    /// Ask the provider for speaker notes. Default: true.
    ///
    /// When false no credential is resolved and no provider is contacted.
    pub generate_notes: bool,

    /// Opaque, already-authenticated user identifier for stored-key lookup.
    pub user_id: Option<String>,

    /// Per-call provider timeout in seconds. Default: 30.
    pub api_timeout_secs: u64,

    /// Maximum tokens the provider may generate per slide. Default: 2000.
    pub max_tokens: u32,

    /// Sampling temperature. Default: None (provider default).
    pub temperature: Option<f32>,

    /// Retry attempts on a transient provider failure. Default: 0.
    ///
    /// Permanent errors (bad API key, 4xx) are never retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Number of concurrent provider calls. Default: 1 (strictly sequential).
    ///
    /// Slide order in the output never depends on this value.
    pub concurrency: usize,

    /// Override the provider's base URL (OpenAI-compatible gateways, proxies).
    pub base_url: Option<String>,

    /// Optional progress callback for per-slide events.
    pub progress_callback: Option<ProgressCallback>,

    /// Cooperative cancellation, checked between slides.
    pub cancel: Option<CancelFlag>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini.as_str().to_string(),
            api_key: None,
            model: None,
            context: None,
            notes_language: None,
            dpi: 144,
            remove_watermark: true,
            generate_notes: true,
            user_id: None,
            api_timeout_secs: 30,
            max_tokens: 2000,
            temperature: None,
            max_retries: 0,
            retry_backoff_ms: 500,
            concurrency: 1,
            base_url: None,
            progress_callback: None,
            cancel: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("context", &self.context.as_ref().map(|c| c.len()))
            .field("notes_language", &self.notes_language)
            .field("dpi", &self.dpi)
            .field("remove_watermark", &self.remove_watermark)
            .field("generate_notes", &self.generate_notes)
            .field("user_id", &self.user_id)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("concurrency", &self.concurrency)
            .field("base_url", &self.base_url)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Context text, if any non-blank context was supplied.
    pub fn context_text(&self) -> Option<&str> {
        self.context.as_deref().filter(|c| !c.trim().is_empty())
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.config.provider = name.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key: String = key.into();
        self.config.api_key = if key.trim().is_empty() {
            None
        } else {
            Some(SecretString::from(key))
        };
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.config.context = Some(context.into());
        self
    }

    pub fn notes_language(mut self, language: impl Into<String>) -> Self {
        self.config.notes_language = Some(language.into());
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn remove_watermark(mut self, v: bool) -> Self {
        self.config.remove_watermark = v;
        self
    }

    pub fn generate_notes(mut self, v: bool) -> Self {
        self.config.generate_notes = v;
        self
    }

    pub fn user_id(mut self, id: impl Into<String>) -> Self {
        self.config.user_id = Some(id.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.config.cancel = Some(flag);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// The provider name is deliberately not validated here: it is checked at
    /// job start so that the error surfaces from `convert` as
    /// [`NotePptError::UnsupportedProvider`].
    pub fn build(self) -> Result<ConversionConfig, NotePptError> {
        let c = &self.config;
        if c.dpi == 0 || c.dpi > 600 {
            return Err(NotePptError::InvalidConfig(format!(
                "DPI must be 1–600, got {}",
                c.dpi
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(NotePptError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(NotePptError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Cancellation ─────────────────────────────────────────────────────────

/// Shared flag for cooperative cancellation between slides.
///
/// Cancelling does not abort the job: slides not yet processed are written
/// without notes and the deck is still assembled.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Deployment configuration ─────────────────────────────────────────────

/// Environment variable holding the base64 master encryption secret.
pub const MASTER_KEY_ENV: &str = "ENCRYPTION_MASTER_KEY";

/// Process-wide, read-only configuration supplied by the deployment.
#[derive(Default, Clone)]
pub struct DeploymentConfig {
    /// Master secret protecting stored per-user API keys.
    pub master_key: Option<SecretString>,
    fallback_keys: HashMap<ProviderKind, SecretString>,
}

impl fmt::Debug for DeploymentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers: Vec<&str> = self.fallback_keys.keys().map(|k| k.as_str()).collect();
        providers.sort_unstable();
        f.debug_struct("DeploymentConfig")
            .field("master_key", &self.master_key.as_ref().map(|_| "<redacted>"))
            .field("fallback_keys_for", &providers)
            .finish()
    }
}

impl DeploymentConfig {
    /// Read the master secret and fallback keys from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// Empty values count as absent. For each provider the first non-empty
    /// variable in [`ProviderKind::fallback_env_vars`] wins.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let master_key = non_empty(MASTER_KEY_ENV).map(SecretString::from);

        let fallback_keys = ProviderKind::ALL
            .iter()
            .filter_map(|kind| {
                kind.fallback_env_vars()
                    .iter()
                    .find_map(|var| non_empty(var))
                    .map(|key| (*kind, SecretString::from(key)))
            })
            .collect();

        Self {
            master_key,
            fallback_keys,
        }
    }

    /// Set the master secret.
    pub fn with_master_key(mut self, key: impl Into<String>) -> Self {
        self.master_key = Some(SecretString::from(key.into()));
        self
    }

    /// Set the fallback key for one provider.
    pub fn with_fallback_key(mut self, kind: ProviderKind, key: impl Into<String>) -> Self {
        self.fallback_keys
            .insert(kind, SecretString::from(key.into()));
        self
    }

    /// Fallback API key configured for `kind`, if any.
    pub fn fallback_key(&self, kind: ProviderKind) -> Option<&SecretString> {
        self.fallback_keys
            .get(&kind)
            .filter(|k| !k.expose_secret().is_empty())
    }
}
