//! Receipt extraction gateway
//!
//! Owns the provider configuration, the ordered model candidate list, and the
//! degradation path: when no provider is configured or every candidate fails,
//! callers get the deterministic mock result instead of an error.
//!
//! # Configuration
//!
//! Environment variables:
//! - `TALLY_VISION_URL`: provider base URL, e.g. `https://openrouter.ai/api/v1`
//!   (required to enable the provider; without it every scan is mock)
//! - `TALLY_VISION_API_KEY`: bearer token if the provider requires one
//! - `TALLY_VISION_MODEL`: primary model candidate
//! - `TALLY_VISION_FALLBACK_MODELS`: comma-separated fallback candidates
//! - `TALLY_VISION_DEBUG`: set to `1`/`true` to attach per-candidate traces
//!
//! A `models.toml` override in the platform data dir
//! (`~/.local/share/tally/config/models.toml`) supplies primary/fallbacks when
//! the environment does not:
//!
//! ```toml
//! [models]
//! primary = "qwen/qwen2.5-vl-72b-instruct"
//! fallbacks = ["google/gemini-2.0-flash-001"]
//! ```

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::chain::{candidate_order, run_chain, ModelHintCache};
use super::mock::mock_parse_result;
use super::normalize::{normalize_receipt, recompute_grand_total};
use super::provider::ChatVisionProvider;
use super::types::{ParseAttempt, ParseResult, ParseSource, ParsedSummary};
use super::VisionProvider;
use crate::error::{Error, Result};

/// Built-in model candidates tried after any configured ones
const DEFAULT_MODELS: &[&str] = &[
    "qwen/qwen2.5-vl-72b-instruct",
    "google/gemini-2.0-flash-001",
    "openai/gpt-4o-mini",
];

/// Extraction instruction sent with every receipt image
const EXTRACTION_PROMPT: &str = "\
You are reading a photo of a purchase receipt. Extract every line item and \
respond with a single JSON object, no commentary and no markdown, shaped as:\n\
{\n\
  \"items\": [\n\
    {\"name\": string, \"unit_price\": number, \"quantity\": number, \
\"total_price\": number, \"kind\": \"item\"|\"fee\"|\"tip\"|\"discount\"|\"other\"}\n\
  ],\n\
  \"summary\": {\"grand_total\": number, \"currency\": string}\n\
}\n\
Prices are plain numbers without currency signs. Use the receipt's own \
currency symbol or code for \"currency\". Include fees, tips, and discounts \
as their own items.";

/// Gateway configuration resolved from environment plus optional config file
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Provider base URL; `None` disables the provider entirely
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Configured primary model, tried before fallbacks and defaults
    pub primary_model: Option<String>,
    pub fallback_models: Vec<String>,
    /// Attach per-candidate traces to results
    pub debug: bool,
}

impl GatewayConfig {
    /// Resolve configuration from the environment, with the optional
    /// `models.toml` override filling in missing model names
    pub fn from_env() -> Self {
        let mut config = Self {
            base_url: std::env::var("TALLY_VISION_URL").ok(),
            api_key: std::env::var("TALLY_VISION_API_KEY").ok(),
            primary_model: std::env::var("TALLY_VISION_MODEL").ok(),
            fallback_models: std::env::var("TALLY_VISION_FALLBACK_MODELS")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            debug: matches!(
                std::env::var("TALLY_VISION_DEBUG").as_deref(),
                Ok("1") | Ok("true")
            ),
        };

        if config.primary_model.is_none() || config.fallback_models.is_empty() {
            match load_models_file() {
                Ok(Some(models)) => {
                    if config.primary_model.is_none() {
                        config.primary_model = models.primary;
                    }
                    if config.fallback_models.is_empty() {
                        config.fallback_models = models.fallbacks.unwrap_or_default();
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable models.toml: {}", e),
            }
        }

        config
    }
}

/// `[models]` section of the optional config file
#[derive(Debug, Deserialize)]
struct ModelsFile {
    models: Option<ModelsSection>,
}

#[derive(Debug, Deserialize)]
struct ModelsSection {
    primary: Option<String>,
    fallbacks: Option<Vec<String>>,
}

fn models_file_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("tally").join("config").join("models.toml"))
}

fn load_models_file() -> Result<Option<ModelsSection>> {
    let Some(path) = models_file_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path)?;
    let parsed: ModelsFile =
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(parsed.models)
}

/// Receipt extraction gateway
///
/// Holds any [`VisionProvider`] behind the candidate chain, so swapping the
/// vendor (or scripting one in tests) never touches normalization or
/// allocation code.
pub struct ModelGateway {
    provider: Option<Box<dyn VisionProvider>>,
    candidates: Vec<String>,
    hint: ModelHintCache,
    debug: bool,
}

impl ModelGateway {
    /// Build a gateway from explicit config and a hint cache
    ///
    /// The hint cache is passed in (rather than created internally) so tests
    /// and embedding applications control its sharing and lifetime.
    pub fn new(config: GatewayConfig, hint: ModelHintCache) -> Self {
        let provider: Option<Box<dyn VisionProvider>> = config
            .base_url
            .as_deref()
            .map(|url| {
                Box::new(ChatVisionProvider::new(url, config.api_key.as_deref()))
                    as Box<dyn VisionProvider>
            });

        let candidates =
            assemble_candidates(config.primary_model, config.fallback_models);

        Self {
            provider,
            candidates,
            hint,
            debug: config.debug,
        }
    }

    /// Build around a custom provider (tests, alternative vendors)
    pub fn with_provider(
        provider: Box<dyn VisionProvider>,
        candidates: Vec<String>,
        hint: ModelHintCache,
        debug: bool,
    ) -> Self {
        Self {
            provider: Some(provider),
            candidates,
            hint,
            debug,
        }
    }

    /// Build from environment variables with a fresh hint cache
    pub fn from_env() -> Self {
        Self::new(GatewayConfig::from_env(), ModelHintCache::new())
    }

    /// Gateway with no provider: every parse returns the mock result
    pub fn disabled() -> Self {
        Self::new(GatewayConfig::default(), ModelHintCache::new())
    }

    /// Whether a provider is configured
    pub fn provider_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Candidate models in configured order (hint reordering not applied)
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Parse a receipt image into normalized line items
    ///
    /// Never fails: provider errors degrade to the mock result so the
    /// pipeline can proceed without the external dependency. `context_label`
    /// only labels log lines; `language_hint` is forwarded to the model.
    pub async fn parse_receipt(
        &self,
        image: &[u8],
        mime: &str,
        language_hint: Option<&str>,
        context_label: &str,
    ) -> ParseResult {
        let Some(ref provider) = self.provider else {
            debug!(context = context_label, "No vision provider configured, using mock result");
            let mut result = mock_parse_result();
            result.trace = self.debug.then_some(Vec::new());
            return result;
        };

        let (parsed, attempts) = self
            .run_candidates(provider.as_ref(), image, mime, language_hint, context_label)
            .await;

        match parsed {
            Some(mut result) => {
                result.trace = self.debug.then_some(attempts);
                result
            }
            None => {
                warn!(
                    context = context_label,
                    attempts = attempts.len(),
                    "All model candidates failed, using mock result"
                );
                let mut result = mock_parse_result();
                result.trace = self.debug.then_some(attempts);
                result
            }
        }
    }

    /// Like [`parse_receipt`](Self::parse_receipt) but surfaces provider
    /// failure instead of degrading (used by the CLI's `--no-fallback` mode)
    pub async fn parse_receipt_strict(
        &self,
        image: &[u8],
        mime: &str,
        language_hint: Option<&str>,
        context_label: &str,
    ) -> Result<ParseResult> {
        let Some(ref provider) = self.provider else {
            return Err(Error::Upstream("no vision provider configured".into()));
        };

        let (parsed, attempts) = self
            .run_candidates(provider.as_ref(), image, mime, language_hint, context_label)
            .await;

        match parsed {
            Some(mut result) => {
                result.trace = self.debug.then_some(attempts);
                Ok(result)
            }
            None => Err(Error::Upstream(format!(
                "all {} model candidates failed",
                attempts.len()
            ))),
        }
    }

    /// Run the candidate chain and normalize the first parseable output
    async fn run_candidates(
        &self,
        provider: &dyn VisionProvider,
        image: &[u8],
        mime: &str,
        language_hint: Option<&str>,
        context_label: &str,
    ) -> (Option<ParseResult>, Vec<ParseAttempt>) {
        let image_hash = hex::encode(Sha256::digest(image));
        debug!(
            context = context_label,
            image_hash = &image_hash[..12],
            image_bytes = image.len(),
            "Parsing receipt image"
        );

        let prompt = match language_hint {
            Some(lang) => format!(
                "{}\nThe receipt language is likely: {}.",
                EXTRACTION_PROMPT, lang
            ),
            None => EXTRACTION_PROMPT.to_string(),
        };

        let ordered = candidate_order(&self.candidates, &self.hint);
        let outcome = run_chain(provider, &ordered, &prompt, image, mime).await;

        let Some(parsed) = outcome.parsed else {
            return (None, outcome.attempts);
        };

        self.hint.set(&parsed.model);
        info!(
            context = context_label,
            model = %parsed.model,
            attempts = outcome.attempts.len(),
            "Receipt parsed by provider"
        );

        let (items, currency) = normalize_receipt(&parsed.receipt);
        let grand_total = recompute_grand_total(&items);

        let result = ParseResult {
            items,
            summary: ParsedSummary {
                grand_total,
                currency,
            },
            source: ParseSource::Provider,
            trace: None,
        };
        (Some(result), outcome.attempts)
    }
}

/// Configured primary + fallbacks + built-in defaults, deduplicated in order
fn assemble_candidates(primary: Option<String>, fallbacks: Vec<String>) -> Vec<String> {
    let mut candidates = Vec::new();
    if let Some(primary) = primary {
        candidates.push(primary);
    }
    for fallback in fallbacks {
        if !candidates.contains(&fallback) {
            candidates.push(fallback);
        }
    }
    for default in DEFAULT_MODELS {
        let default = default.to_string();
        if !candidates.contains(&default) {
            candidates.push(default);
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::super::mock::ScriptedProvider;
    use super::super::types::AttemptOutcome;
    use super::super::ProviderError;
    use super::*;

    const GOOD: &str = r#"{"items": [
            {"name": "Latte", "unit_price": 4.5, "quantity": 2},
            {"name": "Tip", "price": 1.0, "kind": "tip"}
        ],
        "summary": {"grand_total": 99.0, "currency": "€"}}"#;

    fn scripted_gateway(
        responses: Vec<std::result::Result<String, ProviderError>>,
        candidates: &[&str],
        debug: bool,
    ) -> (ModelGateway, ModelHintCache) {
        let hint = ModelHintCache::new();
        let gateway = ModelGateway::with_provider(
            Box::new(ScriptedProvider::new(responses)),
            candidates.iter().map(|s| s.to_string()).collect(),
            hint.clone(),
            debug,
        );
        (gateway, hint)
    }

    #[tokio::test]
    async fn test_no_provider_returns_mock() {
        let gateway = ModelGateway::disabled();
        assert!(!gateway.provider_configured());

        let result = gateway
            .parse_receipt(b"img", "image/jpeg", None, "test")
            .await;
        assert_eq!(result.source, ParseSource::Mock);
        assert_eq!(result.summary.grand_total, 13.50);
        assert!(result.trace.is_none());
    }

    #[tokio::test]
    async fn test_strict_mode_surfaces_missing_provider() {
        let gateway = ModelGateway::disabled();
        let err = gateway
            .parse_receipt_strict(b"img", "image/jpeg", None, "test")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }

    #[tokio::test]
    async fn test_provider_success_normalizes_and_recomputes_total() {
        let (gateway, hint) = scripted_gateway(vec![Ok(GOOD.to_string())], &["a", "b"], false);

        let result = gateway
            .parse_receipt(b"img", "image/jpeg", Some("en"), "test")
            .await;

        assert_eq!(result.source, ParseSource::Provider);
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0].total_price, 9.0);
        assert_eq!(result.items[1].unit_price, 1.0); // legacy `price` fallback
        // The model's own 99.0 summary total is ignored
        assert_eq!(result.summary.grand_total, 10.0);
        assert_eq!(result.summary.currency, "EUR");
        assert_eq!(hint.get().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_failover_trace_in_debug_mode() {
        let (gateway, hint) = scripted_gateway(
            vec![
                Err(ProviderError::Status {
                    status: 500,
                    body: "boom".into(),
                }),
                Err(ProviderError::Status {
                    status: 503,
                    body: "unavailable".into(),
                }),
                Ok(GOOD.to_string()),
            ],
            &["a", "b", "c"],
            true,
        );

        let result = gateway
            .parse_receipt(b"img", "image/jpeg", None, "test")
            .await;

        assert_eq!(result.source, ParseSource::Provider);
        let trace = result.trace.expect("debug mode attaches trace");
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[0].outcome, AttemptOutcome::HttpError);
        assert_eq!(trace[1].outcome, AttemptOutcome::HttpError);
        assert_eq!(trace[2].outcome, AttemptOutcome::Ok);
        assert_eq!(hint.get().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_all_candidates_fail_degrades_to_mock_with_trace() {
        let (gateway, hint) = scripted_gateway(
            vec![
                Err(ProviderError::Transport("refused".into())),
                Err(ProviderError::Transport("refused".into())),
            ],
            &["a", "b"],
            true,
        );

        let result = gateway
            .parse_receipt(b"img", "image/jpeg", None, "test")
            .await;

        assert_eq!(result.source, ParseSource::Mock);
        assert_eq!(result.trace.unwrap().len(), 2);
        assert_eq!(hint.get(), None);
    }

    #[tokio::test]
    async fn test_trace_absent_without_debug() {
        let (gateway, _) = scripted_gateway(vec![Ok(GOOD.to_string())], &["a"], false);
        let result = gateway
            .parse_receipt(b"img", "image/jpeg", None, "test")
            .await;
        assert!(result.trace.is_none());
    }

    #[test]
    fn test_candidate_assembly_dedupes_and_appends_defaults() {
        let candidates = assemble_candidates(
            Some(DEFAULT_MODELS[0].to_string()),
            vec!["custom/model".to_string()],
        );

        assert_eq!(candidates[0], DEFAULT_MODELS[0]);
        assert_eq!(candidates[1], "custom/model");
        // The primary also appears in DEFAULT_MODELS but is not duplicated
        assert_eq!(candidates.len(), 1 + 1 + (DEFAULT_MODELS.len() - 1));
    }
}
