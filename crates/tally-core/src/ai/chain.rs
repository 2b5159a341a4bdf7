//! Ordered model candidate chain
//!
//! Tries an ordered list of model identifiers against one provider until a
//! candidate returns structurally valid output, recording a diagnostic
//! [`ParseAttempt`] per try. There is no retry within a candidate; a failure
//! of any kind moves the chain to the next one.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{debug, warn};

use super::parsing::{decode_receipt, Decoded};
use super::types::{AttemptOutcome, ParseAttempt, RawReceipt};
use super::VisionProvider;

/// Shared "last successful model" hint
///
/// A best-effort latency/cost optimization: the model that last produced
/// parseable output is tried first on the next call. Races between concurrent
/// calls only cost a wasted attempt, never a wrong result, so a plain RwLock
/// with no further coordination is enough. Pass one cache per test to keep
/// tests deterministic.
#[derive(Clone, Default)]
pub struct ModelHintCache {
    inner: Arc<RwLock<Option<String>>>,
}

impl ModelHintCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.inner.read().ok().and_then(|guard| guard.clone())
    }

    pub fn set(&self, model: &str) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some(model.to_string());
        }
    }
}

/// A candidate that produced parseable output
pub struct ParsedCandidate {
    pub model: String,
    pub receipt: RawReceipt,
}

/// Result of running the chain over every candidate
pub struct ChainOutcome {
    /// First candidate that parsed, if any
    pub parsed: Option<ParsedCandidate>,
    /// One attempt record per candidate tried
    pub attempts: Vec<ParseAttempt>,
}

/// Order candidates for one call: hint first (when it is a known candidate),
/// then the configured order, deduplicated
pub fn candidate_order(candidates: &[String], hint: &ModelHintCache) -> Vec<String> {
    let mut ordered = Vec::with_capacity(candidates.len());
    if let Some(hinted) = hint.get() {
        if candidates.contains(&hinted) {
            ordered.push(hinted);
        }
    }
    for candidate in candidates {
        if !ordered.contains(candidate) {
            ordered.push(candidate.clone());
        }
    }
    ordered
}

/// Run the chain: one request per candidate, stop at the first parse success
pub async fn run_chain<P: VisionProvider + ?Sized>(
    provider: &P,
    candidates: &[String],
    prompt: &str,
    image: &[u8],
    mime: &str,
) -> ChainOutcome {
    let mut attempts = Vec::with_capacity(candidates.len());

    for model in candidates {
        let started = Instant::now();
        let call = provider.generate(model, prompt, image, mime).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match call {
            Ok(text) => match decode_receipt(&text) {
                Decoded::Parsed(receipt) => {
                    debug!(model = %model, duration_ms, "Model candidate parsed");
                    attempts.push(ParseAttempt {
                        model: model.clone(),
                        api_version: provider.api_version().to_string(),
                        outcome: AttemptOutcome::Ok,
                        http_status: Some(200),
                        duration_ms,
                        output_len: text.len(),
                        error: None,
                    });
                    return ChainOutcome {
                        parsed: Some(ParsedCandidate {
                            model: model.clone(),
                            receipt,
                        }),
                        attempts,
                    };
                }
                Decoded::Unparseable(raw) => {
                    warn!(model = %model, duration_ms, "Model output not parseable");
                    attempts.push(ParseAttempt {
                        model: model.clone(),
                        api_version: provider.api_version().to_string(),
                        outcome: AttemptOutcome::ParseFail,
                        http_status: Some(200),
                        duration_ms,
                        output_len: raw.len(),
                        error: Some("no valid receipt object in model output".to_string()),
                    });
                }
            },
            Err(err) => {
                warn!(model = %model, error = %err, "Model candidate call failed");
                attempts.push(ParseAttempt {
                    model: model.clone(),
                    api_version: provider.api_version().to_string(),
                    outcome: err.outcome(),
                    http_status: err.http_status(),
                    duration_ms,
                    output_len: 0,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    ChainOutcome {
        parsed: None,
        attempts,
    }
}
