//! Receipt extraction from vision models
//!
//! This module turns an untrusted multimodal model into structured line
//! items. The pieces, in call order:
//!
//! - [`gateway::ModelGateway`]: entry point; owns configuration and the
//!   mock degradation path
//! - [`chain`]: ordered model candidate failover with per-attempt diagnostics
//! - [`provider::ChatVisionProvider`]: one OpenAI-style HTTP call per
//!   candidate
//! - [`parsing`]: repair and structural validation of model output
//! - [`normalize`]: pure price/quantity/currency normalization
//!
//! The gateway never fails outward: with no provider configured, or with
//! every candidate down, callers get the fixed [`mock::mock_parse_result`].

pub mod chain;
pub mod gateway;
pub mod mock;
pub mod normalize;
pub mod parsing;
pub mod provider;
pub mod types;

pub use chain::ModelHintCache;
pub use gateway::{GatewayConfig, ModelGateway};
pub use provider::ChatVisionProvider;
pub use types::*;

use async_trait::async_trait;

/// Error from a single provider call, classified for attempt diagnostics
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered with a non-success HTTP status
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The call never produced a usable HTTP response
    #[error("provider call failed: {0}")]
    Transport(String),
}

impl ProviderError {
    pub fn outcome(&self) -> AttemptOutcome {
        match self {
            Self::Status { .. } => AttemptOutcome::HttpError,
            Self::Transport(_) => AttemptOutcome::Exception,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }
}

/// One vision model call: instruction + image in, generated text out
///
/// Implementations must be Send + Sync so the gateway can be shared across
/// request handlers.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Send one request to the named model and return its raw text output
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        image: &[u8],
        mime: &str,
    ) -> Result<String, ProviderError>;

    /// Provider API version string, recorded in attempt diagnostics
    fn api_version(&self) -> &str;
}
