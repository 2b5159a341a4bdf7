//! Deterministic fallback result and test provider
//!
//! The mock result keeps the pipeline usable when no provider is configured
//! or every model candidate fails; the scripted provider drives chain and
//! gateway tests without a network.

use std::sync::Mutex;

use async_trait::async_trait;

use super::types::{LineItem, ParseResult, ParseSource, ParsedSummary};
use super::{ProviderError, VisionProvider};
use crate::models::ItemKind;

/// Fixed, reproducible parse result tagged `source: "mock"`
///
/// The grand total is the sum of the fixed item totals, so downstream
/// invariant checks hold for mock output exactly as for provider output.
pub fn mock_parse_result() -> ParseResult {
    let items = vec![
        LineItem {
            id: "item-1".to_string(),
            name: "Flat white".to_string(),
            unit_price: 4.50,
            quantity: 2.0,
            total_price: 9.00,
            kind: Some(ItemKind::Item),
        },
        LineItem {
            id: "item-2".to_string(),
            name: "Blueberry muffin".to_string(),
            unit_price: 3.25,
            quantity: 1.0,
            total_price: 3.25,
            kind: Some(ItemKind::Item),
        },
        LineItem {
            id: "item-3".to_string(),
            name: "Service charge".to_string(),
            unit_price: 1.25,
            quantity: 1.0,
            total_price: 1.25,
            kind: Some(ItemKind::Fee),
        },
    ];

    ParseResult {
        summary: ParsedSummary {
            grand_total: 13.50,
            currency: "USD".to_string(),
        },
        items,
        source: ParseSource::Mock,
        trace: None,
    }
}

/// Scripted provider for tests
///
/// Returns canned responses in order and records which models were asked.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Result<String, ProviderError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        let mut responses = responses;
        responses.reverse(); // pop() serves them front-to-back
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Models requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionProvider for ScriptedProvider {
    async fn generate(
        &self,
        model: &str,
        _prompt: &str,
        _image: &[u8],
        _mime: &str,
    ) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(model.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(ProviderError::Transport("script exhausted".into())))
    }

    fn api_version(&self) -> &str {
        "test"
    }
}
