//! Vision extraction types
//!
//! These types are provider-agnostic: the raw shapes mirror whatever JSON the
//! model produced, the normalized shapes are what the rest of the system sees.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::ItemKind;

/// Sentinel currency code when nothing in the model output matched
pub const UNKNOWN_CURRENCY: &str = "UNKNOWN";

/// A normalized line item extracted from a receipt image
///
/// `total_price` always equals `unit_price * quantity` rounded to two
/// decimals; `id` is caller-scoped and not a database key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub name: String,
    pub unit_price: f64,
    pub quantity: f64,
    pub total_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ItemKind>,
}

/// Normalized receipt summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSummary {
    /// Recomputed from item totals, never taken from the model
    pub grand_total: f64,
    /// ISO 4217 code or [`UNKNOWN_CURRENCY`]
    pub currency: String,
}

/// Where a parse result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseSource {
    /// A model candidate returned parseable output
    Provider,
    /// Deterministic fallback (no provider configured or all candidates failed)
    Mock,
}

/// Result of parsing one receipt image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResult {
    pub items: Vec<LineItem>,
    pub summary: ParsedSummary,
    pub source: ParseSource,
    /// Per-candidate diagnostics, attached only when the gateway debug flag
    /// is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<ParseAttempt>>,
}

/// Outcome of one model candidate attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Ok,
    ParseFail,
    HttpError,
    Exception,
}

/// Diagnostic record for one model candidate attempt (never persisted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseAttempt {
    pub model: String,
    pub api_version: String,
    pub outcome: AttemptOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub duration_ms: u64,
    pub output_len: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Raw decode shapes
// ---------------------------------------------------------------------------
// Money and quantity fields arrive as whatever the model felt like emitting
// (number, quoted number, missing), so they are held as Value and coerced in
// one place by `normalize`.

/// Untrusted receipt object decoded from model output
#[derive(Debug, Clone, Deserialize)]
pub struct RawReceipt {
    pub items: Option<Vec<RawItem>>,
    pub summary: Option<RawSummary>,
}

/// Untrusted line item as decoded from model output
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "unitPrice")]
    pub unit_price: Option<Value>,
    /// Legacy field some prompts/models still emit instead of `unit_price`
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub quantity: Option<Value>,
    #[serde(default, alias = "totalPrice")]
    pub total_price: Option<Value>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Untrusted summary as decoded from model output
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSummary {
    #[serde(default, alias = "grandTotal", alias = "total")]
    pub grand_total: Option<Value>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, alias = "currencyCode")]
    pub currency_code: Option<String>,
}
