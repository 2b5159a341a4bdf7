//! Normalization of untrusted model output
//!
//! Pure functions that turn [`RawItem`]s into [`LineItem`]s and map whatever
//! the model called the currency onto an ISO 4217 code. The model's own
//! summary total is never trusted; the grand total is recomputed from the
//! normalized items.

use serde_json::Value;

use super::types::{LineItem, RawItem, RawReceipt, RawSummary, UNKNOWN_CURRENCY};
use crate::money::round2;

/// Symbols and textual currency names mapped to ISO 4217 codes
const CURRENCY_TABLE: &[(&str, &str)] = &[
    ("$", "USD"),
    ("usd", "USD"),
    ("dollar", "USD"),
    ("dollars", "USD"),
    ("€", "EUR"),
    ("eur", "EUR"),
    ("euro", "EUR"),
    ("euros", "EUR"),
    ("£", "GBP"),
    ("pound", "GBP"),
    ("pounds", "GBP"),
    ("sterling", "GBP"),
    ("¥", "JPY"),
    ("yen", "JPY"),
    ("₽", "RUB"),
    ("rub", "RUB"),
    ("руб", "RUB"),
    ("руб.", "RUB"),
    ("рубль", "RUB"),
    ("рублей", "RUB"),
    ("ruble", "RUB"),
    ("rubles", "RUB"),
    ("rouble", "RUB"),
    ("₴", "UAH"),
    ("грн", "UAH"),
    ("hryvnia", "UAH"),
    ("₸", "KZT"),
    ("тенге", "KZT"),
    ("tenge", "KZT"),
    ("₹", "INR"),
    ("rupee", "INR"),
    ("rupees", "INR"),
    ("₺", "TRY"),
    ("lira", "TRY"),
];

/// ISO 4217 codes accepted verbatim (case-insensitive)
const KNOWN_CODES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CNY", "RUB", "UAH", "KZT", "BYN", "AMD", "GEL", "TRY", "INR",
    "AED", "CHF", "CAD", "AUD", "NZD", "SEK", "NOK", "DKK", "PLN", "CZK", "RSD", "ILS", "THB",
    "VND", "IDR", "KRW", "BRL", "MXN",
];

/// Map a raw currency token to an ISO 4217 code
///
/// Accepts symbols ("€"), textual names ("rubles", "руб"), and already-valid
/// codes in any case. Anything else becomes [`UNKNOWN_CURRENCY`].
pub fn normalize_currency(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return UNKNOWN_CURRENCY.to_string();
    };
    let token = raw.trim();
    if token.is_empty() {
        return UNKNOWN_CURRENCY.to_string();
    }

    let lowered = token.to_lowercase();
    for (pattern, code) in CURRENCY_TABLE {
        if lowered == *pattern {
            return (*code).to_string();
        }
    }

    let upper = token.to_uppercase();
    if KNOWN_CODES.contains(&upper.as_str()) {
        return upper;
    }

    UNKNOWN_CURRENCY.to_string()
}

/// Coerce a loosely-typed JSON value to a float (number or quoted number)
fn as_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            // Models sometimes quote amounts or keep a currency sign attached
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse().ok()
        }
        _ => None,
    }
}

/// Normalize one raw item
///
/// Quantity defaults to 1 when missing or invalid; `unit_price` falls back to
/// the legacy `price` field, or is derived from the total when only that is
/// present. The total is always recomputed as `unit_price * quantity`.
pub fn normalize_item(raw: &RawItem, index: usize) -> LineItem {
    let quantity = match as_f64(raw.quantity.as_ref()) {
        Some(q) if q.is_finite() && q > 0.0 => q,
        _ => 1.0,
    };

    let explicit_unit = as_f64(raw.unit_price.as_ref()).or_else(|| as_f64(raw.price.as_ref()));
    let total = as_f64(raw.total_price.as_ref());

    let unit_price = match explicit_unit {
        Some(p) if p.is_finite() => round2(p),
        _ => match total {
            Some(t) if t.is_finite() => round2(t / quantity),
            _ => 0.0,
        },
    };

    LineItem {
        id: raw
            .id
            .clone()
            .unwrap_or_else(|| format!("item-{}", index + 1)),
        name: raw
            .name
            .clone()
            .unwrap_or_else(|| format!("Item {}", index + 1)),
        unit_price,
        quantity,
        total_price: round2(unit_price * quantity),
        kind: raw.kind.as_deref().and_then(|k| k.parse().ok()),
    }
}

/// Sum of item totals, rounded at each accumulation step
pub fn recompute_grand_total(items: &[LineItem]) -> f64 {
    items
        .iter()
        .fold(0.0, |acc, item| round2(acc + item.total_price))
}

/// Pick the first usable currency token from summary or item-level fields
pub fn currency_of(summary: &RawSummary, items: &[RawItem]) -> String {
    let candidates = summary
        .currency
        .as_deref()
        .into_iter()
        .chain(summary.currency_code.as_deref())
        .chain(items.iter().filter_map(|i| i.currency.as_deref()));

    for raw in candidates {
        let code = normalize_currency(Some(raw));
        if code != UNKNOWN_CURRENCY {
            return code;
        }
    }
    UNKNOWN_CURRENCY.to_string()
}

/// Normalize a whole decoded receipt into line items plus currency
pub fn normalize_receipt(raw: &RawReceipt) -> (Vec<LineItem>, String) {
    let raw_items = raw.items.as_deref().unwrap_or_default();
    let summary = raw.summary.clone().unwrap_or_default();

    let items: Vec<LineItem> = raw_items
        .iter()
        .enumerate()
        .map(|(i, item)| normalize_item(item, i))
        .collect();
    let currency = currency_of(&summary, raw_items);

    (items, currency)
}
