//! JSON repair for vision model responses
//!
//! Models wrap their output in markdown fences, prose, or both. These
//! functions strip the wrapping, locate the outermost JSON object, and decode
//! it into a tagged result instead of probing fields ad hoc.

use super::types::RawReceipt;

/// Decoded model response: either a structurally valid receipt or the raw
/// text kept for diagnostics
#[derive(Debug)]
pub enum Decoded {
    Parsed(RawReceipt),
    Unparseable(String),
}

/// Strip markdown code fences (```json ... ``` or ``` ... ```) if present
fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the fence line
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Locate the outermost `{...}` span in a response
fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if start < end {
        Some(&response[start..=end])
    } else {
        None
    }
}

/// Decode a model response into a receipt
///
/// Returns `Unparseable` when no JSON object is found, when it fails to
/// decode, or when the required shape (`items` array plus `summary` object)
/// is missing.
pub fn decode_receipt(response: &str) -> Decoded {
    let cleaned = strip_code_fences(response);

    let Some(json_str) = extract_json_object(cleaned) else {
        return Decoded::Unparseable(response.to_string());
    };

    match serde_json::from_str::<RawReceipt>(json_str) {
        Ok(raw) if raw.items.is_some() && raw.summary.is_some() => Decoded::Parsed(raw),
        Ok(_) => Decoded::Unparseable(response.to_string()),
        Err(_) => Decoded::Unparseable(response.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "items": [{"name": "Latte", "unit_price": 4.5, "quantity": 1}],
        "summary": {"grand_total": 4.5, "currency": "USD"}
    }"#;

    #[test]
    fn test_decode_plain_json() {
        let decoded = decode_receipt(VALID);
        let Decoded::Parsed(raw) = decoded else {
            panic!("expected parse");
        };
        assert_eq!(raw.items.unwrap().len(), 1);
    }

    #[test]
    fn test_decode_with_fences() {
        let fenced = format!("```json\n{}\n```", VALID);
        assert!(matches!(decode_receipt(&fenced), Decoded::Parsed(_)));
    }

    #[test]
    fn test_decode_with_surrounding_prose() {
        let wrapped = format!("Here is the extracted receipt:\n{}\nHope that helps!", VALID);
        assert!(matches!(decode_receipt(&wrapped), Decoded::Parsed(_)));
    }

    #[test]
    fn test_decode_missing_summary_is_parse_failure() {
        let no_summary = r#"{"items": [{"name": "Latte"}]}"#;
        assert!(matches!(
            decode_receipt(no_summary),
            Decoded::Unparseable(_)
        ));
    }

    #[test]
    fn test_decode_missing_items_is_parse_failure() {
        let no_items = r#"{"summary": {"grand_total": 4.5}}"#;
        assert!(matches!(decode_receipt(no_items), Decoded::Unparseable(_)));
    }

    #[test]
    fn test_decode_no_json_keeps_raw_text() {
        let Decoded::Unparseable(raw) = decode_receipt("I could not read this receipt.") else {
            panic!("expected unparseable");
        };
        assert_eq!(raw, "I could not read this receipt.");
    }

    #[test]
    fn test_decode_garbage_braces() {
        assert!(matches!(decode_receipt("{{{not json"), Decoded::Unparseable(_)));
    }
}
