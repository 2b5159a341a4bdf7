//! Shared domain types for settlements
//!
//! Types that flow between the allocation engine, the settlement store, and
//! the API layer. Receipt-extraction types live in [`crate::ai::types`].

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag describing what a line item represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Item,
    Fee,
    Tip,
    Discount,
    Other,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Fee => "fee",
            Self::Tip => "tip",
            Self::Discount => "discount",
            Self::Other => "other",
        }
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "item" => Ok(Self::Item),
            "fee" => Ok(Self::Fee),
            "tip" => Ok(Self::Tip),
            "discount" => Ok(Self::Discount),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown item kind: {}", s)),
        }
    }
}

/// Directory identity attached to allocations and snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    /// Stable human-facing identifier (directory key)
    pub unique_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// How one item's cost is divided among participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    /// Even fractions across an explicit assignee list
    Equal,
    /// Integer unit counts per participant, summing to the item quantity
    Count,
}

/// One reviewed line item submitted for finalization
///
/// Starts life as a gateway [`crate::ai::LineItem`]; the caller may edit
/// prices and attach split instructions before finalizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementItem {
    /// Caller-scoped identifier, echoed into allocations
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub kind: Option<ItemKind>,
    /// Explicit split policy; inferred from the other fields when absent
    #[serde(default)]
    pub split: Option<SplitKind>,
    /// Assignees for an equal split
    #[serde(default)]
    pub assigned_to: Option<Vec<String>>,
    /// Participant id -> unit count for a count split
    #[serde(default)]
    pub units: Option<BTreeMap<String, i64>>,
}

/// One item's cost share assigned to one participant
///
/// Exactly one of `share_units` / `share_ratio` is set, depending on the
/// item's split policy. `share_amount` is always present and rounded to
/// two decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub item_id: String,
    pub participant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_units: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_ratio: Option<f64>,
    pub share_amount: f64,
}

/// Per-item roll-up derived from the allocation list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemTotal {
    pub item_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ItemKind>,
    pub total: f64,
}

/// Per-participant roll-up derived from the allocation list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantTotal {
    pub participant_id: String,
    pub username: String,
    pub amount_owed: f64,
}

/// Aggregated totals for a finalized session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementTotals {
    pub grand_total: f64,
    pub by_item: Vec<ItemTotal>,
    pub by_participant: Vec<ParticipantTotal>,
}

/// Output of the allocation engine before persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResult {
    pub totals: SettlementTotals,
    pub allocations: Vec<Allocation>,
}

/// Per-session record of final participant debts
///
/// At most one live snapshot exists per session; re-finalizing replaces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSnapshot {
    pub session_id: i64,
    pub participants: Vec<ParticipantInfo>,
    pub allocations: Vec<Allocation>,
    pub totals: SettlementTotals,
    pub finalized_at: DateTime<Utc>,
}

/// A snapshot paired with one participant's own owed amount
///
/// Returned by participant history queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantSettlement {
    pub amount_owed: f64,
    #[serde(flatten)]
    pub snapshot: SettlementSnapshot,
}

/// Session record owned by an authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub creator_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_kind_round_trip() {
        for kind in [
            ItemKind::Item,
            ItemKind::Fee,
            ItemKind::Tip,
            ItemKind::Discount,
            ItemKind::Other,
        ] {
            assert_eq!(kind.as_str().parse::<ItemKind>().unwrap(), kind);
        }
        assert!("bogus".parse::<ItemKind>().is_err());
    }

    #[test]
    fn test_settlement_item_accepts_sparse_json() {
        let item: SettlementItem = serde_json::from_str(
            r#"{"id": "i1", "name": "Coffee", "unit_price": 3.5, "assigned_to": ["alice"]}"#,
        )
        .unwrap();
        assert_eq!(item.quantity, None);
        assert_eq!(item.split, None);
        assert_eq!(item.assigned_to.as_deref(), Some(&["alice".to_string()][..]));
    }

    #[test]
    fn test_allocation_serializes_one_share_field() {
        let alloc = Allocation {
            item_id: "i1".into(),
            participant_id: "alice".into(),
            share_units: Some(2),
            share_ratio: None,
            share_amount: 4.0,
        };
        let json = serde_json::to_value(&alloc).unwrap();
        assert_eq!(json["share_units"], 2);
        assert!(json.get("share_ratio").is_none());
    }
}
