//! Allocation engine
//!
//! Converts reviewed line items plus split instructions into a cent-exact
//! per-participant debt table. Validation is all-or-nothing: any malformed
//! item rejects the whole call and no partial allocation is ever returned.
//!
//! All arithmetic runs on integer cents. For each item, every share except
//! the last is the rounded nominal share and the last absorbs the exact
//! remainder, so the item's allocations always sum to its total. Assignees
//! are sorted by participant id before the remainder rule is applied, making
//! the remainder target independent of caller ordering.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{Error, Result};
use crate::models::{
    Allocation, ItemTotal, ParticipantInfo, ParticipantTotal, SettlementItem, SettlementResult,
    SettlementTotals, SplitKind,
};
use crate::money::{from_cents, round2, to_cents};

/// Tolerance for comparing a unit sum against a (float) quantity
const QUANTITY_EPSILON: f64 = 1e-9;

/// Compute the full allocation table for one session
///
/// Totals are aggregated from the produced allocations only, never from
/// caller-supplied summaries. Participants who receive nothing still appear
/// in `by_participant` with a zero amount.
pub fn finalize(
    participants: &[ParticipantInfo],
    items: &[SettlementItem],
) -> Result<SettlementResult> {
    if participants.is_empty() {
        return Err(Error::Validation("participants must not be empty".into()));
    }
    if items.is_empty() {
        return Err(Error::Validation("items must not be empty".into()));
    }

    let mut roster: HashSet<&str> = HashSet::new();
    for participant in participants {
        if !roster.insert(participant.unique_id.as_str()) {
            return Err(Error::Validation(format!(
                "duplicate participant '{}' in roster",
                participant.unique_id
            )));
        }
    }

    let mut allocations = Vec::new();
    for item in items {
        allocate_item(item, &roster, &mut allocations)?;
    }

    let totals = aggregate(participants, items, &allocations);

    Ok(SettlementResult {
        totals,
        allocations,
    })
}

/// Pricing resolved for one item: positive unit price, quantity, and total
struct ItemPricing {
    unit_price: f64,
    quantity: f64,
    total_cents: i64,
}

fn resolve_pricing(item: &SettlementItem) -> Result<ItemPricing> {
    let quantity = item.quantity.unwrap_or(1.0);
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(Error::Validation(format!(
            "item '{}' has non-positive quantity",
            item.id
        )));
    }

    let unit_price = match item.unit_price {
        Some(p) if p.is_finite() && p > 0.0 => p,
        Some(_) => {
            return Err(Error::Validation(format!(
                "item '{}' has non-positive unit price",
                item.id
            )))
        }
        None => match item.total_price {
            Some(t) if t.is_finite() && t > 0.0 => t / quantity,
            _ => {
                return Err(Error::Validation(format!(
                    "item '{}' resolves no positive unit price",
                    item.id
                )))
            }
        },
    };

    Ok(ItemPricing {
        unit_price,
        quantity,
        total_cents: to_cents(round2(unit_price * quantity)),
    })
}

/// Resolve the split policy: explicit tag wins, otherwise a units map means
/// count and anything else means equal
fn resolve_policy(item: &SettlementItem) -> SplitKind {
    match item.split {
        Some(kind) => kind,
        None if item.units.is_some() => SplitKind::Count,
        None => SplitKind::Equal,
    }
}

fn allocate_item(
    item: &SettlementItem,
    roster: &HashSet<&str>,
    allocations: &mut Vec<Allocation>,
) -> Result<()> {
    let pricing = resolve_pricing(item)?;

    match resolve_policy(item) {
        SplitKind::Equal => {
            let assignees = item.assigned_to.as_deref().unwrap_or_default();
            if assignees.is_empty() {
                return Err(Error::Validation(format!(
                    "item '{}' has an equal split but no assignees",
                    item.id
                )));
            }

            let mut sorted: Vec<&str> = Vec::with_capacity(assignees.len());
            for id in assignees {
                if !roster.contains(id.as_str()) {
                    return Err(Error::Validation(format!(
                        "item '{}' assigns to unknown participant '{}'",
                        item.id, id
                    )));
                }
                if sorted.contains(&id.as_str()) {
                    return Err(Error::Validation(format!(
                        "item '{}' assigns to participant '{}' twice",
                        item.id, id
                    )));
                }
                sorted.push(id.as_str());
            }
            sorted.sort_unstable();

            let n = sorted.len();
            let ratio = 1.0 / n as f64;
            let nominal_cents = to_cents(round2(pricing.unit_price * pricing.quantity * ratio));

            let mut allocated = 0i64;
            for (index, id) in sorted.iter().enumerate() {
                let share_cents = if index + 1 == n {
                    pricing.total_cents - allocated
                } else {
                    nominal_cents
                };
                allocated += share_cents;
                allocations.push(Allocation {
                    item_id: item.id.clone(),
                    participant_id: (*id).to_string(),
                    share_units: None,
                    share_ratio: Some(ratio),
                    share_amount: from_cents(share_cents),
                });
            }
        }
        SplitKind::Count => {
            let units = item.units.as_ref().ok_or_else(|| {
                Error::Validation(format!(
                    "item '{}' has a count split but no units map",
                    item.id
                ))
            })?;

            let mut unit_sum = 0i64;
            for (id, count) in units {
                if !roster.contains(id.as_str()) {
                    return Err(Error::Validation(format!(
                        "item '{}' counts units for unknown participant '{}'",
                        item.id, id
                    )));
                }
                if *count < 0 {
                    return Err(Error::Validation(format!(
                        "item '{}' has negative units for participant '{}'",
                        item.id, id
                    )));
                }
                unit_sum += count;
            }

            if (unit_sum as f64 - pricing.quantity).abs() > QUANTITY_EPSILON {
                return Err(Error::Validation(format!(
                    "item '{}' unit counts sum to {} but quantity is {}",
                    item.id, unit_sum, pricing.quantity
                )));
            }

            // BTreeMap iterates in participant-id order, which is exactly the
            // stable order the remainder rule needs
            let holders: Vec<(&String, i64)> = units
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(id, count)| (id, *count))
                .collect();
            if holders.is_empty() {
                return Err(Error::Validation(format!(
                    "item '{}' has no positive unit counts",
                    item.id
                )));
            }

            let mut allocated = 0i64;
            for (index, (id, count)) in holders.iter().enumerate() {
                let share_cents = if index + 1 == holders.len() {
                    pricing.total_cents - allocated
                } else {
                    to_cents(round2(*count as f64 * pricing.unit_price))
                };
                allocated += share_cents;
                allocations.push(Allocation {
                    item_id: item.id.clone(),
                    participant_id: (*id).clone(),
                    share_units: Some(*count),
                    share_ratio: None,
                    share_amount: from_cents(share_cents),
                });
            }
        }
    }

    Ok(())
}

/// Aggregate totals from the allocation list alone, rounding at each step
fn aggregate(
    participants: &[ParticipantInfo],
    items: &[SettlementItem],
    allocations: &[Allocation],
) -> SettlementTotals {
    let mut item_sums: BTreeMap<&str, f64> = BTreeMap::new();
    let mut participant_sums: HashMap<&str, f64> = HashMap::new();

    for allocation in allocations {
        let item_sum = item_sums.entry(allocation.item_id.as_str()).or_insert(0.0);
        *item_sum = round2(*item_sum + allocation.share_amount);

        let participant_sum = participant_sums
            .entry(allocation.participant_id.as_str())
            .or_insert(0.0);
        *participant_sum = round2(*participant_sum + allocation.share_amount);
    }

    let by_item: Vec<ItemTotal> = items
        .iter()
        .map(|item| ItemTotal {
            item_id: item.id.clone(),
            name: item.name.clone(),
            kind: item.kind,
            total: item_sums.get(item.id.as_str()).copied().unwrap_or(0.0),
        })
        .collect();

    let by_participant: Vec<ParticipantTotal> = participants
        .iter()
        .map(|participant| ParticipantTotal {
            participant_id: participant.unique_id.clone(),
            username: participant.username.clone(),
            amount_owed: participant_sums
                .get(participant.unique_id.as_str())
                .copied()
                .unwrap_or(0.0),
        })
        .collect();

    let grand_total = by_item
        .iter()
        .fold(0.0, |acc, entry| round2(acc + entry.total));

    SettlementTotals {
        grand_total,
        by_item,
        by_participant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: &str) -> ParticipantInfo {
        ParticipantInfo {
            unique_id: id.to_string(),
            username: id.to_uppercase(),
            avatar_url: None,
        }
    }

    fn roster(ids: &[&str]) -> Vec<ParticipantInfo> {
        ids.iter().map(|id| participant(id)).collect()
    }

    fn equal_item(id: &str, unit_price: f64, quantity: f64, assignees: &[&str]) -> SettlementItem {
        SettlementItem {
            id: id.to_string(),
            name: id.to_string(),
            unit_price: Some(unit_price),
            quantity: Some(quantity),
            total_price: None,
            kind: None,
            split: Some(SplitKind::Equal),
            assigned_to: Some(assignees.iter().map(|s| s.to_string()).collect()),
            units: None,
        }
    }

    fn count_item(id: &str, unit_price: f64, quantity: f64, units: &[(&str, i64)]) -> SettlementItem {
        SettlementItem {
            id: id.to_string(),
            name: id.to_string(),
            unit_price: Some(unit_price),
            quantity: Some(quantity),
            total_price: None,
            kind: None,
            split: Some(SplitKind::Count),
            assigned_to: None,
            units: Some(units.iter().map(|(k, v)| (k.to_string(), *v)).collect()),
        }
    }

    fn owed(result: &SettlementResult, id: &str) -> f64 {
        result
            .totals
            .by_participant
            .iter()
            .find(|p| p.participant_id == id)
            .unwrap()
            .amount_owed
    }

    /// Every item's allocations must sum to its total, and the three
    /// grand-total views must agree.
    fn assert_invariants(result: &SettlementResult) {
        for entry in &result.totals.by_item {
            let sum = result
                .allocations
                .iter()
                .filter(|a| a.item_id == entry.item_id)
                .fold(0.0, |acc, a| round2(acc + a.share_amount));
            assert_eq!(sum, entry.total, "item {} drifted", entry.item_id);
        }

        let by_item_sum = result
            .totals
            .by_item
            .iter()
            .fold(0.0, |acc, e| round2(acc + e.total));
        let by_participant_sum = result
            .totals
            .by_participant
            .iter()
            .fold(0.0, |acc, e| round2(acc + e.amount_owed));
        assert_eq!(result.totals.grand_total, by_item_sum);
        assert_eq!(result.totals.grand_total, by_participant_sum);
    }

    #[test]
    fn test_even_split() {
        // unitPrice 2.00 x 3 split equally across three people: 2.00 each
        let result = finalize(
            &roster(&["a", "b", "c"]),
            &[equal_item("i1", 2.0, 3.0, &["a", "b", "c"])],
        )
        .unwrap();

        assert_eq!(owed(&result, "a"), 2.0);
        assert_eq!(owed(&result, "b"), 2.0);
        assert_eq!(owed(&result, "c"), 2.0);
        assert_eq!(result.totals.grand_total, 6.0);
        assert_invariants(&result);
    }

    #[test]
    fn test_remainder_split() {
        // 1.00 x 3 across two people: 1.50 each, no drift
        let result = finalize(
            &roster(&["a", "b"]),
            &[equal_item("i1", 1.0, 3.0, &["a", "b"])],
        )
        .unwrap();

        assert_eq!(owed(&result, "a"), 1.5);
        assert_eq!(owed(&result, "b"), 1.5);
        assert_eq!(result.totals.grand_total, 3.0);
        assert_invariants(&result);
    }

    #[test]
    fn test_count_split() {
        // 1.00 x 3 with a:2, b:1
        let result = finalize(
            &roster(&["a", "b"]),
            &[count_item("i1", 1.0, 3.0, &[("a", 2), ("b", 1)])],
        )
        .unwrap();

        assert_eq!(owed(&result, "a"), 2.0);
        assert_eq!(owed(&result, "b"), 1.0);
        assert_invariants(&result);

        let a_alloc = result
            .allocations
            .iter()
            .find(|a| a.participant_id == "a")
            .unwrap();
        assert_eq!(a_alloc.share_units, Some(2));
        assert_eq!(a_alloc.share_ratio, None);
    }

    #[test]
    fn test_equal_split_awkward_price() {
        // 10.00 across three people: 3.33 + 3.33 + 3.34
        let result = finalize(
            &roster(&["a", "b", "c"]),
            &[equal_item("i1", 10.0, 1.0, &["a", "b", "c"])],
        )
        .unwrap();

        let amounts: Vec<f64> = result.allocations.iter().map(|a| a.share_amount).collect();
        assert_eq!(amounts, vec![3.33, 3.33, 3.34]);
        assert_invariants(&result);
    }

    #[test]
    fn test_remainder_lands_on_same_participant_regardless_of_order() {
        let forward = finalize(
            &roster(&["a", "b", "c"]),
            &[equal_item("i1", 10.0, 1.0, &["a", "b", "c"])],
        )
        .unwrap();
        let reversed = finalize(
            &roster(&["a", "b", "c"]),
            &[equal_item("i1", 10.0, 1.0, &["c", "b", "a"])],
        )
        .unwrap();

        for id in ["a", "b", "c"] {
            assert_eq!(owed(&forward, id), owed(&reversed, id));
        }
        // Drift goes to the lexicographically last assignee
        assert_eq!(owed(&forward, "c"), 3.34);
    }

    #[test]
    fn test_count_split_subcent_price_stays_exact() {
        // 0.333 x 2 rounds to an item total of 0.67, while the naive rounded
        // per-share products (0.33 + 0.33) would sum to 0.66; the remainder
        // rule keeps the allocations pinned to the item total
        let result = finalize(
            &roster(&["a", "b"]),
            &[count_item("i1", 0.333, 2.0, &[("a", 1), ("b", 1)])],
        )
        .unwrap();
        assert_eq!(owed(&result, "a"), 0.33);
        assert_eq!(owed(&result, "b"), 0.34);
        assert_invariants(&result);
    }

    #[test]
    fn test_count_unit_sum_mismatch_rejected() {
        let err = finalize(
            &roster(&["a", "b"]),
            &[count_item("i1", 1.0, 3.0, &[("a", 1), ("b", 1)])],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_negative_units_rejected() {
        let err = finalize(
            &roster(&["a", "b"]),
            &[count_item("i1", 1.0, 1.0, &[("a", 2), ("b", -1)])],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_unknown_participant_rejected() {
        let err = finalize(
            &roster(&["a"]),
            &[equal_item("i1", 1.0, 1.0, &["a", "ghost"])],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = finalize(
            &roster(&["a"]),
            &[count_item("i1", 1.0, 1.0, &[("ghost", 1)])],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert!(matches!(
            finalize(&[], &[equal_item("i1", 1.0, 1.0, &["a"])]),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            finalize(&roster(&["a"]), &[]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_validation_failure_is_all_or_nothing() {
        // First item is fine, second is malformed: nothing is returned
        let err = finalize(
            &roster(&["a", "b"]),
            &[
                equal_item("i1", 2.0, 1.0, &["a"]),
                count_item("i2", 1.0, 3.0, &[("a", 1)]),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_policy_inference() {
        // No explicit split: units map present means count
        let mut inferred_count = count_item("i1", 1.0, 2.0, &[("a", 2)]);
        inferred_count.split = None;
        // No explicit split and no units: equal over assigned_to
        let mut inferred_equal = equal_item("i2", 3.0, 1.0, &["a", "b"]);
        inferred_equal.split = None;

        let result = finalize(&roster(&["a", "b"]), &[inferred_count, inferred_equal]).unwrap();

        let i1: Vec<_> = result
            .allocations
            .iter()
            .filter(|a| a.item_id == "i1")
            .collect();
        assert!(i1.iter().all(|a| a.share_units.is_some()));

        let i2: Vec<_> = result
            .allocations
            .iter()
            .filter(|a| a.item_id == "i2")
            .collect();
        assert!(i2.iter().all(|a| a.share_ratio.is_some()));
        assert_invariants(&result);
    }

    #[test]
    fn test_unit_price_derived_from_total() {
        let item = SettlementItem {
            id: "i1".into(),
            name: "Pizza".into(),
            unit_price: None,
            quantity: Some(2.0),
            total_price: Some(17.0),
            kind: None,
            split: Some(SplitKind::Equal),
            assigned_to: Some(vec!["a".into(), "b".into()]),
            units: None,
        };
        let result = finalize(&roster(&["a", "b"]), &[item]).unwrap();
        assert_eq!(owed(&result, "a"), 8.5);
        assert_eq!(owed(&result, "b"), 8.5);
        assert_invariants(&result);
    }

    #[test]
    fn test_missing_price_rejected() {
        let item = SettlementItem {
            id: "i1".into(),
            name: "Mystery".into(),
            unit_price: None,
            quantity: Some(1.0),
            total_price: None,
            kind: None,
            split: Some(SplitKind::Equal),
            assigned_to: Some(vec!["a".into()]),
            units: None,
        };
        assert!(matches!(
            finalize(&roster(&["a"]), &[item]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_unallocated_roster_member_owes_zero() {
        let result = finalize(
            &roster(&["a", "b", "c"]),
            &[equal_item("i1", 4.0, 1.0, &["a", "b"])],
        )
        .unwrap();
        assert_eq!(owed(&result, "c"), 0.0);
        assert_eq!(result.totals.by_participant.len(), 3);
        assert_invariants(&result);
    }

    #[test]
    fn test_duplicate_roster_rejected() {
        let err = finalize(
            &roster(&["a", "a"]),
            &[equal_item("i1", 1.0, 1.0, &["a"])],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_multi_item_aggregation() {
        let result = finalize(
            &roster(&["a", "b"]),
            &[
                equal_item("food", 12.5, 1.0, &["a", "b"]),
                count_item("beer", 3.0, 4.0, &[("a", 3), ("b", 1)]),
            ],
        )
        .unwrap();

        // food: 6.25 each; beer: a 9.00, b 3.00
        assert_eq!(owed(&result, "a"), 15.25);
        assert_eq!(owed(&result, "b"), 9.25);
        assert_eq!(result.totals.grand_total, 24.5);
        assert_eq!(result.totals.by_item.len(), 2);
        assert_invariants(&result);
    }
}
