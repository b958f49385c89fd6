use std::collections::BTreeSet;

use inviterole_models::attribution::AttributionResult;
use inviterole_models::invite::InviteSnapshot;

/// Work out which invite a join consumed by diffing use-counters.
///
/// Only codes present in `after` are considered; a code that vanished between
/// the two captures is ignored. A code missing from `before` counts from zero,
/// and so does a code whose creation time changed (the invite was regenerated
/// under the same code and its counter reset).
pub fn attribute(before: &InviteSnapshot, after: &InviteSnapshot) -> AttributionResult {
    let mut consumed = BTreeSet::new();

    for current in after.iter() {
        let baseline = match before.get(&current.code) {
            Some(prev) if prev.created_at == current.created_at => prev.uses,
            _ => 0,
        };
        if current.uses > baseline {
            consumed.insert(current.code.clone());
        }
    }

    let mut codes = consumed.into_iter();
    match (codes.next(), codes.next()) {
        (None, _) => AttributionResult::Unresolved,
        (Some(code), None) => AttributionResult::Resolved(code),
        (Some(first), Some(second)) => {
            let mut all: BTreeSet<String> = codes.collect();
            all.insert(first);
            all.insert(second);
            AttributionResult::Ambiguous(all)
        }
    }
}
