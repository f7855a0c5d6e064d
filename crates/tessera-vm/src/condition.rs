//! Condition groups to row-id sets.

use std::collections::{BTreeSet, HashSet};
use tessera_common::{Result, RowId};

use crate::access::TableAccess;
use crate::instruction::Condition;

/// Evaluates OR-of-AND condition groups against `table`.
///
/// Each group is the intersection of its conditions' matches; groups are
/// unioned, and the union is clipped to the live rows. No groups at all
/// selects every live row. An empty group matches nothing.
pub fn evaluate_conditions<T>(groups: &[Vec<Condition>], table: &T) -> Result<BTreeSet<RowId>>
where
    T: TableAccess + ?Sized,
{
    if groups.is_empty() {
        return Ok(table.locate_all().into_iter().collect());
    }

    let mut selected = BTreeSet::new();
    for group in groups {
        let mut conditions = group.iter();
        let Some(first) = conditions.next() else {
            continue;
        };
        let mut matched: BTreeSet<RowId> = table
            .locate(first.column, first.comparator, &first.value)?
            .into_iter()
            .collect();
        for condition in conditions {
            let ids: HashSet<RowId> = table
                .locate(condition.column, condition.comparator, &condition.value)?
                .into_iter()
                .collect();
            matched.retain(|id| ids.contains(id));
        }
        selected.append(&mut matched);
    }

    let live: HashSet<RowId> = table.locate_all().into_iter().collect();
    selected.retain(|id| live.contains(id));
    Ok(selected)
}
