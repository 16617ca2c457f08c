//! Key-based merge planning between staged rows and a master table.
//!
//! The SQL store expresses the same thing as an `UPDATE .. FROM` over the
//! intersection and an anti-join `INSERT .. SELECT` over the difference.

use std::collections::BTreeMap;

use crate::models::MergeSummary;

/// Changes needed to bring a master table in line with staged rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan<K, V> {
    /// Keys on both sides whose value differs, with the staged value.
    pub updates: Vec<(K, V)>,
    /// Keys only present in the staged rows.
    pub inserts: Vec<(K, V)>,
}

impl<K, V> MergePlan<K, V> {
    pub fn summary(&self) -> MergeSummary {
        MergeSummary {
            updated: self.updates.len() as u64,
            inserted: self.inserts.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.inserts.is_empty()
    }
}

/// Compare staged pairs with the master. Staged pairs sharing a key collapse
/// to the last one. Keys only found in the master are left out of the plan.
pub fn plan_merge<K, V, I>(staged: I, master: &BTreeMap<K, V>) -> MergePlan<K, V>
where
    K: Ord + Clone,
    V: PartialEq + Clone,
    I: IntoIterator<Item = (K, V)>,
{
    let collapsed: BTreeMap<K, V> = staged.into_iter().collect();

    let mut plan = MergePlan {
        updates: Vec::new(),
        inserts: Vec::new(),
    };
    for (key, value) in collapsed {
        match master.get(&key) {
            Some(current) if *current == value => {}
            Some(_) => plan.updates.push((key, value)),
            None => plan.inserts.push((key, value)),
        }
    }
    plan
}

/// Write a plan into the master map.
pub fn apply_plan<K: Ord, V>(plan: MergePlan<K, V>, master: &mut BTreeMap<K, V>) -> MergeSummary {
    let summary = plan.summary();
    for (key, value) in plan.updates.into_iter().chain(plan.inserts) {
        master.insert(key, value);
    }
    summary
}
