//! Producer-first deployment order.
//!
//! Applications are emitted level by level: a level holds every node whose
//! producers have all been emitted already, sorted by key so the order is
//! stable across runs.

use crate::errors::{LifetimeError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Topologically sort `dependencies` (application key -> producer keys).
///
/// Producers that are not keys of the map are still part of the order.
/// Self references are ignored.
pub fn deployment_order(dependencies: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>> {
    let mut remaining: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (node, producers) in dependencies {
        let producers = producers
            .iter()
            .filter(|producer| *producer != node)
            .cloned()
            .collect::<BTreeSet<_>>();
        for producer in &producers {
            remaining.entry(producer.clone()).or_default();
        }
        remaining.entry(node.clone()).or_default().extend(producers);
    }

    let mut order = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let level = remaining
            .iter()
            .filter(|(_, producers)| producers.is_empty())
            .map(|(node, _)| node.clone())
            .collect::<BTreeSet<_>>();
        if level.is_empty() {
            return Err(LifetimeError::CircularDependency(
                remaining.into_keys().collect(),
            ));
        }
        remaining.retain(|node, producers| {
            if level.contains(node) {
                return false;
            }
            producers.retain(|producer| !level.contains(producer));
            true
        });
        order.extend(level);
    }
    Ok(order)
}
