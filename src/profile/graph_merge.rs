//! Non-destructive merge of the relation graph.
//!
//! Only keys named in the update are touched. Everything else in the stored
//! graph survives as-is, which is what lets a conversation about a spouse
//! leave the stored parents alone.

use crate::profile::operations::OperationCounts;
use crate::profile::relations::{
    Cardinality, FamilyEntry, KeyResolution, OtherEntry, PersonEntry, RelationEvent,
    RelationGraph, RelationGraphUpdate, RelationKey, RelationOp, resolve_relation_key,
};

/// Result of merging a proposed update into the stored graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphMergeOutcome {
    pub graph: RelationGraph,
    pub counts: OperationCounts,
    /// Entries that were corrected, redirected or dropped.
    pub warnings: Vec<String>,
}

impl GraphMergeOutcome {
    pub fn changed(&self) -> bool {
        self.counts.total() > 0
    }
}

/// Merge `update` into `existing`.
pub fn merge_relation_graph(existing: RelationGraph, update: RelationGraphUpdate) -> GraphMergeOutcome {
    let mut out = GraphMergeOutcome {
        graph: existing,
        ..Default::default()
    };

    for (raw_key, payload) in update.family {
        match resolve_relation_key(&raw_key) {
            KeyResolution::Family { key, corrected } => {
                if corrected && raw_key != key.as_str() {
                    tracing::info!(from = %raw_key, to = %key, "Corrected relation key");
                    out.warnings
                        .push(format!("family key '{raw_key}' corrected to '{key}'"));
                }
                for op in payload.into_ops() {
                    match key.cardinality() {
                        Cardinality::Single => merge_single(&mut out, key, op),
                        Cardinality::Array => merge_array(&mut out, key, op),
                    }
                }
            }
            KeyResolution::Collateral(relation) => {
                tracing::info!(key = %raw_key, "Redirecting collateral relative to others");
                out.warnings
                    .push(format!("family key '{raw_key}' moved to others"));
                for op in payload.into_ops() {
                    if op.event_or_default() == RelationEvent::Delete {
                        out.warnings
                            .push(format!("DELETE on '{raw_key}' is not supported, ignored"));
                        continue;
                    }
                    if op.entry.is_empty() {
                        continue;
                    }
                    out.graph.others.push(OtherEntry {
                        name: op.entry.name,
                        relation: relation.clone(),
                        info: dedup_info(op.entry.info),
                    });
                    out.counts.added += 1;
                }
            }
            KeyResolution::Rejected => {
                tracing::warn!(key = %raw_key, "Dropping unknown relation key");
                out.warnings
                    .push(format!("unknown family key '{raw_key}' dropped"));
            }
        }
    }

    for friend in update.friends {
        if friend.is_empty() {
            continue;
        }
        out.graph.friends.push(PersonEntry {
            name: friend.name,
            info: dedup_info(friend.info),
        });
        out.counts.added += 1;
    }
    for other in update.others {
        out.graph.others.push(OtherEntry {
            info: dedup_info(other.info),
            ..other
        });
        out.counts.added += 1;
    }

    out
}

fn merge_single(out: &mut GraphMergeOutcome, key: RelationKey, op: RelationOp) {
    let event = op.event_or_default();
    if event != RelationEvent::Delete && op.entry.is_empty() {
        return;
    }

    match event {
        RelationEvent::Add => {
            out.graph
                .family
                .insert(key, FamilyEntry::Single(clean(op.entry)));
            out.counts.added += 1;
        }
        RelationEvent::Update => match out.graph.family.get_mut(&key) {
            Some(FamilyEntry::Single(current)) => {
                merge_person(current, op.entry);
                out.counts.updated += 1;
            }
            _ => {
                out.graph
                    .family
                    .insert(key, FamilyEntry::Single(clean(op.entry)));
                out.counts.added += 1;
            }
        },
        RelationEvent::Delete => {
            if out.graph.family.remove(&key).is_some() {
                out.counts.deleted += 1;
            }
        }
    }
}

fn merge_array(out: &mut GraphMergeOutcome, key: RelationKey, op: RelationOp) {
    let event = op.event_or_default();
    if event == RelationEvent::Delete {
        // Array entries carry no stable identity to delete by.
        tracing::warn!(%key, "DELETE on an array relation is not supported");
        out.warnings
            .push(format!("DELETE on array relation '{key}' is not supported, ignored"));
        return;
    }
    if op.entry.is_empty() {
        return;
    }

    let entry = out
        .graph
        .family
        .entry(key)
        .or_insert_with(|| FamilyEntry::Many(Vec::new()));
    if let FamilyEntry::Single(person) = entry {
        *entry = FamilyEntry::Many(vec![std::mem::take(person)]);
    }
    let FamilyEntry::Many(people) = entry else {
        return;
    };

    let existing = match (event, op.entry.name.as_deref().map(str::trim)) {
        (RelationEvent::Update, Some(name)) => people
            .iter_mut()
            .find(|p| p.name.as_deref().map(str::trim) == Some(name)),
        _ => None,
    };

    match existing {
        Some(person) => {
            merge_person(person, op.entry);
            out.counts.updated += 1;
        }
        None => {
            people.push(clean(op.entry));
            out.counts.added += 1;
        }
    }
}

/// Merge `incoming` into `current`: info by exact-value dedup, name only when given.
fn merge_person(current: &mut PersonEntry, incoming: PersonEntry) {
    if let Some(name) = incoming.name {
        current.name = Some(name);
    }
    for fact in incoming.info {
        let fact = fact.trim();
        if !fact.is_empty() && !current.info.iter().any(|f| f == fact) {
            current.info.push(fact.to_string());
        }
    }
}

fn clean(entry: PersonEntry) -> PersonEntry {
    PersonEntry {
        name: entry.name,
        info: dedup_info(entry.info),
    }
}

fn dedup_info(info: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(info.len());
    for fact in info {
        let fact = fact.trim();
        if !fact.is_empty() && !out.iter().any(|f| f == fact) {
            out.push(fact.to_string());
        }
    }
    out
}
