//! Applies decided operations to one trait list.
//!
//! Works on an in-memory copy of the stored category; the caller writes the
//! resulting list back as a single document.

use uuid::Uuid;

use crate::profile::identity::IdentityMap;
use crate::profile::operations::{OperationCounts, TraitOperation, TraitUpdate};
use crate::profile::{TraitCategory, TraitItem, merge_evidence};

/// Result of merging one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitMergeOutcome {
    pub items: Vec<TraitItem>,
    pub counts: OperationCounts,
    /// Operations dropped because their surrogate matched nothing.
    pub unresolved: usize,
}

impl TraitMergeOutcome {
    /// Whether the list differs from what was loaded.
    pub fn changed(&self) -> bool {
        self.counts.total() > 0
    }
}

/// Apply `ops` in order to `current`.
pub fn apply_trait_operations(
    category: TraitCategory,
    current: Vec<TraitItem>,
    ops: &[TraitOperation],
    ids: &IdentityMap,
    evidence_cap: usize,
) -> TraitMergeOutcome {
    let mut outcome = TraitMergeOutcome {
        items: current,
        counts: OperationCounts::default(),
        unresolved: 0,
    };

    for op in ops {
        match op {
            TraitOperation::Add(draft) => {
                let id = Uuid::new_v4().to_string();
                tracing::debug!(%category, %id, name = %draft.name, "Adding trait item");
                outcome.items.push(TraitItem {
                    id,
                    name: draft.name.clone(),
                    degree: draft.degree,
                    evidence: merge_evidence(Vec::new(), draft.evidence.clone(), evidence_cap),
                });
                outcome.counts.added += 1;
            }
            TraitOperation::Update(update) => {
                match locate(&outcome.items, category, update.surrogate, ids) {
                    Some(index) => {
                        apply_update(&mut outcome.items[index], update, evidence_cap);
                        outcome.counts.updated += 1;
                    }
                    None => outcome.unresolved += 1,
                }
            }
            TraitOperation::Delete { surrogate } => {
                match locate(&outcome.items, category, *surrogate, ids) {
                    Some(index) => {
                        let removed = outcome.items.remove(index);
                        tracing::debug!(%category, id = %removed.id, "Deleted trait item");
                        outcome.counts.deleted += 1;
                    }
                    None => outcome.unresolved += 1,
                }
            }
        }
    }

    outcome
}

/// Find the stored item a surrogate points at, if any.
fn locate(
    items: &[TraitItem],
    category: TraitCategory,
    surrogate: u32,
    ids: &IdentityMap,
) -> Option<usize> {
    let Some(opaque) = ids.resolve(surrogate) else {
        tracing::warn!(%category, surrogate, "Oracle referenced an unknown id, skipping");
        return None;
    };
    let index = items.iter().position(|item| item.id == opaque);
    if index.is_none() {
        tracing::warn!(
            %category,
            surrogate,
            id = %opaque,
            "Referenced item is not in this category, skipping"
        );
    }
    index
}

fn apply_update(item: &mut TraitItem, update: &TraitUpdate, evidence_cap: usize) {
    let existing = std::mem::take(&mut item.evidence);
    item.evidence = merge_evidence(existing, update.evidence.clone(), evidence_cap);
    if let Some(name) = &update.name {
        item.name = name.clone();
    }
    if let Some(degree) = update.degree {
        item.degree = degree;
    }
    tracing::debug!(id = %item.id, name = %item.name, degree = %item.degree, "Updated trait item");
}
