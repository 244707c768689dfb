//! Surrogate identities for oracle calls.
//!
//! Before the decide call every stored trait item id is replaced with a small
//! integer, so the oracle can only point at records it was actually shown.
//! The map lives for one pipeline run and is never persisted.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::profile::{
    AdditionalProfile, Degree, Evidence, LearningPreferences, RelationGraph, TraitCategory,
    TraitItem,
};

/// Short-lived integer standing in for an opaque id.
pub type Surrogate = u32;

/// First surrogate handed out in a run.
const FIRST_SURROGATE: Surrogate = 1;

/// Bijection between surrogates and the opaque ids they replace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMap {
    opaque: BTreeMap<Surrogate, String>,
}

impl IdentityMap {
    /// Walk the trait lists of `profile` and assign surrogates in document order.
    pub fn build(profile: &AdditionalProfile) -> (MaskedProfile<'_>, IdentityMap) {
        let mut map = IdentityMap::default();
        let mut next = FIRST_SURROGATE;

        let interests = map.mask(profile.traits(TraitCategory::Interests), &mut next);
        let skills = map.mask(profile.traits(TraitCategory::Skills), &mut next);
        let personality = map.mask(profile.traits(TraitCategory::Personality), &mut next);

        let masked = MaskedProfile {
            interests,
            skills,
            personality,
            social_context: profile.social_context.as_ref(),
            learning_preferences: profile.learning_preferences.as_ref(),
        };

        (masked, map)
    }

    fn mask<'a>(&mut self, items: &'a [TraitItem], next: &mut Surrogate) -> Vec<MaskedItem<'a>> {
        items
            .iter()
            .map(|item| {
                let id = (!item.id.is_empty()).then(|| {
                    let surrogate = *next;
                    *next += 1;
                    self.opaque.insert(surrogate, item.id.clone());
                    surrogate
                });
                MaskedItem {
                    id,
                    name: &item.name,
                    degree: item.degree,
                    evidence: &item.evidence,
                }
            })
            .collect()
    }

    /// The opaque id behind a surrogate, or `None` when the oracle made it up.
    pub fn resolve(&self, surrogate: Surrogate) -> Option<&str> {
        self.opaque.get(&surrogate).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.opaque.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Surrogate, &str)> {
        self.opaque.iter().map(|(s, id)| (*s, id.as_str()))
    }
}

/// The existing profile as the oracle sees it: ids replaced by surrogates.
///
/// Borrows from the loaded profile and only implements `Serialize`, so it can
/// be rendered into a prompt but never written back to a store.
#[derive(Debug, Serialize)]
pub struct MaskedProfile<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interests: Vec<MaskedItem<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<MaskedItem<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub personality: Vec<MaskedItem<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_context: Option<&'a RelationGraph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_preferences: Option<&'a LearningPreferences>,
}

#[derive(Debug, Serialize)]
pub struct MaskedItem<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Surrogate>,
    pub name: &'a str,
    pub degree: Degree,
    pub evidence: &'a [Evidence],
}
