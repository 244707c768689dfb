//! Typed oracle payloads: the extraction delta and the decided operation set.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use serde::Serialize;

use crate::profile::relations::RelationGraphUpdate;
use crate::profile::{BasicInfo, Degree, Evidence, LearningPreferences, Surrogate, TraitCategory};

/// A trait item proposed by the oracle, evidence already stamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraitDraft {
    pub name: String,
    pub degree: Degree,
    pub evidence: Vec<Evidence>,
}

/// Changes to one existing trait item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitUpdate {
    pub surrogate: Surrogate,
    pub name: Option<String>,
    pub degree: Option<Degree>,
    pub evidence: Vec<Evidence>,
}

/// One decided change to a trait list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitOperation {
    Add(TraitDraft),
    Update(TraitUpdate),
    Delete { surrogate: Surrogate },
}

/// Everything the extract call found in a transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileDelta {
    pub basic_info: BasicInfo,
    pub additional_profile: DeltaProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeltaProfile {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interests: Vec<TraitDraft>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<TraitDraft>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub personality: Vec<TraitDraft>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_context: Option<RelationGraphUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_preferences: Option<LearningPreferences>,
}

impl DeltaProfile {
    pub fn traits_mut(&mut self, category: TraitCategory) -> &mut Vec<TraitDraft> {
        match category {
            TraitCategory::Interests => &mut self.interests,
            TraitCategory::Skills => &mut self.skills,
            TraitCategory::Personality => &mut self.personality,
        }
    }
}

impl ProfileDelta {
    pub fn is_empty(&self) -> bool {
        let extra = &self.additional_profile;
        self.basic_info.is_empty()
            && extra.interests.is_empty()
            && extra.skills.is_empty()
            && extra.personality.is_empty()
            && extra.social_context.as_ref().is_none_or(RelationGraphUpdate::is_empty)
            && extra.learning_preferences.is_none()
    }
}

/// The decide call's answer, validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationSet {
    pub basic_info: BasicInfo,
    pub traits: BTreeMap<TraitCategory, Vec<TraitOperation>>,
    pub social_context: Option<RelationGraphUpdate>,
    pub learning_preferences: Option<LearningPreferences>,
    /// Malformed entries dropped at the boundary, for the caller's `errors[]`.
    pub rejected: Vec<String>,
}

impl OperationSet {
    pub fn trait_ops(&self, category: TraitCategory) -> &[TraitOperation] {
        self.traits.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn touches_documents(&self) -> bool {
        self.traits.values().any(|ops| !ops.is_empty())
            || self.social_context.as_ref().is_some_and(|u| !u.is_empty())
            || self.learning_preferences.is_some()
    }
}

/// Counters reported by `setProfile`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationCounts {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl OperationCounts {
    pub fn total(&self) -> usize {
        self.added + self.updated + self.deleted
    }
}

impl AddAssign for OperationCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.added += rhs.added;
        self.updated += rhs.updated;
        self.deleted += rhs.deleted;
    }
}
