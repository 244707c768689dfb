//! Profile data model.
//!
//! A profile is split across two stores: [`BasicInfo`] holds flat reference
//! values in the scalar store, and [`AdditionalProfile`] holds the
//! category documents (trait lists, relation graph, learning preferences).
//! Trait items carry evidence; their opaque ids are assigned once at ADD.

pub mod basic_info;
pub mod evidence;
pub mod graph_merge;
pub mod identity;
pub mod list_merge;
pub mod operations;
pub mod relations;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use self::basic_info::{BasicInfo, BasicInfoField};
pub use self::evidence::{DEFAULT_EVIDENCE_CAP, Evidence, EvidenceLimit, merge_evidence};
pub use self::identity::{IdentityMap, MaskedProfile, Surrogate};
pub use self::relations::{FamilyEntry, OtherEntry, PersonEntry, RelationGraph, RelationKey};

use crate::error::ValidationError;

/// Strength or proficiency rating, always within `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct Degree(u8);

impl Degree {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Clamp any integer into the valid range.
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl From<i64> for Degree {
    fn from(value: i64) -> Self {
        Self::clamped(value)
    }
}

impl From<Degree> for i64 {
    fn from(value: Degree) -> Self {
        value.0 as i64
    }
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the interests, skills or personality lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitItem {
    pub id: String,
    pub name: String,
    pub degree: Degree,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

/// The array-of-[`TraitItem`] categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitCategory {
    Interests,
    Skills,
    Personality,
}

impl TraitCategory {
    pub const ALL: [TraitCategory; 3] = [
        TraitCategory::Interests,
        TraitCategory::Skills,
        TraitCategory::Personality,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TraitCategory::Interests => "interests",
            TraitCategory::Skills => "skills",
            TraitCategory::Personality => "personality",
        }
    }

    pub fn field(self) -> ProfileField {
        match self {
            TraitCategory::Interests => ProfileField::Interests,
            TraitCategory::Skills => ProfileField::Skills,
            TraitCategory::Personality => ProfileField::Personality,
        }
    }
}

impl fmt::Display for TraitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level keys of the additional profile document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Interests,
    Skills,
    Personality,
    SocialContext,
    LearningPreferences,
}

impl ProfileField {
    pub const ALL: [ProfileField; 5] = [
        ProfileField::Interests,
        ProfileField::Skills,
        ProfileField::Personality,
        ProfileField::SocialContext,
        ProfileField::LearningPreferences,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProfileField::Interests => "interests",
            ProfileField::Skills => "skills",
            ProfileField::Personality => "personality",
            ProfileField::SocialContext => "social_context",
            ProfileField::LearningPreferences => "learning_preferences",
        }
    }

    pub fn trait_category(self) -> Option<TraitCategory> {
        match self {
            ProfileField::Interests => Some(TraitCategory::Interests),
            ProfileField::Skills => Some(TraitCategory::Skills),
            ProfileField::Personality => Some(TraitCategory::Personality),
            ProfileField::SocialContext | ProfileField::LearningPreferences => None,
        }
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ProfileField::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownField(s.to_string()))
    }
}

/// Flat preferences object, replaced wholesale on every update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<String>,
}

impl LearningPreferences {
    pub fn is_empty(&self) -> bool {
        self.preferred_time.is_none()
            && self.preferred_style.is_none()
            && self.difficulty_level.is_none()
    }
}

/// The document-store half of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalProfile {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interests: Vec<TraitItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<TraitItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub personality: Vec<TraitItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_context: Option<RelationGraph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_preferences: Option<LearningPreferences>,
}

impl AdditionalProfile {
    pub fn traits(&self, category: TraitCategory) -> &[TraitItem] {
        match category {
            TraitCategory::Interests => &self.interests,
            TraitCategory::Skills => &self.skills,
            TraitCategory::Personality => &self.personality,
        }
    }

    pub fn traits_mut(&mut self, category: TraitCategory) -> &mut Vec<TraitItem> {
        match category {
            TraitCategory::Interests => &mut self.interests,
            TraitCategory::Skills => &mut self.skills,
            TraitCategory::Personality => &mut self.personality,
        }
    }

    /// Whether a field is absent or holds nothing.
    pub fn is_field_empty(&self, field: ProfileField) -> bool {
        match field {
            ProfileField::SocialContext => {
                self.social_context.as_ref().is_none_or(RelationGraph::is_empty)
            }
            ProfileField::LearningPreferences => self
                .learning_preferences
                .as_ref()
                .is_none_or(LearningPreferences::is_empty),
            other => other
                .trait_category()
                .is_none_or(|category| self.traits(category).is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        ProfileField::ALL.iter().all(|f| self.is_field_empty(*f))
    }

    pub fn missing_fields(&self) -> Vec<ProfileField> {
        ProfileField::ALL
            .into_iter()
            .filter(|f| self.is_field_empty(*f))
            .collect()
    }

    /// The stored value of one field, if present.
    pub fn field_value(&self, field: ProfileField) -> Option<FieldValue> {
        match field {
            ProfileField::SocialContext => self.social_context.clone().map(FieldValue::SocialContext),
            ProfileField::LearningPreferences => self
                .learning_preferences
                .clone()
                .map(FieldValue::LearningPreferences),
            other => other.trait_category().and_then(|category| {
                let items = self.traits(category);
                (!items.is_empty()).then(|| FieldValue::Traits(category, items.to_vec()))
            }),
        }
    }

    /// Every present field, in document order.
    pub fn field_values(&self) -> Vec<FieldValue> {
        ProfileField::ALL
            .into_iter()
            .filter_map(|f| self.field_value(f))
            .collect()
    }

    pub fn set_field(&mut self, value: FieldValue) {
        match value {
            FieldValue::Traits(category, items) => *self.traits_mut(category) = items,
            FieldValue::SocialContext(graph) => self.social_context = Some(graph),
            FieldValue::LearningPreferences(prefs) => self.learning_preferences = Some(prefs),
        }
    }

    /// Keep only the requested fields.
    pub fn retain_fields(&mut self, fields: &[ProfileField]) {
        for field in ProfileField::ALL {
            if fields.contains(&field) {
                continue;
            }
            match field {
                ProfileField::SocialContext => self.social_context = None,
                ProfileField::LearningPreferences => self.learning_preferences = None,
                other => {
                    if let Some(category) = other.trait_category() {
                        self.traits_mut(category).clear();
                    }
                }
            }
        }
    }

    /// Read-time evidence projection. Never touches the stored copy.
    pub fn limit_evidence(&mut self, limit: EvidenceLimit) {
        for category in TraitCategory::ALL {
            for item in self.traits_mut(category) {
                limit.apply(&mut item.evidence);
            }
        }
    }
}

/// One whole-category value, the unit of a document-store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Traits(TraitCategory, Vec<TraitItem>),
    SocialContext(RelationGraph),
    LearningPreferences(LearningPreferences),
}

impl FieldValue {
    pub fn field(&self) -> ProfileField {
        match self {
            FieldValue::Traits(category, _) => category.field(),
            FieldValue::SocialContext(_) => ProfileField::SocialContext,
            FieldValue::LearningPreferences(_) => ProfileField::LearningPreferences,
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            FieldValue::Traits(_, items) => serde_json::to_value(items),
            FieldValue::SocialContext(graph) => serde_json::to_value(graph),
            FieldValue::LearningPreferences(prefs) => serde_json::to_value(prefs),
        }
    }

    pub fn from_json(field: ProfileField, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match field {
            ProfileField::SocialContext => FieldValue::SocialContext(serde_json::from_value(value)?),
            ProfileField::LearningPreferences => {
                FieldValue::LearningPreferences(serde_json::from_value(value)?)
            }
            ProfileField::Interests => {
                FieldValue::Traits(TraitCategory::Interests, serde_json::from_value(value)?)
            }
            ProfileField::Skills => {
                FieldValue::Traits(TraitCategory::Skills, serde_json::from_value(value)?)
            }
            ProfileField::Personality => {
                FieldValue::Traits(TraitCategory::Personality, serde_json::from_value(value)?)
            }
        })
    }
}

/// A full profile as returned to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub user_id: String,
    pub basic_info: BasicInfo,
    pub additional_profile: AdditionalProfile,
}
