//! Registration summary to profile conversion.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::profile::{
    AdditionalProfile, BasicInfo, BasicInfoField, Degree, Evidence, TraitCategory, TraitItem,
};

/// Degree given to every imported trait.
pub const SEED_DEGREE: i64 = 3;

/// The single evidence entry attached to imported traits.
pub const REGISTRATION_EVIDENCE: &str = "Initial profile from user registration";

/// What a summary converts into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Seed {
    pub basic_info: BasicInfo,
    pub additional_profile: AdditionalProfile,
}

impl Seed {
    pub fn is_empty(&self) -> bool {
        self.basic_info.is_empty() && self.additional_profile.is_empty()
    }
}

/// Map summary keys onto profile fields.
///
/// - `childName` becomes `nickname`
/// - `gender` 1/2 (or 1.0/2.0) becomes male/female, any other value `unknown`
/// - `hobbies` and `personalityTraits` are comma lists of interests and personality
pub fn convert_summary(summary: &Map<String, Value>, now: DateTime<Utc>) -> Seed {
    let mut seed = Seed::default();

    if let Some(name) = summary.get("childName").and_then(Value::as_str)
        && let Err(e) = seed.basic_info.set(BasicInfoField::Nickname, name)
    {
        tracing::debug!(error = %e, "Skipping childName");
    }

    let gender = match summary.get("gender") {
        None | Some(Value::Null) => None,
        Some(v) => match gender_code(v) {
            Some(1) => Some("male"),
            Some(2) => Some("female"),
            _ => Some("unknown"),
        },
    };
    if let Some(gender) = gender
        && let Err(e) = seed.basic_info.set(BasicInfoField::Gender, gender)
    {
        tracing::debug!(error = %e, "Skipping gender");
    }

    for (key, category) in [
        ("personalityTraits", TraitCategory::Personality),
        ("hobbies", TraitCategory::Interests),
    ] {
        let Some(text) = summary.get(key).and_then(Value::as_str) else {
            continue;
        };
        *seed.additional_profile.traits_mut(category) = split_list(text)
            .map(|name| TraitItem {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                degree: Degree::clamped(SEED_DEGREE),
                evidence: vec![Evidence::new(REGISTRATION_EVIDENCE, now)],
            })
            .collect();
    }

    seed
}

/// Integer codes, also accepting integral floats such as `1.0`.
fn gender_code(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

fn split_list(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').map(str::trim).filter(|s| !s.is_empty())
}
