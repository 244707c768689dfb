//! The social relation graph and its key vocabulary.
//!
//! Family relations use a closed key set split by cardinality. Keys coming
//! from the oracle are checked against that set, a small correction table,
//! and a list of collateral relatives that belong in `others` instead.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a relation key holds one person or a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Array,
}

/// Allowed keys of `social_context.family`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKey {
    Father,
    Mother,
    Spouse,
    GrandfatherPaternal,
    GrandmotherPaternal,
    GrandfatherMaternal,
    GrandmotherMaternal,
    Brother,
    Sister,
    Son,
    Daughter,
    Grandson,
    Granddaughter,
}

impl RelationKey {
    pub const ALL: [RelationKey; 13] = [
        RelationKey::Father,
        RelationKey::Mother,
        RelationKey::Spouse,
        RelationKey::GrandfatherPaternal,
        RelationKey::GrandmotherPaternal,
        RelationKey::GrandfatherMaternal,
        RelationKey::GrandmotherMaternal,
        RelationKey::Brother,
        RelationKey::Sister,
        RelationKey::Son,
        RelationKey::Daughter,
        RelationKey::Grandson,
        RelationKey::Granddaughter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationKey::Father => "father",
            RelationKey::Mother => "mother",
            RelationKey::Spouse => "spouse",
            RelationKey::GrandfatherPaternal => "grandfather_paternal",
            RelationKey::GrandmotherPaternal => "grandmother_paternal",
            RelationKey::GrandfatherMaternal => "grandfather_maternal",
            RelationKey::GrandmotherMaternal => "grandmother_maternal",
            RelationKey::Brother => "brother",
            RelationKey::Sister => "sister",
            RelationKey::Son => "son",
            RelationKey::Daughter => "daughter",
            RelationKey::Grandson => "grandson",
            RelationKey::Granddaughter => "granddaughter",
        }
    }

    pub fn cardinality(self) -> Cardinality {
        match self {
            RelationKey::Father
            | RelationKey::Mother
            | RelationKey::Spouse
            | RelationKey::GrandfatherPaternal
            | RelationKey::GrandmotherPaternal
            | RelationKey::GrandfatherMaternal
            | RelationKey::GrandmotherMaternal => Cardinality::Single,
            RelationKey::Brother
            | RelationKey::Sister
            | RelationKey::Son
            | RelationKey::Daughter
            | RelationKey::Grandson
            | RelationKey::Granddaughter => Cardinality::Array,
        }
    }

    fn from_exact(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aliases and common misspellings that map onto exactly one allowed key.
const KEY_CORRECTIONS: &[(&str, RelationKey)] = &[
    ("wife", RelationKey::Spouse),
    ("husband", RelationKey::Spouse),
    ("spose", RelationKey::Spouse),
    ("dad", RelationKey::Father),
    ("mom", RelationKey::Mother),
    ("mum", RelationKey::Mother),
    ("fatehr", RelationKey::Father),
    ("motehr", RelationKey::Mother),
    ("borther", RelationKey::Brother),
    ("sisiter", RelationKey::Sister),
    ("daugther", RelationKey::Daughter),
    ("brothers", RelationKey::Brother),
    ("sisters", RelationKey::Sister),
    ("sons", RelationKey::Son),
    ("daughters", RelationKey::Daughter),
];

/// Relatives outside the nuclear and grandparent lines.
const COLLATERAL_RELATIONS: &[&str] = &[
    "uncle",
    "aunt",
    "cousin",
    "nephew",
    "niece",
    "uncle_paternal",
    "uncle_maternal",
    "aunt_paternal",
    "aunt_maternal",
];

/// Outcome of checking one `family` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResolution {
    /// An allowed key, possibly after correction.
    Family { key: RelationKey, corrected: bool },
    /// A collateral relative, to be stored in `others` under this label.
    Collateral(String),
    /// Unknown or ambiguous; dropped.
    Rejected,
}

/// Classify a raw `family` key.
pub fn resolve_relation_key(raw: &str) -> KeyResolution {
    let normalized = raw.trim().to_lowercase().replace([' ', '-'], "_");

    if let Some(key) = RelationKey::from_exact(&normalized) {
        return KeyResolution::Family {
            key,
            corrected: normalized != raw,
        };
    }
    if let Some((_, key)) = KEY_CORRECTIONS.iter().find(|(alias, _)| *alias == normalized) {
        return KeyResolution::Family {
            key: *key,
            corrected: true,
        };
    }
    if COLLATERAL_RELATIONS.contains(&normalized.as_str()) {
        return KeyResolution::Collateral(normalized);
    }
    KeyResolution::Rejected
}

/// A family member or friend: optional name plus free-text facts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub info: Vec<String>,
}

impl PersonEntry {
    pub fn new(name: Option<&str>, info: &[&str]) -> Self {
        Self {
            name: name.map(str::to_string),
            info: info.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.info.is_empty()
    }
}

/// Someone outside the family key set, labelled with their relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherEntry {
    #[serde(default)]
    pub name: Option<String>,
    pub relation: String,
    #[serde(default)]
    pub info: Vec<String>,
}

/// A stored `family` value. Single keys hold one person, array keys a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FamilyEntry {
    Many(Vec<PersonEntry>),
    Single(PersonEntry),
}

/// `social_context` as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationGraph {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub family: BTreeMap<RelationKey, FamilyEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub friends: Vec<PersonEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub others: Vec<OtherEntry>,
}

impl RelationGraph {
    pub fn is_empty(&self) -> bool {
        self.family.is_empty() && self.friends.is_empty() && self.others.is_empty()
    }

    pub fn single(&self, key: RelationKey) -> Option<&PersonEntry> {
        match self.family.get(&key) {
            Some(FamilyEntry::Single(person)) => Some(person),
            _ => None,
        }
    }

    pub fn many(&self, key: RelationKey) -> &[PersonEntry] {
        match self.family.get(&key) {
            Some(FamilyEntry::Many(people)) => people,
            _ => &[],
        }
    }
}

/// What the oracle asked for on one relation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationEvent {
    Add,
    Update,
    Delete,
}

/// One proposed change to a family entry.
///
/// `event` is absent in extraction output; at merge time a missing event
/// means UPDATE, which adds when nothing matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationOp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<RelationEvent>,
    #[serde(flatten)]
    pub entry: PersonEntry,
}

impl RelationOp {
    pub fn event_or_default(&self) -> RelationEvent {
        self.event.unwrap_or(RelationEvent::Update)
    }
}

/// Ops proposed under one raw family key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FamilyPayload {
    One(RelationOp),
    Many(Vec<RelationOp>),
}

impl FamilyPayload {
    pub fn into_ops(self) -> Vec<RelationOp> {
        match self {
            FamilyPayload::One(op) => vec![op],
            FamilyPayload::Many(ops) => ops,
        }
    }
}

/// `social_context` as proposed by the oracle, validated but not yet merged.
///
/// Family keys stay raw here; they are resolved during the merge so that
/// corrections and collateral redirects happen in one place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelationGraphUpdate {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub family: BTreeMap<String, FamilyPayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub friends: Vec<PersonEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub others: Vec<OtherEntry>,
}

impl RelationGraphUpdate {
    pub fn is_empty(&self) -> bool {
        self.family.is_empty() && self.friends.is_empty() && self.others.is_empty()
    }
}
