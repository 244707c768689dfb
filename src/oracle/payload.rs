//! Schema validation of oracle output.
//!
//! Untyped JSON from the oracle is turned into the typed payloads in
//! [`crate::profile::operations`] here and nowhere else. Entries that do not
//! fit the schema are dropped one by one and described in the returned issue
//! list, so a single bad item never sinks the rest of the reply.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::oracle::json::kind;
use crate::profile::operations::{
    DeltaProfile, OperationSet, ProfileDelta, TraitDraft, TraitOperation, TraitUpdate,
};
use crate::profile::relations::{
    FamilyPayload, OtherEntry, PersonEntry, RelationEvent, RelationGraphUpdate, RelationOp,
};
use crate::profile::{
    BasicInfo, Degree, Evidence, LearningPreferences, Surrogate, TraitCategory, evidence,
};

/// Degree used when the oracle proposes a new item without one.
pub const FALLBACK_DEGREE: i64 = 3;

const BASIC_INFO: &str = "basic_info";
const ADDITIONAL_PROFILE: &str = "additional_profile";

/// Parse the extract call's reply.
pub fn parse_delta(root: &Map<String, Value>, now: DateTime<Utc>) -> (ProfileDelta, Vec<String>) {
    let mut issues = Vec::new();
    let mut delta = ProfileDelta {
        basic_info: parse_basic_info(root.get(BASIC_INFO), &mut issues),
        additional_profile: DeltaProfile::default(),
    };

    for (key, value) in additional_entries(root, &mut issues) {
        match key.as_str() {
            "social_context" => {
                delta.additional_profile.social_context =
                    parse_relation_update(value, &mut issues).filter(|u| !u.is_empty());
            }
            "learning_preferences" => {
                delta.additional_profile.learning_preferences =
                    parse_learning_preferences(value, &mut issues);
            }
            other => {
                let Some(category) = trait_category(other) else {
                    issues.push(format!("unknown profile category '{other}'"));
                    continue;
                };
                let drafts = delta.additional_profile.traits_mut(category);
                for (i, item) in array_items(value, other, &mut issues).iter().enumerate() {
                    match parse_draft(item, now) {
                        Ok(draft) => drafts.push(draft),
                        Err(reason) => issues.push(format!("{other}[{i}]: {reason}")),
                    }
                }
            }
        }
    }

    (delta, issues)
}

/// Parse the decide call's reply. Dropped entries end up in `rejected`.
pub fn parse_operations(root: &Map<String, Value>, now: DateTime<Utc>) -> OperationSet {
    let mut issues = Vec::new();
    let mut ops = OperationSet {
        basic_info: parse_basic_info(root.get(BASIC_INFO), &mut issues),
        ..Default::default()
    };

    for (key, value) in additional_entries(root, &mut issues) {
        match key.as_str() {
            "social_context" => {
                ops.social_context =
                    parse_relation_update(value, &mut issues).filter(|u| !u.is_empty());
            }
            "learning_preferences" => {
                ops.learning_preferences = parse_learning_preferences(value, &mut issues);
            }
            other => {
                let Some(category) = trait_category(other) else {
                    issues.push(format!("unknown profile category '{other}'"));
                    continue;
                };
                let mut parsed = Vec::new();
                for (i, item) in array_items(value, other, &mut issues).iter().enumerate() {
                    match parse_operation(item, now) {
                        Ok(Some(op)) => parsed.push(op),
                        Ok(None) => {}
                        Err(reason) => issues.push(format!("{other}[{i}]: {reason}")),
                    }
                }
                if !parsed.is_empty() {
                    ops.traits.insert(category, parsed);
                }
            }
        }
    }

    ops.rejected = issues;
    ops
}

fn additional_entries<'a>(
    root: &'a Map<String, Value>,
    issues: &mut Vec<String>,
) -> Vec<(&'a String, &'a Value)> {
    match root.get(ADDITIONAL_PROFILE) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(map)) => map.iter().filter(|(_, v)| !v.is_null()).collect(),
        Some(other) => {
            issues.push(format!(
                "{ADDITIONAL_PROFILE} must be an object, got {}",
                kind(other)
            ));
            Vec::new()
        }
    }
}

fn trait_category(key: &str) -> Option<TraitCategory> {
    TraitCategory::ALL.into_iter().find(|c| c.as_str() == key)
}

fn array_items<'a>(value: &'a Value, field: &str, issues: &mut Vec<String>) -> &'a [Value] {
    match value {
        Value::Array(items) => items,
        other => {
            issues.push(format!("{field} must be an array, got {}", kind(other)));
            &[]
        }
    }
}

fn parse_basic_info(value: Option<&Value>, issues: &mut Vec<String>) -> BasicInfo {
    match value {
        None | Some(Value::Null) => BasicInfo::new(),
        Some(Value::Object(map)) => {
            let (info, rejected) = BasicInfo::from_json_lenient(map);
            issues.extend(rejected.into_iter().map(|r| r.to_string()));
            info
        }
        Some(other) => {
            issues.push(format!("{BASIC_INFO} must be an object, got {}", kind(other)));
            BasicInfo::new()
        }
    }
}

fn parse_learning_preferences(
    value: &Value,
    issues: &mut Vec<String>,
) -> Option<LearningPreferences> {
    let Value::Object(map) = value else {
        issues.push(format!(
            "learning_preferences must be an object, got {}",
            kind(value)
        ));
        return None;
    };
    let mut text = |key: &str| match map.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::String(_)) => None,
        Some(other) => {
            issues.push(format!("learning_preferences.{key} must be a string, got {}", kind(other)));
            None
        }
    };
    let prefs = LearningPreferences {
        preferred_time: text("preferred_time"),
        preferred_style: text("preferred_style"),
        difficulty_level: text("difficulty_level"),
    };
    (!prefs.is_empty()).then_some(prefs)
}

fn parse_draft(item: &Value, now: DateTime<Utc>) -> Result<TraitDraft, String> {
    let obj = item
        .as_object()
        .ok_or_else(|| format!("expected an object, got {}", kind(item)))?;
    let name = optional_text(obj.get("name"), "name")?.ok_or("name is required")?;
    let degree = match obj.get("degree") {
        None | Some(Value::Null) => {
            tracing::debug!(%name, "No degree proposed, using fallback");
            Degree::clamped(FALLBACK_DEGREE)
        }
        Some(v) => parse_degree(v)?,
    };
    Ok(TraitDraft {
        name,
        degree,
        evidence: parse_evidence(obj.get("evidence"), now)?,
    })
}

fn parse_operation(item: &Value, now: DateTime<Utc>) -> Result<Option<TraitOperation>, String> {
    let obj = item
        .as_object()
        .ok_or_else(|| format!("expected an object, got {}", kind(item)))?;

    let event = match obj.get("event") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.trim().to_ascii_uppercase(),
        Some(other) => return Err(format!("event must be a string, got {}", kind(other))),
    };

    match event.as_str() {
        "SKIP" | "NONE" => Ok(None),
        "ADD" => parse_draft(item, now).map(|draft| Some(TraitOperation::Add(draft))),
        "UPDATE" => {
            let surrogate = parse_surrogate(obj.get("id"))?.ok_or("UPDATE requires an id")?;
            let degree = match obj.get("degree") {
                None | Some(Value::Null) => None,
                Some(v) => Some(parse_degree(v)?),
            };
            Ok(Some(TraitOperation::Update(TraitUpdate {
                surrogate,
                name: optional_text(obj.get("name"), "name")?,
                degree,
                evidence: parse_evidence(obj.get("evidence"), now)?,
            })))
        }
        "DELETE" => {
            let surrogate = parse_surrogate(obj.get("id"))?.ok_or("DELETE requires an id")?;
            Ok(Some(TraitOperation::Delete { surrogate }))
        }
        other => Err(format!("unknown event '{other}'")),
    }
}

/// Surrogates arrive as numbers or numeric strings.
fn parse_surrogate(value: Option<&Value>) -> Result<Option<Surrogate>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| Surrogate::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| format!("id {n} is not a valid reference")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<Surrogate>()
            .map(Some)
            .map_err(|_| format!("id '{s}' is not a valid reference")),
        Some(other) => Err(format!("id must be a number, got {}", kind(other))),
    }
}

/// Degrees are clamped, never rejected, once they are numeric.
fn parse_degree(value: &Value) -> Result<Degree, String> {
    let number = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    };
    number
        .map(Degree::clamped)
        .ok_or_else(|| format!("degree must be a number, got {value}"))
}

/// Evidence texts, stamped with `now`. Any oracle-supplied timestamp is ignored.
fn parse_evidence(value: Option<&Value>, now: DateTime<Utc>) -> Result<Vec<Evidence>, String> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => return Err(format!("evidence must be an array, got {}", kind(other))),
    };
    let texts = items.iter().filter_map(|entry| {
        let text = match entry {
            Value::String(s) => s.as_str(),
            Value::Object(obj) => obj.get("text").and_then(Value::as_str)?,
            _ => return None,
        };
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    });
    Ok(evidence::stamp(texts, now))
}

fn optional_text(value: Option<&Value>, field: &str) -> Result<Option<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(other) => Err(format!("{field} must be a string, got {}", kind(other))),
    }
}

fn parse_relation_update(value: &Value, issues: &mut Vec<String>) -> Option<RelationGraphUpdate> {
    let Value::Object(map) = value else {
        issues.push(format!("social_context must be an object, got {}", kind(value)));
        return None;
    };
    let mut update = RelationGraphUpdate::default();

    match map.get("family") {
        None | Some(Value::Null) => {}
        Some(Value::Object(family)) => {
            update.family = parse_family(family, issues);
        }
        Some(other) => issues.push(format!("family must be an object, got {}", kind(other))),
    }

    if let Some(value) = map.get("friends").filter(|v| !v.is_null()) {
        for (i, item) in array_items(value, "friends", issues).iter().enumerate() {
            match parse_person(item, &["name", "info"]) {
                Ok((Some(RelationEvent::Delete), _)) => {
                    issues.push(format!("friends[{i}]: DELETE is not supported for friends"));
                }
                Ok((_, person)) if person.is_empty() => {}
                Ok((_, person)) => update.friends.push(person),
                Err(reason) => issues.push(format!("friends[{i}]: {reason}")),
            }
        }
    }

    if let Some(value) = map.get("others").filter(|v| !v.is_null()) {
        for (i, item) in array_items(value, "others", issues).iter().enumerate() {
            match parse_other(item) {
                Ok(Some(other)) => update.others.push(other),
                Ok(None) => {}
                Err(reason) => issues.push(format!("others[{i}]: {reason}")),
            }
        }
    }

    for key in map.keys() {
        if !matches!(key.as_str(), "family" | "friends" | "others") {
            issues.push(format!("social_context.{key} is not a known section"));
        }
    }

    Some(update)
}

fn parse_family(
    family: &Map<String, Value>,
    issues: &mut Vec<String>,
) -> BTreeMap<String, FamilyPayload> {
    let mut out = BTreeMap::new();
    for (key, value) in family {
        let to_op = |item: &Value| {
            parse_person(item, &["name", "info"]).map(|(event, entry)| RelationOp { event, entry })
        };
        let payload = match value {
            Value::Null => continue,
            Value::Object(_) => match to_op(value) {
                Ok(op) => FamilyPayload::One(op),
                Err(reason) => {
                    issues.push(format!("family.{key}: {reason}"));
                    continue;
                }
            },
            Value::Array(items) => {
                let mut ops = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match to_op(item) {
                        Ok(op) => ops.push(op),
                        Err(reason) => issues.push(format!("family.{key}[{i}]: {reason}")),
                    }
                }
                if ops.is_empty() {
                    continue;
                }
                FamilyPayload::Many(ops)
            }
            other => {
                issues.push(format!(
                    "family.{key} must be an object or array, got {}",
                    kind(other)
                ));
                continue;
            }
        };
        out.insert(key.clone(), payload);
    }
    out
}

/// Keys tolerated on relation entries besides the data fields.
const MARKER_KEYS: &[&str] = &["event", "id"];

/// A `{name, info}` entry with an optional event marker.
fn parse_person(
    item: &Value,
    fields: &[&str],
) -> Result<(Option<RelationEvent>, PersonEntry), String> {
    let obj = item
        .as_object()
        .ok_or_else(|| format!("expected an object, got {}", kind(item)))?;
    if let Some(extra) = obj
        .keys()
        .find(|k| !fields.contains(&k.as_str()) && !MARKER_KEYS.contains(&k.as_str()))
    {
        return Err(format!("unexpected field '{extra}'"));
    }
    let event = match obj.get("event") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(match s.trim().to_ascii_uppercase().as_str() {
            "ADD" => RelationEvent::Add,
            "UPDATE" => RelationEvent::Update,
            "DELETE" => RelationEvent::Delete,
            other => return Err(format!("unknown event '{other}'")),
        }),
        Some(other) => return Err(format!("event must be a string, got {}", kind(other))),
    };
    let entry = PersonEntry {
        name: optional_text(obj.get("name"), "name")?,
        info: parse_info(obj.get("info"))?,
    };
    Ok((event, entry))
}

fn parse_other(item: &Value) -> Result<Option<OtherEntry>, String> {
    let (event, person) = parse_person(item, &["name", "relation", "info"])?;
    if event == Some(RelationEvent::Delete) {
        return Err("DELETE is not supported for others".to_string());
    }
    let relation = item
        .get("relation")
        .map(|v| optional_text(Some(v), "relation"))
        .transpose()?
        .flatten()
        .ok_or("relation is required")?;
    if person.is_empty() {
        return Ok(None);
    }
    Ok(Some(OtherEntry {
        name: person.name,
        relation,
        info: person.info,
    }))
}

fn parse_info(value: Option<&Value>) -> Result<Vec<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.trim().to_string()]),
        Some(Value::Array(items)) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| {
                v.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| format!("info entries must be strings, got {}", kind(v)))
            })
            .filter(|r| !matches!(r, Ok(s) if s.is_empty()))
            .collect(),
        Some(other) => Err(format!("info must be an array of strings, got {}", kind(other))),
    }
}
