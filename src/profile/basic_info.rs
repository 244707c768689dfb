//! Flat reference fields kept in the scalar store.
//!
//! These values are inferred from conversation and are never authoritative.
//! Only known columns are accepted; anything else the oracle invents is dropped.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date format for `birthday`, both on the wire and in prompts.
pub const BIRTHDAY_FORMAT: &str = "%Y-%m-%d";

/// Known scalar columns, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasicInfoField {
    Name,
    Nickname,
    EnglishName,
    Birthday,
    Gender,
    Nationality,
    Hometown,
    CurrentCity,
    Timezone,
    Language,
    SchoolName,
    Grade,
    ClassName,
}

impl BasicInfoField {
    pub const ALL: [BasicInfoField; 13] = [
        BasicInfoField::Name,
        BasicInfoField::Nickname,
        BasicInfoField::EnglishName,
        BasicInfoField::Birthday,
        BasicInfoField::Gender,
        BasicInfoField::Nationality,
        BasicInfoField::Hometown,
        BasicInfoField::CurrentCity,
        BasicInfoField::Timezone,
        BasicInfoField::Language,
        BasicInfoField::SchoolName,
        BasicInfoField::Grade,
        BasicInfoField::ClassName,
    ];

    /// Column name; also the JSON key.
    pub fn column(self) -> &'static str {
        match self {
            BasicInfoField::Name => "name",
            BasicInfoField::Nickname => "nickname",
            BasicInfoField::EnglishName => "english_name",
            BasicInfoField::Birthday => "birthday",
            BasicInfoField::Gender => "gender",
            BasicInfoField::Nationality => "nationality",
            BasicInfoField::Hometown => "hometown",
            BasicInfoField::CurrentCity => "current_city",
            BasicInfoField::Timezone => "timezone",
            BasicInfoField::Language => "language",
            BasicInfoField::SchoolName => "school_name",
            BasicInfoField::Grade => "grade",
            BasicInfoField::ClassName => "class_name",
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column() == column)
    }
}

impl fmt::Display for BasicInfoField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Why a value offered for a basic-info field was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BasicInfoRejection {
    #[error("unknown basic_info field '{0}'")]
    UnknownField(String),
    #[error("basic_info.{0} must be a non-empty string")]
    NotText(BasicInfoField),
    #[error("basic_info.birthday '{0}' is not a YYYY-MM-DD date")]
    BadDate(String),
}

/// A partial set of scalar values. Absent fields are simply not present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasicInfo {
    values: BTreeMap<BasicInfoField, String>,
}

impl BasicInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: BasicInfoField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Birthday as a date. Values are validated on the way in.
    pub fn birthday(&self) -> Option<NaiveDate> {
        self.get(BasicInfoField::Birthday)
            .and_then(|s| NaiveDate::parse_from_str(s, BIRTHDAY_FORMAT).ok())
    }

    /// Set a field, normalizing whitespace and validating birthdays.
    pub fn set(
        &mut self,
        field: BasicInfoField,
        value: impl Into<String>,
    ) -> Result<(), BasicInfoRejection> {
        let value = value.into();
        let value = value.trim();
        if value.is_empty() {
            return Err(BasicInfoRejection::NotText(field));
        }
        let normalized = if field == BasicInfoField::Birthday {
            NaiveDate::parse_from_str(value, BIRTHDAY_FORMAT)
                .map_err(|_| BasicInfoRejection::BadDate(value.to_string()))?
                .format(BIRTHDAY_FORMAT)
                .to_string()
        } else {
            value.to_string()
        };
        self.values.insert(field, normalized);
        Ok(())
    }

    /// Builder-style [`set`](Self::set) for literals known to be valid.
    pub fn with(mut self, field: BasicInfoField, value: impl Into<String>) -> Self {
        if let Err(e) = self.set(field, value) {
            tracing::warn!(error = %e, "Ignoring invalid basic_info value");
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BasicInfoField, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Overlay `other` on top of `self`, field by field.
    pub fn merge_from(&mut self, other: &BasicInfo) {
        for (field, value) in other.iter() {
            self.values.insert(field, value.to_string());
        }
    }

    pub fn missing_fields(&self) -> Vec<BasicInfoField> {
        BasicInfoField::ALL
            .into_iter()
            .filter(|f| !self.values.contains_key(f))
            .collect()
    }

    /// Accept what can be accepted from an untyped JSON object.
    ///
    /// Nulls are skipped silently; every other rejected entry is reported.
    pub fn from_json_lenient(
        object: &serde_json::Map<String, serde_json::Value>,
    ) -> (Self, Vec<BasicInfoRejection>) {
        let mut info = Self::new();
        let mut rejected = Vec::new();

        for (key, value) in object {
            let Some(field) = BasicInfoField::from_column(key) else {
                if !value.is_null() {
                    rejected.push(BasicInfoRejection::UnknownField(key.clone()));
                }
                continue;
            };
            let text = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                _ => {
                    rejected.push(BasicInfoRejection::NotText(field));
                    continue;
                }
            };
            if text.trim().is_empty() {
                continue;
            }
            if let Err(e) = info.set(field, text) {
                rejected.push(e);
            }
        }

        (info, rejected)
    }
}
