//! Label record types

use label_printer::LabelContent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Material name, printed as the headline
pub const FIELD_NAME: &str = "name";
/// Paragraph printed under the headline
pub const FIELD_DESCRIPTION: &str = "description";

/// Ordered label content fields
///
/// Keys keep their insertion order; setting an existing key replaces the
/// value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelFields(Vec<(String, String)>);

impl LabelFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(idx).1)
    }

    /// Apply every entry of `other` on top of these fields
    pub fn merge(&mut self, other: LabelFields) {
        for (k, v) in other.0 {
            self.set(k, v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = LabelFields::new();
        for (k, v) in iter {
            fields.set(k, v);
        }
        fields
    }
}

/// One stored label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRecord {
    /// Unique, generated, never edited
    pub code: String,
    /// Unix milliseconds (UTC)
    pub created_at: i64,
    pub fields: LabelFields,
}

impl LabelRecord {
    pub fn name(&self) -> Option<&str> {
        self.fields.get(FIELD_NAME)
    }

    pub fn description(&self) -> Option<&str> {
        self.fields.get(FIELD_DESCRIPTION)
    }

    /// Map the record onto the fixed label layout
    ///
    /// The name becomes the headline (the code when there is no name),
    /// every field other than name and description is appended as a
    /// `key: value` line and the code goes in the footer.
    pub fn to_content(&self, tag: Option<LabelTag>) -> LabelContent {
        let headline = self
            .name()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.code)
            .to_string();

        let extra_lines = self
            .fields
            .iter()
            .filter(|(k, v)| *k != FIELD_NAME && *k != FIELD_DESCRIPTION && !v.trim().is_empty())
            .map(|(k, v)| format!("{}: {}", k, v.trim()))
            .collect();

        LabelContent {
            headline,
            tag: tag.map(|t| t.to_string()),
            description: self.description().unwrap_or_default().trim().to_string(),
            extra_lines,
            footer: Some(self.code.clone()),
            issued_at: self.created_at,
        }
    }
}

/// Secondary tag printed under the headline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelTag {
    Scrap,
    Regrind,
}

impl fmt::Display for LabelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelTag::Scrap => write!(f, "Scrap"),
            LabelTag::Regrind => write!(f, "Regrind"),
        }
    }
}

impl FromStr for LabelTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scrap" => Ok(LabelTag::Scrap),
            "regrind" => Ok(LabelTag::Regrind),
            other => Err(format!("unknown tag '{}' (expected scrap or regrind)", other)),
        }
    }
}
