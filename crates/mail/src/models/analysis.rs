//! Structured analysis attached to each email
//!
//! The analyzer emits markdown which the backend breaks into sections of
//! bullet entries. Section and field names are Chinese and arrive in either
//! simplified or traditional script, so nothing here assumes a spelling.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One bullet entry of a section: field name -> text
pub type AnalysisEntry = BTreeMap<String, String>;

/// Analysis payload: section name -> entries
///
/// Deserialization is lenient. Anything that is not a list of flat objects is
/// dropped with a warning instead of failing the whole email.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct AnalysisPayload(BTreeMap<String, Vec<AnalysisEntry>>);

impl AnalysisPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry to a section, creating the section when needed
    pub fn with_entry<K, V>(mut self, section: &str, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let entry = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.0.entry(section.to_string()).or_default().push(entry);
        self
    }

    pub fn section(&self, key: &str) -> Option<&[AnalysisEntry]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn section_mut(&mut self, key: &str) -> Option<&mut Vec<AnalysisEntry>> {
        self.0.get_mut(key)
    }

    /// Section under `key`, inserted empty when missing
    pub fn section_or_default(&mut self, key: &str) -> &mut Vec<AnalysisEntry> {
        self.0.entry(key.to_string()).or_default()
    }

    /// Replace a whole section
    pub fn insert_section(&mut self, key: impl Into<String>, entries: Vec<AnalysisEntry>) {
        self.0.insert(key.into(), entries);
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &[AnalysisEntry])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All field values, for text matching
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0
            .values()
            .flatten()
            .flat_map(|entry| entry.values().map(String::as_str))
    }
}

impl From<BTreeMap<String, Vec<AnalysisEntry>>> for AnalysisPayload {
    fn from(sections: BTreeMap<String, Vec<AnalysisEntry>>) -> Self {
        Self(sections)
    }
}

impl From<Value> for AnalysisPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::default(),
            // Rows straight from the database carry the payload as a JSON string
            Value::String(text) if text.trim().is_empty() => Self::default(),
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(inner @ Value::Object(_)) => Self::from(inner),
                Ok(_) | Err(_) => {
                    warn!("Ignoring analysis payload that is not a JSON object");
                    Self::default()
                }
            },
            Value::Object(map) => {
                let mut sections = BTreeMap::new();
                for (key, section) in map {
                    match section {
                        Value::Array(items) => {
                            sections.insert(key, items.into_iter().filter_map(entry_from_value).collect());
                        }
                        other => warn!("Ignoring analysis section {key:?}: expected a list, got {other}"),
                    }
                }
                Self(sections)
            }
            other => {
                warn!("Ignoring analysis payload of unexpected shape: {other}");
                Self::default()
            }
        }
    }
}

fn entry_from_value(value: Value) -> Option<AnalysisEntry> {
    let Value::Object(fields) = value else {
        warn!("Ignoring analysis entry that is not an object");
        return None;
    };

    let entry = fields
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s)),
            Value::Number(n) => Some((key, n.to_string())),
            Value::Bool(b) => Some((key, b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        })
        .collect();
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_nested_payload() {
        let json = r#"{
            "邮件摘要": [{"**主题**": "Weekly report", "**发件人**": "bob"}],
            "邮件紧急程度评估": [{"**评估**": "", "- **紧急程度**": "高"}]
        }"#;
        let payload: AnalysisPayload = serde_json::from_str(json).unwrap();

        let summary = payload.section("邮件摘要").unwrap();
        assert_eq!(summary[0]["**主题**"], "Weekly report");
        assert_eq!(payload.section("邮件紧急程度评估").unwrap()[0]["- **紧急程度**"], "高");
    }

    #[test]
    fn test_deserialize_payload_encoded_as_string() {
        let json = r#""{\"郵件摘要\": [{\"**主題**\": \"会议\"}]}""#;
        let payload: AnalysisPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.section("郵件摘要").unwrap()[0]["**主題**"], "会议");
    }

    #[test]
    fn test_malformed_sections_are_dropped() {
        let json = r#"{
            "good": [{"a": "1"}, "stray", {"n": 3, "nested": {"x": 1}}],
            "bad": "not a list"
        }"#;
        let payload: AnalysisPayload = serde_json::from_str(json).unwrap();

        let good = payload.section("good").unwrap();
        assert_eq!(good.len(), 2);
        assert_eq!(good[1]["n"], "3");
        assert!(!good[1].contains_key("nested"));
        assert!(payload.section("bad").is_none());
    }

    #[test]
    fn test_null_and_garbage_become_empty() {
        let payload: AnalysisPayload = serde_json::from_str("null").unwrap();
        assert!(payload.is_empty());

        let payload: AnalysisPayload = serde_json::from_str(r#""not json""#).unwrap();
        assert!(payload.is_empty());

        let payload: AnalysisPayload = serde_json::from_str("[1, 2]").unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let payload = AnalysisPayload::new().with_entry("邮件摘要", [("**主题**", "Hi")]);
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"邮件摘要":[{"**主题**":"Hi"}]}"#);
    }
}
