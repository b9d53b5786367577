//! Variant spellings of analysis field names

use crate::models::{AnalysisEntry, AnalysisPayload};

/// A field name that may be spelled in simplified or traditional script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantKey {
    pub simplified: &'static str,
    pub traditional: &'static str,
}

/// Urgency assessment section
pub const URGENCY_BLOCK: VariantKey = VariantKey {
    simplified: "邮件紧急程度评估",
    traditional: "郵件緊急程度評估",
};

/// Urgency level field inside the first urgency entry
pub const URGENCY_FIELD: VariantKey = VariantKey {
    simplified: "- **紧急程度**",
    traditional: "- **緊急程度**",
};

/// Summary section
pub const SUMMARY_BLOCK: VariantKey = VariantKey {
    simplified: "邮件摘要",
    traditional: "郵件摘要",
};

/// Subject line inside the first summary entry
pub const SUMMARY_SUBJECT: VariantKey = VariantKey {
    simplified: "**主题**",
    traditional: "**主題**",
};

impl VariantKey {
    /// Spellings in lookup order
    pub fn candidates(&self) -> [&'static str; 2] {
        [self.simplified, self.traditional]
    }

    /// First section present under either spelling
    ///
    /// A present-but-empty section under the simplified spelling still wins,
    /// which leaves its first entry absent.
    pub fn section<'a>(&self, payload: &'a AnalysisPayload) -> Option<&'a [AnalysisEntry]> {
        self.candidates()
            .into_iter()
            .find_map(|key| payload.section(key))
    }

    /// First non-empty field value under either spelling
    pub fn field<'a>(&self, entry: &'a AnalysisEntry) -> Option<&'a str> {
        self.candidates()
            .into_iter()
            .filter_map(|key| entry.get(key))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }

    /// The field of the first entry of this section
    pub fn first_field<'a>(&self, field: &VariantKey, payload: &'a AnalysisPayload) -> Option<&'a str> {
        self.section(payload)
            .and_then(|entries| entries.first())
            .and_then(|entry| field.field(entry))
    }
}
