//! Urgency levels assigned by the analyzer

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Three-level urgency classification
///
/// Serialized with the analyzer's labels (`高`, `中`, `低`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Urgency {
    #[serde(rename = "高")]
    High,
    #[serde(rename = "中")]
    Medium,
    #[serde(rename = "低")]
    Low,
}

impl Urgency {
    pub const ALL: [Urgency; 3] = [Urgency::High, Urgency::Medium, Urgency::Low];

    /// Label used in analysis payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::High => "高",
            Urgency::Medium => "中",
            Urgency::Low => "低",
        }
    }

    /// Parse an analysis label; anything unrecognized is absent
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "高" => Some(Urgency::High),
            "中" => Some(Urgency::Medium),
            "低" => Some(Urgency::Low),
            _ => None,
        }
    }

    /// Sort rank: most urgent first, absent last
    pub fn rank(urgency: Option<Urgency>) -> u8 {
        match urgency {
            Some(Urgency::High) => 1,
            Some(Urgency::Medium) => 2,
            Some(Urgency::Low) => 3,
            None => 4,
        }
    }

    /// Next level for the manual urgency control: absent -> 低 -> 中 -> 高 -> 低
    pub fn next_assigned(current: Option<Urgency>) -> Urgency {
        match current {
            None | Some(Urgency::High) => Urgency::Low,
            Some(Urgency::Low) => Urgency::Medium,
            Some(Urgency::Medium) => Urgency::High,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no urgency level
#[derive(Debug, thiserror::Error)]
#[error("unknown urgency level: {0:?} (expected high/medium/low or 高/中/低)")]
pub struct ParseUrgencyError(pub String);

impl FromStr for Urgency {
    type Err = ParseUrgencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(urgency) = Urgency::from_label(s) {
            return Ok(urgency);
        }
        match s.trim().to_lowercase().as_str() {
            "high" | "h" => Ok(Urgency::High),
            "medium" | "med" | "m" => Ok(Urgency::Medium),
            "low" | "l" => Ok(Urgency::Low),
            _ => Err(ParseUrgencyError(s.to_string())),
        }
    }
}
