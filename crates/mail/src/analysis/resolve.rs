//! Field resolution for urgency and summary

use log::debug;

use super::keys::{SUMMARY_BLOCK, SUMMARY_SUBJECT, URGENCY_BLOCK, URGENCY_FIELD};
use crate::models::{Email, Urgency};

/// Urgency level recorded in the analysis, if any
///
/// Each level of the lookup tries both spellings independently, so a payload
/// may mix simplified and traditional keys. Missing sections, empty lists,
/// missing fields and unknown labels all resolve to `None`.
pub fn resolve_urgency(email: &Email) -> Option<Urgency> {
    let label = URGENCY_BLOCK.first_field(&URGENCY_FIELD, &email.analysis_json)?;
    let urgency = Urgency::from_label(label);
    if urgency.is_none() {
        debug!("Email {} has unrecognized urgency label {:?}", email.id, label);
    }
    urgency
}

/// Display summary: the analyzed subject, else the raw subject
pub fn resolve_summary(email: &Email) -> &str {
    SUMMARY_BLOCK
        .first_field(&SUMMARY_SUBJECT, &email.analysis_json)
        .unwrap_or(email.subject.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisPayload;

    fn email_with(payload: AnalysisPayload) -> Email {
        Email::builder("1").subject("Raw subject").analysis(payload).build()
    }

    #[test]
    fn test_simplified_keys() {
        let email = email_with(
            AnalysisPayload::new()
                .with_entry("邮件紧急程度评估", [("- **紧急程度**", "高")])
                .with_entry("邮件摘要", [("**主题**", "Quarterly review")]),
        );
        assert_eq!(resolve_urgency(&email), Some(Urgency::High));
        assert_eq!(resolve_summary(&email), "Quarterly review");
    }

    #[test]
    fn test_traditional_keys_match_simplified() {
        let simplified = email_with(
            AnalysisPayload::new()
                .with_entry("邮件紧急程度评估", [("- **紧急程度**", "中")])
                .with_entry("邮件摘要", [("**主题**", "会议通知")]),
        );
        let traditional = email_with(
            AnalysisPayload::new()
                .with_entry("郵件緊急程度評估", [("- **緊急程度**", "中")])
                .with_entry("郵件摘要", [("**主題**", "会议通知")]),
        );
        assert_eq!(resolve_urgency(&simplified), resolve_urgency(&traditional));
        assert_eq!(resolve_summary(&simplified), resolve_summary(&traditional));
    }

    #[test]
    fn test_mixed_variants_across_levels() {
        let email = email_with(
            AnalysisPayload::new()
                .with_entry("郵件緊急程度評估", [("- **紧急程度**", "低")])
                .with_entry("邮件摘要", [("**主題**", "Mixed")]),
        );
        assert_eq!(resolve_urgency(&email), Some(Urgency::Low));
        assert_eq!(resolve_summary(&email), "Mixed");
    }

    #[test]
    fn test_missing_pieces_resolve_to_absent() {
        assert_eq!(resolve_urgency(&email_with(AnalysisPayload::new())), None);

        let empty_block = email_with(AnalysisPayload::from(std::collections::BTreeMap::from([(
            "邮件紧急程度评估".to_string(),
            Vec::new(),
        )])));
        assert_eq!(resolve_urgency(&empty_block), None);

        let no_field = email_with(AnalysisPayload::new().with_entry("邮件紧急程度评估", [("**评估**", "x")]));
        assert_eq!(resolve_urgency(&no_field), None);

        let unknown = email_with(AnalysisPayload::new().with_entry("邮件紧急程度评估", [("- **紧急程度**", "很高")]));
        assert_eq!(resolve_urgency(&unknown), None);
    }

    #[test]
    fn test_empty_field_falls_through_to_other_spelling() {
        let email = email_with(AnalysisPayload::new().with_entry(
            "邮件摘要",
            [("**主题**", ""), ("**主題**", "Traditional wins")],
        ));
        assert_eq!(resolve_summary(&email), "Traditional wins");
    }

    #[test]
    fn test_summary_falls_back_to_subject() {
        let email = email_with(AnalysisPayload::new().with_entry("邮件摘要", [("**发件人**", "bob")]));
        assert_eq!(resolve_summary(&email), "Raw subject");
    }

    #[test]
    fn test_only_first_entry_is_consulted() {
        let email = email_with(
            AnalysisPayload::new()
                .with_entry("邮件紧急程度评估", [("**评估**", "none")])
                .with_entry("邮件紧急程度评估", [("- **紧急程度**", "高")]),
        );
        assert_eq!(resolve_urgency(&email), None);
    }
}
