use crate::models::{Citation, Product};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[([A-Za-z0-9_]+)\]").unwrap())
}

/// Extracts `[field]` references from a model answer.
///
/// Only identifiers naming a product attribute are kept, each once, in the
/// order they first appear in `answer`. Anything else in brackets is ignored.
///
/// # Example
///
/// ```rust,ignore
/// let citations = extract_citations("APR is 9% [rate_apr] and unknown [bogus_field]", &product);
/// assert_eq!(citations[0].field, "rate_apr");
/// ```
pub fn extract_citations(answer: &str, product: &Product) -> Vec<Citation> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut citations = Vec::new();

    for caps in citation_pattern().captures_iter(answer) {
        let field = &caps[1];
        if seen.contains(field) {
            continue;
        }
        if let Some(value) = product.field_value(field) {
            seen.insert(field.to_string());
            citations.push(Citation {
                field: field.to_string(),
                value,
            });
        }
    }

    citations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DisbursalSpeed, DocsLevel, LoanType};
    use crate::prompt::FALLBACK_ANSWER;
    use serde_json::{json, Map};
    use uuid::Uuid;

    fn product() -> Product {
        Product {
            id: Uuid::nil(),
            name: "Flexi Loan".to_string(),
            bank: "HDFC".to_string(),
            loan_type: LoanType::Personal,
            rate_apr: 9.0,
            min_income: 20000.0,
            min_credit_score: 710,
            tenure_min_months: 12,
            tenure_max_months: 48,
            processing_fee_pct: 1.0,
            prepayment_allowed: false,
            disbursal_speed: DisbursalSpeed::Fast,
            docs_level: DocsLevel::Minimal,
            limited_offer: true,
            summary: None,
            faq: vec![],
            terms: Map::new(),
            created_at: None,
        }
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let citations = extract_citations(
            "APR is 9% [rate_apr] and unknown [bogus_field]",
            &product(),
        );
        assert_eq!(
            citations,
            vec![Citation {
                field: "rate_apr".to_string(),
                value: json!(9.0),
            }]
        );
    }

    #[test]
    fn test_order_of_first_appearance_and_dedup() {
        let citations = extract_citations(
            "Fee [processing_fee_pct], APR [rate_apr], again [processing_fee_pct] and [bank]",
            &product(),
        );
        let fields: Vec<&str> = citations.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["processing_fee_pct", "rate_apr", "bank"]);
        assert_eq!(citations[2].value, json!("HDFC"));
    }

    #[test]
    fn test_non_identifier_brackets_ignored() {
        let citations = extract_citations(
            "See [rate apr], [rate-apr], [] and [[docs_level]]",
            &product(),
        );
        let fields: Vec<&str> = citations.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["docs_level"]);
        assert_eq!(citations[0].value, json!("minimal"));
    }

    #[test]
    fn test_field_names_are_case_sensitive() {
        assert!(extract_citations("[RATE_APR]", &product()).is_empty());
    }

    #[test]
    fn test_missing_summary_cites_null() {
        let citations = extract_citations("[summary]", &product());
        assert_eq!(citations[0].value, serde_json::Value::Null);
    }

    #[test]
    fn test_fallback_answer_has_no_citations() {
        assert!(extract_citations(FALLBACK_ANSWER, &product()).is_empty());
    }
}
