use crate::types::PolicyRecord;

/// Case-insensitive substring search over holder name and policy number.
///
/// An empty query matches every policy. The query is matched literally.
pub fn search<'a>(policies: &'a [PolicyRecord], query: &str) -> Vec<&'a PolicyRecord> {
    let needle = query.to_lowercase();
    policies
        .iter()
        .filter(|policy| {
            policy.name.to_lowercase().contains(&needle)
                || policy.policy_number.to_lowercase().contains(&needle)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn policy(name: &str, number: &str) -> PolicyRecord {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        PolicyRecord {
            id: Uuid::new_v4(),
            name: name.into(),
            email: "holder@example.com".into(),
            phone_number: "+15550100".into(),
            insurance_type: "Home".into(),
            insurance_company: "Acme".into(),
            policy_number: number.into(),
            policy_start_date: at,
            policy_end_date: at,
            premium_amount: 100.0,
            messages: Vec::new(),
        }
    }

    fn numbers<'a>(found: &[&'a PolicyRecord]) -> Vec<&'a str> {
        found.iter().map(|p| p.policy_number.as_str()).collect()
    }

    #[test]
    fn empty_query_matches_everything() {
        let policies = vec![policy("Jane Doe", "A-1"), policy("John Roe", "B-2")];
        assert_eq!(search(&policies, "").len(), 2);
    }

    #[test]
    fn matches_name_case_insensitively() {
        let policies = vec![policy("Jane Doe", "A-1"), policy("John Roe", "B-2")];
        assert_eq!(numbers(&search(&policies, "jAnE")), vec!["A-1"]);
    }

    #[test]
    fn matches_policy_number_substring() {
        let policies = vec![policy("Jane Doe", "AUTO-2025-17"), policy("John Roe", "HOME-9")];
        assert_eq!(numbers(&search(&policies, "2025")), vec!["AUTO-2025-17"]);
        assert_eq!(numbers(&search(&policies, "home")), vec!["HOME-9"]);
    }

    #[test]
    fn preserves_collection_order() {
        let policies = vec![
            policy("Ann Smith", "3"),
            policy("Bob Smith", "1"),
            policy("Cy Jones", "2"),
        ];
        assert_eq!(numbers(&search(&policies, "smith")), vec!["3", "1"]);
    }

    #[test]
    fn metacharacters_are_literal() {
        let policies = vec![policy("Jane Doe", "A.1"), policy("John Roe", "AX1")];
        assert_eq!(numbers(&search(&policies, "a.1")), vec!["A.1"]);
        assert!(search(&policies, "(").is_empty());
    }
}
