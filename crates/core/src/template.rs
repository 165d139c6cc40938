use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::PolicyRecord;

/// Formats a date as `Www Mmm DD YYYY`, e.g. `Wed Jun 11 2025`.
pub fn display_date(value: DateTime<Utc>) -> String {
    value.format("%a %b %d %Y").to_string()
}

/// SMS-ready renewal reminder. Delivery is left to an external gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsReminder {
    pub phone_number: String,
    pub message: String,
}

pub fn sms_reminder(policy: &PolicyRecord) -> SmsReminder {
    SmsReminder {
        phone_number: policy.phone_number.clone(),
        message: format!(
            "Hello {}, please remember to renew your {} policy (Policy No: {}). It expires on {}.",
            policy.name,
            policy.insurance_type,
            policy.policy_number,
            display_date(policy.policy_end_date)
        ),
    }
}

/// Labelled rows shown on a policy report, in display order.
pub fn report_fields(policy: &PolicyRecord) -> Vec<(&'static str, String)> {
    vec![
        ("Name", policy.name.clone()),
        ("Email", policy.email.clone()),
        ("Phone", policy.phone_number.clone()),
        ("Insurance Type", policy.insurance_type.clone()),
        ("Insurance Company", policy.insurance_company.clone()),
        ("Policy Number", policy.policy_number.clone()),
        ("Policy Start Date", display_date(policy.policy_start_date)),
        ("Policy End Date", display_date(policy.policy_end_date)),
        ("Premium Amount", format!("${}", policy.premium_amount)),
    ]
}

/// File stem for a policy report: the holder name with whitespace runs replaced by `_`.
pub fn report_file_stem(policy: &PolicyRecord) -> String {
    let holder = policy.name.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{holder}_Policy_Report")
}
