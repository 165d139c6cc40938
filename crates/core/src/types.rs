use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Administrator account that owns an ordered collection of policies.
///
/// The admin is the unit of persistence: every policy mutation rewrites the
/// whole aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub tenant_id: String,
    pub policies: Vec<PolicyRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of an admin returned after register/login.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub tenant_id: String,
}

impl From<&Admin> for AdminProfile {
    fn from(admin: &Admin) -> Self {
        Self {
            id: admin.id,
            name: admin.name.clone(),
            email: admin.email.clone(),
            tenant_id: admin.tenant_id.clone(),
        }
    }
}

/// Insurance policy embedded in an [`Admin`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub insurance_type: String,
    pub insurance_company: String,
    pub policy_number: String,
    pub policy_start_date: DateTime<Utc>,
    pub policy_end_date: DateTime<Utc>,
    pub premium_amount: f64,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Communication log entry attached to a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub status: MessageStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Pending,
    Sent,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload accepted when creating a policy. Every field but `messages` is required.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPolicy {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub insurance_type: String,
    pub insurance_company: String,
    pub policy_number: String,
    #[serde(deserialize_with = "deserialize_instant")]
    pub policy_start_date: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_instant")]
    pub policy_end_date: DateTime<Utc>,
    pub premium_amount: f64,
    #[serde(default)]
    pub messages: Option<Vec<NewMessage>>,
}

/// Message supplied alongside a new policy; missing fields are filled in on creation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub content: String,
    #[serde(default)]
    pub status: Option<MessageStatus>,
    #[serde(default, deserialize_with = "deserialize_optional_instant")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl NewMessage {
    pub fn into_message(self, now: DateTime<Utc>) -> Message {
        Message {
            content: self.content,
            status: self.status.unwrap_or_default(),
            sent_at: self.sent_at.unwrap_or(now),
        }
    }
}

/// Partial update applied by a renewal. Absent (or `null`) fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub insurance_type: Option<String>,
    #[serde(default)]
    pub insurance_company: Option<String>,
    #[serde(default)]
    pub policy_number: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_instant")]
    pub policy_start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_instant")]
    pub policy_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub premium_amount: Option<f64>,
    #[serde(default)]
    pub messages: Option<Vec<NewMessage>>,
}

impl PolicyPatch {
    /// Overwrites every field of `record` that is present in the patch.
    ///
    /// No invariant is re-checked here: a patch may introduce a duplicate
    /// policy number or an end date before the start date. Replacement
    /// messages get the same defaults as on creation.
    pub fn apply_to(self, record: &mut PolicyRecord, now: DateTime<Utc>) {
        if let Some(value) = self.name {
            record.name = value;
        }
        if let Some(value) = self.email {
            record.email = value;
        }
        if let Some(value) = self.phone_number {
            record.phone_number = value;
        }
        if let Some(value) = self.insurance_type {
            record.insurance_type = value;
        }
        if let Some(value) = self.insurance_company {
            record.insurance_company = value;
        }
        if let Some(value) = self.policy_number {
            record.policy_number = value;
        }
        if let Some(value) = self.policy_start_date {
            record.policy_start_date = value;
        }
        if let Some(value) = self.policy_end_date {
            record.policy_end_date = value;
        }
        if let Some(value) = self.premium_amount {
            record.premium_amount = value;
        }
        if let Some(value) = self.messages {
            record.messages = value
                .into_iter()
                .map(|message| message.into_message(now))
                .collect();
        }
    }
}

/// Parses either an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (taken as UTC midnight).
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Some(value.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn deserialize_instant<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_instant(&raw).ok_or_else(|| D::Error::custom(format!("invalid date: {raw}")))
}

fn deserialize_optional_instant<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(value) => parse_instant(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid date: {value}"))),
    }
}
