use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::template::display_date;
use crate::types::PolicyRecord;

/// Policies ending within this many (ceiling-rounded) days are reported.
pub const EXPIRY_WINDOW_DAYS: i64 = 14;

const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationStatus {
    #[serde(rename = "Expiring Soon")]
    ExpiringSoon,
    #[serde(rename = "Expired")]
    Expired,
}

impl NotificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExpiringSoon => "Expiring Soon",
            Self::Expired => "Expired",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::ExpiringSoon => "Policy Expiring Soon",
            Self::Expired => "Policy Expired",
        }
    }
}

/// Renewal reminder derived from a policy's end date. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub title: &'static str,
    pub message: String,
    pub holder_name: String,
    pub due_date: DateTime<Utc>,
    pub status: NotificationStatus,
    pub dismissible: bool,
    pub popup: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationFeed {
    pub count: usize,
    pub notifications: Vec<Notification>,
}

/// Whole days until `end`, rounded up from the millisecond difference.
///
/// An end date later today yields `0`; one that passed earlier today yields
/// `0` as well, which is why expiry is decided separately by [`is_expired`].
pub fn days_until(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (end - now).num_milliseconds();
    let whole = millis.div_euclid(MILLIS_PER_DAY);
    if millis.rem_euclid(MILLIS_PER_DAY) == 0 {
        whole
    } else {
        whole + 1
    }
}

/// Exact timestamp comparison, no day truncation.
pub fn is_expired(end: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    end < now
}

/// Builds the notification feed for the given policies, preserving their order.
pub fn derive_notifications(policies: &[PolicyRecord], now: DateTime<Utc>) -> NotificationFeed {
    let notifications: Vec<Notification> = policies
        .iter()
        .filter(|policy| days_until(policy.policy_end_date, now) <= EXPIRY_WINDOW_DAYS)
        .map(|policy| notification_for(policy, now))
        .collect();

    NotificationFeed {
        count: notifications.len(),
        notifications,
    }
}

fn notification_for(policy: &PolicyRecord, now: DateTime<Utc>) -> Notification {
    let status = if is_expired(policy.policy_end_date, now) {
        NotificationStatus::Expired
    } else {
        NotificationStatus::ExpiringSoon
    };
    let message = match status {
        NotificationStatus::Expired => format!(
            "The policy for {} (Policy No: {}) has already expired.",
            policy.name, policy.policy_number
        ),
        NotificationStatus::ExpiringSoon => format!(
            "The policy for {} (Policy No: {}) will expire on {}.",
            policy.name,
            policy.policy_number,
            display_date(policy.policy_end_date)
        ),
    };

    Notification {
        id: policy.id,
        title: status.title(),
        message,
        holder_name: policy.name.clone(),
        due_date: policy.policy_end_date,
        status,
        dismissible: true,
        popup: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn policy(number: &str, end: DateTime<Utc>) -> PolicyRecord {
        PolicyRecord {
            id: Uuid::new_v4(),
            name: "Jane Doe".into(),
            email: "jane@example.com".into(),
            phone_number: "+15550100".into(),
            insurance_type: "Auto".into(),
            insurance_company: "Acme".into(),
            policy_number: number.into(),
            policy_start_date: end - Duration::days(365),
            policy_end_date: end,
            premium_amount: 250.0,
            messages: Vec::new(),
        }
    }

    #[test]
    fn days_until_rounds_up_partial_days() {
        assert_eq!(days_until(now() + Duration::days(14), now()), 14);
        assert_eq!(
            days_until(now() + Duration::days(14) + Duration::milliseconds(1), now()),
            15
        );
        assert_eq!(days_until(now() + Duration::hours(3), now()), 1);
        assert_eq!(days_until(now(), now()), 0);
        assert_eq!(days_until(now() - Duration::hours(3), now()), 0);
        assert_eq!(days_until(now() - Duration::days(5), now()), -5);
    }

    #[test]
    fn expiring_in_ten_days_is_reported() {
        let policies = vec![policy("P1", now() + Duration::days(10))];
        let feed = derive_notifications(&policies, now());

        assert_eq!(feed.count, 1);
        let notification = &feed.notifications[0];
        assert_eq!(notification.status, NotificationStatus::ExpiringSoon);
        assert_eq!(notification.title, "Policy Expiring Soon");
        assert_eq!(
            notification.message,
            "The policy for Jane Doe (Policy No: P1) will expire on Wed Jun 11 2025."
        );
        assert_eq!(notification.id, policies[0].id);
        assert!(notification.dismissible);
        assert!(notification.popup);
    }

    #[test]
    fn past_end_date_is_reported_as_expired() {
        let policies = vec![policy("P1", now() - Duration::days(5))];
        let feed = derive_notifications(&policies, now());

        assert_eq!(feed.count, 1);
        let notification = &feed.notifications[0];
        assert_eq!(notification.status, NotificationStatus::Expired);
        assert_eq!(notification.title, "Policy Expired");
        assert!(notification.message.contains("already expired"));
    }

    #[test]
    fn window_boundary_is_fourteen_days() {
        let policies = vec![
            policy("IN", now() + Duration::days(14)),
            policy("OUT", now() + Duration::days(15)),
            policy("EDGE", now() + Duration::days(14) + Duration::minutes(1)),
        ];
        let feed = derive_notifications(&policies, now());

        assert_eq!(feed.count, 1);
        assert_eq!(feed.notifications[0].id, policies[0].id);
    }

    #[test]
    fn ancient_policies_are_still_reported() {
        let policies = vec![policy("OLD", now() - Duration::days(3_650))];
        let feed = derive_notifications(&policies, now());
        assert_eq!(feed.count, 1);
        assert_eq!(feed.notifications[0].status, NotificationStatus::Expired);
    }

    #[test]
    fn same_day_split_uses_exact_timestamps() {
        let later_today = policy("LATER", now() + Duration::hours(2));
        let earlier_today = policy("EARLIER", now() - Duration::hours(2));
        let feed = derive_notifications(&[later_today, earlier_today], now());

        assert_eq!(feed.count, 2);
        assert_eq!(feed.notifications[0].status, NotificationStatus::ExpiringSoon);
        assert_eq!(feed.notifications[1].status, NotificationStatus::Expired);
    }

    #[test]
    fn order_follows_the_collection() {
        let policies = vec![
            policy("A", now() + Duration::days(12)),
            policy("B", now() - Duration::days(1)),
            policy("C", now() + Duration::days(60)),
            policy("D", now() + Duration::days(1)),
        ];
        let feed = derive_notifications(&policies, now());
        let ids: Vec<_> = feed.notifications.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![policies[0].id, policies[1].id, policies[3].id]);
    }

    #[test]
    fn serializes_with_display_status() {
        let policies = vec![policy("P1", now() - Duration::days(1))];
        let feed = derive_notifications(&policies, now());
        let value = serde_json::to_value(&feed).expect("serialize");

        assert_eq!(value["count"], 1);
        assert_eq!(value["notifications"][0]["status"], "Expired");
        assert_eq!(value["notifications"][0]["holderName"], "Jane Doe");
        assert!(value["notifications"][0]["dueDate"].is_string());
    }
}
