//! Domain model for the policy desk: the admin aggregate with its embedded
//! policies, renewal notifications, search, and outbound text templates.

pub mod admin;
pub mod notification;
pub mod password;
pub mod search;
pub mod template;
pub mod types;

pub use admin::{normalize_email, PolicyError, Registration, RegistrationError};
pub use notification::{derive_notifications, Notification, NotificationFeed, NotificationStatus};
pub use types::{Admin, AdminProfile, Message, MessageStatus, NewPolicy, PolicyPatch, PolicyRecord};
