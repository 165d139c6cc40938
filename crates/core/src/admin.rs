use std::sync::{Mutex, OnceLock};

use chrono::{DateTime, Utc};
use thiserror::Error;
use ulid::{Generator, Ulid};
use uuid::Uuid;

use crate::password::{self, PasswordError};
use crate::search;
use crate::types::{Admin, NewPolicy, PolicyPatch, PolicyRecord};

pub const MIN_PASSWORD_LEN: usize = 6;

static TENANT_IDS: OnceLock<Mutex<Generator>> = OnceLock::new();

/// Returns a fresh tenant identifier.
///
/// Identifiers are ULIDs produced by a process-wide monotonic generator, so
/// two calls never return the same value even within one millisecond.
pub fn next_tenant_id() -> String {
    let mut generator = TENANT_IDS
        .get_or_init(|| Mutex::new(Generator::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    generator
        .generate()
        .unwrap_or_else(|_| Ulid::new())
        .to_string()
}

/// Canonical form used to store and look up admin emails.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Sign-up request after validation and normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    pub fn new(name: &str, email: &str, password: &str) -> Result<Self, RegistrationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(RegistrationError::EmptyEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RegistrationError::PasswordTooShort);
        }

        Ok(Self {
            name: name.to_string(),
            email,
            password: password.to_string(),
        })
    }

    /// Hashes the password and builds the aggregate with a new tenant identifier.
    pub fn into_admin(self, now: DateTime<Utc>) -> Result<Admin, PasswordError> {
        let password_hash = password::hash_password(&self.password)?;
        Ok(Admin {
            id: Uuid::new_v4(),
            name: self.name,
            email: self.email,
            password_hash,
            tenant_id: next_tenant_id(),
            policies: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("email must not be empty")]
    EmptyEmail,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
}

/// Errors raised by policy operations on an admin aggregate.
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("policy number already exists: {0}")]
    DuplicatePolicyNumber(String),
    #[error("policy not found")]
    NotFound,
    #[error("invalid policy: {0}")]
    Invalid(String),
}

impl Admin {
    /// Checks a candidate password against the stored hash.
    pub fn compare_password(&self, candidate: &str) -> Result<bool, PasswordError> {
        password::verify_password(candidate, &self.password_hash)
    }

    /// Appends a new policy, rejecting policy numbers already present in this aggregate.
    pub fn add_policy(
        &mut self,
        new: NewPolicy,
        now: DateTime<Utc>,
    ) -> Result<&PolicyRecord, PolicyError> {
        if !new.premium_amount.is_finite() || new.premium_amount < 0.0 {
            return Err(PolicyError::Invalid(
                "premiumAmount must be a non-negative number".to_string(),
            ));
        }
        if self
            .policies
            .iter()
            .any(|policy| policy.policy_number == new.policy_number)
        {
            return Err(PolicyError::DuplicatePolicyNumber(new.policy_number));
        }

        let messages = new
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|message| message.into_message(now))
            .collect();

        self.policies.push(PolicyRecord {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            phone_number: new.phone_number,
            insurance_type: new.insurance_type,
            insurance_company: new.insurance_company,
            policy_number: new.policy_number,
            policy_start_date: new.policy_start_date,
            policy_end_date: new.policy_end_date,
            premium_amount: new.premium_amount,
            messages,
        });
        self.updated_at = now;

        let index = self.policies.len() - 1;
        Ok(&self.policies[index])
    }

    /// Looks a policy up by its generated identifier.
    ///
    /// Identifiers that are not valid UUIDs simply do not match.
    pub fn policy(&self, id: &str) -> Result<&PolicyRecord, PolicyError> {
        self.position_of(id)
            .map(|index| &self.policies[index])
            .ok_or(PolicyError::NotFound)
    }

    /// Returns the first policy carrying the given policy number.
    pub fn policy_by_number(&self, policy_number: &str) -> Result<&PolicyRecord, PolicyError> {
        self.policies
            .iter()
            .find(|policy| policy.policy_number == policy_number)
            .ok_or(PolicyError::NotFound)
    }

    /// Applies a blind partial overwrite to the policy with the given identifier.
    pub fn renew_policy(
        &mut self,
        id: &str,
        patch: PolicyPatch,
        now: DateTime<Utc>,
    ) -> Result<&PolicyRecord, PolicyError> {
        let index = self.position_of(id).ok_or(PolicyError::NotFound)?;
        patch.apply_to(&mut self.policies[index], now);
        self.updated_at = now;
        Ok(&self.policies[index])
    }

    /// Removes every policy with the given policy number and returns how many were dropped.
    pub fn remove_policies(&mut self, policy_number: &str, now: DateTime<Utc>) -> usize {
        let before = self.policies.len();
        self.policies.retain(|policy| policy.policy_number != policy_number);
        self.updated_at = now;
        before - self.policies.len()
    }

    pub fn search_policies(&self, query: &str) -> Vec<&PolicyRecord> {
        search::search(&self.policies, query)
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        let id = Uuid::parse_str(id).ok()?;
        self.policies.iter().position(|policy| policy.id == id)
    }
}
