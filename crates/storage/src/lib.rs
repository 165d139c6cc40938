mod policy_store;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{migrate::MigrateError, sqlite::SqlitePoolOptions, SqlitePool};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use policy_desk_core::{Admin, PolicyRecord};

pub use policy_store::{PolicyStore, PolicyStoreError};

const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle for loading and saving admin aggregates.
    pub fn admins(&self) -> AdminRepository {
        AdminRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns the policy operations scoped to a single admin aggregate.
    pub fn policies(&self) -> PolicyStore {
        PolicyStore::new(self.admins())
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository persisting admin aggregates, one row per admin.
///
/// Policies live in the `policies_json` column; saving an admin rewrites the
/// whole row, so concurrent load-mutate-save cycles are last-write-wins.
#[derive(Clone)]
pub struct AdminRepository {
    pool: SqlitePool,
}

const ADMIN_COLUMNS: &str =
    "id, name, email, password_hash, tenant_id, policies_json, created_at, updated_at";

impl AdminRepository {
    /// Inserts a freshly registered admin.
    pub async fn insert(&self, admin: &Admin) -> Result<(), AdminStoreError> {
        let policies_json = serde_json::to_string(&admin.policies)?;
        sqlx::query(
            "INSERT INTO admins \
             (id, name, email, password_hash, tenant_id, policies_json, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(admin.id.to_string())
        .bind(&admin.name)
        .bind(&admin.email)
        .bind(&admin.password_hash)
        .bind(&admin.tenant_id)
        .bind(policies_json)
        .bind(to_rfc3339(admin.created_at))
        .bind(to_rfc3339(admin.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db_err) => {
                if db_err.code().as_deref() == Some(SQLITE_CONSTRAINT_UNIQUE) {
                    if db_err.message().contains("admins.tenant_id") {
                        AdminStoreError::DuplicateTenant
                    } else {
                        AdminStoreError::DuplicateEmail
                    }
                } else {
                    AdminStoreError::Database(sqlx::Error::Database(db_err))
                }
            }
            other => AdminStoreError::Database(other),
        })?;

        debug!(stage = "storage", admin_id = %admin.id, tenant_id = %admin.tenant_id, "admin inserted");
        Ok(())
    }

    /// Loads an admin by identifier.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Admin>, AdminStoreError> {
        let row = sqlx::query_as::<_, AdminRow>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admins WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(AdminRow::into_domain).transpose()
    }

    /// Loads an admin by email; the column collates case-insensitively.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Admin>, AdminStoreError> {
        let row = sqlx::query_as::<_, AdminRow>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admins WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AdminRow::into_domain).transpose()
    }

    /// Persists the whole aggregate, including every embedded policy, in one statement.
    pub async fn save(&self, admin: &Admin) -> Result<(), AdminStoreError> {
        let policies_json = serde_json::to_string(&admin.policies)?;
        let result = sqlx::query(
            "UPDATE admins \
             SET name = ?, email = ?, password_hash = ?, policies_json = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&admin.name)
        .bind(&admin.email)
        .bind(&admin.password_hash)
        .bind(policies_json)
        .bind(to_rfc3339(admin.updated_at))
        .bind(admin.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AdminStoreError::NotFound);
        }

        debug!(
            stage = "storage",
            admin_id = %admin.id,
            policies = admin.policies.len(),
            "admin saved"
        );
        Ok(())
    }
}

/// Errors that can occur while loading or persisting admins.
#[derive(Debug, Error)]
pub enum AdminStoreError {
    #[error("an admin with this email already exists")]
    DuplicateEmail,
    #[error("tenant identifier is already assigned")]
    DuplicateTenant,
    #[error("admin not found")]
    NotFound,
    #[error("stored admin row is corrupt: {0}")]
    Corrupt(String),
    #[error("failed to encode or decode policies json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Raw `admins` row.
#[derive(Debug, sqlx::FromRow)]
struct AdminRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    tenant_id: String,
    policies_json: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AdminRow {
    fn into_domain(self) -> Result<Admin, AdminStoreError> {
        let id = Uuid::parse_str(&self.id).map_err(|err| {
            AdminStoreError::Corrupt(format!("invalid admin id {}: {err}", self.id))
        })?;
        let policies: Vec<PolicyRecord> = serde_json::from_str(&self.policies_json)?;
        Ok(Admin {
            id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            tenant_id: self.tenant_id,
            policies,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
