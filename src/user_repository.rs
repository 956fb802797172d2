use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::postgres::PgRow;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};
use uuid::Uuid;

use crate::database::Database;

/// Defines the types of user repository errors that can occur
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    #[error("User already exists: {0}")]
    Conflict(String),
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Invalid data format: {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for UserRepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => {
                UserRepositoryError::Conflict(db_err.message().to_string())
            }
            _ => UserRepositoryError::Database(e.to_string()),
        }
    }
}

/// Local user row, keyed by the identity provider subject id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalUser {
    pub id: Uuid,
    pub subject_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub hometown: Option<String>,
    pub instrument: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LocalUser {
    /// A fresh row as the store creates it on first login
    pub fn new(subject_id: &str, email: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id: subject_id.to_string(),
            email: email.map(str::to_string),
            phone: None,
            first_name: None,
            last_name: None,
            display_name: None,
            hometown: None,
            instrument: None,
            created_at: Utc::now(),
        }
    }

    /// The one definition of a completed profile: every profile field is
    /// present and non-blank.
    pub fn profile_completed(&self) -> bool {
        [
            &self.first_name,
            &self.last_name,
            &self.display_name,
            &self.hometown,
            &self.instrument,
        ]
        .iter()
        .all(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

/// Active membership of a user in a band (read-only projection)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BandMembership {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub status: String,
}

/// Persistent store for local users and their band memberships
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_subject(&self, subject_id: &str)
    -> Result<Option<LocalUser>, UserRepositoryError>;

    /// Insert a new user. Fails with `Conflict` when the subject id is taken.
    async fn insert_user(
        &self,
        subject_id: &str,
        email: Option<&str>,
    ) -> Result<LocalUser, UserRepositoryError>;

    /// Memberships with `status = 'active'`
    async fn active_memberships(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<BandMembership>, UserRepositoryError>;
}

const USER_COLUMNS: &str = "id, cognito_id, email, phone_number, first_name, last_name, \
                            display_name, hometown, instrument, created_at";

/// PostgreSQL-backed user store
pub struct PgUserStore {
    db: Arc<Database>,
}

impl PgUserStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn pool(&self) -> Result<&sqlx::PgPool, UserRepositoryError> {
        self.db.pool().await.map_err(|e| {
            error!("Database unavailable: {:#}", e);
            UserRepositoryError::Database(format!("{:#}", e))
        })
    }
}

fn user_from_row(row: &PgRow) -> Result<LocalUser, UserRepositoryError> {
    let get = |e: sqlx::Error| UserRepositoryError::InvalidData(e.to_string());

    Ok(LocalUser {
        id: row.try_get("id").map_err(get)?,
        subject_id: row.try_get("cognito_id").map_err(get)?,
        email: row.try_get("email").map_err(get)?,
        phone: row.try_get("phone_number").map_err(get)?,
        first_name: row.try_get("first_name").map_err(get)?,
        last_name: row.try_get("last_name").map_err(get)?,
        display_name: row.try_get("display_name").map_err(get)?,
        hometown: row.try_get("hometown").map_err(get)?,
        instrument: row.try_get("instrument").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
    })
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_subject(
        &self,
        subject_id: &str,
    ) -> Result<Option<LocalUser>, UserRepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE cognito_id = $1",
            USER_COLUMNS
        ))
        .bind(subject_id)
        .fetch_optional(self.pool().await?)
        .await
        .map_err(|e| {
            error!("Database error looking up user: {}", e);
            UserRepositoryError::from(e)
        })?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert_user(
        &self,
        subject_id: &str,
        email: Option<&str>,
    ) -> Result<LocalUser, UserRepositoryError> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (cognito_id, email, phone_number, created_at) \
             VALUES ($1, $2, NULL, NOW()) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(subject_id)
        .bind(email)
        .fetch_one(self.pool().await?)
        .await
        .map_err(UserRepositoryError::from)?;

        let user = user_from_row(&row)?;
        debug!("Created new user in database: {}", user.id);
        Ok(user)
    }

    async fn active_memberships(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<BandMembership>, UserRepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.name, ub.role, ub.status
            FROM bands b
            JOIN user_bands ub ON b.id = ub.band_id
            WHERE ub.user_id = $1 AND ub.status = 'active'
            ORDER BY b.name
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool().await?)
        .await
        .map_err(|e| {
            error!("Database error listing memberships: {}", e);
            UserRepositoryError::from(e)
        })?;

        rows.iter()
            .map(|row| {
                Ok(BandMembership {
                    id: row
                        .try_get("id")
                        .map_err(|e| UserRepositoryError::InvalidData(e.to_string()))?,
                    name: row
                        .try_get("name")
                        .map_err(|e| UserRepositoryError::InvalidData(e.to_string()))?,
                    role: row
                        .try_get("role")
                        .map_err(|e| UserRepositoryError::InvalidData(e.to_string()))?,
                    status: row
                        .try_get("status")
                        .map_err(|e| UserRepositoryError::InvalidData(e.to_string()))?,
                })
            })
            .collect()
    }
}

/// In-memory user store for development and tests
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, LocalUser>>,
    memberships: RwLock<HashMap<Uuid, Vec<BandMembership>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a membership for an existing user
    pub async fn add_membership(&self, user_id: Uuid, membership: BandMembership) {
        self.memberships
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push(membership);
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_subject(
        &self,
        subject_id: &str,
    ) -> Result<Option<LocalUser>, UserRepositoryError> {
        Ok(self.users.read().await.get(subject_id).cloned())
    }

    async fn insert_user(
        &self,
        subject_id: &str,
        email: Option<&str>,
    ) -> Result<LocalUser, UserRepositoryError> {
        let mut users = self.users.write().await;
        if users.contains_key(subject_id) {
            return Err(UserRepositoryError::Conflict(subject_id.to_string()));
        }

        let user = LocalUser::new(subject_id, email);
        users.insert(subject_id.to_string(), user.clone());
        debug!("Created new user in memory: {}", user.id);
        Ok(user)
    }

    async fn active_memberships(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<BandMembership>, UserRepositoryError> {
        Ok(self
            .memberships
            .read()
            .await
            .get(&user_id)
            .map(|all| {
                all.iter()
                    .filter(|m| m.status == "active")
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
