//! Credential store: persistence of users, accounts, sessions, categories and
//! business profiles behind the [`CredentialStore`] trait.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod repo_types;

use repo_types::{
    Account, Business, BusinessFields, Category, NewAccount, NewCategory, NewSession, NewUser,
    Session, User, UserPatch, UserType,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("duplicate value violates unique constraint: {constraint}")]
    Conflict { constraint: String },

    #[error("record not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::Conflict {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                }
            }
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    // users
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    /// Users with this email, oldest first, optionally restricted to one user type.
    async fn find_users_by_email(
        &self,
        email: &str,
        usertype: Option<UserType>,
    ) -> StoreResult<Vec<User>>;
    /// Whether (email, usertype) is taken by a user other than `exclude`.
    async fn email_taken(
        &self,
        email: &str,
        usertype: UserType,
        exclude: Option<Uuid>,
    ) -> StoreResult<bool>;
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<Option<User>>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;

    /// Inserts the user, its local account and its category links atomically.
    async fn create_local_user(
        &self,
        user: NewUser,
        password_hash: String,
        categories: &[NewCategory],
    ) -> StoreResult<(User, Vec<Category>)>;

    // accounts
    async fn insert_account(&self, account: NewAccount) -> StoreResult<Account>;
    async fn find_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<Option<Account>>;
    async fn find_local_account(&self, user_id: Uuid) -> StoreResult<Option<Account>>;
    /// Replaces the hash of the user's local account; false when there is none.
    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> StoreResult<bool>;
    async fn delete_account(&self, provider: &str, provider_account_id: &str)
        -> StoreResult<bool>;

    // sessions
    async fn insert_session(&self, session: NewSession) -> StoreResult<Session>;
    async fn find_session_with_user(&self, token: &str) -> StoreResult<Option<(Session, User)>>;
    async fn update_session_expiry(
        &self,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<Option<Session>>;
    async fn delete_session(&self, token: &str) -> StoreResult<bool>;

    // categories
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;
    /// Resolves every input to its row, inserting missing slugs. Output follows input order.
    async fn upsert_categories(&self, categories: &[NewCategory]) -> StoreResult<Vec<Category>>;
    /// Upserts, then replaces every link of the user in one transaction.
    async fn replace_user_categories(
        &self,
        user_id: Uuid,
        categories: &[NewCategory],
    ) -> StoreResult<Vec<Category>>;
    async fn clear_user_categories(&self, user_id: Uuid) -> StoreResult<()>;
    async fn user_categories(&self, user_id: Uuid) -> StoreResult<Vec<Category>>;

    // business
    async fn find_business(&self, user_id: Uuid) -> StoreResult<Option<Business>>;
    async fn insert_business(&self, user_id: Uuid, fields: BusinessFields)
        -> StoreResult<Business>;
    /// Updates the row only when it belongs to `user_id`.
    async fn update_business(
        &self,
        id: Uuid,
        user_id: Uuid,
        fields: BusinessFields,
    ) -> StoreResult<Option<Business>>;
}

/// Orders `rows` to follow `wanted` by slug. Slugs without a row are skipped.
pub(crate) fn order_by_slugs(wanted: &[NewCategory], rows: Vec<Category>) -> Vec<Category> {
    wanted
        .iter()
        .filter_map(|c| rows.iter().find(|r| r.slug == c.slug).cloned())
        .collect()
}
