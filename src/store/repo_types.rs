use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{
    encode::IsNull,
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
    Decode, Encode, FromRow, Postgres, Type,
};
use time::OffsetDateTime;
use uuid::Uuid;

/// Provider name of email + password accounts.
pub const LOCAL_PROVIDER: &str = "local";

/// Partition of users that may share an email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Business,
    Influencer,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Business => "business",
            UserType::Influencer => "influencer",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "business" => Ok(UserType::Business),
            "influencer" => Ok(UserType::Influencer),
            other => Err(format!("unknown user type: {other}")),
        }
    }
}

// Stored as TEXT with a CHECK constraint rather than a Postgres enum.
impl Type<Postgres> for UserType {
    fn type_info() -> PgTypeInfo {
        <&str as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <&str as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for UserType {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <&str as Decode<Postgres>>::decode(value)?;
        Ok(raw.parse::<UserType>()?)
    }
}

impl<'q> Encode<'q, Postgres> for UserType {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub avatar_url: Option<String>,
    pub usertype: Option<UserType>,
    pub phone: Option<String>,
    pub referral_source: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// One row per (user, provider) pair.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub provider_account_id: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // Argon2 PHC string, local accounts only
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub session_token: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Business profile extension of a `business` user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Business {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub job_position: String,
    pub team_size: Option<String>,
    pub location: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub avatar_url: Option<String>,
    pub usertype: Option<UserType>,
    pub phone: Option<String>,
    pub referral_source: Option<String>,
}

/// Partial user update; `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub username: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub avatar_url: Option<String>,
    /// Only ever set on users that have none yet.
    pub usertype: Option<UserType>,
    pub phone: Option<String>,
    pub referral_source: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.username.is_none()
            && self.firstname.is_none()
            && self.lastname.is_none()
            && self.avatar_url.is_none()
            && self.usertype.is_none()
            && self.phone.is_none()
            && self.referral_source.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: Uuid,
    pub provider: String,
    pub provider_account_id: String,
    pub password_hash: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

impl NewAccount {
    /// Local account carrying a password hash. The provider account id is the user id.
    pub fn local(user_id: Uuid, password_hash: String) -> Self {
        Self {
            user_id,
            provider: LOCAL_PROVIDER.to_string(),
            provider_account_id: user_id.to_string(),
            password_hash: Some(password_hash),
            access_token: None,
            refresh_token: None,
            expires_at: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_token: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
}

/// A normalized category name with its dedup slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Default)]
pub struct BusinessFields {
    pub name: String,
    pub job_position: String,
    pub team_size: Option<String>,
    pub location: Option<String>,
}
