use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    adapter::AdapterUser,
    categories::CategoryInput,
    error::{AppError, AppResult},
    store::repo_types::{Category, User, UserType},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `Some` only for values that are present and not blank.
fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn parse_usertype(raw: Option<&str>) -> AppResult<Option<UserType>> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<UserType>()
            .map(Some)
            .map_err(|_| AppError::Invalid("usertype must be business or influencer".into())),
    }
}

/// Request body for user registration.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub username: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub usertype: Option<String>,
    pub phone: Option<String>,
    #[serde(alias = "referralSource")]
    pub referral_source: Option<String>,
    pub categories: Option<CategoryInput>,
}

/// Registration that passed boundary validation.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub usertype: UserType,
    pub phone: Option<String>,
    pub referral_source: Option<String>,
    pub categories: Option<CategoryInput>,
}

impl RegisterRequest {
    /// Reports every missing field at once, then checks formats.
    pub fn validate(self) -> AppResult<Registration> {
        let email = present(&self.email);
        let password = self.password.clone().filter(|p| !p.is_empty());
        let username = present(&self.username);
        let firstname = present(&self.firstname);
        let lastname = present(&self.lastname);
        let usertype = present(&self.usertype);

        let mut missing = Vec::new();
        for (field, value) in [
            ("email", email.is_none()),
            ("password", password.is_none()),
            ("username", username.is_none()),
            ("firstname", firstname.is_none()),
            ("lastname", lastname.is_none()),
            ("usertype", usertype.is_none()),
        ] {
            if value {
                missing.push(field);
            }
        }

        let (
            Some(email),
            Some(password),
            Some(username),
            Some(firstname),
            Some(lastname),
            Some(usertype),
        ) = (email, password, username, firstname, lastname, usertype)
        else {
            return Err(AppError::Validation { fields: missing });
        };

        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            return Err(AppError::Invalid("Invalid email".into()));
        }
        let usertype = parse_usertype(Some(&usertype))?
            .ok_or_else(|| AppError::Validation { fields: vec!["usertype"] })?;

        Ok(Registration {
            email,
            password,
            username,
            firstname,
            lastname,
            usertype,
            phone: present(&self.phone),
            referral_source: present(&self.referral_source),
            categories: self.categories,
        })
    }
}

/// Request body for credential sign-in.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub usertype: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckEmailRequest {
    pub email: Option<String>,
    pub usertype: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
    pub usertype: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPasswordRequest {
    pub password: Option<String>,
}

/// Partial profile update. An absent `categories` leaves them untouched,
/// an empty one clears them.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    /// Accepted only while the user has no type yet.
    pub usertype: Option<String>,
    pub phone: Option<String>,
    #[serde(alias = "referralSource")]
    pub referral_source: Option<String>,
    pub password: Option<String>,
    pub categories: Option<CategoryInput>,
}

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    pub url: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub image: Option<String>,
    pub usertype: Option<UserType>,
    pub phone: Option<String>,
    pub referral_source: Option<String>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
            firstname: u.firstname,
            lastname: u.lastname,
            image: u.avatar_url,
            usertype: u.usertype,
            phone: u.phone,
            referral_source: u.referral_source,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: PublicUser,
    pub categories: Vec<Category>,
}

/// Returned after login or session refresh.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    pub user: AdapterUser,
}

#[derive(Debug, Serialize)]
pub struct CurrentSession {
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    pub user: AdapterUser,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: PublicUser,
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckEmailResponse {
    pub exists: bool,
}

#[derive(Debug, Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RedirectResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub image: String,
    pub user: AdapterUser,
}
