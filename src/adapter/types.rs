use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::repo_types::{Session, User, UserType};

/// User shape handed back to the session framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub image: Option<String>,
    pub usertype: Option<UserType>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub email_verified: Option<OffsetDateTime>,
}

impl From<User> for AdapterUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
            firstname: u.firstname,
            lastname: u.lastname,
            image: u.avatar_url,
            usertype: u.usertype,
            email_verified: None,
        }
    }
}

/// Candidate passed to `create_user` by the framework.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAdapterUser {
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub username: Option<String>,
}

/// Fields the framework may change on an existing user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdapterUserPatch {
    pub id: Uuid,
    pub name: Option<String>,
    pub image: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterAccount {
    pub user_id: Uuid,
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterSession {
    pub session_token: String,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
}

impl AdapterSession {
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires <= now
    }
}

impl From<Session> for AdapterSession {
    fn from(s: Session) -> Self {
        Self {
            session_token: s.session_token,
            user_id: s.user_id,
            expires: s.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationToken {
    pub identifier: String,
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
}

/// Splits a display name on the first space: `"Ada King Lovelace"` -> `("Ada", "King Lovelace")`.
pub fn split_display_name(name: &str) -> (String, String) {
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");
    (first, rest)
}

/// Local part of an email address, used as the default username.
pub fn username_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_display_names() {
        assert_eq!(
            split_display_name("Ada King Lovelace"),
            ("Ada".to_string(), "King Lovelace".to_string())
        );
        assert_eq!(split_display_name("Cher"), ("Cher".to_string(), String::new()));
        assert_eq!(split_display_name("  "), (String::new(), String::new()));
    }

    #[test]
    fn username_is_local_part() {
        assert_eq!(username_from_email("alice@example.com"), "alice");
        assert_eq!(username_from_email("no-at-sign"), "no-at-sign");
    }

    #[test]
    fn adapter_user_serializes_email_verified_null() {
        let user = AdapterUser {
            id: Uuid::new_v4(),
            email: "a@b.co".into(),
            username: "a".into(),
            firstname: "A".into(),
            lastname: "B".into(),
            image: None,
            usertype: Some(UserType::Influencer),
            email_verified: None,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json["emailVerified"].is_null());
        assert_eq!(json["usertype"], "influencer");
    }

    #[test]
    fn session_expiry_is_inclusive() {
        let now = OffsetDateTime::now_utc();
        let session = AdapterSession {
            session_token: "tok".into(),
            user_id: Uuid::new_v4(),
            expires: now,
        };
        assert!(session.is_expired_at(now));
        assert!(!session.is_expired_at(now - time::Duration::seconds(1)));
    }
}
