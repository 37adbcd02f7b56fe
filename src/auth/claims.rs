use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::repo_types::UserType;

/// JWT payload referencing a database session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,                   // user ID
    pub sid: String,                 // session token
    pub usertype: Option<UserType>,  // business or influencer
    pub iat: usize,                  // issued at (unix timestamp)
    pub exp: usize,                  // expires at, equals session expiry
    pub iss: String,                 // issuer
}
