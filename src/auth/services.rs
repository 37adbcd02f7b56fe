//! Credential verification: registration, sign-in checks, password changes and
//! profile updates.

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        is_valid_email, normalize_email, parse_usertype, Registration, UpdateProfileRequest,
    },
    password::{hash_password, verify_dummy, verify_password as check_hash},
};
use crate::{
    adapter::AdapterUser,
    categories::{
        services::{fetch_user_categories_or_empty, sync_user_categories},
        slug::normalize_category_names,
    },
    error::{AppError, AppResult},
    store::{
        repo_types::{Category, NewAccount, NewUser, User, UserPatch, UserType},
        CredentialStore, StoreError,
    },
};

/// Value `forgot_password` resets to. Stand-in until a token-based reset exists.
pub const RESET_PASSWORD: &str = "123456";

const EMAIL_TYPE_CONSTRAINT: &str = "uq_users_email_usertype";

fn already_bound(usertype: UserType) -> AppError {
    AppError::Conflict(format!(
        "This email is already bound to a {usertype} account"
    ))
}

/// Maps the (email, usertype) unique violation onto the user-facing conflict.
fn email_conflict(err: StoreError, usertype: Option<UserType>) -> AppError {
    match (err, usertype) {
        (StoreError::Conflict { constraint }, Some(t)) if constraint == EMAIL_TYPE_CONSTRAINT => {
            already_bound(t)
        }
        (err, _) => AppError::Store(err),
    }
}

#[instrument(skip(store, reg), fields(email = %reg.email, usertype = %reg.usertype))]
pub async fn register(
    store: &dyn CredentialStore,
    reg: Registration,
) -> AppResult<(User, Vec<Category>)> {
    // Best effort; the unique constraint is the real guard.
    if store.email_taken(&reg.email, reg.usertype, None).await? {
        warn!("email already registered for this user type");
        return Err(already_bound(reg.usertype));
    }

    let hash = hash_password(&reg.password)?;
    let categories = reg
        .categories
        .map(normalize_category_names)
        .unwrap_or_default();

    let (user, linked) = store
        .create_local_user(
            NewUser {
                email: reg.email,
                username: reg.username,
                firstname: reg.firstname,
                lastname: reg.lastname,
                avatar_url: None,
                usertype: Some(reg.usertype),
                phone: reg.phone,
                referral_source: reg.referral_source,
            },
            hash,
            &categories,
        )
        .await
        .map_err(|e| email_conflict(e, Some(reg.usertype)))?;

    info!(user_id = %user.id, categories = linked.len(), "user registered");
    Ok((user, linked))
}

/// Checks an email/password pair. Every failure collapses to `None`; the cause
/// only shows up in the logs.
#[instrument(skip(store, password))]
pub async fn authorize(
    store: &dyn CredentialStore,
    email: &str,
    password: &str,
    usertype: Option<UserType>,
) -> Option<AdapterUser> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        warn!("missing credentials");
        verify_dummy(password);
        return None;
    }

    let candidates = match store.find_users_by_email(&email, usertype).await {
        Ok(users) => users,
        Err(e) => {
            warn!(error = %e, "user lookup failed");
            verify_dummy(password);
            return None;
        }
    };
    if candidates.is_empty() {
        warn!("no user with this email");
        verify_dummy(password);
        return None;
    }

    let mut verified_any = false;
    for user in candidates {
        let hash = match store.find_local_account(user.id).await {
            Ok(Some(account)) => account.password_hash,
            Ok(None) => {
                warn!(user_id = %user.id, "no local account");
                continue;
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "account lookup failed");
                continue;
            }
        };
        let Some(hash) = hash else {
            warn!(user_id = %user.id, "local account has no password hash");
            continue;
        };
        verified_any = true;
        match check_hash(password, &hash) {
            Ok(true) => {
                debug!(user_id = %user.id, "credentials accepted");
                return Some(user.into());
            }
            Ok(false) => warn!(user_id = %user.id, "invalid password"),
            Err(e) => warn!(user_id = %user.id, error = %e, "stored hash unreadable"),
        }
    }

    if !verified_any {
        verify_dummy(password);
    }
    None
}

/// Re-checks the password of an already signed-in user.
#[instrument(skip(store, password))]
pub async fn verify_password(
    store: &dyn CredentialStore,
    user_id: Uuid,
    password: &str,
) -> AppResult<()> {
    let hash = store
        .find_local_account(user_id)
        .await?
        .and_then(|a| a.password_hash)
        .ok_or_else(|| AppError::NotFound("Account not found".into()))?;

    if check_hash(password, &hash)? {
        Ok(())
    } else {
        warn!(%user_id, "password re-verification failed");
        Err(AppError::Unauthorized("Invalid password".into()))
    }
}

/// Resets the local password of every user with this email to [`RESET_PASSWORD`].
/// Returns how many accounts were reset.
#[instrument(skip(store))]
pub async fn forgot_password(
    store: &dyn CredentialStore,
    email: &str,
    usertype: Option<UserType>,
) -> AppResult<usize> {
    let email = normalize_email(email);
    let users = store.find_users_by_email(&email, usertype).await?;
    if users.is_empty() {
        return Err(AppError::NotFound("No account found for this email".into()));
    }

    let hash = hash_password(RESET_PASSWORD)?;
    let mut reset = 0;
    for user in &users {
        if store.set_password_hash(user.id, &hash).await? {
            reset += 1;
        }
    }
    if reset == 0 {
        return Err(AppError::NotFound(
            "No password account found for this email".into(),
        ));
    }
    warn!(accounts = reset, "password reset to the fixed placeholder");
    Ok(reset)
}

/// Applies a partial profile update. Categories are synced only when the
/// request carries the field.
#[instrument(skip(store, req))]
pub async fn update_profile(
    store: &dyn CredentialStore,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> AppResult<(User, Option<Vec<Category>>)> {
    let current = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let trimmed = |v: Option<String>| {
        v.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    // A federated sign-up picks its user type once; it never changes afterwards.
    let usertype = match parse_usertype(req.usertype.as_deref())? {
        Some(t) => match current.usertype {
            None => Some(t),
            Some(existing) if existing == t => None,
            Some(_) => return Err(AppError::Invalid("User type cannot be changed".into())),
        },
        None => None,
    };

    let email = match trimmed(req.email) {
        Some(raw) => {
            let email = normalize_email(&raw);
            if !is_valid_email(&email) {
                return Err(AppError::Invalid("Invalid email".into()));
            }
            (email != current.email).then_some(email)
        }
        None => None,
    };

    let effective_type = usertype.or(current.usertype);
    if email.is_some() || usertype.is_some() {
        if let Some(t) = effective_type {
            let target = email.as_deref().unwrap_or(&current.email);
            if store.email_taken(target, t, Some(user_id)).await? {
                return Err(already_bound(t));
            }
        }
    }

    let patch = UserPatch {
        email,
        username: trimmed(req.username),
        firstname: trimmed(req.firstname),
        lastname: trimmed(req.lastname),
        avatar_url: None,
        usertype,
        phone: trimmed(req.phone),
        referral_source: trimmed(req.referral_source),
    };

    let user = if patch.is_empty() {
        current
    } else {
        store
            .update_user(user_id, patch)
            .await
            .map_err(|e| email_conflict(e, effective_type))?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?
    };

    if let Some(password) = req.password.filter(|p| !p.is_empty()) {
        let hash = hash_password(&password)?;
        if !store.set_password_hash(user_id, &hash).await? {
            store.insert_account(NewAccount::local(user_id, hash)).await?;
            debug!(%user_id, "local account created on password change");
        }
        info!(%user_id, "password changed");
    }

    let categories = match req.categories {
        Some(input) => Some(sync_user_categories(store, user_id, input).await?),
        None => None,
    };

    info!(%user_id, "profile updated");
    Ok((user, categories))
}

/// Whether registering this email (for this user type, if given) would conflict.
pub async fn check_email(
    store: &dyn CredentialStore,
    email: &str,
    usertype: Option<UserType>,
) -> AppResult<bool> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::Validation {
            fields: vec!["email"],
        });
    }
    Ok(match usertype {
        Some(t) => store.email_taken(&email, t, None).await?,
        None => !store.find_users_by_email(&email, None).await?.is_empty(),
    })
}

pub async fn get_user_profile(
    store: &dyn CredentialStore,
    user_id: Uuid,
) -> AppResult<(User, Vec<Category>)> {
    let user = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let categories = fetch_user_categories_or_empty(store, user_id).await;
    Ok((user, categories))
}

/// Where to send the browser after a social sign-in.
pub fn resolve_redirect(base_url: &str, url: Option<&str>) -> String {
    let base = base_url.trim_end_matches('/');
    let fallback = format!("{base}/business/profile");
    let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
        return fallback;
    };
    if url.starts_with('/') {
        return format!("{base}{url}");
    }
    let same_origin = url == base
        || ["/", "?", "#"]
            .iter()
            .any(|sep| url.starts_with(&format!("{base}{sep}")));
    if same_origin {
        url.to_string()
    } else {
        fallback
    }
}
