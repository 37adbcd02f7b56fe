//! Lifecycle callbacks required by the session framework, mapped onto the
//! credential store.
//!
//! Lookups return `Ok(None)` when nothing matches and `Err` only when the store
//! itself failed; the framework relies on that distinction.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::store::{
    repo_types::{NewAccount, NewSession, NewUser, UserPatch},
    CredentialStore, StoreError, StoreResult,
};

pub mod types;

pub use types::{
    AdapterAccount, AdapterSession, AdapterUser, AdapterUserPatch, NewAdapterUser,
    VerificationToken,
};
use types::{split_display_name, username_from_email};

#[async_trait]
pub trait Adapter: Send + Sync {
    async fn create_user(&self, user: NewAdapterUser) -> StoreResult<AdapterUser>;
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<AdapterUser>>;
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<AdapterUser>>;
    async fn get_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<Option<AdapterUser>>;
    async fn update_user(&self, patch: AdapterUserPatch) -> StoreResult<AdapterUser>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;
    async fn link_account(&self, account: AdapterAccount) -> StoreResult<()>;
    async fn unlink_account(&self, provider: &str, provider_account_id: &str) -> StoreResult<()>;
    async fn create_session(&self, session: AdapterSession) -> StoreResult<AdapterSession>;
    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> StoreResult<Option<(AdapterSession, AdapterUser)>>;
    async fn update_session(&self, session: AdapterSession) -> StoreResult<AdapterSession>;
    async fn delete_session(&self, session_token: &str) -> StoreResult<()>;
    async fn create_verification_token(
        &self,
        token: VerificationToken,
    ) -> StoreResult<Option<VerificationToken>>;
    async fn use_verification_token(
        &self,
        identifier: &str,
        token: &str,
    ) -> StoreResult<Option<VerificationToken>>;
}

/// [`Adapter`] over any [`CredentialStore`].
#[derive(Clone)]
pub struct StoreAdapter {
    store: Arc<dyn CredentialStore>,
}

impl StoreAdapter {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Adapter for StoreAdapter {
    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create_user(&self, user: NewAdapterUser) -> StoreResult<AdapterUser> {
        let email = user.email.trim().to_lowercase();
        let username = user
            .username
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| username_from_email(&email));
        let (firstname, lastname) = user
            .name
            .as_deref()
            .map(split_display_name)
            .unwrap_or_default();

        // usertype stays unset for federated sign-ups until updateProfile sets it.
        let created = self
            .store
            .insert_user(NewUser {
                email,
                username,
                firstname,
                lastname,
                avatar_url: user.image,
                ..NewUser::default()
            })
            .await?;
        debug!(user_id = %created.id, "adapter user created");
        Ok(created.into())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<AdapterUser>> {
        Ok(self.store.find_user(id).await?.map(AdapterUser::from))
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<AdapterUser>> {
        let email = email.trim().to_lowercase();
        let users = self.store.find_users_by_email(&email, None).await?;
        Ok(users.into_iter().next().map(AdapterUser::from))
    }

    async fn get_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<Option<AdapterUser>> {
        match self.store.find_account(provider, provider_account_id).await? {
            Some(account) => self.get_user(account.user_id).await,
            None => Ok(None),
        }
    }

    #[instrument(skip(self, patch), fields(user_id = %patch.id))]
    async fn update_user(&self, patch: AdapterUserPatch) -> StoreResult<AdapterUser> {
        let (firstname, lastname) = match patch.name.as_deref() {
            Some(name) => {
                let (first, last) = split_display_name(name);
                (Some(first), Some(last))
            }
            None => (None, None),
        };
        let updated = self
            .store
            .update_user(
                patch.id,
                UserPatch {
                    email: patch.email.map(|e| e.trim().to_lowercase()),
                    firstname,
                    lastname,
                    avatar_url: patch.image,
                    ..UserPatch::default()
                },
            )
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(updated.into())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        self.store.delete_user(id).await?;
        Ok(())
    }

    #[instrument(skip(self, account), fields(user_id = %account.user_id, provider = %account.provider))]
    async fn link_account(&self, account: AdapterAccount) -> StoreResult<()> {
        self.store
            .insert_account(NewAccount {
                user_id: account.user_id,
                provider: account.provider,
                provider_account_id: account.provider_account_id,
                password_hash: None,
                access_token: account.access_token,
                refresh_token: account.refresh_token,
                expires_at: account.expires_at,
            })
            .await?;
        debug!("account linked");
        Ok(())
    }

    async fn unlink_account(&self, provider: &str, provider_account_id: &str) -> StoreResult<()> {
        self.store
            .delete_account(provider, provider_account_id)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    async fn create_session(&self, session: AdapterSession) -> StoreResult<AdapterSession> {
        let row = self
            .store
            .insert_session(NewSession {
                session_token: session.session_token,
                user_id: session.user_id,
                expires_at: session.expires,
            })
            .await?;
        Ok(row.into())
    }

    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> StoreResult<Option<(AdapterSession, AdapterUser)>> {
        Ok(self
            .store
            .find_session_with_user(session_token)
            .await?
            .map(|(s, u)| (s.into(), u.into())))
    }

    async fn update_session(&self, session: AdapterSession) -> StoreResult<AdapterSession> {
        let row = self
            .store
            .update_session_expiry(&session.session_token, session.expires)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(row.into())
    }

    async fn delete_session(&self, session_token: &str) -> StoreResult<()> {
        self.store.delete_session(session_token).await?;
        Ok(())
    }

    async fn create_verification_token(
        &self,
        _token: VerificationToken,
    ) -> StoreResult<Option<VerificationToken>> {
        Ok(None)
    }

    async fn use_verification_token(
        &self,
        _identifier: &str,
        _token: &str,
    ) -> StoreResult<Option<VerificationToken>> {
        Ok(None)
    }
}
