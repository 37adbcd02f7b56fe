//! In-memory [`CredentialStore`] used by unit and router tests. Enforces the
//! same unique constraints as the Postgres schema.

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    order_by_slugs,
    repo_types::{
        Account, Business, BusinessFields, Category, NewAccount, NewCategory, NewSession, NewUser,
        Session, User, UserPatch, UserType, LOCAL_PROVIDER,
    },
    CredentialStore, StoreError, StoreResult,
};

#[derive(Default, Clone)]
struct Inner {
    users: Vec<User>,
    accounts: Vec<Account>,
    sessions: Vec<Session>,
    categories: Vec<Category>,
    // (user_id, category_id) in link order
    links: Vec<(Uuid, Uuid)>,
    businesses: Vec<Business>,
    fail_category_writes: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn conflict(constraint: &str) -> StoreError {
    StoreError::Conflict {
        constraint: constraint.to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every category write fail, to exercise rollback paths.
    pub async fn fail_category_writes(&self, fail: bool) {
        self.inner.lock().await.fail_category_writes = fail;
    }

    pub async fn user_count(&self) -> usize {
        self.inner.lock().await.users.len()
    }

    pub async fn category_count(&self) -> usize {
        self.inner.lock().await.categories.len()
    }

    pub async fn link_count(&self, user_id: Uuid) -> usize {
        let inner = self.inner.lock().await;
        inner.links.iter().filter(|(u, _)| *u == user_id).count()
    }

    pub async fn account_count(&self) -> usize {
        self.inner.lock().await.accounts.len()
    }
}

impl Inner {
    fn insert_user(&mut self, user: NewUser) -> StoreResult<User> {
        if user.usertype.is_some()
            && self
                .users
                .iter()
                .any(|u| u.email == user.email && u.usertype == user.usertype)
        {
            return Err(conflict("uq_users_email_usertype"));
        }
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: Uuid::new_v4(),
            email: user.email,
            username: user.username,
            firstname: user.firstname,
            lastname: user.lastname,
            avatar_url: user.avatar_url,
            usertype: user.usertype,
            phone: user.phone,
            referral_source: user.referral_source,
            created_at: now,
            updated_at: now,
        };
        self.users.push(row.clone());
        Ok(row)
    }

    fn insert_account(&mut self, account: NewAccount) -> StoreResult<Account> {
        if self.accounts.iter().any(|a| {
            a.provider == account.provider && a.provider_account_id == account.provider_account_id
        }) {
            return Err(conflict("uq_accounts_provider_account"));
        }
        if account.provider == LOCAL_PROVIDER
            && self
                .accounts
                .iter()
                .any(|a| a.user_id == account.user_id && a.provider == LOCAL_PROVIDER)
        {
            return Err(conflict("uq_accounts_local_user"));
        }
        let now = OffsetDateTime::now_utc();
        let row = Account {
            id: Uuid::new_v4(),
            user_id: account.user_id,
            provider: account.provider,
            provider_account_id: account.provider_account_id,
            password_hash: account.password_hash,
            access_token: account.access_token,
            refresh_token: account.refresh_token,
            expires_at: account.expires_at,
            created_at: now,
            updated_at: now,
        };
        self.accounts.push(row.clone());
        Ok(row)
    }

    fn upsert_categories(&mut self, categories: &[NewCategory]) -> StoreResult<Vec<Category>> {
        if self.fail_category_writes && !categories.is_empty() {
            return Err(StoreError::Database(sqlx::Error::Protocol(
                "category writes disabled".into(),
            )));
        }
        for c in categories {
            if !self.categories.iter().any(|e| e.slug == c.slug) {
                self.categories.push(Category {
                    id: Uuid::new_v4(),
                    name: c.name.clone(),
                    slug: c.slug.clone(),
                });
            }
        }
        Ok(order_by_slugs(categories, self.categories.clone()))
    }

    fn relink(&mut self, user_id: Uuid, categories: &[Category]) {
        self.links.retain(|(u, _)| *u != user_id);
        for c in categories {
            if !self.links.contains(&(user_id, c.id)) {
                self.links.push((user_id, c.id));
            }
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        self.inner.lock().await.insert_user(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_users_by_email(
        &self,
        email: &str,
        usertype: Option<UserType>,
    ) -> StoreResult<Vec<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .iter()
            .filter(|u| u.email == email && (usertype.is_none() || u.usertype == usertype))
            .cloned()
            .collect())
    }

    async fn email_taken(
        &self,
        email: &str,
        usertype: UserType,
        exclude: Option<Uuid>,
    ) -> StoreResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().any(|u| {
            u.email == email && u.usertype == Some(usertype) && Some(u.id) != exclude
        }))
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<Option<User>> {
        let mut inner = self.inner.lock().await;
        if patch.email.is_some() || patch.usertype.is_some() {
            if let Some(current) = inner.users.iter().find(|u| u.id == id) {
                let email = patch.email.as_ref().unwrap_or(&current.email);
                let usertype = patch.usertype.or(current.usertype);
                if usertype.is_some()
                    && inner
                        .users
                        .iter()
                        .any(|u| u.id != id && &u.email == email && u.usertype == usertype)
                {
                    return Err(conflict("uq_users_email_usertype"));
                }
            }
        }
        let Some(user) = inner.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(v) = patch.email {
            user.email = v;
        }
        if let Some(v) = patch.username {
            user.username = v;
        }
        if let Some(v) = patch.firstname {
            user.firstname = v;
        }
        if let Some(v) = patch.lastname {
            user.lastname = v;
        }
        if let Some(v) = patch.avatar_url {
            user.avatar_url = Some(v);
        }
        if let Some(v) = patch.usertype {
            user.usertype = Some(v);
        }
        if let Some(v) = patch.phone {
            user.phone = Some(v);
        }
        if let Some(v) = patch.referral_source {
            user.referral_source = Some(v);
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let before = inner.users.len();
        inner.users.retain(|u| u.id != id);
        inner.accounts.retain(|a| a.user_id != id);
        inner.sessions.retain(|s| s.user_id != id);
        inner.links.retain(|(u, _)| *u != id);
        inner.businesses.retain(|b| b.user_id != id);
        Ok(inner.users.len() < before)
    }

    async fn create_local_user(
        &self,
        user: NewUser,
        password_hash: String,
        categories: &[NewCategory],
    ) -> StoreResult<(User, Vec<Category>)> {
        let mut inner = self.inner.lock().await;
        // Work on a copy so a failure leaves nothing behind, like a rolled back transaction.
        let mut staged = inner.clone();
        let created = staged.insert_user(user)?;
        staged.insert_account(NewAccount::local(created.id, password_hash))?;
        let linked = staged.upsert_categories(categories)?;
        staged.relink(created.id, &linked);
        *inner = staged;
        Ok((created, linked))
    }

    async fn insert_account(&self, account: NewAccount) -> StoreResult<Account> {
        self.inner.lock().await.insert_account(account)
    }

    async fn find_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<Option<Account>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .accounts
            .iter()
            .find(|a| a.provider == provider && a.provider_account_id == provider_account_id)
            .cloned())
    }

    async fn find_local_account(&self, user_id: Uuid) -> StoreResult<Option<Account>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .accounts
            .iter()
            .find(|a| a.user_id == user_id && a.provider == LOCAL_PROVIDER)
            .cloned())
    }

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner
            .accounts
            .iter_mut()
            .find(|a| a.user_id == user_id && a.provider == LOCAL_PROVIDER)
        {
            Some(account) => {
                account.password_hash = Some(password_hash.to_string());
                account.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let before = inner.accounts.len();
        inner
            .accounts
            .retain(|a| !(a.provider == provider && a.provider_account_id == provider_account_id));
        Ok(inner.accounts.len() < before)
    }

    async fn insert_session(&self, session: NewSession) -> StoreResult<Session> {
        let mut inner = self.inner.lock().await;
        if inner
            .sessions
            .iter()
            .any(|s| s.session_token == session.session_token)
        {
            return Err(conflict("uq_sessions_token"));
        }
        let row = Session {
            id: Uuid::new_v4(),
            session_token: session.session_token,
            user_id: session.user_id,
            expires_at: session.expires_at,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.sessions.push(row.clone());
        Ok(row)
    }

    async fn find_session_with_user(&self, token: &str) -> StoreResult<Option<(Session, User)>> {
        let inner = self.inner.lock().await;
        let Some(session) = inner.sessions.iter().find(|s| s.session_token == token) else {
            return Ok(None);
        };
        Ok(inner
            .users
            .iter()
            .find(|u| u.id == session.user_id)
            .map(|u| (session.clone(), u.clone())))
    }

    async fn update_session_expiry(
        &self,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<Option<Session>> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .sessions
            .iter_mut()
            .find(|s| s.session_token == token)
            .map(|s| {
                s.expires_at = expires_at;
                s.clone()
            }))
    }

    async fn delete_session(&self, token: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let before = inner.sessions.len();
        inner.sessions.retain(|s| s.session_token != token);
        Ok(inner.sessions.len() < before)
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let inner = self.inner.lock().await;
        let mut rows = inner.categories.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn upsert_categories(&self, categories: &[NewCategory]) -> StoreResult<Vec<Category>> {
        self.inner.lock().await.upsert_categories(categories)
    }

    async fn replace_user_categories(
        &self,
        user_id: Uuid,
        categories: &[NewCategory],
    ) -> StoreResult<Vec<Category>> {
        let mut inner = self.inner.lock().await;
        let resolved = inner.upsert_categories(categories)?;
        inner.relink(user_id, &resolved);
        Ok(resolved)
    }

    async fn clear_user_categories(&self, user_id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.links.retain(|(u, _)| *u != user_id);
        Ok(())
    }

    async fn user_categories(&self, user_id: Uuid) -> StoreResult<Vec<Category>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .links
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, c)| inner.categories.iter().find(|cat| cat.id == *c).cloned())
            .collect())
    }

    async fn find_business(&self, user_id: Uuid) -> StoreResult<Option<Business>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .businesses
            .iter()
            .find(|b| b.user_id == user_id)
            .cloned())
    }

    async fn insert_business(
        &self,
        user_id: Uuid,
        fields: BusinessFields,
    ) -> StoreResult<Business> {
        let mut inner = self.inner.lock().await;
        let now = OffsetDateTime::now_utc();
        let row = Business {
            id: Uuid::new_v4(),
            user_id,
            name: fields.name,
            job_position: fields.job_position,
            team_size: fields.team_size,
            location: fields.location,
            created_at: now,
            updated_at: now,
        };
        inner.businesses.push(row.clone());
        Ok(row)
    }

    async fn update_business(
        &self,
        id: Uuid,
        user_id: Uuid,
        fields: BusinessFields,
    ) -> StoreResult<Option<Business>> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .businesses
            .iter_mut()
            .find(|b| b.id == id && b.user_id == user_id)
            .map(|b| {
                b.name = fields.name;
                b.job_position = fields.job_position;
                if fields.team_size.is_some() {
                    b.team_size = fields.team_size;
                }
                if fields.location.is_some() {
                    b.location = fields.location;
                }
                b.updated_at = OffsetDateTime::now_utc();
                b.clone()
            }))
    }
}
