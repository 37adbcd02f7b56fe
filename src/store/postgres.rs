use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, PgPool};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{
    order_by_slugs,
    repo_types::{
        Account, Business, BusinessFields, Category, NewAccount, NewCategory, NewSession, NewUser,
        Session, User, UserPatch, UserType, LOCAL_PROVIDER,
    },
    CredentialStore, StoreResult,
};

const USER_COLUMNS: &str = "\
    id, email, username, firstname, lastname, avatar_url, usertype, phone, \
    referral_source, created_at, updated_at";

const ACCOUNT_COLUMNS: &str = "\
    id, user_id, provider, provider_account_id, password_hash, access_token, \
    refresh_token, expires_at, created_at, updated_at";

const SESSION_COLUMNS: &str = "id, session_token, user_id, expires_at, created_at";

const BUSINESS_COLUMNS: &str = "\
    id, user_id, name, job_position, team_size, location, created_at, updated_at";

/// Postgres-backed [`CredentialStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Session joined with its owner, columns prefixed to avoid clashing with `users`.
#[derive(FromRow)]
struct SessionUserRow {
    session_id: Uuid,
    session_token: String,
    session_expires_at: OffsetDateTime,
    session_created_at: OffsetDateTime,
    #[sqlx(flatten)]
    user: User,
}

async fn insert_user_in(conn: &mut PgConnection, user: &NewUser) -> Result<User, sqlx::Error> {
    let query = format!(
        "INSERT INTO users \
             (email, username, firstname, lastname, avatar_url, usertype, phone, referral_source) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {USER_COLUMNS}"
    );
    sqlx::query_as::<_, User>(&query)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(&user.avatar_url)
        .bind(user.usertype)
        .bind(&user.phone)
        .bind(&user.referral_source)
        .fetch_one(conn)
        .await
}

async fn insert_account_in(
    conn: &mut PgConnection,
    account: &NewAccount,
) -> Result<Account, sqlx::Error> {
    let query = format!(
        "INSERT INTO accounts \
             (user_id, provider, provider_account_id, password_hash, access_token, \
              refresh_token, expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {ACCOUNT_COLUMNS}"
    );
    sqlx::query_as::<_, Account>(&query)
        .bind(account.user_id)
        .bind(&account.provider)
        .bind(&account.provider_account_id)
        .bind(&account.password_hash)
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(account.expires_at)
        .fetch_one(conn)
        .await
}

async fn categories_by_slugs(
    conn: &mut PgConnection,
    slugs: &[String],
) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>("SELECT id, name, slug FROM categories WHERE slug = ANY($1)")
        .bind(slugs)
        .fetch_all(conn)
        .await
}

/// Batch lookup by slug, insert the missing ones, re-read. Concurrent callers
/// proposing the same slug converge on a single row.
async fn upsert_categories_in(
    conn: &mut PgConnection,
    categories: &[NewCategory],
) -> Result<Vec<Category>, sqlx::Error> {
    if categories.is_empty() {
        return Ok(Vec::new());
    }
    let slugs: Vec<String> = categories.iter().map(|c| c.slug.clone()).collect();
    let existing = categories_by_slugs(&mut *conn, &slugs).await?;

    let missing: Vec<&NewCategory> = categories
        .iter()
        .filter(|c| !existing.iter().any(|e| e.slug == c.slug))
        .collect();
    if missing.is_empty() {
        return Ok(order_by_slugs(categories, existing));
    }

    let names: Vec<String> = missing.iter().map(|c| c.name.clone()).collect();
    let new_slugs: Vec<String> = missing.iter().map(|c| c.slug.clone()).collect();
    sqlx::query(
        "INSERT INTO categories (name, slug) \
         SELECT * FROM UNNEST($1::text[], $2::text[]) \
         ON CONFLICT (slug) DO NOTHING",
    )
    .bind(&names)
    .bind(&new_slugs)
    .execute(&mut *conn)
    .await?;
    debug!(inserted = missing.len(), "categories inserted");

    let rows = categories_by_slugs(&mut *conn, &slugs).await?;
    Ok(order_by_slugs(categories, rows))
}

async fn link_categories_in(
    conn: &mut PgConnection,
    user_id: Uuid,
    categories: &[Category],
) -> Result<(), sqlx::Error> {
    let ids: Vec<Uuid> = categories.iter().map(|c| c.id).collect();
    let positions: Vec<i32> = (0..categories.len() as i32).collect();
    sqlx::query(
        "INSERT INTO user_categories (user_id, category_id, position) \
         SELECT $1::uuid, t.category_id, t.position \
         FROM UNNEST($2::uuid[], $3::int4[]) AS t(category_id, position) \
         ON CONFLICT (user_id, category_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(&ids)
    .bind(&positions)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut conn = self.pool.acquire().await?;
        Ok(insert_user_in(&mut conn, &user).await?)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_users_by_email(
        &self,
        email: &str,
        usertype: Option<UserType>,
    ) -> StoreResult<Vec<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE email = $1 AND ($2::text IS NULL OR usertype = $2) \
             ORDER BY created_at, id"
        );
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(email)
            .bind(usertype)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn email_taken(
        &self,
        email: &str,
        usertype: UserType,
        exclude: Option<Uuid>,
    ) -> StoreResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS( \
                 SELECT 1 FROM users \
                 WHERE email = $1 AND usertype = $2 AND ($3::uuid IS NULL OR id <> $3))",
        )
        .bind(email)
        .bind(usertype)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<Option<User>> {
        let query = format!(
            "UPDATE users SET \
                 email = COALESCE($2, email), \
                 username = COALESCE($3, username), \
                 firstname = COALESCE($4, firstname), \
                 lastname = COALESCE($5, lastname), \
                 avatar_url = COALESCE($6, avatar_url), \
                 phone = COALESCE($7, phone), \
                 referral_source = COALESCE($8, referral_source), \
                 usertype = COALESCE($9, usertype), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(patch.email)
            .bind(patch.username)
            .bind(patch.firstname)
            .bind(patch.lastname)
            .bind(patch.avatar_url)
            .bind(patch.phone)
            .bind(patch.referral_source)
            .bind(patch.usertype)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_local_user(
        &self,
        user: NewUser,
        password_hash: String,
        categories: &[NewCategory],
    ) -> StoreResult<(User, Vec<Category>)> {
        let mut tx = self.pool.begin().await?;
        let created = insert_user_in(&mut tx, &user).await?;
        insert_account_in(&mut tx, &NewAccount::local(created.id, password_hash)).await?;
        let linked = upsert_categories_in(&mut tx, categories).await?;
        if !linked.is_empty() {
            link_categories_in(&mut tx, created.id, &linked).await?;
        }
        tx.commit().await?;
        Ok((created, linked))
    }

    async fn insert_account(&self, account: NewAccount) -> StoreResult<Account> {
        let mut conn = self.pool.acquire().await?;
        Ok(insert_account_in(&mut conn, &account).await?)
    }

    async fn find_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<Option<Account>> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE provider = $1 AND provider_account_id = $2"
        );
        Ok(sqlx::query_as::<_, Account>(&query)
            .bind(provider)
            .bind(provider_account_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_local_account(&self, user_id: Uuid) -> StoreResult<Option<Account>> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = $1 AND provider = $2"
        );
        Ok(sqlx::query_as::<_, Account>(&query)
            .bind(user_id)
            .bind(LOCAL_PROVIDER)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE accounts SET password_hash = $2, updated_at = now() \
             WHERE user_id = $1 AND provider = $3",
        )
        .bind(user_id)
        .bind(password_hash)
        .bind(LOCAL_PROVIDER)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM accounts WHERE provider = $1 AND provider_account_id = $2")
                .bind(provider)
                .bind(provider_account_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_session(&self, session: NewSession) -> StoreResult<Session> {
        let query = format!(
            "INSERT INTO sessions (session_token, user_id, expires_at) \
             VALUES ($1, $2, $3) \
             RETURNING {SESSION_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Session>(&query)
            .bind(&session.session_token)
            .bind(session.user_id)
            .bind(session.expires_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_session_with_user(&self, token: &str) -> StoreResult<Option<(Session, User)>> {
        let row = sqlx::query_as::<_, SessionUserRow>(
            "SELECT s.id AS session_id, s.session_token, s.expires_at AS session_expires_at, \
                    s.created_at AS session_created_at, \
                    u.id, u.email, u.username, u.firstname, u.lastname, u.avatar_url, \
                    u.usertype, u.phone, u.referral_source, u.created_at, u.updated_at \
             FROM sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.session_token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let session = Session {
                id: r.session_id,
                session_token: r.session_token,
                user_id: r.user.id,
                expires_at: r.session_expires_at,
                created_at: r.session_created_at,
            };
            (session, r.user)
        }))
    }

    async fn update_session_expiry(
        &self,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<Option<Session>> {
        let query = format!(
            "UPDATE sessions SET expires_at = $2 WHERE session_token = $1 \
             RETURNING {SESSION_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Session>(&query)
            .bind(token)
            .bind(expires_at)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_session(&self, token: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE session_token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        Ok(
            sqlx::query_as::<_, Category>("SELECT id, name, slug FROM categories ORDER BY name")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn upsert_categories(&self, categories: &[NewCategory]) -> StoreResult<Vec<Category>> {
        let mut conn = self.pool.acquire().await?;
        Ok(upsert_categories_in(&mut conn, categories).await?)
    }

    async fn replace_user_categories(
        &self,
        user_id: Uuid,
        categories: &[NewCategory],
    ) -> StoreResult<Vec<Category>> {
        let mut tx = self.pool.begin().await?;
        let resolved = upsert_categories_in(&mut tx, categories).await?;
        sqlx::query("DELETE FROM user_categories WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        link_categories_in(&mut tx, user_id, &resolved).await?;
        tx.commit().await?;
        Ok(resolved)
    }

    async fn clear_user_categories(&self, user_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM user_categories WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_categories(&self, user_id: Uuid) -> StoreResult<Vec<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            "SELECT c.id, c.name, c.slug \
             FROM user_categories uc \
             JOIN categories c ON c.id = uc.category_id \
             WHERE uc.user_id = $1 \
             ORDER BY uc.position, uc.created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_business(&self, user_id: Uuid) -> StoreResult<Option<Business>> {
        let query = format!(
            "SELECT {BUSINESS_COLUMNS} FROM business WHERE user_id = $1 \
             ORDER BY created_at LIMIT 1"
        );
        Ok(sqlx::query_as::<_, Business>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_business(
        &self,
        user_id: Uuid,
        fields: BusinessFields,
    ) -> StoreResult<Business> {
        let query = format!(
            "INSERT INTO business (user_id, name, job_position, team_size, location) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {BUSINESS_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Business>(&query)
            .bind(user_id)
            .bind(fields.name)
            .bind(fields.job_position)
            .bind(fields.team_size)
            .bind(fields.location)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_business(
        &self,
        id: Uuid,
        user_id: Uuid,
        fields: BusinessFields,
    ) -> StoreResult<Option<Business>> {
        let query = format!(
            "UPDATE business SET \
                 name = $3, job_position = $4, \
                 team_size = COALESCE($5, team_size), \
                 location = COALESCE($6, location), \
                 updated_at = now() \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {BUSINESS_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Business>(&query)
            .bind(id)
            .bind(user_id)
            .bind(fields.name)
            .bind(fields.job_position)
            .bind(fields.team_size)
            .bind(fields.location)
            .fetch_optional(&self.pool)
            .await?)
    }
}
