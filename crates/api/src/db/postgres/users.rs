use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::{Email, Role, UserId};

use crate::db::RepositoryError;
use crate::db::store::UserStore;
use crate::models::{NewUser, ProfileChanges, User};

/// Repository for user accounts and their credentials.
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    role: Role,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            email,
            role: row.role,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn to_user(row: Option<UserRow>) -> Result<Option<User>, RepositoryError> {
    row.map(User::try_from).transpose()
}

#[async_trait]
impl UserStore for UserRepository {
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, name, email, role, active, created_at, updated_at
            FROM shop.user
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        to_user(row)
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, name, email, role, active, created_at, updated_at
            FROM shop.user
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        to_user(row)
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, name, email, role, active, created_at, updated_at
            FROM shop.user
            ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO shop.user (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, role, active, created_at, updated_at
            ",
        )
        .bind(&user.name)
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "email"))?;

        User::try_from(row)
    }

    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM shop.user WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(hash)
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.user
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        id: UserId,
        changes: ProfileChanges,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE shop.user
            SET name = COALESCE($2, name),
                role = COALESCE($3, role),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, email, role, active, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.role)
        .fetch_optional(&self.pool)
        .await?;

        to_user(row)
    }

    async fn set_active(&self, id: UserId, active: bool) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE shop.user
            SET active = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, email, role, active, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;

        to_user(row)
    }

    async fn set_reset_token(
        &self,
        id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.user
            SET reset_token_hash = $2, reset_token_expires_at = $3
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE shop.user
            SET password_hash = $3,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL,
                updated_at = NOW()
            WHERE reset_token_hash = $1 AND reset_token_expires_at > $2
            RETURNING id, name, email, role, active, created_at, updated_at
            ",
        )
        .bind(token_hash)
        .bind(now)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;

        to_user(row)
    }
}
