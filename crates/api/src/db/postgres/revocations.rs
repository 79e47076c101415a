use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::RepositoryError;
use crate::db::store::RevocationStore;

/// Repository for tokens revoked by logout.
pub struct RevocationRepository {
    pool: PgPool,
}

impl RevocationRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationStore for RevocationRepository {
    async fn revoke(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.revoked_token (jti, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (jti) DO NOTHING
            ",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        // Entries past their expiry can no longer match a valid token.
        let purged = sqlx::query("DELETE FROM shop.revoked_token WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?
            .rows_affected();
        if purged > 0 {
            tracing::debug!(purged, "Purged expired token revocations");
        }

        Ok(())
    }

    async fn is_revoked(&self, jti: Uuid) -> Result<bool, RepositoryError> {
        let revoked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM shop.revoked_token WHERE jti = $1)",
        )
        .bind(jti)
        .fetch_one(&self.pool)
        .await?;

        Ok(revoked)
    }
}
