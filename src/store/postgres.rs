//! Postgres store.
//!
//! Uses runtime-checked queries so the crate builds without a live database.
//! The conditional revoke relies on `UPDATE ... WHERE revoked_utc IS NULL`
//! row counts; no multi-row transaction is needed anywhere else.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::models::{
    BlacklistEntry, OneTimeToken, Principal, RefreshSession, SecondFactor, TokenPurpose,
};
use crate::store::{Store, StoreError};

const SCHEMA: &str = include_str!("schema.sql");

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        tracing::info!("Connected to Postgres");
        Ok(Self { pool })
    }

    /// Apply the idempotent schema.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    fn principal_from_row(row: &PgRow) -> Result<Principal, sqlx::Error> {
        let secret: Option<String> = row.try_get("second_factor_secret")?;
        let enabled_utc: Option<DateTime<Utc>> = row.try_get("second_factor_enabled_utc")?;
        Ok(Principal {
            principal_id: row.try_get("principal_id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            display_name: row.try_get("display_name")?,
            provider: row.try_get("provider")?,
            provider_id: row.try_get("provider_id")?,
            verified_utc: row.try_get("verified_utc")?,
            disabled_utc: row.try_get("disabled_utc")?,
            second_factor: SecondFactor::from_columns(secret, enabled_utc),
            created_utc: row.try_get("created_utc")?,
        })
    }

    fn map_insert_error(err: sqlx::Error, key: &'static str) -> StoreError {
        if let sqlx::Error::Database(ref db) = err {
            if db.is_unique_violation() {
                return StoreError::Duplicate(key);
            }
        }
        StoreError::Database(err)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_principal(&self, principal: &Principal) -> Result<(), StoreError> {
        let (secret, enabled_utc) = principal.second_factor.to_columns();
        sqlx::query(
            r#"INSERT INTO principals
               (principal_id, email, password_hash, display_name, provider, provider_id,
                verified_utc, disabled_utc, second_factor_secret, second_factor_enabled_utc,
                created_utc)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
        )
        .bind(principal.principal_id)
        .bind(&principal.email)
        .bind(&principal.password_hash)
        .bind(&principal.display_name)
        .bind(&principal.provider)
        .bind(&principal.provider_id)
        .bind(principal.verified_utc)
        .bind(principal.disabled_utc)
        .bind(secret)
        .bind(enabled_utc)
        .bind(principal.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_insert_error(e, "email"))?;
        Ok(())
    }

    async fn find_principal(&self, principal_id: Uuid) -> Result<Option<Principal>, StoreError> {
        let row = sqlx::query("SELECT * FROM principals WHERE principal_id = $1")
            .bind(principal_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(Self::principal_from_row)
            .transpose()
            .map_err(StoreError::Database)
    }

    async fn find_principal_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        let row = sqlx::query("SELECT * FROM principals WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(Self::principal_from_row)
            .transpose()
            .map_err(StoreError::Database)
    }

    async fn find_principal_by_provider(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let row =
            sqlx::query("SELECT * FROM principals WHERE provider = $1 AND provider_id = $2")
                .bind(provider)
                .bind(provider_id)
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref()
            .map(Self::principal_from_row)
            .transpose()
            .map_err(StoreError::Database)
    }

    async fn set_password_hash(&self, principal_id: Uuid, hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE principals SET password_hash = $1 WHERE principal_id = $2")
            .bind(hash)
            .bind(principal_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_verified(
        &self,
        principal_id: Uuid,
        when: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE principals SET verified_utc = $1 WHERE principal_id = $2")
            .bind(when)
            .bind(principal_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_disabled(
        &self,
        principal_id: Uuid,
        when: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE principals SET disabled_utc = $1 WHERE principal_id = $2")
            .bind(when)
            .bind(principal_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_second_factor(
        &self,
        principal_id: Uuid,
        secret: Option<&str>,
        enabled_utc: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"UPDATE principals
               SET second_factor_secret = $1, second_factor_enabled_utc = $2
               WHERE principal_id = $3"#,
        )
        .bind(secret)
        .bind(enabled_utc)
        .bind(principal_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_session(&self, session: &RefreshSession) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO refresh_sessions
               (session_id, principal_id, token_hash, issued_utc, expiry_utc,
                revoked_utc, revoked_reason, predecessor_id, ip_address, user_agent)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(session.session_id)
        .bind(session.principal_id)
        .bind(&session.token_hash)
        .bind(session.issued_utc)
        .bind(session.expiry_utc)
        .bind(session.revoked_utc)
        .bind(&session.revoked_reason)
        .bind(session.predecessor_id)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_insert_error(e, "token_hash"))?;
        Ok(())
    }

    async fn find_session(&self, session_id: Uuid) -> Result<Option<RefreshSession>, StoreError> {
        let session =
            sqlx::query_as::<_, RefreshSession>(
                "SELECT * FROM refresh_sessions WHERE session_id = $1",
            )
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn find_session_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshSession>, StoreError> {
        let session =
            sqlx::query_as::<_, RefreshSession>(
                "SELECT * FROM refresh_sessions WHERE token_hash = $1",
            )
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn find_successor(
        &self,
        session_id: Uuid,
    ) -> Result<Option<RefreshSession>, StoreError> {
        let session = sqlx::query_as::<_, RefreshSession>(
            "SELECT * FROM refresh_sessions WHERE predecessor_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn list_active_sessions(
        &self,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshSession>, StoreError> {
        let sessions = sqlx::query_as::<_, RefreshSession>(
            r#"SELECT * FROM refresh_sessions
               WHERE principal_id = $1 AND revoked_utc IS NULL AND expiry_utc > $2
               ORDER BY issued_utc DESC"#,
        )
        .bind(principal_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    async fn revoke_session_if_active(
        &self,
        session_id: Uuid,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"UPDATE refresh_sessions
               SET revoked_utc = $1, revoked_reason = $2
               WHERE session_id = $3 AND revoked_utc IS NULL"#,
        )
        .bind(now)
        .bind(reason)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_owned_session(
        &self,
        principal_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool, StoreError> {
        // Two steps: ownership check, then the conditional revoke. A session
        // already revoked but still owned reports success.
        let owned = sqlx::query(
            "SELECT 1 FROM refresh_sessions WHERE session_id = $1 AND principal_id = $2",
        )
        .bind(session_id)
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?
        .is_some();
        if !owned {
            return Ok(false);
        }
        self.revoke_session_if_active(session_id, now, reason)
            .await?;
        Ok(true)
    }

    async fn revoke_sessions(
        &self,
        principal_id: Uuid,
        exclude_hash: Option<&str>,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"UPDATE refresh_sessions
               SET revoked_utc = $1, revoked_reason = $2
               WHERE principal_id = $3 AND revoked_utc IS NULL AND expiry_utc > $1
                 AND ($4::text IS NULL OR token_hash <> $4)"#,
        )
        .bind(now)
        .bind(reason)
        .bind(principal_id)
        .bind(exclude_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_sessions WHERE expiry_utc <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_blacklist_entry(&self, entry: &BlacklistEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO access_blacklist
               (token_hash, principal_id, expiry_utc, reason, created_utc)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (token_hash) DO NOTHING"#,
        )
        .bind(&entry.token_hash)
        .bind(entry.principal_id)
        .bind(entry.expiry_utc)
        .bind(&entry.reason)
        .bind(entry.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn blacklist_contains(&self, token_hash: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM access_blacklist WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn delete_expired_blacklist(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM access_blacklist WHERE expiry_utc <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_live_one_time_tokens(
        &self,
        principal_id: Uuid,
        purpose: TokenPurpose,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM one_time_tokens WHERE principal_id = $1 AND purpose_code = $2",
        )
        .bind(principal_id)
        .bind(purpose.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_one_time_token(&self, token: &OneTimeToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO one_time_tokens
               (token_id, principal_id, token_value, purpose_code, expiry_utc, created_utc)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(token.token_id)
        .bind(token.principal_id)
        .bind(&token.token_value)
        .bind(&token.purpose_code)
        .bind(token.expiry_utc)
        .bind(token.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_insert_error(e, "token_value"))?;
        Ok(())
    }

    async fn find_one_time_token(
        &self,
        purpose: TokenPurpose,
        token_value: &str,
    ) -> Result<Option<OneTimeToken>, StoreError> {
        let token = sqlx::query_as::<_, OneTimeToken>(
            "SELECT * FROM one_time_tokens WHERE purpose_code = $1 AND token_value = $2",
        )
        .bind(purpose.as_str())
        .bind(token_value)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn delete_one_time_token(&self, token_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM one_time_tokens WHERE token_id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired_one_time_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM one_time_tokens WHERE expiry_utc <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
