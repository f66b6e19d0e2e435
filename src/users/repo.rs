use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::users::repo_types::{Account, AccountChanges, ListFilter, NewAccount, SafeAccount};

const ACCOUNT_COLUMNS: &str =
    "id, name, email, password_hash, role, created_at, updated_at, last_login_at";

/// Persistence for accounts. Holds no policy.
///
/// Everything except [`AccountStore::find_by_email`] returns the safe
/// projection; that lookup exists for credential checks only.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn create(&self, new: NewAccount) -> AppResult<SafeAccount>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<SafeAccount>>;

    /// Full record including the password hash.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>>;

    async fn list(&self, filter: ListFilter) -> AppResult<Vec<SafeAccount>>;

    async fn list_inactive(&self, cutoff: OffsetDateTime) -> AppResult<Vec<SafeAccount>>;

    /// Applies `changes` and bumps `updated_at`. Fails with `NotFound`.
    async fn update(&self, id: Uuid, changes: AccountChanges) -> AppResult<SafeAccount>;

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> AppResult<()>;

    /// Fails with `NotFound`.
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

pub(crate) fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("User with ID \"{}\" not found", id))
}

pub(crate) fn email_taken() -> AppError {
    AppError::Conflict("Email already registered".into())
}

#[derive(Clone)]
pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create(&self, new: NewAccount) -> AppResult<SafeAccount> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            ACCOUNT_COLUMNS
        );
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.name)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(new.role)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => email_taken(),
                other => AppError::Database(other),
            })?;
        Ok(account.into())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<SafeAccount>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", ACCOUNT_COLUMNS);
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(account.map(SafeAccount::from))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", ACCOUNT_COLUMNS);
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(account)
    }

    async fn list(&self, filter: ListFilter) -> AppResult<Vec<SafeAccount>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM users", ACCOUNT_COLUMNS));
        if let Some(role) = filter.role {
            qb.push(" WHERE role = ").push_bind(role);
        }
        // Column and direction come from closed enums, never from raw input.
        qb.push(format!(
            " ORDER BY {} {}, id ASC",
            filter.sort_by.column(),
            filter.order.keyword()
        ));
        let rows = qb.build_query_as::<Account>().fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(SafeAccount::from).collect())
    }

    async fn list_inactive(&self, cutoff: OffsetDateTime) -> AppResult<Vec<SafeAccount>> {
        let sql = format!(
            "SELECT {} FROM users \
             WHERE last_login_at < $1 \
                OR (last_login_at IS NULL AND created_at < $1) \
             ORDER BY created_at ASC, id ASC",
            ACCOUNT_COLUMNS
        );
        let rows = sqlx::query_as::<_, Account>(&sql)
            .bind(cutoff)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(SafeAccount::from).collect())
    }

    async fn update(&self, id: Uuid, changes: AccountChanges) -> AppResult<SafeAccount> {
        let sql = format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                password_hash = COALESCE($3, password_hash), \
                role = COALESCE($4, role), \
                updated_at = now() \
             WHERE id = $1 RETURNING {}",
            ACCOUNT_COLUMNS
        );
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.password_hash)
            .bind(changes.role)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| not_found(id))?;
        Ok(account.into())
    }

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}
