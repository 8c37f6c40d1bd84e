//! Database helpers for accounts.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

/// Columns selected for every account read; timestamps rendered to RFC3339.
const USER_COLUMNS: &str = r#"
    id,
    email,
    username,
    full_name,
    hashed_password,
    is_active,
    is_admin,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    CASE
        WHEN updated_at IS NULL THEN NULL
        ELSE to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
    END AS updated_at
"#;

/// A full account row. The stored hash never leaves the handler layer.
#[derive(Debug, Clone)]
pub(crate) struct UserRow {
    pub(crate) id: i64,
    pub(crate) email: String,
    pub(crate) username: String,
    pub(crate) full_name: Option<String>,
    pub(crate) hashed_password: String,
    pub(crate) is_active: bool,
    pub(crate) is_admin: bool,
    pub(crate) created_at: String,
    pub(crate) updated_at: Option<String>,
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> UserRow {
    UserRow {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        full_name: row.get("full_name"),
        hashed_password: row.get("hashed_password"),
        is_active: row.get("is_active"),
        is_admin: row.get("is_admin"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Apply the idempotent schema at startup.
pub(crate) async fn init_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await
        .context("failed to apply database schema")?;
    Ok(())
}

/// Look up an account by username or email, for login.
pub(crate) async fn fetch_user_by_identifier(
    pool: &PgPool,
    identifier: &str,
) -> Result<Option<UserRow>> {
    let query =
        format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $1 LIMIT 1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let row = sqlx::query(&query)
        .bind(identifier)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by identifier")?;
    Ok(row.as_ref().map(user_from_row))
}

/// Look up an account by id, for principal resolution.
pub(crate) async fn fetch_user(pool: &PgPool, user_id: i64) -> Result<Option<UserRow>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 LIMIT 1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by id")?;
    Ok(row.as_ref().map(user_from_row))
}

pub(crate) async fn count_users(pool: &PgPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
        .fetch_one(pool)
        .await
        .context("failed to count accounts")?;
    Ok(row.get("count"))
}

pub(crate) async fn email_exists(pool: &PgPool, email: &str) -> Result<bool> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1) AS found")
        .bind(email)
        .fetch_one(pool)
        .await
        .context("failed to check email")?;
    Ok(row.get("found"))
}

pub(crate) async fn username_exists(pool: &PgPool, username: &str) -> Result<bool> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1) AS found")
        .bind(username)
        .fetch_one(pool)
        .await
        .context("failed to check username")?;
    Ok(row.get("found"))
}

pub(crate) struct NewUser<'a> {
    pub(crate) email: &'a str,
    pub(crate) username: &'a str,
    pub(crate) full_name: Option<&'a str>,
    pub(crate) hashed_password: &'a str,
    pub(crate) is_admin: bool,
}

/// Outcome of an insert attempt; a unique violation means another request
/// won the race between our pre-checks and the insert.
pub(crate) enum InsertOutcome {
    Created(UserRow),
    Conflict,
}

pub(crate) async fn insert_user(pool: &PgPool, user: NewUser<'_>) -> Result<InsertOutcome> {
    let query = format!(
        r"
        INSERT INTO users (email, username, full_name, hashed_password, is_admin)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {USER_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT"
    );
    let row = sqlx::query(&query)
        .bind(user.email)
        .bind(user.username)
        .bind(user.full_name)
        .bind(user.hashed_password)
        .bind(user.is_admin)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(InsertOutcome::Created(user_from_row(&row))),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert account"),
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn schema_has_core_tables() {
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS users"));
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS portfolios"));
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS trades"));
    }
}
