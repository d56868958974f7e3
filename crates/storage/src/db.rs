use chrono::{DateTime, SecondsFormat, Utc};
use extrato_core::{
    Account, AccountId, AccountStatus, Category, CategoryId, TransactionType, DEFAULT_CATEGORIES,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

use crate::error::StorageError;

pub type DbPool = Pool<Sqlite>;

/// Open (or create) the database and bring the schema up to date.
/// The pool is the one shared resource handle; every operation takes it
/// explicitly, nothing reaches for a global.
pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            transaction_type TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Logical rule identity is (rule_id, version); revising a rule inserts
    // a new version row and deactivates the old one, so versions referenced
    // by classified transactions survive untouched.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rule_id INTEGER NOT NULL,
            version INTEGER NOT NULL,
            matcher TEXT NOT NULL,
            pattern TEXT NOT NULL,
            category_id INTEGER NOT NULL REFERENCES categories(id),
            transaction_type TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_by INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(rule_id, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Batch-level idempotency lives in the UNIQUE tuple; concurrent
    // uploads of the same file race safely on it.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_batches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL REFERENCES accounts(id),
            uploaded_by INTEGER NOT NULL,
            uploaded_at TEXT NOT NULL,
            checksum TEXT NOT NULL,
            period_month INTEGER NOT NULL,
            period_year INTEGER NOT NULL,
            encoding TEXT NOT NULL,
            row_count INTEGER NOT NULL DEFAULT 0,
            UNIQUE(account_id, checksum, period_month, period_year)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Row-level idempotency: the fingerprint is unique per account, so a
    // statement line present in two overlapping uploads is stored once.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL REFERENCES accounts(id),
            batch_id INTEGER NOT NULL REFERENCES import_batches(id),
            date TEXT NOT NULL,
            document_raw TEXT NOT NULL,
            document TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL DEFAULT 'BRL',
            fingerprint TEXT NOT NULL,
            classification_source TEXT NOT NULL DEFAULT 'NONE',
            category_id INTEGER REFERENCES categories(id),
            transaction_type TEXT,
            rule_id INTEGER,
            rule_version INTEGER,
            rationale TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(account_id, fingerprint)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classification_overrides (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_id INTEGER NOT NULL REFERENCES transactions(id),
            previous_category_id INTEGER,
            previous_type TEXT,
            new_category_id INTEGER NOT NULL REFERENCES categories(id),
            new_type TEXT NOT NULL,
            overridden_by INTEGER NOT NULL,
            reason TEXT,
            overridden_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transactions_unclassified
         ON transactions(classification_source) WHERE classification_source = 'NONE'",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub(crate) fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| StorageError::Corrupt(format!("timestamp '{s}'")))
}

pub(crate) fn parse_stored<T: FromStr<Err = String>>(s: &str) -> Result<T, StorageError> {
    s.parse().map_err(StorageError::Corrupt)
}

pub async fn seed_default_categories(pool: &DbPool) -> Result<(), sqlx::Error> {
    for (name, transaction_type) in DEFAULT_CATEGORIES {
        sqlx::query("INSERT OR IGNORE INTO categories (name, transaction_type) VALUES (?, ?)")
            .bind(name)
            .bind(transaction_type.as_str())
            .execute(pool)
            .await?;
    }
    Ok(())
}

pub async fn create_account(pool: &DbPool, name: &str) -> Result<Account, StorageError> {
    let (id,) = sqlx::query_as::<_, (i64,)>(
        "INSERT INTO accounts (name, status, created_at) VALUES (?, 'active', ?) RETURNING id",
    )
    .bind(name)
    .bind(now_utc())
    .fetch_one(pool)
    .await?;

    Ok(Account {
        id: Some(AccountId(id)),
        name: name.to_string(),
        status: AccountStatus::Active,
    })
}

pub async fn get_account(pool: &DbPool, id: AccountId) -> Result<Option<Account>, StorageError> {
    let row = sqlx::query_as::<_, (i64, String, String)>(
        "SELECT id, name, status FROM accounts WHERE id = ?",
    )
    .bind(id.0)
    .fetch_optional(pool)
    .await?;

    row.map(|(id, name, status)| {
        Ok(Account {
            id: Some(AccountId(id)),
            name,
            status: parse_stored(&status)?,
        })
    })
    .transpose()
}

pub async fn get_category(pool: &DbPool, id: CategoryId) -> Result<Option<Category>, StorageError> {
    let row = sqlx::query_as::<_, (i64, String, String)>(
        "SELECT id, name, transaction_type FROM categories WHERE id = ?",
    )
    .bind(id.0)
    .fetch_optional(pool)
    .await?;

    row.map(map_category).transpose()
}

pub async fn get_category_by_name(
    pool: &DbPool,
    name: &str,
) -> Result<Option<Category>, StorageError> {
    let row = sqlx::query_as::<_, (i64, String, String)>(
        "SELECT id, name, transaction_type FROM categories WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    row.map(map_category).transpose()
}

pub async fn get_all_categories(pool: &DbPool) -> Result<Vec<Category>, StorageError> {
    let rows = sqlx::query_as::<_, (i64, String, String)>(
        "SELECT id, name, transaction_type FROM categories ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(map_category).collect()
}

pub async fn create_category(
    pool: &DbPool,
    name: &str,
    transaction_type: TransactionType,
) -> Result<Category, StorageError> {
    let (id,) = sqlx::query_as::<_, (i64,)>(
        "INSERT INTO categories (name, transaction_type) VALUES (?, ?) RETURNING id",
    )
    .bind(name)
    .bind(transaction_type.as_str())
    .fetch_one(pool)
    .await?;

    Ok(Category {
        id: Some(CategoryId(id)),
        name: name.to_string(),
        transaction_type,
    })
}

fn map_category((id, name, transaction_type): (i64, String, String)) -> Result<Category, StorageError> {
    Ok(Category {
        id: Some(CategoryId(id)),
        name,
        transaction_type: parse_stored(&transaction_type)?,
    })
}
