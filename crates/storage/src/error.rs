use extrato_core::{
    AccountId, BatchId, CategoryId, RuleId, StatementPeriod, TransactionId, TransactionType,
};
use extrato_import::{ParseError, RuleError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// A malformed statement row. Import is all-or-nothing, so this
    /// aborts and rolls back the whole batch.
    #[error("statement rejected: {0}")]
    Parse(#[from] ParseError),

    #[error("statement contains no data rows")]
    EmptyStatement,

    /// The (account, checksum, period) tuple already exists. Nothing was
    /// written; the conflicting batch is named for the caller.
    #[error("duplicate import for account {account}, period {period}: already uploaded as batch {existing}")]
    DuplicateImport {
        account: AccountId,
        period: StatementPeriod,
        existing: BatchId,
    },

    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),

    #[error("category {0} not found")]
    CategoryNotFound(CategoryId),

    #[error("category named '{0}' not found")]
    CategoryNameNotFound(String),

    #[error("rule {0} not found")]
    RuleNotFound(RuleId),

    #[error("invalid rule: {0}")]
    Rule(#[from] RuleError),

    /// The requested type contradicts the category's own type.
    #[error("category {category} is {category_type}, not {requested}")]
    TypeMismatch {
        category: CategoryId,
        category_type: TransactionType,
        requested: TransactionType,
    },

    /// A stored value failed to map back to a domain type.
    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    /// Storage-layer failure. The enclosing transaction rolls back;
    /// retryable from the caller's point of view.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.kind() == sqlx::error::ErrorKind::UniqueViolation
    )
}
