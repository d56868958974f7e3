use chrono::NaiveDate;
use extrato_core::{
    AccountId, BatchId, CategoryId, Classification, Money, RuleId, StatementTransaction,
    TransactionId,
};

use crate::db::{parse_stored, DbPool};
use crate::error::StorageError;

const TX_COLUMNS: &str = "id, account_id, batch_id, date, document_raw, document, amount_cents, \
     currency, fingerprint, classification_source, category_id, transaction_type, rule_id, \
     rule_version, rationale";

type TxRow = (
    i64,            // id
    i64,            // account_id
    i64,            // batch_id
    String,         // date
    String,         // document_raw
    String,         // document
    i64,            // amount_cents
    String,         // currency
    String,         // fingerprint
    String,         // classification_source
    Option<i64>,    // category_id
    Option<String>, // transaction_type
    Option<i64>,    // rule_id
    Option<i64>,    // rule_version
    Option<String>, // rationale
);

fn map_transaction(row: TxRow) -> Result<StatementTransaction, StorageError> {
    let (
        id,
        account_id,
        batch_id,
        date,
        document_raw,
        document,
        amount_cents,
        currency,
        fingerprint,
        source,
        category_id,
        transaction_type,
        rule_id,
        rule_version,
        rationale,
    ) = row;

    let date: NaiveDate = date
        .parse()
        .map_err(|_| StorageError::Corrupt(format!("date '{date}'")))?;

    Ok(StatementTransaction {
        id: Some(TransactionId(id)),
        account_id: AccountId(account_id),
        batch_id: BatchId(batch_id),
        date,
        document_raw,
        document,
        amount: Money::from_cents(amount_cents),
        currency,
        fingerprint,
        classification: Classification {
            source: parse_stored(&source)?,
            category_id: category_id.map(CategoryId),
            transaction_type: transaction_type.as_deref().map(parse_stored).transpose()?,
            rule_id: rule_id.map(RuleId),
            rule_version,
            rationale,
        },
    })
}

pub async fn get_transaction(
    pool: &DbPool,
    id: TransactionId,
) -> Result<Option<StatementTransaction>, StorageError> {
    let row = sqlx::query_as::<_, TxRow>(&format!(
        "SELECT {TX_COLUMNS} FROM transactions WHERE id = ?"
    ))
    .bind(id.0)
    .fetch_optional(pool)
    .await?;

    row.map(map_transaction).transpose()
}

pub async fn transactions_for_batch(
    pool: &DbPool,
    batch_id: BatchId,
) -> Result<Vec<StatementTransaction>, StorageError> {
    let rows = sqlx::query_as::<_, TxRow>(&format!(
        "SELECT {TX_COLUMNS} FROM transactions WHERE batch_id = ? ORDER BY date, id"
    ))
    .bind(batch_id.0)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(map_transaction).collect()
}

pub async fn transactions_for_account(
    pool: &DbPool,
    account_id: AccountId,
) -> Result<Vec<StatementTransaction>, StorageError> {
    let rows = sqlx::query_as::<_, TxRow>(&format!(
        "SELECT {TX_COLUMNS} FROM transactions WHERE account_id = ? ORDER BY date, id"
    ))
    .bind(account_id.0)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(map_transaction).collect()
}

/// Transactions still awaiting classification, oldest first.
pub async fn unclassified_transactions(
    pool: &DbPool,
) -> Result<Vec<StatementTransaction>, StorageError> {
    let rows = sqlx::query_as::<_, TxRow>(&format!(
        "SELECT {TX_COLUMNS} FROM transactions WHERE classification_source = 'NONE' ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(map_transaction).collect()
}

/// Put a transaction back to `NONE` so the next rule pass re-evaluates
/// it. The only sanctioned way to re-run rules over a classified row.
pub async fn reset_classification(
    pool: &DbPool,
    id: TransactionId,
) -> Result<(), StorageError> {
    let result = sqlx::query(
        "UPDATE transactions SET classification_source = 'NONE', category_id = NULL,
         transaction_type = NULL, rule_id = NULL, rule_version = NULL, rationale = NULL
         WHERE id = ?",
    )
    .bind(id.0)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::TransactionNotFound(id));
    }
    Ok(())
}
