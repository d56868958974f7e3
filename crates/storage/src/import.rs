use extrato_core::{
    AccountId, Actor, BatchId, ImportBatch, StatementPeriod, TextEncoding, UserId,
};
use extrato_import::{encoding, file_checksum, row_fingerprint, StatementFormat, StatementReader};

use crate::db::{now_utc, parse_stored, parse_timestamp, DbPool};
use crate::error::{is_unique_violation, StorageError};

/// What one upload did. `rows_parsed` is the file's row count; the
/// inserted/skipped split tells an operator how much was net-new.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub batch_id: BatchId,
    pub checksum: String,
    pub encoding: TextEncoding,
    pub rows_parsed: i64,
    pub rows_inserted: i64,
    pub rows_skipped: i64,
}

/// Ingest one statement file for an account and period.
///
/// Everything happens inside a single database transaction: the batch
/// row, every statement row, and the final row count commit together or
/// not at all. A parse failure anywhere aborts the whole upload.
pub async fn import_statement(
    pool: &DbPool,
    account_id: AccountId,
    actor: &Actor,
    period: StatementPeriod,
    format: &StatementFormat,
    bytes: &[u8],
) -> Result<ImportOutcome, StorageError> {
    if crate::db::get_account(pool, account_id).await?.is_none() {
        return Err(StorageError::AccountNotFound(account_id));
    }

    // Checksum over the raw bytes, before any decoding touches them.
    let checksum = file_checksum(bytes);
    let detected = encoding::detect(bytes);

    // Fast path for retried uploads; the UNIQUE constraint below still
    // covers the concurrent race.
    if let Some(existing) = find_batch(pool, account_id, &checksum, period).await? {
        return Err(StorageError::DuplicateImport {
            account: account_id,
            period,
            existing,
        });
    }

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query_as::<_, (i64,)>(
        "INSERT INTO import_batches
             (account_id, uploaded_by, uploaded_at, checksum, period_month, period_year, encoding, row_count)
         VALUES (?, ?, ?, ?, ?, ?, ?, 0)
         RETURNING id",
    )
    .bind(account_id.0)
    .bind(actor.user_id.0)
    .bind(now_utc())
    .bind(&checksum)
    .bind(period.month())
    .bind(period.year())
    .bind(detected.as_str())
    .fetch_one(&mut *tx)
    .await;

    let batch_id = match inserted {
        Ok((id,)) => BatchId(id),
        Err(e) if is_unique_violation(&e) => {
            // Lost the race to a concurrent upload of the same file.
            drop(tx);
            let existing = find_batch(pool, account_id, &checksum, period)
                .await?
                .ok_or(StorageError::Database(e))?;
            return Err(StorageError::DuplicateImport {
                account: account_id,
                period,
                existing,
            });
        }
        Err(e) => return Err(e.into()),
    };

    let mut rows_parsed: i64 = 0;
    let mut rows_inserted: i64 = 0;

    for row in StatementReader::new(bytes, format) {
        let row = row?; // aborts the batch; dropping `tx` rolls back
        rows_parsed += 1;

        let fingerprint = row_fingerprint(row.date, &row.document, row.amount);
        let result = sqlx::query(
            "INSERT INTO transactions
                 (account_id, batch_id, date, document_raw, document, amount_cents,
                  currency, fingerprint, classification_source, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 'BRL', ?, 'NONE', ?)
             ON CONFLICT(account_id, fingerprint) DO NOTHING",
        )
        .bind(account_id.0)
        .bind(batch_id.0)
        .bind(row.date.to_string())
        .bind(&row.document_raw)
        .bind(&row.document)
        .bind(row.amount.to_cents())
        .bind(&fingerprint)
        .bind(now_utc())
        .execute(&mut *tx)
        .await?;

        rows_inserted += result.rows_affected() as i64;
    }

    if rows_parsed == 0 {
        return Err(StorageError::EmptyStatement);
    }

    sqlx::query("UPDATE import_batches SET row_count = ? WHERE id = ?")
        .bind(rows_parsed)
        .bind(batch_id.0)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let rows_skipped = rows_parsed - rows_inserted;
    tracing::info!(
        batch = batch_id.0,
        account = account_id.0,
        rows_parsed,
        rows_inserted,
        rows_skipped,
        encoding = %detected,
        "statement imported"
    );

    Ok(ImportOutcome {
        batch_id,
        checksum,
        encoding: detected,
        rows_parsed,
        rows_inserted,
        rows_skipped,
    })
}

async fn find_batch(
    pool: &DbPool,
    account_id: AccountId,
    checksum: &str,
    period: StatementPeriod,
) -> Result<Option<BatchId>, StorageError> {
    let row = sqlx::query_as::<_, (i64,)>(
        "SELECT id FROM import_batches
         WHERE account_id = ? AND checksum = ? AND period_month = ? AND period_year = ?",
    )
    .bind(account_id.0)
    .bind(checksum)
    .bind(period.month())
    .bind(period.year())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id,)| BatchId(id)))
}

type BatchRow = (i64, i64, i64, String, String, i64, i64, String, i64);

fn map_batch(row: BatchRow) -> Result<ImportBatch, StorageError> {
    let (id, account_id, uploaded_by, uploaded_at, checksum, month, year, enc, row_count) = row;
    let period = StatementPeriod::new(month as u32, year as i32)
        .map_err(|e| StorageError::Corrupt(e.to_string()))?;
    Ok(ImportBatch {
        id: Some(BatchId(id)),
        account_id: AccountId(account_id),
        uploaded_by: UserId(uploaded_by),
        uploaded_at: parse_timestamp(&uploaded_at)?,
        checksum,
        period,
        encoding: parse_stored(&enc)?,
        row_count,
    })
}

const BATCH_COLUMNS: &str = "id, account_id, uploaded_by, uploaded_at, checksum, period_month, \
     period_year, encoding, row_count";

pub async fn get_batch(pool: &DbPool, id: BatchId) -> Result<Option<ImportBatch>, StorageError> {
    let row = sqlx::query_as::<_, BatchRow>(&format!(
        "SELECT {BATCH_COLUMNS} FROM import_batches WHERE id = ?"
    ))
    .bind(id.0)
    .fetch_optional(pool)
    .await?;

    row.map(map_batch).transpose()
}

pub async fn batches_for_account(
    pool: &DbPool,
    account_id: AccountId,
) -> Result<Vec<ImportBatch>, StorageError> {
    let rows = sqlx::query_as::<_, BatchRow>(&format!(
        "SELECT {BATCH_COLUMNS} FROM import_batches WHERE account_id = ? ORDER BY uploaded_at, id"
    ))
    .bind(account_id.0)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(map_batch).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testutil::test_db;
    use crate::db::create_account;
    use crate::transactions::{transactions_for_account, transactions_for_batch};
    use extrato_core::ClassificationSource;

    const STATEMENT: &str = "\
Data;Documento;Valor
15/03/2025;PIX  PADARIA CENTRAL;(35,90)
16/03/2025;TED SALÁRIO EMPRESA;R$ 5.000,00
17/03/2025;DÉBITO MERCADO BOM PREÇO;(412,75)
";

    fn actor() -> Actor {
        Actor::new(UserId(1), "ana")
    }

    fn period() -> StatementPeriod {
        StatementPeriod::new(3, 2025).unwrap()
    }

    async fn import(
        pool: &DbPool,
        account: AccountId,
        data: &str,
    ) -> Result<ImportOutcome, StorageError> {
        import_statement(
            pool,
            account,
            &actor(),
            period(),
            &StatementFormat::default(),
            data.as_bytes(),
        )
        .await
    }

    #[tokio::test]
    async fn imports_all_rows_unclassified() {
        let (_dir, pool) = test_db().await;
        let account = create_account(&pool, "CC").await.unwrap().id.unwrap();

        let outcome = import(&pool, account, STATEMENT).await.unwrap();
        assert_eq!(outcome.rows_parsed, 3);
        assert_eq!(outcome.rows_inserted, 3);
        assert_eq!(outcome.rows_skipped, 0);
        assert_eq!(outcome.encoding, TextEncoding::Utf8);

        let txs = transactions_for_batch(&pool, outcome.batch_id).await.unwrap();
        assert_eq!(txs.len(), 3);
        assert!(txs
            .iter()
            .all(|t| t.classification.source == ClassificationSource::None));
        assert_eq!(txs[0].document, "PIX PADARIA CENTRAL");
        assert_eq!(txs[0].amount.to_cents(), -3590);
        assert_eq!(txs[1].amount.to_cents(), 500000);

        let batch = get_batch(&pool, outcome.batch_id).await.unwrap().unwrap();
        assert_eq!(batch.row_count, 3);
        assert_eq!(batch.checksum, outcome.checksum);
    }

    #[tokio::test]
    async fn same_file_twice_is_a_duplicate_batch() {
        let (_dir, pool) = test_db().await;
        let account = create_account(&pool, "CC").await.unwrap().id.unwrap();

        let first = import(&pool, account, STATEMENT).await.unwrap();
        let err = import(&pool, account, STATEMENT).await.unwrap_err();

        match err {
            StorageError::DuplicateImport { existing, .. } => {
                assert_eq!(existing, first.batch_id)
            }
            other => panic!("expected DuplicateImport, got {other}"),
        }

        // Nothing extra was written.
        let txs = transactions_for_account(&pool, account).await.unwrap();
        assert_eq!(txs.len(), 3);
        assert_eq!(batches_for_account(&pool, account).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn overlapping_file_inserts_only_new_rows() {
        let (_dir, pool) = test_db().await;
        let account = create_account(&pool, "CC").await.unwrap().id.unwrap();

        import(&pool, account, STATEMENT).await.unwrap();

        // Same three rows plus one new one; different bytes, so it is a
        // new batch, but only the new row lands.
        let extended = format!("{STATEMENT}18/03/2025;UBER VIAGEM;(23,40)\n");
        let outcome = import(&pool, account, &extended).await.unwrap();

        assert_eq!(outcome.rows_parsed, 4);
        assert_eq!(outcome.rows_inserted, 1);
        assert_eq!(outcome.rows_skipped, 3);

        let txs = transactions_for_account(&pool, account).await.unwrap();
        assert_eq!(txs.len(), 4);
    }

    #[tokio::test]
    async fn same_rows_for_other_account_are_not_duplicates() {
        let (_dir, pool) = test_db().await;
        let a = create_account(&pool, "CC A").await.unwrap().id.unwrap();
        let b = create_account(&pool, "CC B").await.unwrap().id.unwrap();

        import(&pool, a, STATEMENT).await.unwrap();
        let outcome = import(&pool, b, STATEMENT).await.unwrap();
        assert_eq!(outcome.rows_inserted, 3);
    }

    #[tokio::test]
    async fn bad_row_aborts_whole_batch() {
        let (_dir, pool) = test_db().await;
        let account = create_account(&pool, "CC").await.unwrap().id.unwrap();

        let data = "Data;Documento;Valor\n15/03/2025;PIX OK;10,00\n99/99/2025;QUEBRADO;5,00\n";
        let err = import(&pool, account, data).await.unwrap_err();
        assert!(matches!(err, StorageError::Parse(_)));
        assert!(err.to_string().contains("row 2"), "got: {err}");

        // All-or-nothing: the good first row was rolled back too.
        assert!(transactions_for_account(&pool, account).await.unwrap().is_empty());
        assert!(batches_for_account(&pool, account).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_statement_rejected() {
        let (_dir, pool) = test_db().await;
        let account = create_account(&pool, "CC").await.unwrap().id.unwrap();

        let err = import(&pool, account, "Data;Documento;Valor\n").await.unwrap_err();
        assert!(matches!(err, StorageError::EmptyStatement));
        assert!(batches_for_account(&pool, account).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_account_rejected() {
        let (_dir, pool) = test_db().await;
        let err = import(&pool, AccountId(42), STATEMENT).await.unwrap_err();
        assert!(matches!(err, StorageError::AccountNotFound(AccountId(42))));
    }

    #[tokio::test]
    async fn latin1_statement_records_encoding() {
        let (_dir, pool) = test_db().await;
        let account = create_account(&pool, "CC").await.unwrap().id.unwrap();

        let mut data = b"Data;Documento;Valor\n16/03/2025;TED SAL".to_vec();
        data.push(0xC1); // Á in Latin-1
        data.extend_from_slice(b"RIO;5.000,00\n");

        let outcome = import_statement(
            &pool,
            account,
            &actor(),
            period(),
            &StatementFormat::default(),
            &data,
        )
        .await
        .unwrap();

        assert_eq!(outcome.encoding, TextEncoding::Latin1);
        let txs = transactions_for_batch(&pool, outcome.batch_id).await.unwrap();
        assert_eq!(txs[0].document, "TED SALÁRIO");

        let batch = get_batch(&pool, outcome.batch_id).await.unwrap().unwrap();
        assert_eq!(batch.encoding, TextEncoding::Latin1);
    }
}
