use extrato_core::{
    Actor, CategoryId, OverrideId, OverrideRecord, TransactionId, TransactionType, UserId,
};

use crate::db::{now_utc, parse_stored, parse_timestamp, DbPool};
use crate::error::StorageError;

/// A manual correction as submitted by the caller. The actor arrives
/// separately as explicit context.
#[derive(Debug, Clone)]
pub struct OverrideRequest {
    pub transaction_id: TransactionId,
    pub new_category_id: CategoryId,
    pub new_type: TransactionType,
    pub reason: Option<String>,
}

/// Apply a manual classification correction and append the audit entry.
///
/// The audit row captures the state being replaced; the transaction then
/// carries the new category with source `OVERRIDE` and no rule reference,
/// since it is now explained by the override record rather than a rule.
/// Overriding again later appends another record; the trail is never edited.
pub async fn apply_override(
    pool: &DbPool,
    request: &OverrideRequest,
    actor: &Actor,
) -> Result<OverrideRecord, StorageError> {
    let category = crate::db::get_category(pool, request.new_category_id)
        .await?
        .ok_or(StorageError::CategoryNotFound(request.new_category_id))?;
    if category.transaction_type != request.new_type {
        return Err(StorageError::TypeMismatch {
            category: request.new_category_id,
            category_type: category.transaction_type,
            requested: request.new_type,
        });
    }

    let mut tx = pool.begin().await?;

    let previous = sqlx::query_as::<_, (Option<i64>, Option<String>)>(
        "SELECT category_id, transaction_type FROM transactions WHERE id = ?",
    )
    .bind(request.transaction_id.0)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(StorageError::TransactionNotFound(request.transaction_id))?;

    let previous_category_id = previous.0.map(CategoryId);
    let previous_type: Option<TransactionType> =
        previous.1.as_deref().map(parse_stored).transpose()?;

    let overridden_at = now_utc();
    let (id,) = sqlx::query_as::<_, (i64,)>(
        "INSERT INTO classification_overrides
             (transaction_id, previous_category_id, previous_type, new_category_id, new_type,
              overridden_by, reason, overridden_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(request.transaction_id.0)
    .bind(previous_category_id.map(|c| c.0))
    .bind(previous_type.map(|t| t.as_str()))
    .bind(request.new_category_id.0)
    .bind(request.new_type.as_str())
    .bind(actor.user_id.0)
    .bind(&request.reason)
    .bind(&overridden_at)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE transactions
         SET category_id = ?, transaction_type = ?, classification_source = 'OVERRIDE',
             rule_id = NULL, rule_version = NULL, rationale = NULL
         WHERE id = ?",
    )
    .bind(request.new_category_id.0)
    .bind(request.new_type.as_str())
    .bind(request.transaction_id.0)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        transaction = request.transaction_id.0,
        category = request.new_category_id.0,
        actor = actor.user_id.0,
        "classification overridden"
    );

    Ok(OverrideRecord {
        id: Some(OverrideId(id)),
        transaction_id: request.transaction_id,
        previous_category_id,
        previous_type,
        new_category_id: request.new_category_id,
        new_type: request.new_type,
        overridden_by: actor.user_id,
        reason: request.reason.clone(),
        overridden_at: parse_timestamp(&overridden_at)?,
    })
}

/// The full audit trail for one transaction, oldest first.
pub async fn override_history(
    pool: &DbPool,
    transaction_id: TransactionId,
) -> Result<Vec<OverrideRecord>, StorageError> {
    type Row = (
        i64,
        i64,
        Option<i64>,
        Option<String>,
        i64,
        String,
        i64,
        Option<String>,
        String,
    );

    let rows = sqlx::query_as::<_, Row>(
        "SELECT id, transaction_id, previous_category_id, previous_type, new_category_id,
                new_type, overridden_by, reason, overridden_at
         FROM classification_overrides WHERE transaction_id = ? ORDER BY id",
    )
    .bind(transaction_id.0)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(id, tx_id, prev_cat, prev_type, new_cat, new_type, by, reason, at)| {
            Ok(OverrideRecord {
                id: Some(OverrideId(id)),
                transaction_id: TransactionId(tx_id),
                previous_category_id: prev_cat.map(CategoryId),
                previous_type: prev_type.as_deref().map(parse_stored).transpose()?,
                new_category_id: CategoryId(new_cat),
                new_type: parse_stored(&new_type)?,
                overridden_by: UserId(by),
                reason,
                overridden_at: parse_timestamp(&at)?,
            })
        })
        .collect()
}
