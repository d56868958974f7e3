use extrato_import::RuleEngine;

use crate::db::DbPool;
use crate::error::StorageError;
use crate::rules::active_rules;

/// Result of one classification pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyOutcome {
    /// Transactions that were at source `NONE` when the pass started.
    pub candidates: u64,
    /// How many a rule actually classified.
    pub classified: u64,
}

/// Run the rule engine over every unclassified transaction.
///
/// Safe to re-run at any time and safe to run alongside imports and
/// overrides: each UPDATE is predicated on the row still being at
/// source `NONE`, so a concurrent override always wins and rows
/// imported mid-pass are simply picked up next time.
pub async fn run_rule_pass(pool: &DbPool) -> Result<ClassifyOutcome, StorageError> {
    let engine = RuleEngine::new(active_rules(pool).await?)?;
    if engine.is_empty() {
        tracing::debug!("no active rules, skipping classification pass");
        return Ok(ClassifyOutcome::default());
    }

    let candidates = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, document FROM transactions WHERE classification_source = 'NONE' ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut outcome = ClassifyOutcome {
        candidates: candidates.len() as u64,
        classified: 0,
    };

    for (id, document) in &candidates {
        let Some(m) = engine.first_match(document) else {
            continue; // unclassified is an outcome, not an error
        };

        let result = sqlx::query(
            "UPDATE transactions
             SET category_id = ?, transaction_type = ?, classification_source = 'RULE',
                 rule_id = ?, rule_version = ?, rationale = ?
             WHERE id = ? AND classification_source = 'NONE'",
        )
        .bind(m.category_id.0)
        .bind(m.transaction_type.as_str())
        .bind(m.rule_id.0)
        .bind(m.rule_version)
        .bind(&m.rationale)
        .bind(id)
        .execute(pool)
        .await?;

        outcome.classified += result.rows_affected();
    }

    tracing::info!(
        candidates = outcome.candidates,
        classified = outcome.classified,
        "classification pass complete"
    );

    Ok(outcome)
}
