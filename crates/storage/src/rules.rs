use extrato_core::{Actor, CategoryId, MatcherKind, Rule, RuleId, TransactionType, UserId};
use extrato_import::{compile_pattern, RuleSpec};

use crate::db::{now_utc, parse_stored, parse_timestamp, DbPool};
use crate::error::StorageError;

const RULE_COLUMNS: &str = "rule_id, version, matcher, pattern, category_id, transaction_type, \
     active, created_by, created_at";

type RuleRow = (i64, i64, String, String, i64, String, i64, i64, String);

fn map_rule(row: RuleRow) -> Result<Rule, StorageError> {
    let (rule_id, version, matcher, pattern, category_id, transaction_type, active, created_by, created_at) =
        row;
    Ok(Rule {
        id: Some(RuleId(rule_id)),
        version,
        matcher: parse_stored(&matcher)?,
        pattern,
        category_id: CategoryId(category_id),
        transaction_type: parse_stored(&transaction_type)?,
        active: active != 0,
        created_by: UserId(created_by),
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Validate the target category and its type against the rule's own.
async fn check_category(
    pool: &DbPool,
    category_id: CategoryId,
    transaction_type: TransactionType,
) -> Result<(), StorageError> {
    let category = crate::db::get_category(pool, category_id)
        .await?
        .ok_or(StorageError::CategoryNotFound(category_id))?;
    if category.transaction_type != transaction_type {
        return Err(StorageError::TypeMismatch {
            category: category_id,
            category_type: category.transaction_type,
            requested: transaction_type,
        });
    }
    Ok(())
}

/// Author a new rule at version 1. The pattern is compile-checked here,
/// so a malformed regex never reaches the matching engine.
pub async fn create_rule(
    pool: &DbPool,
    matcher: MatcherKind,
    pattern: &str,
    category_id: CategoryId,
    transaction_type: TransactionType,
    actor: &Actor,
) -> Result<Rule, StorageError> {
    compile_pattern(matcher, pattern)?;
    check_category(pool, category_id, transaction_type).await?;

    let created_at = now_utc();
    let (rule_id,) = sqlx::query_as::<_, (i64,)>(
        "INSERT INTO rules
             (rule_id, version, matcher, pattern, category_id, transaction_type, active, created_by, created_at)
         VALUES ((SELECT COALESCE(MAX(rule_id), 0) + 1 FROM rules), 1, ?, ?, ?, ?, 1, ?, ?)
         RETURNING rule_id",
    )
    .bind(matcher.as_str())
    .bind(pattern)
    .bind(category_id.0)
    .bind(transaction_type.as_str())
    .bind(actor.user_id.0)
    .bind(&created_at)
    .fetch_one(pool)
    .await?;

    get_rule(pool, RuleId(rule_id))
        .await?
        .ok_or(StorageError::RuleNotFound(RuleId(rule_id)))
}

/// Change a rule's matching behavior by appending a new version and
/// deactivating the old one. The old row stays as written: transactions
/// classified against it remain explainable.
pub async fn revise_rule(
    pool: &DbPool,
    rule_id: RuleId,
    matcher: MatcherKind,
    pattern: &str,
    category_id: CategoryId,
    transaction_type: TransactionType,
    actor: &Actor,
) -> Result<Rule, StorageError> {
    compile_pattern(matcher, pattern)?;
    check_category(pool, category_id, transaction_type).await?;

    let current = get_rule(pool, rule_id)
        .await?
        .ok_or(StorageError::RuleNotFound(rule_id))?;

    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE rules SET active = 0 WHERE rule_id = ?")
        .bind(rule_id.0)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "INSERT INTO rules
             (rule_id, version, matcher, pattern, category_id, transaction_type, active, created_by, created_at)
         VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(rule_id.0)
    .bind(current.version + 1)
    .bind(matcher.as_str())
    .bind(pattern)
    .bind(category_id.0)
    .bind(transaction_type.as_str())
    .bind(actor.user_id.0)
    .bind(now_utc())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    get_rule(pool, rule_id)
        .await?
        .ok_or(StorageError::RuleNotFound(rule_id))
}

pub async fn deactivate_rule(pool: &DbPool, rule_id: RuleId) -> Result<(), StorageError> {
    let result = sqlx::query("UPDATE rules SET active = 0 WHERE rule_id = ? AND active = 1")
        .bind(rule_id.0)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::RuleNotFound(rule_id));
    }
    Ok(())
}

/// The latest version of one rule.
pub async fn get_rule(pool: &DbPool, rule_id: RuleId) -> Result<Option<Rule>, StorageError> {
    let row = sqlx::query_as::<_, RuleRow>(&format!(
        "SELECT {RULE_COLUMNS} FROM rules WHERE rule_id = ? ORDER BY version DESC LIMIT 1"
    ))
    .bind(rule_id.0)
    .fetch_optional(pool)
    .await?;

    row.map(map_rule).transpose()
}

/// One specific version, exactly as it was when it classified something.
pub async fn get_rule_version(
    pool: &DbPool,
    rule_id: RuleId,
    version: i64,
) -> Result<Option<Rule>, StorageError> {
    let row = sqlx::query_as::<_, RuleRow>(&format!(
        "SELECT {RULE_COLUMNS} FROM rules WHERE rule_id = ? AND version = ?"
    ))
    .bind(rule_id.0)
    .bind(version)
    .fetch_optional(pool)
    .await?;

    row.map(map_rule).transpose()
}

/// Active rules in engine evaluation order: ascending creation time,
/// rule id breaking ties.
pub async fn active_rules(pool: &DbPool) -> Result<Vec<Rule>, StorageError> {
    let rows = sqlx::query_as::<_, RuleRow>(&format!(
        "SELECT {RULE_COLUMNS} FROM rules WHERE active = 1 ORDER BY created_at, rule_id"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(map_rule).collect()
}

/// Every version of every rule, for inspection.
pub async fn all_rules(pool: &DbPool) -> Result<Vec<Rule>, StorageError> {
    let rows = sqlx::query_as::<_, RuleRow>(&format!(
        "SELECT {RULE_COLUMNS} FROM rules ORDER BY rule_id, version"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(map_rule).collect()
}

/// Create rules from a parsed TOML rule file, resolving category names.
pub async fn create_rules_from_specs(
    pool: &DbPool,
    specs: &[RuleSpec],
    actor: &Actor,
) -> Result<Vec<Rule>, StorageError> {
    let mut created = Vec::with_capacity(specs.len());
    for spec in specs {
        let category = crate::db::get_category_by_name(pool, &spec.category)
            .await?
            .ok_or_else(|| StorageError::CategoryNameNotFound(spec.category.clone()))?;
        let rule = create_rule(
            pool,
            spec.matcher,
            &spec.pattern,
            category.id.expect("persisted category has an id"),
            spec.transaction_type,
            actor,
        )
        .await?;
        created.push(rule);
    }
    Ok(created)
}
