use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use extrato_core::{
    AccountId, Actor, MatcherKind, RuleId, StatementPeriod, TransactionId, TransactionType, UserId,
};
use extrato_import::{rules_from_toml, StatementFormat};
use extrato_storage as storage;
use extrato_storage::{DbPool, OverrideRequest};

/// Bank-statement ingestion and classification.
#[derive(Parser)]
#[command(name = "extrato", version)]
struct Cli {
    /// Path to the SQLite database.
    #[arg(long, default_value = "extrato.db")]
    db: PathBuf,

    /// Acting user id, recorded on uploads, rules and overrides.
    #[arg(long, default_value_t = 1)]
    user: i64,

    /// Acting user name.
    #[arg(long, default_value = "operador")]
    user_name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account.
    AccountAdd { name: String },

    /// Import a statement CSV for an account and period.
    Import {
        #[arg(long)]
        account: i64,
        /// Statement period as MM/YYYY.
        #[arg(long)]
        period: String,
        /// Field delimiter (single byte).
        #[arg(long, default_value = ";")]
        delimiter: String,
        /// Treat the first line as data, not a header.
        #[arg(long)]
        no_header: bool,
        file: PathBuf,
    },

    /// Run the rule engine over unclassified transactions.
    Classify,

    /// Manually correct one transaction's classification.
    Override {
        #[arg(long)]
        transaction: i64,
        /// Target category name.
        #[arg(long)]
        category: String,
        /// RECEITA or DESPESA.
        #[arg(long, value_name = "TYPE")]
        r#type: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Show the override audit trail for a transaction.
    History {
        #[arg(long)]
        transaction: i64,
    },

    /// Add a single classification rule.
    RuleAdd {
        /// CONTAINS or REGEX.
        #[arg(long)]
        matcher: String,
        #[arg(long)]
        pattern: String,
        /// Target category name.
        #[arg(long)]
        category: String,
        /// RECEITA or DESPESA.
        #[arg(long, value_name = "TYPE")]
        r#type: String,
    },

    /// Load rules from a TOML rule file.
    RuleLoad { file: PathBuf },

    /// List every rule version.
    RuleList,

    /// Deactivate a rule.
    RuleDeactivate { rule: i64 },

    /// List import batches for an account.
    Batches {
        #[arg(long)]
        account: i64,
    },

    /// List transactions for an account.
    Transactions {
        #[arg(long)]
        account: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let pool = storage::create_db(&cli.db)
        .await
        .with_context(|| format!("failed to open database at {}", cli.db.display()))?;
    storage::seed_default_categories(&pool).await?;

    let actor = Actor::new(UserId(cli.user), &cli.user_name);

    match cli.command {
        Command::AccountAdd { name } => {
            let account = storage::create_account(&pool, &name).await?;
            println!("created account {} ({})", account.id.expect("persisted account has an id"), account.name);
        }

        Command::Import {
            account,
            period,
            delimiter,
            no_header,
            file,
        } => {
            let period = StatementPeriod::from_str(&period)
                .map_err(|e| anyhow::anyhow!("invalid --period: {e}"))?;
            let [delimiter] = delimiter.as_bytes() else {
                bail!("--delimiter must be a single byte");
            };
            let format = StatementFormat {
                delimiter: *delimiter,
                has_header: !no_header,
            };
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;

            let outcome =
                storage::import_statement(&pool, AccountId(account), &actor, period, &format, &bytes)
                    .await?;
            println!(
                "batch {}: {} rows parsed, {} inserted, {} already known ({})",
                outcome.batch_id,
                outcome.rows_parsed,
                outcome.rows_inserted,
                outcome.rows_skipped,
                outcome.encoding
            );
        }

        Command::Classify => {
            let outcome = storage::run_rule_pass(&pool).await?;
            println!(
                "{} candidates, {} classified",
                outcome.candidates, outcome.classified
            );
        }

        Command::Override {
            transaction,
            category,
            r#type,
            reason,
        } => {
            let new_type = parse_type(&r#type)?;
            let category = resolve_category(&pool, &category).await?;
            let record = storage::apply_override(
                &pool,
                &OverrideRequest {
                    transaction_id: TransactionId(transaction),
                    new_category_id: category,
                    new_type,
                    reason,
                },
                &actor,
            )
            .await?;
            println!(
                "override {} recorded for transaction {}",
                record.id.expect("persisted override has an id"),
                record.transaction_id
            );
        }

        Command::History { transaction } => {
            let records =
                storage::override_history(&pool, TransactionId(transaction)).await?;
            if records.is_empty() {
                println!("no overrides for transaction {transaction}");
            }
            for r in records {
                println!(
                    "{} {} -> category {} ({}) by user {}{}",
                    r.overridden_at.format("%Y-%m-%d %H:%M:%S"),
                    r.previous_category_id
                        .map_or("unclassified".to_string(), |c| format!("category {c}")),
                    r.new_category_id,
                    r.new_type,
                    r.overridden_by,
                    r.reason.map_or(String::new(), |s| format!(" ({s})")),
                );
            }
        }

        Command::RuleAdd {
            matcher,
            pattern,
            category,
            r#type,
        } => {
            let matcher = MatcherKind::from_str(&matcher.to_uppercase())
                .map_err(|e| anyhow::anyhow!("invalid --matcher: {e}"))?;
            let transaction_type = parse_type(&r#type)?;
            let category = resolve_category(&pool, &category).await?;
            let rule = storage::create_rule(
                &pool,
                matcher,
                &pattern,
                category,
                transaction_type,
                &actor,
            )
            .await?;
            println!("created rule {} v{}", rule.id.expect("persisted rule has an id"), rule.version);
        }

        Command::RuleLoad { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let specs = rules_from_toml(&content)?;
            let created = storage::create_rules_from_specs(&pool, &specs, &actor).await?;
            println!("created {} rules from {}", created.len(), file.display());
        }

        Command::RuleList => {
            for rule in storage::all_rules(&pool).await? {
                println!(
                    "rule {} v{} [{}] {} \"{}\" -> category {} ({})",
                    rule.id.expect("persisted rule has an id"),
                    rule.version,
                    if rule.active { "active" } else { "inactive" },
                    rule.matcher,
                    rule.pattern,
                    rule.category_id,
                    rule.transaction_type,
                );
            }
        }

        Command::RuleDeactivate { rule } => {
            storage::deactivate_rule(&pool, RuleId(rule)).await?;
            println!("deactivated rule {rule}");
        }

        Command::Batches { account } => {
            for b in storage::batches_for_account(&pool, AccountId(account)).await? {
                println!(
                    "batch {} period {} rows {} encoding {} checksum {}",
                    b.id.expect("persisted batch has an id"),
                    b.period,
                    b.row_count,
                    b.encoding,
                    &b.checksum[..12],
                );
            }
        }

        Command::Transactions { account } => {
            for t in storage::transactions_for_account(&pool, AccountId(account)).await? {
                let c = &t.classification;
                println!(
                    "{} {} {} {} [{}]{}",
                    t.id.expect("persisted transaction has an id"),
                    t.date,
                    t.amount,
                    t.document,
                    c.source,
                    c.rationale
                        .as_deref()
                        .map_or(String::new(), |r| format!(" {r}")),
                );
            }
        }
    }

    Ok(())
}

fn parse_type(s: &str) -> Result<TransactionType> {
    TransactionType::from_str(&s.to_uppercase())
        .map_err(|e| anyhow::anyhow!("invalid --type: {e}"))
}

async fn resolve_category(pool: &DbPool, name: &str) -> Result<extrato_core::CategoryId> {
    let category = storage::get_category_by_name(pool, name)
        .await?
        .with_context(|| format!("unknown category '{name}'"))?;
    Ok(category.id.expect("persisted category has an id"))
}
