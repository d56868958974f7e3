pub mod classify;
pub mod db;
pub mod error;
pub mod import;
pub mod overrides;
pub mod rules;
pub mod transactions;

pub use classify::{run_rule_pass, ClassifyOutcome};
pub use db::{
    create_account, create_category, create_db, get_account, get_all_categories, get_category,
    get_category_by_name, seed_default_categories, DbPool,
};
pub use error::StorageError;
pub use import::{batches_for_account, get_batch, import_statement, ImportOutcome};
pub use overrides::{apply_override, override_history, OverrideRequest};
pub use rules::{
    active_rules, all_rules, create_rule, create_rules_from_specs, deactivate_rule, get_rule,
    get_rule_version, revise_rule,
};
pub use transactions::{
    get_transaction, reset_classification, transactions_for_account, transactions_for_batch,
    unclassified_transactions,
};
