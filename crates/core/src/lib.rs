pub mod account;
pub mod batch;
pub mod category;
pub mod money;
pub mod overrides;
pub mod period;
pub mod rule;
pub mod transaction;

pub use account::{Account, AccountId, AccountStatus, Actor, UserId};
pub use batch::{BatchId, ImportBatch, TextEncoding};
pub use category::{Category, CategoryId, TransactionType, DEFAULT_CATEGORIES};
pub use money::Money;
pub use overrides::{OverrideId, OverrideRecord};
pub use period::{PeriodError, StatementPeriod};
pub use rule::{MatcherKind, Rule, RuleId};
pub use transaction::{
    Classification, ClassificationSource, StatementTransaction, TransactionId,
};
