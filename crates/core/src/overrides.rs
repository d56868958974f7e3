use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::UserId;
use super::category::{CategoryId, TransactionType};
use super::transaction::TransactionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverrideId(pub i64);

impl fmt::Display for OverrideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One manual correction, written exactly once and never touched again.
/// Previous category/type are null when the transaction was still
/// unclassified at override time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub id: Option<OverrideId>,
    pub transaction_id: TransactionId,
    pub previous_category_id: Option<CategoryId>,
    pub previous_type: Option<TransactionType>,
    pub new_category_id: CategoryId,
    pub new_type: TransactionType,
    pub overridden_by: UserId,
    pub reason: Option<String>,
    pub overridden_at: DateTime<Utc>,
}
