use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::AccountId;
use super::batch::BatchId;
use super::category::{CategoryId, TransactionType};
use super::money::Money;
use super::rule::RuleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provenance of a transaction's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassificationSource {
    Rule,
    Override,
    None,
}

impl ClassificationSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassificationSource::Rule => "RULE",
            ClassificationSource::Override => "OVERRIDE",
            ClassificationSource::None => "NONE",
        }
    }
}

impl fmt::Display for ClassificationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClassificationSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RULE" => Ok(ClassificationSource::Rule),
            "OVERRIDE" => Ok(ClassificationSource::Override),
            "NONE" => Ok(ClassificationSource::None),
            other => Err(format!("unknown classification source: '{other}'")),
        }
    }
}

/// How a transaction came to carry its category. Mirrors the columns the
/// classify pass and the override recorder write together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub source: ClassificationSource,
    pub category_id: Option<CategoryId>,
    pub transaction_type: Option<TransactionType>,
    pub rule_id: Option<RuleId>,
    pub rule_version: Option<i64>,
    pub rationale: Option<String>,
}

impl Classification {
    pub fn none() -> Self {
        Classification {
            source: ClassificationSource::None,
            category_id: None,
            transaction_type: None,
            rule_id: None,
            rule_version: None,
            rationale: None,
        }
    }

    /// Invariants: `RULE` carries a rule reference and rationale,
    /// `NONE` carries no category, `OVERRIDE` carries no rule reference.
    pub fn is_consistent(&self) -> bool {
        match self.source {
            ClassificationSource::None => {
                self.category_id.is_none() && self.rule_id.is_none() && self.rationale.is_none()
            }
            ClassificationSource::Rule => {
                self.category_id.is_some()
                    && self.rule_id.is_some()
                    && self.rule_version.is_some()
                    && self.rationale.is_some()
            }
            ClassificationSource::Override => {
                self.category_id.is_some() && self.rule_id.is_none() && self.rule_version.is_none()
            }
        }
    }
}

/// One bank-statement line. Created at import with source `NONE`;
/// reclassified in place by the rule pass or an override, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementTransaction {
    pub id: Option<TransactionId>,
    pub account_id: AccountId,
    pub batch_id: BatchId,
    pub date: NaiveDate,
    pub document_raw: String,
    pub document: String,
    pub amount: Money,
    pub currency: String,
    pub fingerprint: String,
    pub classification: Classification,
}
