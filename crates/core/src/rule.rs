use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::UserId;
use super::category::{CategoryId, TransactionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub i64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatcherKind {
    Contains,
    Regex,
}

impl MatcherKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MatcherKind::Contains => "CONTAINS",
            MatcherKind::Regex => "REGEX",
        }
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatcherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONTAINS" => Ok(MatcherKind::Contains),
            "REGEX" => Ok(MatcherKind::Regex),
            other => Err(format!("unknown matcher kind: '{other}'")),
        }
    }
}

/// One classification instruction. Rules are versioned: editing matching
/// behavior inserts a new version and deactivates the old row, so a
/// transaction classified by `(id, version)` stays explainable forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: Option<RuleId>,
    pub version: i64,
    pub matcher: MatcherKind,
    pub pattern: String,
    pub category_id: CategoryId,
    pub transaction_type: TransactionType,
    pub active: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Rule {
    pub fn new(
        matcher: MatcherKind,
        pattern: &str,
        category_id: CategoryId,
        transaction_type: TransactionType,
        created_by: UserId,
    ) -> Self {
        Rule {
            id: None,
            version: 1,
            matcher,
            pattern: pattern.to_string(),
            category_id,
            transaction_type,
            active: true,
            created_by,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn matcher_round_trip() {
        assert_eq!(
            MatcherKind::from_str("CONTAINS").unwrap(),
            MatcherKind::Contains
        );
        assert_eq!(MatcherKind::from_str("REGEX").unwrap(), MatcherKind::Regex);
        assert!(MatcherKind::from_str("GLOB").is_err());
    }

    #[test]
    fn new_rule_starts_at_version_one() {
        let rule = Rule::new(
            MatcherKind::Contains,
            "PADARIA",
            CategoryId(1),
            TransactionType::Despesa,
            UserId(1),
        );
        assert_eq!(rule.version, 1);
        assert!(rule.active);
    }
}
