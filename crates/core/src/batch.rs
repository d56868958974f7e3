use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::{AccountId, UserId};
use super::period::StatementPeriod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub i64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The encoding a statement file was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

impl TextEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Latin1 => "ISO-8859-1",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UTF-8" => Ok(TextEncoding::Utf8),
            "ISO-8859-1" => Ok(TextEncoding::Latin1),
            other => Err(format!("unknown text encoding: '{other}'")),
        }
    }
}

/// One CSV upload. Insert-only: batches are never mutated or deleted,
/// they are the import half of the audit trail.
/// `(account_id, checksum, period)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub id: Option<BatchId>,
    pub account_id: AccountId,
    pub uploaded_by: UserId,
    pub uploaded_at: DateTime<Utc>,
    /// SHA-256 of the raw file bytes, lowercase hex.
    pub checksum: String,
    pub period: StatementPeriod,
    pub encoding: TextEncoding,
    /// Rows parsed from the file, including rows later skipped as
    /// fingerprint duplicates.
    pub row_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn encoding_round_trip() {
        assert_eq!(
            TextEncoding::from_str(TextEncoding::Utf8.as_str()).unwrap(),
            TextEncoding::Utf8
        );
        assert_eq!(
            TextEncoding::from_str(TextEncoding::Latin1.as_str()).unwrap(),
            TextEncoding::Latin1
        );
        assert!(TextEncoding::from_str("UTF-16").is_err());
    }
}
