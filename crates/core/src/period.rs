use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("month out of range: {0}")]
    MonthOutOfRange(u32),
    #[error("year out of range: {0}")]
    YearOutOfRange(i32),
}

/// The statement month a batch was uploaded for. Part of the batch
/// uniqueness tuple, so two uploads of the same file land in the same
/// batch slot only when they target the same period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatementPeriod {
    month: u32,
    year: i32,
}

impl StatementPeriod {
    pub fn new(month: u32, year: i32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::MonthOutOfRange(month));
        }
        if !(1900..=9999).contains(&year) {
            return Err(PeriodError::YearOutOfRange(year));
        }
        Ok(StatementPeriod { month, year })
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn year(self) -> i32 {
        self.year
    }
}

impl fmt::Display for StatementPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

impl std::str::FromStr for StatementPeriod {
    type Err = String;

    /// Parses `MM/YYYY`, e.g. `03/2025`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (m, y) = s
            .split_once('/')
            .ok_or_else(|| format!("expected MM/YYYY, got '{s}'"))?;
        let month: u32 = m.parse().map_err(|_| format!("invalid month: '{m}'"))?;
        let year: i32 = y.parse().map_err(|_| format!("invalid year: '{y}'"))?;
        StatementPeriod::new(month, year).map_err(|e| e.to_string())
    }
}
