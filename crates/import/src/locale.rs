use chrono::NaiveDate;
use extrato_core::Money;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid date '{0}': expected DD/MM/YYYY")]
    InvalidDate(String),
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),
    #[error("empty {0} field")]
    EmptyField(&'static str),
    #[error("expected at least {expected} columns, found {found}")]
    TooFewColumns { expected: usize, found: usize },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {source}")]
    Row {
        row: u64,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Attaches the data-row number so batch failures name the offending row.
    pub fn at_row(self, row: u64) -> ParseError {
        ParseError::Row {
            row,
            source: Box::new(self),
        }
    }
}

/// One parsed statement line, not yet persisted.
#[derive(Debug, Clone)]
pub struct StatementRow {
    pub date: NaiveDate,
    /// Document text as it appeared in the file, trimmed only.
    pub document_raw: String,
    /// Normalized document text used for matching and fingerprinting.
    pub document: String,
    pub amount: Money,
}

/// Strict `DD/MM/YYYY`: exactly two/two/four digits after trimming.
/// Calendar validity (month range, day-of-month, leap years) is delegated
/// to `NaiveDate::from_ymd_opt`.
pub fn parse_date(text: &str) -> Result<NaiveDate, ParseError> {
    let s = text.trim();
    let invalid = || ParseError::InvalidDate(s.to_string());

    let mut parts = s.split('/');
    let (day, month, year) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(d), Some(m), Some(y), None) => (d, m, y),
        _ => return Err(invalid()),
    };

    if day.len() != 2 || month.len() != 2 || year.len() != 4 {
        return Err(invalid());
    }
    if ![day, month, year]
        .iter()
        .all(|p| p.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(invalid());
    }

    let day: u32 = day.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let year: i32 = year.parse().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// pt-BR numeric convention: `.` groups thousands, `,` is the decimal
/// separator. An optional `R$` prefix is stripped and a parenthesized
/// value is negative: `(1.000,00)` → -1000.00.
pub fn parse_amount(text: &str) -> Result<Money, ParseError> {
    let s = text.trim();
    let invalid = || ParseError::InvalidAmount(text.trim().to_string());
    if s.is_empty() {
        return Err(invalid());
    }

    let (parenthesized, s) = if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        (true, s[1..s.len() - 1].trim())
    } else {
        (false, s)
    };

    let s = s.strip_prefix("R$").map(str::trim_start).unwrap_or(s);
    if s.is_empty() {
        return Err(invalid());
    }

    // `,` splits off the decimal part; everything before it must be a
    // correctly grouped pt-BR integer, so an en-US "1,000.00" is rejected
    // instead of misread as 1.00.
    let (int_part, frac_part) = match s.split_once(',') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };
    if !valid_integer_part(int_part) {
        return Err(invalid());
    }
    if let Some(f) = frac_part {
        if f.is_empty() || !f.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
    }

    let normalized = s.replace('.', "").replace(',', ".");
    let mut dec = Decimal::from_str(&normalized).map_err(|_| invalid())?;
    if parenthesized {
        dec = -dec;
    }

    let money = Money::from_decimal(dec);
    if money.try_to_cents().is_none() {
        return Err(invalid());
    }
    Ok(money)
}

/// Digits with optional `-` sign; when `.` separators appear, the first
/// group is 1-3 digits and every later group exactly 3.
fn valid_integer_part(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    if let Some((first, rest)) = s.split_once('.') {
        if first.is_empty() || first.len() > 3 || !first.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        rest.split('.')
            .all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
    } else {
        s.chars().all(|c| c.is_ascii_digit())
    }
}

/// Trims, collapses whitespace runs to a single space, and uppercases.
/// Accented characters stay accented (`café` → `CAFÉ`); no transliteration.
pub fn normalize_document(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Fixed column positions: date, document, amount. Trailing columns
/// (balance, branch codes) are ignored.
const COL_DATE: usize = 0;
const COL_DOCUMENT: usize = 1;
const COL_AMOUNT: usize = 2;
const REQUIRED_COLUMNS: usize = 3;

pub fn parse_row(record: &csv::StringRecord) -> Result<StatementRow, ParseError> {
    if record.len() < REQUIRED_COLUMNS {
        return Err(ParseError::TooFewColumns {
            expected: REQUIRED_COLUMNS,
            found: record.len(),
        });
    }

    let date_field = record.get(COL_DATE).unwrap_or_default().trim();
    let document_field = record.get(COL_DOCUMENT).unwrap_or_default().trim();
    let amount_field = record.get(COL_AMOUNT).unwrap_or_default().trim();

    if date_field.is_empty() {
        return Err(ParseError::EmptyField("date"));
    }
    if document_field.is_empty() {
        return Err(ParseError::EmptyField("document"));
    }
    if amount_field.is_empty() {
        return Err(ParseError::EmptyField("amount"));
    }

    Ok(StatementRow {
        date: parse_date(date_field)?,
        document_raw: document_field.to_string(),
        document: normalize_document(document_field),
        amount: parse_amount(amount_field)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_date ────────────────────────────────────────────────────────────

    #[test]
    fn parse_date_valid() {
        let d = parse_date("31/12/2024").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }

    #[test]
    fn parse_date_trims_whitespace() {
        assert!(parse_date("  15/03/2025  ").is_ok());
    }

    #[test]
    fn parse_date_leap_year() {
        assert!(parse_date("29/02/2024").is_ok());
        assert!(parse_date("29/02/2025").is_err());
    }

    #[test]
    fn parse_date_day_out_of_range() {
        assert!(parse_date("32/01/2025").is_err());
        assert!(parse_date("31/04/2025").is_err()); // April has 30 days
    }

    #[test]
    fn parse_date_month_out_of_range() {
        assert!(parse_date("03/13/2025").is_err());
        assert!(parse_date("03/00/2025").is_err());
    }

    #[test]
    fn parse_date_wrong_shape() {
        assert!(parse_date("2025-01-03").is_err());
        assert!(parse_date("1/2/2025").is_err()); // single digits
        assert!(parse_date("01/02/25").is_err()); // two-digit year
        assert!(parse_date("01/02").is_err());
        assert!(parse_date("01/02/2025/09").is_err());
        assert!(parse_date("").is_err());
    }

    // ── parse_amount ──────────────────────────────────────────────────────────

    #[test]
    fn parse_amount_thousands_and_decimal() {
        assert_eq!(parse_amount("1.234,56").unwrap().to_cents(), 123456);
    }

    #[test]
    fn parse_amount_parenthesized_negative() {
        assert_eq!(parse_amount("(500,00)").unwrap().to_cents(), -50000);
        assert_eq!(parse_amount("(1.000,00)").unwrap().to_cents(), -100000);
    }

    #[test]
    fn parse_amount_currency_prefix() {
        assert_eq!(parse_amount("R$ 2.000,00").unwrap().to_cents(), 200000);
        assert_eq!(parse_amount("  R$2.000,00 ").unwrap().to_cents(), 200000);
    }

    #[test]
    fn parse_amount_prefix_inside_parens() {
        assert_eq!(parse_amount("(R$ 75,25)").unwrap().to_cents(), -7525);
    }

    #[test]
    fn parse_amount_explicit_minus() {
        assert_eq!(parse_amount("-50,00").unwrap().to_cents(), -5000);
    }

    #[test]
    fn parse_amount_no_thousands() {
        assert_eq!(parse_amount("0,05").unwrap().to_cents(), 5);
        assert_eq!(parse_amount("100").unwrap().to_cents(), 10000);
    }

    #[test]
    fn parse_amount_invalid() {
        assert!(parse_amount("").is_err());
        assert!(parse_amount("   ").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("R$").is_err());
        assert!(parse_amount("()").is_err());
    }

    #[test]
    fn parse_amount_rejects_en_us_convention() {
        // `.` as the decimal separator must fail, not misread as 1.00.
        assert!(parse_amount("1,000.00").is_err());
        assert!(parse_amount("10.00").is_err());
        assert!(parse_amount("1.00,00").is_err()); // bad group width
        assert!(parse_amount("1.0000,00").is_err());
    }

    #[test]
    fn parse_amount_rejects_second_decimal_separator() {
        assert!(parse_amount("1,0,0").is_err());
        assert!(parse_amount("1,").is_err());
    }

    #[test]
    fn parse_amount_rejects_amounts_beyond_cents_range() {
        // Well-formed pt-BR, but too large for integer cents.
        assert!(parse_amount("100.000.000.000.000.000.000,00").is_err());
        assert_eq!(
            parse_amount("1.000.000.000.000,00").unwrap().to_cents(),
            100_000_000_000_000
        );
    }

    // ── normalize_document ────────────────────────────────────────────────────

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_document("  TRANSF   PADARIA  "), "TRANSF PADARIA");
        assert_eq!(normalize_document("a\t b\n c"), "A B C");
    }

    #[test]
    fn normalize_preserves_accents() {
        assert_eq!(normalize_document("café josé"), "CAFÉ JOSÉ");
        assert_eq!(normalize_document("CAFÉ JOSÉ"), "CAFÉ JOSÉ");
    }

    // ── parse_row ─────────────────────────────────────────────────────────────

    fn record(fields: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(fields.to_vec())
    }

    #[test]
    fn parse_row_basic() {
        let row = parse_row(&record(&["15/03/2025", " pix  padaria central ", "(35,90)"])).unwrap();
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        assert_eq!(row.document, "PIX PADARIA CENTRAL");
        assert_eq!(row.document_raw, "pix  padaria central");
        assert_eq!(row.amount.to_cents(), -3590);
    }

    #[test]
    fn parse_row_ignores_trailing_columns() {
        let row = parse_row(&record(&["01/01/2025", "TED", "10,00", "saldo", "9.999,99"])).unwrap();
        assert_eq!(row.amount.to_cents(), 1000);
    }

    #[test]
    fn parse_row_too_few_columns() {
        assert!(matches!(
            parse_row(&record(&["01/01/2025", "TED"])),
            Err(ParseError::TooFewColumns { found: 2, .. })
        ));
    }

    #[test]
    fn parse_row_empty_fields() {
        assert!(matches!(
            parse_row(&record(&["  ", "TED", "10,00"])),
            Err(ParseError::EmptyField("date"))
        ));
        assert!(matches!(
            parse_row(&record(&["01/01/2025", "", "10,00"])),
            Err(ParseError::EmptyField("document"))
        ));
        assert!(matches!(
            parse_row(&record(&["01/01/2025", "TED", " "])),
            Err(ParseError::EmptyField("amount"))
        ));
    }

    #[test]
    fn row_error_carries_row_number() {
        let err = ParseError::EmptyField("date").at_row(7);
        assert_eq!(err.to_string(), "row 7: empty date field");
    }
}
