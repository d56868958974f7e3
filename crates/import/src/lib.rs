pub mod encoding;
pub mod hash;
pub mod locale;
pub mod rules;
pub mod statement;

pub use hash::{file_checksum, row_fingerprint};
pub use locale::{normalize_document, parse_amount, parse_date, ParseError, StatementRow};
pub use rules::{compile_pattern, rules_from_toml, RuleEngine, RuleError, RuleMatch, RuleSpec};
pub use statement::{StatementFormat, StatementReader};
