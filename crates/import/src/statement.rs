use extrato_core::TextEncoding;
use std::borrow::Cow;
use std::io::{Cursor, Read};

use crate::locale::{parse_row, ParseError, StatementRow};

/// Shape of a bank's CSV export. pt-BR exports are usually
/// semicolon-delimited because the amounts themselves contain commas.
#[derive(Debug, Clone)]
pub struct StatementFormat {
    pub delimiter: u8,
    pub has_header: bool,
}

impl Default for StatementFormat {
    fn default() -> Self {
        Self {
            delimiter: b';',
            has_header: true,
        }
    }
}

/// Streaming reader over a statement file: detects the encoding once,
/// then yields one parsed row at a time so large files never have to be
/// materialized as a row vector.
pub struct StatementReader<'a> {
    records: csv::StringRecordsIntoIter<Box<dyn Read + Send + 'a>>,
    encoding: TextEncoding,
    row: u64,
}

impl<'a> StatementReader<'a> {
    pub fn new(bytes: &'a [u8], format: &StatementFormat) -> Self {
        let (text, encoding) = crate::encoding::decode(bytes);
        let source: Box<dyn Read + Send + 'a> = match text {
            Cow::Borrowed(s) => Box::new(s.as_bytes()),
            Cow::Owned(s) => Box::new(Cursor::new(s.into_bytes())),
        };

        let reader = csv::ReaderBuilder::new()
            .delimiter(format.delimiter)
            .has_headers(format.has_header)
            .flexible(true)
            .from_reader(source);

        Self {
            records: reader.into_records(),
            encoding,
            row: 0,
        }
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }
}

impl Iterator for StatementReader<'_> {
    type Item = Result<StatementRow, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(r) => r,
                Err(e) => return Some(Err(ParseError::Csv(e).at_row(self.row + 1))),
            };

            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }

            self.row += 1;
            return Some(parse_row(&record).map_err(|e| e.at_row(self.row)));
        }
    }
}
