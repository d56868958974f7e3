use extrato_core::TextEncoding;
use std::borrow::Cow;

/// Detect whether raw statement bytes are UTF-8 or Latin-1. Brazilian
/// bank exports come in both; anything that is not valid UTF-8 is
/// treated as Latin-1, where every byte maps to the code point of the
/// same value so decoding cannot fail.
pub fn detect(bytes: &[u8]) -> TextEncoding {
    if std::str::from_utf8(bytes).is_ok() {
        TextEncoding::Utf8
    } else {
        TextEncoding::Latin1
    }
}

/// Decode statement bytes, borrowing when the input is already UTF-8.
pub fn decode(bytes: &[u8]) -> (Cow<'_, str>, TextEncoding) {
    match std::str::from_utf8(bytes) {
        Ok(s) => (Cow::Borrowed(s), TextEncoding::Utf8),
        Err(_) => {
            let mut s = String::with_capacity(bytes.len());
            for &b in bytes {
                s.push(b as char);
            }
            (Cow::Owned(s), TextEncoding::Latin1)
        }
    }
}
