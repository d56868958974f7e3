use chrono::NaiveDate;
use extrato_core::Money;
use sha2::{Digest, Sha256};

/// Compute SHA-256 of an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode a raw 32-byte hash as a lowercase hex string (64 chars).
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Whole-file checksum over the raw bytes, computed before any decoding.
/// Used only for duplicate-batch detection.
pub fn file_checksum(bytes: &[u8]) -> String {
    to_hex(&sha256_bytes(bytes))
}

/// Per-row fingerprint over the normalized values, so the same statement
/// line is recognized across uploads regardless of surrounding file
/// content. Input shape: `YYYY-MM-DD|NORMALIZED DOCUMENT|cents`.
pub fn row_fingerprint(date: NaiveDate, document: &str, amount: Money) -> String {
    let input = format!("{date}|{document}|{}", amount.to_cents());
    to_hex(&sha256_bytes(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256 of empty bytes is a known constant.
        assert_eq!(
            file_checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn checksum_is_deterministic() {
        assert_eq!(file_checksum(b"hello"), file_checksum(b"hello"));
        assert_ne!(file_checksum(b"hello"), file_checksum(b"world"));
    }

    #[test]
    fn fingerprint_depends_on_all_parts() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let base = row_fingerprint(date, "PIX PADARIA", Money::from_cents(-3590));

        assert_eq!(
            base,
            row_fingerprint(date, "PIX PADARIA", Money::from_cents(-3590))
        );
        assert_ne!(
            base,
            row_fingerprint(date, "PIX PADARIA", Money::from_cents(-3591))
        );
        assert_ne!(
            base,
            row_fingerprint(date, "PIX MERCADO", Money::from_cents(-3590))
        );
        assert_ne!(
            base,
            row_fingerprint(
                NaiveDate::from_ymd_opt(2025, 3, 16).unwrap(),
                "PIX PADARIA",
                Money::from_cents(-3590)
            )
        );
    }

    #[test]
    fn fingerprint_is_hex_64() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let fp = row_fingerprint(date, "TED", Money::from_cents(100));
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
