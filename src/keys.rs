//! Byte-comparable composite key encoding for range search

/// Builder for fixed-width, byte-comparable composite keys.
///
/// Keys address ranges in the legacy store: each appended field is encoded
/// left-padded at the width declared by the engine's schema metadata, so
/// concatenated keys compare bytewise in the same order as their field
/// tuples. Keys are write-only probes; there is no decoder.
///
/// Widths must come from
/// [`field_length`](crate::traits::IsamEngine::field_length). Passing a
/// value wider than the declared width is a programming error and panics.
#[derive(Debug, Default)]
pub struct KeyBuilder {
    key: String,
}

impl KeyBuilder {
    pub fn new() -> Self {
        Self { key: String::new() }
    }

    /// Append a non-negative number, zero-padded to `width` digits.
    pub fn append_numeric(mut self, value: i64, width: usize) -> Self {
        assert!(
            value >= 0,
            "numeric key field must be non-negative, got {value}"
        );
        let encoded = format!("{value:0width$}");
        assert!(
            encoded.len() <= width,
            "numeric key field {value} exceeds declared width {width}"
        );
        self.key.push_str(&encoded);
        self
    }

    /// Append an alphanumeric value, uppercased and space-padded to
    /// `width` characters.
    pub fn append_text(mut self, value: &str, width: usize) -> Self {
        let upper = value.to_uppercase();
        assert!(
            upper.chars().count() <= width,
            "text key field '{value}' exceeds declared width {width}"
        );
        let pad = width - upper.chars().count();
        for _ in 0..pad {
            self.key.push(' ');
        }
        self.key.push_str(&upper);
        self
    }

    pub fn build(self) -> String {
        self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_fields_are_zero_padded() {
        let key = KeyBuilder::new()
            .append_numeric(30, 3)
            .append_numeric(1, 3)
            .build();
        assert_eq!(key, "030001");
    }

    #[test]
    fn text_fields_are_space_padded_and_uppercased() {
        let key = KeyBuilder::new().append_text("a10", 6).build();
        assert_eq!(key, "   A10");
    }

    #[test]
    fn encoding_preserves_tuple_order() {
        let enc = |table: i64, ledger: i64| {
            KeyBuilder::new()
                .append_numeric(table, 3)
                .append_numeric(ledger, 3)
                .build()
        };
        assert!(enc(30, 2) < enc(30, 10));
        assert!(enc(30, 999) < enc(40, 0));
    }

    #[test]
    fn round_trip_within_declared_widths() {
        // Decoding is not part of the API; slicing with the same declared
        // widths must still reproduce the original pair.
        for table in [0i64, 9, 30, 999] {
            for ledger in [0i64, 1, 42, 999] {
                let key = KeyBuilder::new()
                    .append_numeric(table, 3)
                    .append_numeric(ledger, 3)
                    .build();
                assert_eq!(key.len(), 6);
                assert_eq!(key[..3].parse::<i64>().unwrap(), table);
                assert_eq!(key[3..].parse::<i64>().unwrap(), ledger);
            }
        }
    }

    #[test]
    #[should_panic(expected = "exceeds declared width")]
    fn numeric_overflow_fails_fast() {
        let _ = KeyBuilder::new().append_numeric(1000, 3);
    }

    #[test]
    #[should_panic(expected = "exceeds declared width")]
    fn text_overflow_fails_fast() {
        let _ = KeyBuilder::new().append_text("TOOLONG", 3);
    }

    #[test]
    #[should_panic(expected = "non-negative")]
    fn negative_numeric_fails_fast() {
        let _ = KeyBuilder::new().append_numeric(-1, 3);
    }
}
