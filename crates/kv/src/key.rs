//! Row keys.

use crate::tuple::{self, TupleValue};

/// A row address: a fixed-width table prefix plus the tuple of index
/// parts identifying the row (or row range) within that table.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    table: Vec<u8>,
    index_parts: Vec<TupleValue>,
}

impl Key {
    /// Builds a key from a table prefix and index parts.
    pub fn new(table: Vec<u8>, index_parts: Vec<TupleValue>) -> Self {
        Self { table, index_parts }
    }

    /// Builds a key addressing an entire table: empty index parts, so the
    /// packed key is exactly the table prefix and a range read over it
    /// scans every row.
    pub fn table_scan(table: Vec<u8>) -> Self {
        Self { table, index_parts: Vec::new() }
    }

    /// The table prefix.
    pub fn table(&self) -> &[u8] {
        &self.table
    }

    /// The index parts.
    pub fn index_parts(&self) -> &[TupleValue] {
        &self.index_parts
    }

    /// Packs the index parts into the byte key used within the table.
    pub fn packed_parts(&self) -> Vec<u8> {
        tuple::pack(&self.index_parts)
    }

    /// The full raw KV key: table prefix followed by the packed parts.
    pub fn pack(&self) -> Vec<u8> {
        let parts = self.packed_parts();
        let mut out = Vec::with_capacity(self.table.len() + parts.len());
        out.extend_from_slice(&self.table);
        out.extend_from_slice(&parts);
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_concatenates_table_and_parts() {
        let key = Key::new(b"data\x00\x00\x00\x01".to_vec(), vec![TupleValue::Int(7)]);
        let packed = key.pack();
        assert!(packed.starts_with(b"data\x00\x00\x00\x01"));
        assert_eq!(&packed[8..], tuple::pack(&[TupleValue::Int(7)]));
    }

    #[test]
    fn test_table_scan_packs_to_prefix() {
        let key = Key::table_scan(b"data1234".to_vec());
        assert_eq!(key.pack(), b"data1234");
    }

    #[test]
    fn test_determinism() {
        let make = || {
            Key::new(
                b"dataXXXX".to_vec(),
                vec![TupleValue::String("k".to_string()), TupleValue::Int(3)],
            )
        };
        assert_eq!(make().pack(), make().pack());
    }
}
