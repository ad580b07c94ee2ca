//! Derived address batches

/// Addresses for the index range `[from_index, from_index + len)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressBatch {
    from_index: u32,
    addresses: Vec<String>,
}

impl AddressBatch {
    /// Batch starting at `from_index`
    pub fn new(from_index: u32, addresses: Vec<String>) -> Self {
        Self {
            from_index,
            addresses,
        }
    }

    /// Parse the legacy comma-joined encoding
    pub fn from_delimited(from_index: u32, joined: &str) -> Self {
        let addresses = joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(from_index, addresses)
    }

    /// Legacy comma-joined encoding
    pub fn to_delimited(&self) -> String {
        self.addresses.join(",")
    }

    /// First index in the batch
    pub fn from_index(&self) -> u32 {
        self.from_index
    }

    /// One past the last index in the batch
    pub fn to_index(&self) -> u32 {
        let len = u32::try_from(self.addresses.len()).unwrap_or(u32::MAX);
        self.from_index.saturating_add(len)
    }

    /// Address for absolute `index`, if inside the batch
    pub fn get(&self, index: u32) -> Option<&str> {
        let offset = index.checked_sub(self.from_index)?;
        self.addresses.get(offset as usize).map(String::as_str)
    }

    /// Addresses in index order
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// `(index, address)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        (self.from_index..=u32::MAX).zip(self.addresses.iter().map(String::as_str))
    }

    /// Number of addresses
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// No addresses
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Take the addresses
    pub fn into_inner(self) -> Vec<String> {
        self.addresses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimited_parse() {
        let batch = AddressBatch::from_delimited(5, "ltcmweb1aa, ltcmweb1bb,,");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.get(5), Some("ltcmweb1aa"));
        assert_eq!(batch.get(6), Some("ltcmweb1bb"));
        assert_eq!(batch.get(4), None);
        assert_eq!(batch.to_index(), 7);
        assert_eq!(batch.to_delimited(), "ltcmweb1aa,ltcmweb1bb");
    }

    #[test]
    fn test_iter_indices() {
        let batch = AddressBatch::new(10, vec!["x".into(), "y".into()]);
        let pairs: Vec<_> = batch.iter().collect();
        assert_eq!(pairs, vec![(10, "x"), (11, "y")]);
    }

    #[test]
    fn test_indices_saturate_at_u32_max() {
        let batch = AddressBatch::new(u32::MAX - 1, vec!["x".into(), "y".into(), "z".into()]);
        assert_eq!(batch.to_index(), u32::MAX);
        assert_eq!(batch.get(u32::MAX), Some("y"));
        let pairs: Vec<_> = batch.iter().collect();
        assert_eq!(pairs, vec![(u32::MAX - 1, "x"), (u32::MAX, "y")]);
    }
}
