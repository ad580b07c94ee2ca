//! Observed MWEB outputs and balance accounting

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One confidential output reported by the daemon
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Utxo {
    /// Unique output identifier
    pub output_id: String,
    /// Value in litoshis
    pub value: u64,
    /// Receiving address
    pub address: String,
    /// Block height, 0 while unconfirmed
    pub height: u32,
    /// Block timestamp in epoch seconds, 0 when unknown
    pub block_time: u64,
}

impl Utxo {
    /// Included in a block
    pub fn is_confirmed(&self) -> bool {
        self.height > 0
    }
}

/// Balance snapshot in litoshis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Sum of outputs with height > 0
    pub confirmed: u64,
    /// Sum of outputs with height == 0
    pub unconfirmed: u64,
    /// `confirmed + unconfirmed`
    pub total: u64,
}

/// Outputs keyed by output id, in arrival order.
///
/// An id is an immutable key: once present, later occurrences are
/// duplicates and never replace or merge into the stored entry. Balances
/// are recomputed from the entries on every call.
#[derive(Debug, Clone, Default)]
pub struct UtxoSet {
    entries: IndexMap<String, Utxo>,
}

impl UtxoSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `utxo` unless its id is already present. Returns true if inserted.
    pub fn insert(&mut self, utxo: Utxo) -> bool {
        if self.entries.contains_key(&utxo.output_id) {
            return false;
        }
        self.entries.insert(utxo.output_id.clone(), utxo);
        true
    }

    /// Look up an output by id
    pub fn get(&self, output_id: &str) -> Option<&Utxo> {
        self.entries.get(output_id)
    }

    /// Whether `output_id` has been observed
    pub fn contains(&self, output_id: &str) -> bool {
        self.entries.contains_key(output_id)
    }

    /// Number of distinct outputs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No outputs observed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outputs in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &Utxo> {
        self.entries.values()
    }

    /// Output ids in arrival order
    pub fn output_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Drop every entry
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Sum of confirmed values
    pub fn confirmed_balance(&self) -> u64 {
        self.sum(|utxo| utxo.is_confirmed())
    }

    /// Sum of unconfirmed values
    pub fn unconfirmed_balance(&self) -> u64 {
        self.sum(|utxo| !utxo.is_confirmed())
    }

    /// Sum of all values
    pub fn total_balance(&self) -> u64 {
        self.sum(|_| true)
    }

    /// All three balances from a single pass
    pub fn balance(&self) -> Balance {
        let (confirmed, unconfirmed) =
            self.entries
                .values()
                .fold((0u64, 0u64), |(confirmed, unconfirmed), utxo| {
                    if utxo.is_confirmed() {
                        (confirmed.saturating_add(utxo.value), unconfirmed)
                    } else {
                        (confirmed, unconfirmed.saturating_add(utxo.value))
                    }
                });
        Balance {
            confirmed,
            unconfirmed,
            total: confirmed.saturating_add(unconfirmed),
        }
    }

    fn sum(&self, filter: impl Fn(&Utxo) -> bool) -> u64 {
        self.entries
            .values()
            .filter(|utxo| filter(utxo))
            .fold(0u64, |acc, utxo| acc.saturating_add(utxo.value))
    }
}

impl<'a> IntoIterator for &'a UtxoSet {
    type Item = &'a Utxo;
    type IntoIter = indexmap::map::Values<'a, String, Utxo>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}
