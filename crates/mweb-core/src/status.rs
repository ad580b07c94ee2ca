//! Daemon sync status

use serde::{Deserialize, Serialize};

/// Point-in-time read of the daemon's sync heights
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Best block header height
    pub block_header_height: u32,
    /// Height of the latest MWEB header
    pub mweb_header_height: u32,
    /// Height up to which MWEB outputs have been synced
    pub mweb_utxos_height: u32,
    /// Timestamp of the best block, epoch seconds
    pub block_time: u64,
}

impl StatusSnapshot {
    /// Sync is complete when the UTXO set has caught up with the headers
    pub fn is_synced(&self) -> bool {
        self.mweb_utxos_height == self.block_header_height
    }

    /// Fraction of headers covered by the UTXO sync, in `[0, 1]`
    pub fn sync_progress(&self) -> f64 {
        if self.block_header_height == 0 {
            return if self.mweb_utxos_height == 0 { 1.0 } else { 0.0 };
        }
        (f64::from(self.mweb_utxos_height) / f64::from(self.block_header_height)).clamp(0.0, 1.0)
    }

    /// Blocks left before sync completes
    pub fn blocks_remaining(&self) -> u32 {
        self.block_header_height
            .saturating_sub(self.mweb_utxos_height)
    }
}
