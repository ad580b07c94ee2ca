//! Key derivation and management
//!
//! MWEB wallets use a BIP-32 tree with a fixed, fully hardened path:
//!
//! - account node: `m/1000'/2'/account'`
//! - scan key:     `m/1000'/2'/account'/scan_index'`
//! - spend key:    `m/1000'/2'/account'/spend_index'`
//!
//! The default wallet uses `scan_index = 0` and `spend_index = 1`. Both keys
//! are children of one account node, so a [`KeyPair`] can never mix material
//! from different seeds or accounts.

use crate::{Error, Result};
use bip32::{ChildNumber, DerivationPath, XPrv};
use bip39::{Language, Mnemonic};
use mweb_params::{DEFAULT_SCAN_INDEX, DEFAULT_SPEND_INDEX, MWEB_COIN_TYPE, MWEB_PURPOSE};
use rand::RngCore;
use std::fmt;
use zeroize::Zeroizing;

/// Shortest seed BIP-32 accepts
pub const MIN_SEED_LEN: usize = 16;

/// Longest seed BIP-32 accepts
pub const MAX_SEED_LEN: usize = 64;

const HARDENED_LIMIT: u32 = 1 << 31;

/// Wallet seed material, zeroized on drop
#[derive(Clone)]
pub struct Seed(Zeroizing<Vec<u8>>);

impl Seed {
    /// Wrap raw seed bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidSeed("seed is empty".to_string()));
        }
        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&bytes.len()) {
            return Err(Error::InvalidSeed(format!(
                "seed must be {}..={} bytes, got {}",
                MIN_SEED_LEN,
                MAX_SEED_LEN,
                bytes.len()
            )));
        }
        Ok(Self(Zeroizing::new(bytes.to_vec())))
    }

    /// Derive the 64-byte BIP-39 seed from a mnemonic phrase
    pub fn from_mnemonic(phrase: &str, passphrase: &str) -> Result<Self> {
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase.trim())
            .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;
        let seed = Zeroizing::new(mnemonic.to_seed(passphrase));
        Self::from_bytes(seed.as_ref())
    }

    /// Raw seed bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Seed length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; empty seeds are rejected at construction
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed([REDACTED; {} bytes])", self.0.len())
    }
}

/// Scan private key. Lets the daemon detect outputs but not spend them.
#[derive(Clone, PartialEq, Eq)]
pub struct ScanSecret(Zeroizing<[u8; 32]>);

impl ScanSecret {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ScanSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ScanSecret([REDACTED])")
    }
}

/// Spend private key
#[derive(Clone, PartialEq, Eq)]
pub struct SpendSecret(Zeroizing<[u8; 32]>);

impl SpendSecret {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SpendSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SpendSecret([REDACTED])")
    }
}

/// Compressed secp256k1 public half of the spend key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpendPublicKey([u8; 33]);

impl SpendPublicKey {
    /// Wrap raw compressed point bytes
    pub fn from_bytes(bytes: [u8; 33]) -> Self {
        Self(bytes)
    }

    /// Raw compressed point bytes
    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// Hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SpendPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpendPublicKey({})", self.to_hex())
    }
}

impl fmt::Display for SpendPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Scan and spend keys derived from one seed and one account
#[derive(Clone, Debug)]
pub struct KeyPair {
    account: u32,
    scan_index: u32,
    spend_index: u32,
    scan_secret: ScanSecret,
    spend_secret: SpendSecret,
    spend_pubkey: SpendPublicKey,
}

impl KeyPair {
    /// Derive the default wallet keys (`account`, scan 0, spend 1)
    pub fn derive_default(seed: &Seed, account: u32) -> Result<Self> {
        derive(seed, account, DEFAULT_SCAN_INDEX, DEFAULT_SPEND_INDEX)
    }

    /// Account the keys were derived under
    pub fn account(&self) -> u32 {
        self.account
    }

    /// Scan child index
    pub fn scan_index(&self) -> u32 {
        self.scan_index
    }

    /// Spend child index
    pub fn spend_index(&self) -> u32 {
        self.spend_index
    }

    /// Scan private key
    pub fn scan_secret(&self) -> &ScanSecret {
        &self.scan_secret
    }

    /// Spend private key
    pub fn spend_secret(&self) -> &SpendSecret {
        &self.spend_secret
    }

    /// Spend public key shared with the daemon
    pub fn spend_pubkey(&self) -> &SpendPublicKey {
        &self.spend_pubkey
    }
}

/// Account node path for `account`
pub fn account_path(account: u32) -> String {
    format!("m/{}'/{}'/{}'", MWEB_PURPOSE, MWEB_COIN_TYPE, account)
}

/// Derive scan and spend keys under `m/1000'/2'/account'`.
///
/// Pure and deterministic: identical inputs always yield identical keys.
pub fn derive(seed: &Seed, account: u32, scan_index: u32, spend_index: u32) -> Result<KeyPair> {
    for (name, index) in [
        ("account", account),
        ("scan index", scan_index),
        ("spend index", spend_index),
    ] {
        if index >= HARDENED_LIMIT {
            return Err(Error::KeyDerivation(format!(
                "{} {} is outside the hardened range",
                name, index
            )));
        }
    }
    if scan_index == spend_index {
        return Err(Error::KeyDerivation(format!(
            "scan and spend index are both {}",
            scan_index
        )));
    }

    let path: DerivationPath = account_path(account)
        .parse()
        .map_err(|e: bip32::Error| Error::KeyDerivation(e.to_string()))?;
    let account_node = XPrv::derive_from_path(seed.as_bytes(), &path)
        .map_err(|e| Error::InvalidSeed(e.to_string()))?;

    let scan = account_node
        .derive_child(hardened(scan_index)?)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;
    let spend = account_node
        .derive_child(hardened(spend_index)?)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;

    tracing::debug!(account, scan_index, spend_index, "Derived MWEB key pair");

    Ok(KeyPair {
        account,
        scan_index,
        spend_index,
        scan_secret: ScanSecret::from_bytes(scan.to_bytes()),
        spend_secret: SpendSecret::from_bytes(spend.to_bytes()),
        spend_pubkey: SpendPublicKey::from_bytes(spend.public_key().to_bytes()),
    })
}

fn hardened(index: u32) -> Result<ChildNumber> {
    ChildNumber::new(index, true).map_err(|e| Error::KeyDerivation(e.to_string()))
}

/// Generate a new random BIP-39 mnemonic.
///
/// `word_count` is 12, 18 or 24 and defaults to 24.
pub fn generate_mnemonic(word_count: Option<u32>) -> Result<String> {
    // 12 words = 16 bytes, 18 words = 24 bytes, 24 words = 32 bytes
    let entropy_size = match word_count.unwrap_or(24) {
        12 => 16,
        18 => 24,
        24 => 32,
        other => {
            return Err(Error::InvalidMnemonic(format!(
                "unsupported word count {}",
                other
            )))
        }
    };

    let mut entropy = Zeroizing::new(vec![0u8; entropy_size]);
    rand::thread_rng().fill_bytes(&mut entropy);

    let mnemonic =
        Mnemonic::from_entropy(&entropy).map_err(|e| Error::InvalidMnemonic(e.to_string()))?;
    Ok(mnemonic.to_string())
}
