//! Error types for MWEB Core

use std::fmt;

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// MWEB Core errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Seed is empty or outside the accepted length range
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    /// Mnemonic phrase failed to parse
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Key derivation error
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// Invalid amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

impl Error {
    /// Check if error is caused by user input (recoverable by re-prompting)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidSeed(_) | Error::InvalidMnemonic(_) | Error::InvalidAmount(_)
        )
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidSeed(_) => {
                "The wallet seed is invalid. Please restore from your recovery phrase.".to_string()
            }
            Error::InvalidMnemonic(_) => {
                "The recovery phrase is invalid. Please check and try again.".to_string()
            }
            Error::InvalidAmount(_) => {
                "The amount is invalid. Please enter a valid amount.".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidSeed(_) | Error::InvalidMnemonic(_) => ErrorCategory::Wallet,
            Error::KeyDerivation(_) => ErrorCategory::Keys,
            Error::InvalidAmount(_) => ErrorCategory::Amount,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Amount-related errors
    Amount,
    /// Key-related errors
    Keys,
    /// Wallet-related errors
    Wallet,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Amount => write!(f, "Amount"),
            ErrorCategory::Keys => write!(f, "Keys"),
            ErrorCategory::Wallet => write!(f, "Wallet"),
        }
    }
}
