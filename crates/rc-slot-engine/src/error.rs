//! Error types for the spin engine

use thiserror::Error;

use crate::machine::SpinState;

/// Wallet collaborator errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Debit larger than the available balance
    #[error("Insufficient balance: have {balance}, need {amount}")]
    InsufficientBalance { balance: u64, amount: u64 },

    /// Wallet refused the operation for its own reasons
    #[error("Wallet unavailable: {0}")]
    Unavailable(String),
}

/// Spin request / signal errors. All are local and recoverable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpinError {
    /// Balance below bet but above the bankruptcy threshold
    #[error("Insufficient funds: balance {balance}, bet {bet}")]
    InsufficientFunds { balance: u64, bet: u64 },

    /// Balance below the bankruptcy threshold
    #[error("Bankruptcy: balance {balance} below rescue threshold")]
    Bankruptcy { balance: u64 },

    /// Machine is not idle
    #[error("Machine busy in state {state:?}")]
    Busy { state: SpinState },

    /// A modal or popup is open
    #[error("Spin blocked by an open modal or popup")]
    Blocked,

    /// Bet is zero or a free-spin session is running
    #[error("Invalid bet: {bet}")]
    InvalidBet { bet: u64 },

    /// Reel index outside the active grid
    #[error("Invalid reel {reel} (game has {reels} reels)")]
    InvalidReel { reel: u8, reels: u8 },

    /// Scripted grid does not match the active game dimensions
    #[error("Grid mismatch: expected {expected_reels}x{expected_rows}, got {reels}x{rows}")]
    GridMismatch {
        expected_reels: u8,
        expected_rows: u8,
        reels: u8,
        rows: u8,
    },

    /// Close signal without the matching popup
    #[error("No {0} popup is open")]
    NoPopup(&'static str),

    /// Wallet collaborator error
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),
}

/// Game configuration / registry errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// YAML parse error
    #[error("YAML parse error: {0}")]
    Yaml(String),

    /// JSON parse error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Semantic validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown game id
    #[error("Unknown game: {0}")]
    UnknownGame(String),

    /// Duplicate game id in one registry
    #[error("Duplicate game id: {0}")]
    DuplicateGame(String),

    /// Input exceeds limits
    #[error("Input too large: {size} bytes (max {max})")]
    InputTooLarge { size: usize, max: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for spin operations
pub type SpinResult<T> = Result<T, SpinError>;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SpinError::InsufficientFunds {
            balance: 50,
            bet: 100,
        };
        assert_eq!(err.to_string(), "Insufficient funds: balance 50, bet 100");

        let err = SpinError::InvalidReel { reel: 7, reels: 5 };
        assert!(err.to_string().contains("5 reels"));
    }

    #[test]
    fn test_wallet_error_converts() {
        let err: SpinError = WalletError::Unavailable("offline".into()).into();
        assert!(matches!(err, SpinError::Wallet(_)));
    }
}
