use thiserror::Error;

use crate::address::Address;
use crate::amount::Amount;

/// Failures of the ledger's mutating operations.
///
/// Every variant is raised during validation, before any state is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Debit exceeds the account's current balance.
    #[error("insufficient balance in {account}: have {balance}, need {needed}")]
    InsufficientBalance {
        account: Address,
        balance: Amount,
        needed: Amount,
    },

    /// `transfer_from` exceeds what the owner approved for the spender.
    #[error("insufficient allowance for {spender} on {owner}: have {allowance}, need {needed}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: Amount,
        needed: Amount,
    },

    /// Recipient is the null account.
    #[error("invalid recipient {0}")]
    InvalidRecipient(Address),

    /// An intermediate sum left the representable amount range.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
}

/// Failures converting between decimal text and base units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("empty amount")]
    Empty,

    #[error("invalid character {0:?} in amount")]
    InvalidDigit(char),

    #[error("too many decimal places: {0} (max 18)")]
    TooManyDecimals(usize),

    #[error("amount out of range")]
    Overflow,
}

/// Failures loading a [`TokenConfig`](crate::config::TokenConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

/// Failures restoring a ledger from a persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("balances sum to {balances}, snapshot claims total supply {total_supply}")]
    SupplyMismatch { balances: Amount, total_supply: Amount },

    #[error("state root mismatch: stored {stored}, computed {computed}")]
    RootMismatch { stored: String, computed: String },

    #[error("balance sum overflows")]
    Overflow,

    #[error("invalid token config: {0}")]
    InvalidConfig(String),
}
