//! Simple DeFi Token ledger.
//!
//! A fixed-supply fungible token with ERC-20 style balances and
//! allowances, plus a transfer path that burns a fixed share of the amount
//! instead of delivering it:
//!
//! * [`amount`] — 18-decimal fixed-point amounts and decimal text conversion.
//! * [`ledger`] — the [`Ledger`] aggregate, its events and snapshots.
//! * [`shared`] — a mutex-guarded handle for multi-threaded callers.
//! * [`config`] — genesis parameters, loadable from JSON.
//!
//! Deployment, account provisioning and process plumbing live in the `sdft`
//! binary and only call through this surface.

pub mod address;
pub mod amount;
pub mod config;
pub mod ledger;
pub mod shared;

mod error;

pub use address::Address;
pub use amount::{to_base_units, to_decimal_string, Amount, BurnRate, DECIMALS, ONE_TOKEN};
pub use config::TokenConfig;
pub use error::{AmountError, ConfigError, LedgerError, SnapshotError};
pub use ledger::{Ledger, LedgerEvent, LedgerSnapshot};
pub use shared::SharedLedger;
