use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::Ledger;
use crate::address::Address;
use crate::amount::{serde_units, Amount};
use crate::config::TokenConfig;
use crate::error::SnapshotError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceEntry {
    pub account: Address,
    #[serde(with = "serde_units")]
    pub amount: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllowanceEntry {
    pub owner: Address,
    pub spender: Address,
    #[serde(with = "serde_units")]
    pub amount: Amount,
}

/// Persistable ledger state. The event queue is not part of it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub config: TokenConfig,
    #[serde(with = "serde_units")]
    pub total_supply: Amount,
    pub height: u64,
    pub balances: Vec<BalanceEntry>,
    pub allowances: Vec<AllowanceEntry>,
    /// Hex SHA-256 merkle root over config, supply, balances and allowances.
    pub state_root: String,
}

impl Ledger {
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            config: self.config.clone(),
            total_supply: self.total_supply,
            height: self.height,
            balances: self
                .balances
                .iter()
                .map(|(account, amount)| BalanceEntry {
                    account: *account,
                    amount: *amount,
                })
                .collect(),
            allowances: self
                .allowances
                .iter()
                .map(|((owner, spender), amount)| AllowanceEntry {
                    owner: *owner,
                    spender: *spender,
                    amount: *amount,
                })
                .collect(),
            state_root: hex::encode(self.state_root()),
        }
    }

    pub fn state_root(&self) -> [u8; 32] {
        compute_state_root(
            &self.config,
            self.total_supply,
            &self.balances,
            &self.allowances,
        )
    }

    /// Rebuilds a ledger from a snapshot, checking the config, the supply
    /// invariant and the stored state root. The restored ledger starts with
    /// no events.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Self, SnapshotError> {
        snapshot
            .config
            .validate()
            .map_err(|e| SnapshotError::InvalidConfig(e.to_string()))?;

        let balances: BTreeMap<Address, Amount> = snapshot
            .balances
            .iter()
            .filter(|entry| entry.amount > 0)
            .map(|entry| (entry.account, entry.amount))
            .collect();
        let allowances: BTreeMap<(Address, Address), Amount> = snapshot
            .allowances
            .iter()
            .filter(|entry| entry.amount > 0)
            .map(|entry| ((entry.owner, entry.spender), entry.amount))
            .collect();

        let sum = balances
            .values()
            .try_fold(0u128, |acc, amount| acc.checked_add(*amount))
            .ok_or(SnapshotError::Overflow)?;
        if sum != snapshot.total_supply {
            tracing::warn!(sum, total_supply = snapshot.total_supply, "snapshot supply mismatch");
            return Err(SnapshotError::SupplyMismatch {
                balances: sum,
                total_supply: snapshot.total_supply,
            });
        }

        let computed = hex::encode(compute_state_root(
            &snapshot.config,
            snapshot.total_supply,
            &balances,
            &allowances,
        ));
        if !computed.eq_ignore_ascii_case(&snapshot.state_root) {
            tracing::warn!(stored = %snapshot.state_root, %computed, "snapshot root mismatch");
            return Err(SnapshotError::RootMismatch {
                stored: snapshot.state_root,
                computed,
            });
        }

        Ok(Ledger {
            config: snapshot.config,
            balances,
            allowances,
            total_supply: snapshot.total_supply,
            height: snapshot.height,
            events: Vec::new(),
        })
    }
}

fn compute_state_root(
    config: &TokenConfig,
    total_supply: Amount,
    balances: &BTreeMap<Address, Amount>,
    allowances: &BTreeMap<(Address, Address), Amount>,
) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::with_capacity(2 + balances.len() + allowances.len());
    leaves.push(config_leaf(config));
    let mut hasher = Sha256::new();
    hasher.update(b"supply");
    hasher.update(total_supply.to_le_bytes());
    leaves.push(hasher.finalize().into());
    for (account, amount) in balances {
        let mut hasher = Sha256::new();
        hasher.update(b"bal");
        hasher.update(account.as_bytes());
        hasher.update(amount.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for ((owner, spender), amount) in allowances {
        let mut hasher = Sha256::new();
        hasher.update(b"allow");
        hasher.update(owner.as_bytes());
        hasher.update(spender.as_bytes());
        hasher.update(amount.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    build_merkle(leaves)
}

fn config_leaf(config: &TokenConfig) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"config");
    // length prefixes keep name/symbol boundaries unambiguous
    for text in [&config.name, &config.symbol] {
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    hasher.update(config.initial_supply.to_le_bytes());
    hasher.update(config.burn_rate.scaled().to_le_bytes());
    hasher.update([u8::from(config.reject_zero_recipient)]);
    hasher.finalize().into()
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"sdft-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for pair in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(pair[0]);
            // odd node is paired with itself
            hasher.update(pair.get(1).unwrap_or(&pair[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::amount::{tokens, BurnRate};

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    fn sample() -> Ledger {
        let mut ledger = Ledger::initialize(TokenConfig::default(), addr(0xd0));
        ledger.transfer(addr(0xd0), addr(1), tokens(10)).unwrap();
        ledger
            .transfer_with_auto_burn(addr(1), addr(2), tokens(4))
            .unwrap();
        ledger.approve(addr(1), addr(3), tokens(2)).unwrap();
        ledger
    }

    #[test]
    fn state_root_is_deterministic() {
        let ledger = sample();
        assert_eq!(ledger.state_root(), ledger.state_root());
        assert_eq!(ledger.snapshot().state_root, hex::encode(ledger.state_root()));
    }

    #[test]
    fn state_root_tracks_balances() {
        let mut ledger = sample();
        let root = ledger.state_root();
        ledger.transfer(addr(2), addr(1), 1).unwrap();
        assert_ne!(ledger.state_root(), root);
    }

    #[test]
    fn snapshot_restores_through_json() {
        let ledger = sample();
        let json = serde_json::to_string(&ledger.snapshot()).unwrap();
        let restored = Ledger::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored.snapshot(), ledger.snapshot());
        assert_eq!(restored.balance_of(&addr(2)), tokens(4) * 9 / 10);
        assert_eq!(restored.allowance(&addr(1), &addr(3)), tokens(2));
        assert_eq!(restored.height(), 3);
        assert!(restored.events().is_empty());
    }

    #[test]
    fn tampered_balance_is_rejected() {
        let mut snapshot = sample().snapshot();
        snapshot.balances[0].amount += 1;
        assert!(matches!(
            Ledger::from_snapshot(snapshot),
            Err(SnapshotError::SupplyMismatch { .. })
        ));
    }

    #[test]
    fn tampered_allowance_is_rejected() {
        let mut snapshot = sample().snapshot();
        snapshot.allowances[0].amount = tokens(1_000);
        assert!(matches!(
            Ledger::from_snapshot(snapshot),
            Err(SnapshotError::RootMismatch { .. })
        ));
    }

    #[test]
    fn overflowing_balances_are_rejected() {
        let mut snapshot = sample().snapshot();
        snapshot.balances = vec![
            BalanceEntry {
                account: addr(1),
                amount: Amount::MAX,
            },
            BalanceEntry {
                account: addr(2),
                amount: 1,
            },
        ];
        assert!(matches!(
            Ledger::from_snapshot(snapshot),
            Err(SnapshotError::Overflow)
        ));
    }

    #[test]
    fn tampered_burn_rate_is_rejected() {
        let mut snapshot = sample().snapshot();
        snapshot.config.burn_rate = BurnRate::percent(100).unwrap();
        assert!(matches!(
            Ledger::from_snapshot(snapshot),
            Err(SnapshotError::RootMismatch { .. })
        ));
    }

    #[test]
    fn tampered_zero_recipient_policy_is_rejected() {
        let mut snapshot = sample().snapshot();
        snapshot.config.reject_zero_recipient = false;
        assert!(matches!(
            Ledger::from_snapshot(snapshot),
            Err(SnapshotError::RootMismatch { .. })
        ));
    }

    #[test]
    fn invalid_config_is_rejected_before_root_check() {
        let mut snapshot = sample().snapshot();
        snapshot.config.name = String::new();
        assert_eq!(
            Ledger::from_snapshot(snapshot).err(),
            Some(SnapshotError::InvalidConfig("name must not be empty".into()))
        );
    }

    #[test]
    fn state_root_tracks_config() {
        let ledger = sample();
        let config = TokenConfig {
            symbol: "SDFX".into(),
            ..TokenConfig::default()
        };
        let mut other = Ledger::initialize(config, addr(0xd0));
        other.transfer(addr(0xd0), addr(1), tokens(10)).unwrap();
        other
            .transfer_with_auto_burn(addr(1), addr(2), tokens(4))
            .unwrap();
        other.approve(addr(1), addr(3), tokens(2)).unwrap();
        assert_ne!(other.state_root(), ledger.state_root());
    }
}
