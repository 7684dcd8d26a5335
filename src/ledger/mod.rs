use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::{serde_units, Amount, BurnRate, DECIMALS};
use crate::config::TokenConfig;
use crate::error::LedgerError;

mod snapshot;

pub use snapshot::{AllowanceEntry, BalanceEntry, LedgerSnapshot};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Transfer {
        from: Address,
        to: Address,
        #[serde(with = "serde_units")]
        amount: Amount,
    },
    Approval {
        owner: Address,
        spender: Address,
        #[serde(with = "serde_units")]
        amount: Amount,
    },
    Burn {
        from: Address,
        #[serde(with = "serde_units")]
        amount: Amount,
    },
}

/// Balance changes computed during validation. Committing one only writes
/// these precomputed values, so it cannot fail halfway.
struct TransferPlan {
    from: Address,
    to: Address,
    sender_after: Amount,
    recipient_after: Amount,
    supply_after: Amount,
    delivered: Amount,
    /// `Some` only on the auto-burn path, even when the portion truncates to 0.
    burned: Option<Amount>,
}

/// The authoritative token ledger: balances, allowances and circulating
/// supply. `total_supply` always equals the sum of `balances`.
#[derive(Clone, Debug)]
pub struct Ledger {
    config: TokenConfig,
    balances: BTreeMap<Address, Amount>,
    allowances: BTreeMap<(Address, Address), Amount>,
    total_supply: Amount,
    height: u64,
    events: Vec<LedgerEvent>,
}

impl Ledger {
    /// Genesis: credits the configured supply to `deployer`.
    pub fn initialize(config: TokenConfig, deployer: Address) -> Self {
        let supply = config.initial_supply;
        let mut ledger = Self {
            config,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            total_supply: supply,
            height: 0,
            events: Vec::new(),
        };
        ledger.set_balance(deployer, supply);
        ledger.events.push(LedgerEvent::Transfer {
            from: Address::ZERO,
            to: deployer,
            amount: supply,
        });
        tracing::debug!(%deployer, supply, symbol = %ledger.config.symbol, "ledger initialized");
        ledger
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn decimals(&self) -> u8 {
        DECIMALS
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn burn_rate(&self) -> BurnRate {
        self.config.burn_rate
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Number of mutations applied since genesis.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Accounts with a non-zero balance, in address order.
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn transfer(
        &mut self,
        sender: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.check_recipient(&recipient)?;
        let plan = self.plan(sender, recipient, amount, None)?;
        self.commit(plan);
        Ok(())
    }

    /// Moves `amount` out of `sender`, destroys `amount * burn_rate`
    /// (truncated) and delivers the rest to `recipient`.
    pub fn transfer_with_auto_burn(
        &mut self,
        sender: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.check_recipient(&recipient)?;
        let burn = self
            .config
            .burn_rate
            .burn_portion(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        let plan = self.plan(sender, recipient, amount, Some(burn))?;
        self.commit(plan);
        Ok(())
    }

    /// Sets the allowance to `amount`, replacing any previous value.
    pub fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
        self.height += 1;
        self.events.push(LedgerEvent::Approval {
            owner,
            spender,
            amount,
        });
        tracing::debug!(%owner, %spender, amount, "approval set");
        Ok(())
    }

    /// `spender` moves `amount` from `owner` to `recipient` against its
    /// allowance. An allowance of `Amount::MAX` is unlimited and never
    /// decremented.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.check_recipient(&recipient)?;
        let allowance = self.allowance(&owner, &spender);
        if allowance < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner,
                spender,
                allowance,
                needed: amount,
            });
        }
        let plan = self.plan(owner, recipient, amount, None)?;

        if allowance != Amount::MAX {
            let remaining = allowance - amount;
            if remaining == 0 {
                self.allowances.remove(&(owner, spender));
            } else {
                self.allowances.insert((owner, spender), remaining);
            }
        }
        self.commit(plan);
        Ok(())
    }

    fn check_recipient(&self, recipient: &Address) -> Result<(), LedgerError> {
        if self.config.reject_zero_recipient && recipient.is_zero() {
            return Err(LedgerError::InvalidRecipient(*recipient));
        }
        Ok(())
    }

    fn plan(
        &self,
        from: Address,
        to: Address,
        amount: Amount,
        burned: Option<Amount>,
    ) -> Result<TransferPlan, LedgerError> {
        let balance = self.balance_of(&from);
        let sender_after = balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                account: from,
                balance,
                needed: amount,
            })?;
        let burn = burned.unwrap_or(0);
        let delivered = amount
            .checked_sub(burn)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        // a self-transfer credits the already-debited balance
        let recipient_before = if from == to {
            sender_after
        } else {
            self.balance_of(&to)
        };
        let recipient_after = recipient_before
            .checked_add(delivered)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        let supply_after = self
            .total_supply
            .checked_sub(burn)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        Ok(TransferPlan {
            from,
            to,
            sender_after,
            recipient_after,
            supply_after,
            delivered,
            burned,
        })
    }

    fn commit(&mut self, plan: TransferPlan) {
        self.set_balance(plan.from, plan.sender_after);
        self.set_balance(plan.to, plan.recipient_after);
        self.total_supply = plan.supply_after;
        self.height += 1;

        if let Some(burned) = plan.burned {
            self.events.push(LedgerEvent::Burn {
                from: plan.from,
                amount: burned,
            });
        }
        self.events.push(LedgerEvent::Transfer {
            from: plan.from,
            to: plan.to,
            amount: plan.delivered,
        });
        tracing::debug!(
            from = %plan.from,
            to = %plan.to,
            delivered = plan.delivered,
            burned = plan.burned.unwrap_or(0),
            supply = self.total_supply,
            "transfer applied"
        );
    }

    fn set_balance(&mut self, account: Address, amount: Amount) {
        if amount == 0 {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, amount);
        }
    }
}
