//! Thread-safe handle over a single [`Ledger`].
//!
//! Each call holds the lock for the whole validate-and-commit step, so
//! concurrent callers are serialized and never see a half-applied transfer.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::address::Address;
use crate::amount::Amount;
use crate::error::LedgerError;
use crate::ledger::{Ledger, LedgerEvent, LedgerSnapshot};

#[derive(Clone)]
pub struct SharedLedger {
    inner: Arc<Mutex<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    /// Runs `f` with exclusive access; use it to read several values from
    /// one consistent state.
    pub fn with<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn total_supply(&self) -> Amount {
        self.inner.lock().total_supply()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.inner.lock().balance_of(account)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.inner.lock().allowance(owner, spender)
    }

    pub fn transfer(
        &self,
        sender: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.inner.lock().transfer(sender, recipient, amount)
    }

    pub fn transfer_with_auto_burn(
        &self,
        sender: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.inner
            .lock()
            .transfer_with_auto_burn(sender, recipient, amount)
    }

    pub fn approve(
        &self,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.inner.lock().approve(owner, spender, amount)
    }

    pub fn transfer_from(
        &self,
        spender: Address,
        owner: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.inner
            .lock()
            .transfer_from(spender, owner, recipient, amount)
    }

    pub fn take_events(&self) -> Vec<LedgerEvent> {
        self.inner.lock().take_events()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.lock().snapshot()
    }
}
