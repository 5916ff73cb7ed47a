use std::{cell::Cell, rc::Rc};

use merge_defence_core::CurrencyLedger;

/// Coin and gem balance shared between the world and the autoplay policy.
///
/// Clones observe the same balance, so one clone can be boxed into the world
/// as its currency collaborator while another keeps spending.
#[derive(Clone, Debug, Default)]
pub(crate) struct Wallet {
    coins: Rc<Cell<u32>>,
    gems: Rc<Cell<u32>>,
}

impl Wallet {
    /// Creates a wallet holding the provided number of coins.
    pub(crate) fn with_coins(coins: u32) -> Self {
        let wallet = Self::default();
        wallet.coins.set(coins);
        wallet
    }

    /// Coins currently held.
    pub(crate) fn coins(&self) -> u32 {
        self.coins.get()
    }

    /// Gems currently held.
    pub(crate) fn gems(&self) -> u32 {
        self.gems.get()
    }

    /// Deducts `amount` coins, refusing when the balance is too small.
    pub(crate) fn spend(&self, amount: u32) -> bool {
        match self.coins.get().checked_sub(amount) {
            Some(remaining) => {
                self.coins.set(remaining);
                true
            }
            None => false,
        }
    }

    /// Returns coins for a purchase that did not go through.
    pub(crate) fn refund(&self, amount: u32) {
        self.coins.set(self.coins.get().saturating_add(amount));
    }
}

impl CurrencyLedger for Wallet {
    fn add_coins(&mut self, amount: u32) {
        self.refund(amount);
    }

    fn add_gems(&mut self, amount: u32) {
        self.gems.set(self.gems.get().saturating_add(amount));
    }
}
