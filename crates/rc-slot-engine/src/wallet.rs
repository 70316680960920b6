//! Wallet collaborator

use crate::error::WalletError;

/// Balance owner the machine debits bets from and credits payouts to
pub trait Wallet {
    fn balance(&self) -> u64;

    /// Remove `amount`, returning the new balance
    fn debit(&mut self, amount: u64) -> Result<u64, WalletError>;

    /// Add `amount`, returning the new balance
    fn credit(&mut self, amount: u64) -> u64;
}

/// Plain in-process balance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryWallet {
    balance: u64,
}

impl InMemoryWallet {
    pub fn new(balance: u64) -> Self {
        Self { balance }
    }
}

impl Wallet for InMemoryWallet {
    fn balance(&self) -> u64 {
        self.balance
    }

    fn debit(&mut self, amount: u64) -> Result<u64, WalletError> {
        if amount > self.balance {
            return Err(WalletError::InsufficientBalance {
                balance: self.balance,
                amount,
            });
        }
        self.balance -= amount;
        Ok(self.balance)
    }

    fn credit(&mut self, amount: u64) -> u64 {
        self.balance = self.balance.saturating_add(amount);
        self.balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit_and_credit() {
        let mut wallet = InMemoryWallet::new(100);
        assert_eq!(wallet.debit(40), Ok(60));
        assert_eq!(wallet.credit(15), 75);
        assert_eq!(wallet.balance(), 75);
    }

    #[test]
    fn test_overdraft_refused() {
        let mut wallet = InMemoryWallet::new(10);
        assert_eq!(
            wallet.debit(11),
            Err(WalletError::InsufficientBalance {
                balance: 10,
                amount: 11
            })
        );
        assert_eq!(wallet.balance(), 10);
    }
}
