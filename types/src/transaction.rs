//! Transactions as the staking ledger sees them.
//!
//! Execution is owned by the surrounding chain substrate; the consensus
//! engine only inspects each transaction's job-wallet routing tags to
//! decide how the staker set changes.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::Address;

/// Which of a sender's wallets a transfer draws from or lands in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobWallet {
    /// The spendable main balance.
    Main,
    /// The staked balance.
    Stake,
}

/// A transaction, reduced to the fields the consensus engine consumes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Recovered sender.
    pub from: Address,
    pub to: Address,
    pub value: BigInt,
    pub nonce: u64,
    /// Wallet the value is drawn from.
    pub base: JobWallet,
    /// Wallet the value lands in.
    pub target: JobWallet,
}

impl Transaction {
    /// `Main → Stake`: the sender is staking up.
    pub fn is_stake(&self) -> bool {
        self.base == JobWallet::Main && self.target == JobWallet::Stake
    }

    /// `Stake → Main`: the sender is unstaking.
    pub fn is_unstake(&self) -> bool {
        self.base == JobWallet::Stake && self.target == JobWallet::Main
    }

    /// `Main → Main`: an ordinary transfer, invisible to the staker set.
    pub fn is_transfer(&self) -> bool {
        self.base == JobWallet::Main && self.target == JobWallet::Main
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(base: JobWallet, target: JobWallet) -> Transaction {
        Transaction {
            from: Address::new([1; 20]),
            to: Address::new([2; 20]),
            value: BigInt::from(10u64),
            nonce: 0,
            base,
            target,
        }
    }

    #[test]
    fn wallet_tag_classification() {
        assert!(tx(JobWallet::Main, JobWallet::Stake).is_stake());
        assert!(tx(JobWallet::Stake, JobWallet::Main).is_unstake());
        assert!(tx(JobWallet::Main, JobWallet::Main).is_transfer());
        assert!(!tx(JobWallet::Stake, JobWallet::Stake).is_stake());
        assert!(!tx(JobWallet::Stake, JobWallet::Stake).is_unstake());
    }
}
