//! Block — a sealed header plus its transaction body.

use serde::{Deserialize, Serialize};

use crate::{Header, Transaction};

/// A block as the engine assembles and re-reads it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    header: Header,
    transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Replace the header (with its spliced-in seal), keeping the body.
    pub fn with_seal(self, header: Header) -> Self {
        Self {
            header,
            transactions: self.transactions,
        }
    }
}
