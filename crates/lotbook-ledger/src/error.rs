use thiserror::Error;

use crate::ids::{AccountId, LotId, SplitId, TransactionId};
use crate::numeric::{Numeric, NumericError};

/// Invariant violations and lookup failures surfaced by the [`Book`](crate::Book).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("unknown account {0}")]
    UnknownAccount(AccountId),
    #[error("unknown transaction {0}")]
    UnknownTransaction(TransactionId),
    #[error("unknown split {0}")]
    UnknownSplit(SplitId),
    #[error("unknown lot {0}")]
    UnknownLot(LotId),
    #[error("no account at path '{0}'")]
    UnknownAccountPath(String),
    #[error("no commodity with mnemonic '{0}'")]
    UnknownCommodity(String),
    #[error("account name must not be empty")]
    EmptyAccountName,
    #[error("account '{0}' already exists under that parent")]
    DuplicateAccount(String),
    #[error("split {split} is booked to account {split_account}, lot {lot} belongs to account {lot_account}")]
    LotAccountMismatch {
        split: SplitId,
        split_account: AccountId,
        lot: LotId,
        lot_account: AccountId,
    },
    #[error("transaction '{description}' needs at least two splits, got {count}")]
    TooFewSplits { description: String, count: usize },
    #[error("transaction '{description}' does not balance: off by {imbalance}")]
    Unbalanced {
        description: String,
        imbalance: Numeric,
    },
    #[error(transparent)]
    Numeric(#[from] NumericError),
}
