//! lotbook-ledger
//!
//! Double-entry ledger core for lot accounting:
//! - Exact rational `Numeric` with explicit rounding at commodity fractions
//! - Accounts, transactions, splits and lots held in one `Book` arena
//! - Hierarchical key/value metadata on every entity
//! - Nesting edit sessions; unbalanced commits are logged
//! - Journal import with up-front validation
//! - Pure deterministic logic (no IO, no wall-clock reads)

mod account;
mod book;
mod commodity;
mod error;
mod ids;
mod lot;
mod split;
mod transaction;

pub mod journal;
pub mod kvp;
pub mod numeric;

pub use account::{Account, AccountKind, NewAccount};
pub use book::{Book, ACCOUNT_SEPARATOR, LOT_SPLIT_SLOT};
pub use commodity::{Commodity, CURRENCY_NAMESPACE};
pub use error::LedgerError;
pub use ids::{AccountId, LotId, SplitId, TransactionId};
pub use journal::{load_journal, Journal, JournalAccount, JournalSplit, JournalTransaction};
pub use kvp::{KvpFrame, KvpValue};
pub use lot::{Lot, LOT_TITLE_SLOT};
pub use numeric::{Numeric, NumericError, RoundMode};
pub use split::{Dirty, GainsStatus, NewSplit, ReconcileState, Split};
pub use transaction::Transaction;
