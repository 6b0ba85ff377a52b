//! lotbook-lots
//!
//! Lot assignment and realized gains over a `lotbook_ledger::Book`:
//! - Pluggable lot-selection policy (FIFO, LIFO)
//! - Exact division of splits that overflow a lot
//! - Per-currency gain accounts with a shared fallback
//! - Gains transactions kept fresh through dirty marking
//! - Deterministic given a clock; the engine injects one

mod assign;
mod engine;
mod gain_account;
mod gains;
mod policy;
mod report;
mod settings;
mod splitter;
mod status;

pub use assign::{assign_account_lots, assign_to_lot, AssignOutcome, LOT_COUNTER_SLOT};
pub use engine::{AccountRun, LotEngine};
pub use gain_account::{
    default_gain_account, resolve_gain_account, set_default_gain_account, GainAccountError,
    GAINS_ACCOUNT_SLOT,
};
pub use gains::{
    cap_gains, cap_gains_split, compute_cap_gains, GainsError, GainsOutcome, GainsRecord,
    SkipReason,
};
pub use policy::{
    find_earliest_open_lot, find_latest_open_lot, AccountingPolicy, FifoPolicy, LifoPolicy,
    PolicyKind,
};
pub use report::{account_lot_report, AccountLotReport, LotReport, LotSplitReport};
pub use settings::{
    LotSettings, SETTINGS_POINTERS, DEFAULT_GAINS_DESCRIPTION, DEFAULT_ORPHAN_ACCOUNT_PREFIX,
    DEFAULT_TITLE_PREFIX,
};
pub use splitter::{apply_division, divide, Division};
pub use status::{determine_gains_status, gains_source_of, gains_split_of};
