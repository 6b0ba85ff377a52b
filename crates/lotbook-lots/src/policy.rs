//! Lot-selection policies.
//!
//! A policy proposes the open lot a split should be matched against.  The
//! assigner only ever talks to the [`AccountingPolicy`] trait, so adding a
//! strategy (specific-lot, average-cost) needs no change there.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use lotbook_ledger::{AccountId, Book, LotId, SplitId};
use serde::{Deserialize, Serialize};

pub trait AccountingPolicy {
    /// Short upper-case name (`FIFO`, `LIFO`).
    fn name(&self) -> &'static str;

    /// Open lot on the split's account whose balance sign is opposite to the
    /// split's amount sign, or `None`.
    fn select_lot(&self, book: &Book, split: SplitId) -> Option<LotId>;
}

/// First in, first out: the lot opened earliest.
#[derive(Copy, Clone, Debug, Default)]
pub struct FifoPolicy;

impl AccountingPolicy for FifoPolicy {
    fn name(&self) -> &'static str {
        "FIFO"
    }

    fn select_lot(&self, book: &Book, split: SplitId) -> Option<LotId> {
        let s = book.split(split)?;
        find_earliest_open_lot(book, s.account(), s.amount().signum())
    }
}

/// Last in, first out: the lot opened latest.
#[derive(Copy, Clone, Debug, Default)]
pub struct LifoPolicy;

impl AccountingPolicy for LifoPolicy {
    fn name(&self) -> &'static str {
        "LIFO"
    }

    fn select_lot(&self, book: &Book, split: SplitId) -> Option<LotId> {
        let s = book.split(split)?;
        find_latest_open_lot(book, s.account(), s.amount().signum())
    }
}

/// Open lots on `account` that a split of sign `sign` may be matched against,
/// with their opening dates, in lot creation order.
fn candidate_lots(
    book: &Book,
    account: AccountId,
    sign: i32,
) -> impl Iterator<Item = (LotId, DateTime<Utc>)> + '_ {
    book.account(account)
        .map(|a| a.lots())
        .unwrap_or(&[])
        .iter()
        .copied()
        .filter(move |lot| sign != 0 && book.lot_balance(*lot).signum() == -sign)
        .filter_map(move |lot| Some((lot, book.lot_opening_date(lot)?)))
}

/// Open lot with the earliest opening split; ties go to the lot created first.
pub fn find_earliest_open_lot(book: &Book, account: AccountId, sign: i32) -> Option<LotId> {
    let mut best: Option<(LotId, DateTime<Utc>)> = None;
    for (lot, opened) in candidate_lots(book, account, sign) {
        match best {
            Some((_, at)) if opened >= at => {}
            _ => best = Some((lot, opened)),
        }
    }
    best.map(|(lot, _)| lot)
}

/// Open lot with the latest opening split; ties go to the lot created last.
pub fn find_latest_open_lot(book: &Book, account: AccountId, sign: i32) -> Option<LotId> {
    let mut best: Option<(LotId, DateTime<Utc>)> = None;
    for (lot, opened) in candidate_lots(book, account, sign) {
        match best {
            Some((_, at)) if opened < at => {}
            _ => best = Some((lot, opened)),
        }
    }
    best.map(|(lot, _)| lot)
}

/// Built-in policies, selectable from configuration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyKind {
    #[default]
    Fifo,
    Lifo,
}

impl PolicyKind {
    pub fn into_policy(self) -> Box<dyn AccountingPolicy> {
        match self {
            PolicyKind::Fifo => Box::new(FifoPolicy),
            PolicyKind::Lifo => Box::new(LifoPolicy),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Fifo => f.write_str("FIFO"),
            PolicyKind::Lifo => f.write_str("LIFO"),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FIFO" => Ok(PolicyKind::Fifo),
            "LIFO" => Ok(PolicyKind::Lifo),
            other => Err(format!("unknown lot policy '{other}' (expected FIFO or LIFO)")),
        }
    }
}
