//! Read-only lot summaries for display.

use chrono::{DateTime, Utc};
use serde::Serialize;

use lotbook_ledger::{AccountId, Book, LotId, Numeric, SplitId};

use crate::status::gains_split_of;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountLotReport {
    pub account: String,
    pub commodity: Option<String>,
    pub lots: Vec<LotReport>,
    /// Sum of materialized gains over every lot of the account.
    pub realized_gain: Numeric,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LotReport {
    pub lot: LotId,
    pub title: Option<String>,
    pub opened: Option<DateTime<Utc>>,
    pub balance: Numeric,
    pub open: bool,
    pub realized_gain: Numeric,
    pub splits: Vec<LotSplitReport>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LotSplitReport {
    pub split: SplitId,
    pub posted: DateTime<Utc>,
    pub description: String,
    pub amount: Numeric,
    pub value: Numeric,
    /// `true` for the lot-side split of a gains transaction.
    pub gains_record: bool,
    /// Gain materialized for this split; zero for gains records.
    pub realized_gain: Numeric,
}

/// Snapshot the account's lots from persisted state; nothing is recomputed.
pub fn account_lot_report(book: &Book, account: AccountId) -> Option<AccountLotReport> {
    let acc = book.account(account)?;
    let mut lots = Vec::with_capacity(acc.lots().len());

    for lot_id in acc.lots() {
        let Some(lot) = book.lot(*lot_id) else {
            continue;
        };
        let mut splits = Vec::with_capacity(lot.splits().len());
        for id in lot.splits() {
            let (Some(s), Some(t)) = (book.split(*id), book.split_transaction(*id)) else {
                continue;
            };
            let gains_record = s.gains_source_ref().is_some();
            let realized_gain = if gains_record {
                Numeric::zero()
            } else {
                gains_split_of(book, *id)
                    .and_then(|ls| book.split(ls))
                    .map(|ls| ls.value().clone())
                    .unwrap_or_default()
            };
            splits.push(LotSplitReport {
                split: *id,
                posted: t.date_posted(),
                description: t.description().to_string(),
                amount: s.amount().clone(),
                value: s.value().clone(),
                gains_record,
                realized_gain,
            });
        }
        splits.sort_by_key(|s| s.posted);

        let balance = book.lot_balance(*lot_id);
        lots.push(LotReport {
            lot: *lot_id,
            title: lot.title().map(str::to_string),
            opened: book.lot_opening_date(*lot_id),
            open: !balance.is_zero(),
            balance,
            realized_gain: splits.iter().map(|s| &s.realized_gain).sum(),
            splits,
        });
    }

    Some(AccountLotReport {
        account: book.full_name(account),
        commodity: acc.commodity().map(|c| c.unique_name()),
        realized_gain: lots.iter().map(|l| &l.realized_gain).sum(),
        lots,
    })
}
