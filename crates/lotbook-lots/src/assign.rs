//! Placing trade splits into lots.
//!
//! Each split is matched against the lot the active policy proposes.  When
//! it would overshoot that lot's balance it is divided: the matching part
//! closes the lot, and the remainder goes around again, possibly opening a
//! fresh lot.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use lotbook_ledger::{AccountId, Book, Dirty, KvpValue, LedgerError, LotId, SplitId};

use crate::policy::AccountingPolicy;
use crate::settings::LotSettings;
use crate::splitter::{apply_division, divide};

/// Account metadata counter numbering new lot titles.
pub const LOT_COUNTER_SLOT: &str = "lot-mgmt/next-id";

/// What one assignment did. Empty when the split was left unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssignOutcome {
    /// Lots that received a split, in order.
    pub lots: Vec<LotId>,
    /// Subset of `lots` created by this assignment.
    pub opened_lots: Vec<LotId>,
    /// Remainder splits appended by division.
    pub added_splits: Vec<SplitId>,
}

impl AssignOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn divided(&self) -> bool {
        !self.added_splits.is_empty()
    }
}

/// Assign `split` to one or more lots under `policy`.
///
/// Already-assigned, unknown and zero-amount splits are left unchanged.
pub fn assign_to_lot(
    book: &mut Book,
    split: SplitId,
    policy: &dyn AccountingPolicy,
    settings: &LotSettings,
    now: DateTime<Utc>,
) -> Result<AssignOutcome, LedgerError> {
    let Some(s) = book.split(split) else {
        return Ok(AssignOutcome::default());
    };
    if s.lot().is_some() || s.amount().is_zero() {
        return Ok(AssignOutcome::default());
    }
    let account = s.account();

    book.with_account_edit(account, |book| -> Result<AssignOutcome, LedgerError> {
        let mut outcome = AssignOutcome::default();
        let mut current = split;
        loop {
            let (amount, value) = {
                let s = book
                    .split_mut(current)
                    .ok_or(LedgerError::UnknownSplit(current))?;
                s.mark_dirty(Dirty::VALUE);
                (s.amount().clone(), s.value().clone())
            };

            let Some(lot) = policy.select_lot(book, current) else {
                let lot = open_lot(book, account, &settings.title_prefix)?;
                book.lot_add_split(lot, current)?;
                outcome.opened_lots.push(lot);
                outcome.lots.push(lot);
                break;
            };

            let balance = book.lot_balance(lot);
            debug!(policy = policy.name(), split = %current, %lot, %balance, %amount, "lot candidate");
            let Some(division) = divide(&amount, &value, &-&balance) else {
                // Fits: |amount| <= |balance|.
                book.lot_add_split(lot, current)?;
                outcome.lots.push(lot);
                break;
            };

            let remainder = apply_division(book, current, &division, now)?;
            book.lot_add_split(lot, current)?;
            outcome.lots.push(lot);
            outcome.added_splits.push(remainder);
            current = remainder;
        }
        Ok(outcome)
    })
}

/// Assign every unassigned, nonzero split of `account` in posting order.
/// Splits belonging to gains transactions are not trades and are skipped.
pub fn assign_account_lots(
    book: &mut Book,
    account: AccountId,
    policy: &dyn AccountingPolicy,
    settings: &LotSettings,
    now: DateTime<Utc>,
) -> Result<Vec<AssignOutcome>, LedgerError> {
    let acc = book
        .account(account)
        .ok_or(LedgerError::UnknownAccount(account))?;

    let mut pending: Vec<(DateTime<Utc>, usize, SplitId)> = acc
        .splits()
        .iter()
        .enumerate()
        .filter_map(|(idx, id)| {
            let s = book.split(*id)?;
            if s.lot().is_some()
                || s.amount().is_zero()
                || s.gains_source_ref().is_some()
                || s.gains_status().is_gains_record()
            {
                return None;
            }
            Some((book.split_transaction(*id)?.date_posted(), idx, *id))
        })
        .collect();
    pending.sort();

    let mut out = Vec::with_capacity(pending.len());
    for (_, _, split) in pending {
        let outcome = assign_to_lot(book, split, policy, settings, now)?;
        if !outcome.is_unchanged() {
            out.push(outcome);
        }
    }
    Ok(out)
}

fn open_lot(book: &mut Book, account: AccountId, prefix: &str) -> Result<LotId, LedgerError> {
    let acc = book
        .account_mut(account)
        .ok_or(LedgerError::UnknownAccount(account))?;
    let n = acc.kvp().get_i64(LOT_COUNTER_SLOT).unwrap_or(0);
    acc.kvp_mut().set(LOT_COUNTER_SLOT, KvpValue::Int(n + 1));

    let lot = book.new_lot(account)?;
    let title = format!("{prefix} {n}");
    if let Some(l) = book.lot_mut(lot) {
        l.set_title(title.as_str());
    }
    info!(%account, %lot, %title, "lot opened");
    Ok(lot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::FifoPolicy;
    use chrono::TimeZone;
    use lotbook_ledger::{AccountKind, Commodity, NewAccount, NewSplit, Numeric};

    fn n(s: &str) -> Numeric {
        s.parse().unwrap()
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    struct Fx {
        book: Book,
        stock: AccountId,
        cash: AccountId,
    }

    impl Fx {
        fn new() -> Self {
            let mut book = Book::new();
            let root = book.root();
            let stock = book
                .create_account(
                    root,
                    NewAccount::new("ACME", AccountKind::Stock, Commodity::security("NYSE", "ACME", 1)),
                )
                .unwrap();
            let cash = book
                .create_account(
                    root,
                    NewAccount::new("Cash", AccountKind::Bank, Commodity::currency("USD", 100)),
                )
                .unwrap();
            Self { book, stock, cash }
        }

        fn trade(&mut self, d: u32, amount: &str, value: &str) -> SplitId {
            let t = self
                .book
                .new_transaction(Commodity::currency("USD", 100), day(d), day(d), "trade");
            let s = self
                .book
                .append_split(t, NewSplit::new(self.stock, n(amount), n(value)))
                .unwrap();
            self.book
                .append_split(t, NewSplit::new(self.cash, -n(value), -n(value)))
                .unwrap();
            s
        }

        fn assign(&mut self, split: SplitId) -> AssignOutcome {
            assign_to_lot(&mut self.book, split, &FifoPolicy, &LotSettings::default(), day(28))
                .unwrap()
        }
    }

    #[test]
    fn first_split_opens_titled_lot() {
        let mut fx = Fx::new();
        let buy = fx.trade(1, "100", "1000");
        let out = fx.assign(buy);

        assert_eq!(out.opened_lots.len(), 1);
        let lot = fx.book.lot(out.lots[0]).unwrap();
        assert_eq!(lot.title(), Some("Lot 0"));
        assert_eq!(
            fx.book.account(fx.stock).unwrap().kvp().get_i64(LOT_COUNTER_SLOT),
            Some(1)
        );
        assert!(!fx.book.account(fx.stock).unwrap().is_editing());
    }

    #[test]
    fn fitting_sale_joins_open_lot() {
        let mut fx = Fx::new();
        let buy = fx.trade(1, "100", "1000");
        let lot = fx.assign(buy).lots[0];
        let sell = fx.trade(2, "-60", "-720");
        let out = fx.assign(sell);

        assert_eq!(out.lots, vec![lot]);
        assert!(out.opened_lots.is_empty());
        assert!(!out.divided());
        assert_eq!(fx.book.lot_balance(lot), n("40"));
    }

    #[test]
    fn overflowing_sale_is_divided_into_new_lot() {
        let mut fx = Fx::new();
        let buy = fx.trade(1, "100", "1000");
        let first = fx.assign(buy).lots[0];
        let sell = fx.trade(2, "-150", "-1500");
        let out = fx.assign(sell);

        assert!(out.divided());
        assert_eq!(out.lots.len(), 2);
        assert_eq!(out.lots[0], first);
        assert_eq!(out.opened_lots, vec![out.lots[1]]);
        assert!(fx.book.lot_is_closed(first));

        let rest = out.added_splits[0];
        assert_eq!(fx.book.split(sell).unwrap().amount(), &n("-100"));
        assert_eq!(fx.book.split(sell).unwrap().value(), &n("-1000"));
        assert_eq!(fx.book.split(rest).unwrap().amount(), &n("-50"));
        assert_eq!(fx.book.split(rest).unwrap().value(), &n("-500"));
        assert_eq!(fx.book.split(rest).unwrap().lot(), Some(out.lots[1]));
        assert_eq!(fx.book.lot(out.lots[1]).unwrap().title(), Some("Lot 1"));
    }

    #[test]
    fn assigned_and_zero_splits_are_unchanged() {
        let mut fx = Fx::new();
        let buy = fx.trade(1, "100", "1000");
        fx.assign(buy);
        assert!(fx.assign(buy).is_unchanged());

        let zero = fx.trade(2, "0", "0");
        assert!(fx.assign(zero).is_unchanged());
    }

    #[test]
    fn account_sweep_goes_in_posting_order() {
        let mut fx = Fx::new();
        let sell = fx.trade(5, "-10", "-120");
        let buy = fx.trade(1, "10", "100");

        let outs = assign_account_lots(
            &mut fx.book,
            fx.stock,
            &FifoPolicy,
            &LotSettings::default(),
            day(28),
        )
        .unwrap();

        assert_eq!(outs.len(), 2);
        let lot = fx.book.split(buy).unwrap().lot().unwrap();
        assert_eq!(fx.book.split(sell).unwrap().lot(), Some(lot));
        assert!(fx.book.lot_is_closed(lot));
    }
}
