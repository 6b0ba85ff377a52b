//! Realized gains for lot-assigned splits.
//!
//! # Model
//! A split that reduces a lot (the *source*) realizes a gain against the
//! lot's opening split:
//!
//! ```text
//! cost_basis = opening.value * source.amount / opening.amount
//! gain       = cost_basis - source.value
//! ```
//!
//! A nonzero gain is materialized as a two-split gains transaction:
//! `lot_split` (lot account, amount 0, value `gain`, member of the lot) and
//! `gain_split` (gain account, amount = value = `-gain`).  The source records
//! `gains_split = lot_split`; the lot split records `gains_source = source`.
//!
//! # Freshness
//! Editing a split's amount or value marks its gains dirty.  Computation is
//! skipped while the source is clean and its lot split is clean, so repeated
//! calls never create a second gains transaction.
//!
//! # Failure
//! Malformed lots are logged at error level and returned as [`GainsError`];
//! nothing is repaired.  The gain account is resolved before any split of a
//! new gains transaction exists.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use lotbook_ledger::{
    AccountId, Book, GainsStatus, LedgerError, LotId, NewSplit, Numeric, SplitId, TransactionId,
};

use crate::gain_account::{resolve_gain_account, GainAccountError};
use crate::settings::LotSettings;
use crate::status::{determine_gains_status, gains_source_of, gains_split_of};

/// Why a computation left the book untouched.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    UnknownSplit,
    /// Source and its gains record are both clean.
    Fresh,
    ZeroAmount,
    NotInLot,
    MissingCurrency,
    /// The lot's opening split never realizes a gain.
    OpeningSplit,
    /// Opening and source trades are in different currencies.
    CurrencyMismatch,
}

/// The gains transaction as written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GainsRecord {
    pub source: SplitId,
    pub transaction: TransactionId,
    pub lot_split: SplitId,
    pub gain_split: SplitId,
    pub gain: Numeric,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GainsOutcome {
    Skipped(SkipReason),
    /// Gain computed as exactly zero; no gains transaction was touched.
    ZeroGain,
    Created(GainsRecord),
    Updated(GainsRecord),
}

impl GainsOutcome {
    pub fn record(&self) -> Option<&GainsRecord> {
        match self {
            GainsOutcome::Created(r) | GainsOutcome::Updated(r) => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GainsError {
    #[error("malformed lot {lot}: opening amount {opening} is smaller than split {split} amount {amount}")]
    TooThin {
        lot: LotId,
        split: SplitId,
        opening: Numeric,
        amount: Numeric,
    },
    #[error("malformed lot {lot}: split {split} amount {amount} does not oppose opening amount {opening}")]
    TooFat {
        lot: LotId,
        split: SplitId,
        opening: Numeric,
        amount: Numeric,
    },
    #[error("gains split {0} has no source split")]
    MissingGainsSource(SplitId),
    #[error("gains transaction of lot split {0} has no gain split")]
    MissingGainSplit(SplitId),
    #[error("cannot resolve gain account: {0}")]
    GainAccount(#[from] GainAccountError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Compute and materialize the realized gain of `split`.
///
/// A gains-transaction split is redirected to its source first.
/// `gain_account` overrides the default gain account when it is denominated
/// in the source's currency. `now` stamps the gains transaction's entry date.
pub fn compute_cap_gains(
    book: &mut Book,
    split: SplitId,
    gain_account: Option<AccountId>,
    settings: &LotSettings,
    now: DateTime<Utc>,
) -> Result<GainsOutcome, GainsError> {
    if book.split(split).is_none() {
        return Ok(GainsOutcome::Skipped(SkipReason::UnknownSplit));
    }
    determine_gains_status(book, split);

    let source = match book.split(split).map(|s| s.gains_status()) {
        Some(GainsStatus::GainsRecord(_)) => redirect_to_source(book, split)?,
        _ => split,
    };
    determine_gains_status(book, source);
    let Some(src) = book.split(source) else {
        return Ok(GainsOutcome::Skipped(SkipReason::UnknownSplit));
    };
    let pair = src.gains_pair();
    if let Some(p) = pair {
        determine_gains_status(book, p);
    }

    let src = book.split(source).ok_or(LedgerError::UnknownSplit(source))?;
    let pair_clean = pair
        .and_then(|p| book.split(p))
        .map(|p| !p.gains_status().is_dirty());
    if !src.gains_status().is_dirty() && pair_clean == Some(true) {
        return Ok(GainsOutcome::Skipped(SkipReason::Fresh));
    }
    if src.amount().is_zero() {
        return Ok(GainsOutcome::Skipped(SkipReason::ZeroAmount));
    }
    let Some(lot) = src.lot() else {
        return Ok(GainsOutcome::Skipped(SkipReason::NotInLot));
    };
    let Some(currency) = book.split_transaction(source).and_then(|t| t.currency()).cloned()
    else {
        return Ok(GainsOutcome::Skipped(SkipReason::MissingCurrency));
    };

    let opening = book
        .lot_earliest_split(lot)
        .ok_or(LedgerError::UnknownLot(lot))?;
    if opening == source {
        return Ok(GainsOutcome::Skipped(SkipReason::OpeningSplit));
    }
    let same_currency = book
        .split_transaction(opening)
        .and_then(|t| t.currency())
        .map(|c| c.equiv(&currency))
        .unwrap_or(false);
    if !same_currency {
        return Ok(GainsOutcome::Skipped(SkipReason::CurrencyMismatch));
    }

    let op = book.split(opening).ok_or(LedgerError::UnknownSplit(opening))?;
    let (op_amount, op_value) = (op.amount().clone(), op.value().clone());
    let (amount, value) = (src.amount().clone(), src.value().clone());

    if op_amount.abs() < amount.abs() {
        error!(%lot, split = %source, opening = %op_amount, %amount, "malformed lot (too thin)");
        return Err(GainsError::TooThin {
            lot,
            split: source,
            opening: op_amount,
            amount,
        });
    }
    if op_amount.signum() * amount.signum() != -1 {
        error!(%lot, split = %source, opening = %op_amount, %amount, "malformed lot (too fat)");
        return Err(GainsError::TooFat {
            lot,
            split: source,
            opening: op_amount,
            amount,
        });
    }

    let cost_basis = op_value.mul_div(&amount, &op_amount).map_err(LedgerError::from)?;
    let gain = &cost_basis - &value;
    debug!(
        split = %source, open_amount = %op_amount, open_value = %op_value,
        %amount, %value, %gain, "gains computed"
    );
    if gain.is_zero() {
        return Ok(GainsOutcome::ZeroGain);
    }

    let posted = book
        .split_transaction(source)
        .map(|t| t.date_posted())
        .ok_or(LedgerError::UnknownSplit(source))?;
    let lot_account = book.lot(lot).ok_or(LedgerError::UnknownLot(lot))?.account();

    let (record, created) = match gains_split_of(book, source) {
        None => {
            let gain_acc = match gain_account {
                Some(acc)
                    if book
                        .account(acc)
                        .and_then(|a| a.commodity())
                        .map(|c| c.equiv(&currency))
                        .unwrap_or(false) =>
                {
                    acc
                }
                _ => resolve_gain_account(book, lot_account, &currency, settings)?,
            };
            let record = create_gains_transaction(
                book, source, lot, lot_account, gain_acc, &currency, &gain, posted, now, settings,
            )?;
            info!(
                split = %source, transaction = %record.transaction, %gain,
                "gains transaction created"
            );
            (record, true)
        }
        Some(lot_split) => {
            let record =
                update_gains_transaction(book, source, lot, lot_split, &currency, &gain, posted, now)?;
            debug!(split = %source, transaction = %record.transaction, %gain, "gains transaction updated");
            (record, false)
        }
    };

    if let Some(s) = book.split_mut(source) {
        s.set_gains_status(GainsStatus::Clean);
        s.set_gains_pair(Some(record.lot_split));
    }
    for id in [record.lot_split, record.gain_split] {
        if let Some(s) = book.split_mut(id) {
            s.set_gains_status(GainsStatus::GainsRecord(None));
            s.set_gains_pair(Some(source));
        }
    }

    Ok(if created {
        GainsOutcome::Created(record)
    } else {
        GainsOutcome::Updated(record)
    })
}

fn redirect_to_source(book: &mut Book, split: SplitId) -> Result<SplitId, GainsError> {
    if let Some(p) = book
        .split(split)
        .and_then(|s| s.gains_pair())
        .filter(|p| book.split(*p).is_some())
    {
        return Ok(p);
    }
    error!(%split, "gains split has no cached source; recovering");
    match gains_source_of(book, split) {
        Some(source) => {
            warn!(%split, %source, "gains source recovered from cross-reference");
            if let Some(s) = book.split_mut(split) {
                s.set_gains_pair(Some(source));
            }
            Ok(source)
        }
        None => Err(GainsError::MissingGainsSource(split)),
    }
}

#[allow(clippy::too_many_arguments)]
fn create_gains_transaction(
    book: &mut Book,
    source: SplitId,
    lot: LotId,
    lot_account: AccountId,
    gain_account: AccountId,
    currency: &lotbook_ledger::Commodity,
    gain: &Numeric,
    posted: DateTime<Utc>,
    now: DateTime<Utc>,
    settings: &LotSettings,
) -> Result<GainsRecord, GainsError> {
    let desc = settings.gains_description.as_str();
    let tx = book.new_transaction(currency.clone(), posted, now, desc);

    book.with_account_edit(lot_account, |book| {
        book.with_account_edit(gain_account, |book| {
            book.with_transaction_edit(tx, |book| -> Result<GainsRecord, GainsError> {
                let lot_split = book.append_split(
                    tx,
                    NewSplit::new(lot_account, Numeric::zero(), gain.clone()).memo(desc),
                )?;
                let gain_split = book
                    .append_split(tx, NewSplit::new(gain_account, -gain, -gain).memo(desc))?;
                book.lot_add_split(lot, lot_split)?;

                if let Some(s) = book.split_mut(source) {
                    s.set_gains_split_ref(Some(lot_split));
                }
                if let Some(s) = book.split_mut(lot_split) {
                    s.set_gains_source_ref(Some(source));
                }
                Ok(GainsRecord {
                    source,
                    transaction: tx,
                    lot_split,
                    gain_split,
                    gain: gain.clone(),
                })
            })
        })
    })
}

#[allow(clippy::too_many_arguments)]
fn update_gains_transaction(
    book: &mut Book,
    source: SplitId,
    lot: LotId,
    lot_split: SplitId,
    currency: &lotbook_ledger::Commodity,
    gain: &Numeric,
    posted: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<GainsRecord, GainsError> {
    let tx = book
        .split(lot_split)
        .ok_or(LedgerError::UnknownSplit(lot_split))?
        .transaction();
    let Some(gain_split) = book.other_split(lot_split) else {
        error!(%lot_split, "gains transaction has no gain split");
        return Err(GainsError::MissingGainSplit(lot_split));
    };

    book.with_transaction_edit(tx, |book| -> Result<GainsRecord, GainsError> {
        if let Some(t) = book.transaction_mut(tx) {
            if !t.currency().map(|c| c.equiv(currency)).unwrap_or(false) {
                t.set_currency(currency.clone());
            }
            t.set_date_posted(posted);
            t.set_date_entered(now);
        }
        if let Some(s) = book.split_mut(lot_split) {
            s.set_amount(Numeric::zero());
            s.set_value(gain.clone());
        }
        book.lot_add_split(lot, lot_split)?;
        if let Some(s) = book.split_mut(gain_split) {
            s.set_amount(-gain);
            s.set_value(-gain);
        }
        Ok(GainsRecord {
            source,
            transaction: tx,
            lot_split,
            gain_split,
            gain: gain.clone(),
        })
    })
}

/// Realized gain carried by `split`, refreshing it first when stale.
///
/// For a gains-transaction split this is its own value; for a source split
/// the value of its lot split; zero otherwise. Computation failures are
/// logged and the last materialized figure is returned.
pub fn cap_gains(
    book: &mut Book,
    split: SplitId,
    settings: &LotSettings,
    now: DateTime<Utc>,
) -> Numeric {
    if book.split(split).is_none() {
        return Numeric::zero();
    }
    determine_gains_status(book, split);
    let pair = book.split(split).and_then(|s| s.gains_pair());
    if let Some(p) = pair {
        determine_gains_status(book, p);
    }

    let stale = book
        .split(split)
        .map(|s| s.gains_status().is_dirty())
        .unwrap_or(false)
        || pair
            .and_then(|p| book.split(p))
            .map(|p| p.gains_status().is_dirty())
            .unwrap_or(false);
    if stale {
        if let Err(err) = compute_cap_gains(book, split, None, settings, now) {
            warn!(%split, error = %err, "gains refresh failed");
        }
    }

    let Some(s) = book.split(split) else {
        return Numeric::zero();
    };
    if s.gains_status().is_gains_record() {
        return s.value().clone();
    }
    s.gains_pair()
        .and_then(|p| book.split(p))
        .map(|p| p.value().clone())
        .unwrap_or_default()
}

/// Lot split of the gains transaction recorded for `split`.
pub fn cap_gains_split(book: &Book, split: SplitId) -> Option<SplitId> {
    gains_split_of(book, split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::assign_to_lot;
    use crate::policy::FifoPolicy;
    use chrono::TimeZone;
    use lotbook_ledger::{AccountKind, Commodity, Dirty, NewAccount};

    fn n(s: &str) -> Numeric {
        s.parse().unwrap()
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, d, 0, 0, 0).unwrap()
    }

    fn usd() -> Commodity {
        Commodity::currency("USD", 100)
    }

    struct Fx {
        book: Book,
        stock: AccountId,
        cash: AccountId,
        settings: LotSettings,
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
                .create_account(root, NewAccount::new("Cash", AccountKind::Bank, usd()))
                .unwrap();
            Self {
                book,
                stock,
                cash,
                settings: LotSettings::default(),
            }
        }

        fn trade_in(&mut self, cur: Commodity, d: u32, amount: &str, value: &str) -> SplitId {
            let t = self.book.new_transaction(cur, day(d), day(d), "trade");
            let s = self
                .book
                .append_split(t, NewSplit::new(self.stock, n(amount), n(value)))
                .unwrap();
            self.book
                .append_split(t, NewSplit::new(self.cash, -n(value), -n(value)))
                .unwrap();
            assign_to_lot(&mut self.book, s, &FifoPolicy, &self.settings, day(28)).unwrap();
            s
        }

        fn trade(&mut self, d: u32, amount: &str, value: &str) -> SplitId {
            self.trade_in(usd(), d, amount, value)
        }

        fn compute(&mut self, s: SplitId) -> Result<GainsOutcome, GainsError> {
            compute_cap_gains(&mut self.book, s, None, &self.settings, day(28))
        }
    }

    #[test]
    fn partial_sale_realizes_gain() {
        let mut fx = Fx::new();
        fx.trade(1, "100", "1000");
        let sell = fx.trade(2, "-60", "-720");

        let out = fx.compute(sell).unwrap();
        let GainsOutcome::Created(rec) = out else {
            panic!("expected Created, got {out:?}");
        };
        assert_eq!(rec.gain, n("120"));

        let ls = fx.book.split(rec.lot_split).unwrap();
        assert_eq!((ls.amount(), ls.value()), (&n("0"), &n("120")));
        assert_eq!(ls.lot(), fx.book.split(sell).unwrap().lot());
        assert_eq!(ls.memo(), "Realized Gain/Loss");
        let gs = fx.book.split(rec.gain_split).unwrap();
        assert_eq!((gs.amount(), gs.value()), (&n("-120"), &n("-120")));

        let tx = fx.book.transaction(rec.transaction).unwrap();
        assert_eq!(tx.description(), "Realized Gain/Loss");
        assert_eq!(tx.date_posted(), day(2));
        assert_eq!(tx.date_entered(), day(28));

        assert_eq!(cap_gains_split(&fx.book, sell), Some(rec.lot_split));
        assert_eq!(fx.book.split(sell).unwrap().gains_status(), GainsStatus::Clean);
    }

    #[test]
    fn second_call_is_fresh() {
        let mut fx = Fx::new();
        fx.trade(1, "100", "1000");
        let sell = fx.trade(2, "-60", "-720");
        fx.compute(sell).unwrap();
        let txs = fx.book.transactions().count();

        assert_eq!(fx.compute(sell).unwrap(), GainsOutcome::Skipped(SkipReason::Fresh));
        assert_eq!(fx.book.transactions().count(), txs);
    }

    #[test]
    fn edited_value_updates_existing_transaction() {
        let mut fx = Fx::new();
        fx.trade(1, "100", "1000");
        let sell = fx.trade(2, "-60", "-720");
        let first = fx.compute(sell).unwrap().record().cloned().unwrap();

        fx.book.split_mut(sell).unwrap().set_value(n("-780"));
        let out = fx.compute(sell).unwrap();
        let GainsOutcome::Updated(rec) = out else {
            panic!("expected Updated, got {out:?}");
        };
        assert_eq!(rec.transaction, first.transaction);
        assert_eq!(rec.gain, n("180"));
        assert_eq!(fx.book.split(rec.gain_split).unwrap().value(), &n("-180"));
    }

    #[test]
    fn gains_record_redirects_to_source() {
        let mut fx = Fx::new();
        fx.trade(1, "100", "1000");
        let sell = fx.trade(2, "-60", "-720");
        let rec = fx.compute(sell).unwrap().record().cloned().unwrap();

        fx.book
            .split_mut(rec.lot_split)
            .unwrap()
            .mark_dirty(Dirty::VALUE);
        let out = fx.compute(rec.lot_split).unwrap();
        assert_eq!(out.record().map(|r| r.source), Some(sell));
    }

    #[test]
    fn gains_record_without_cached_source_recovers_it() {
        let mut fx = Fx::new();
        fx.trade(1, "100", "1000");
        let sell = fx.trade(2, "-60", "-720");
        let rec = fx.compute(sell).unwrap().record().cloned().unwrap();
        let txs = fx.book.transactions().count();

        for id in [rec.lot_split, rec.gain_split] {
            fx.book.split_mut(id).unwrap().set_gains_pair(None);
        }
        fx.book.split_mut(sell).unwrap().mark_dirty(Dirty::VALUE);

        let out = fx.compute(rec.gain_split).unwrap();
        let GainsOutcome::Updated(again) = out else {
            panic!("expected Updated, got {out:?}");
        };
        assert_eq!(again.source, sell);
        assert_eq!(again.transaction, rec.transaction);
        assert_eq!(again.gain, n("120"));
        assert_eq!(fx.book.transactions().count(), txs);
        assert_eq!(fx.book.split(rec.gain_split).unwrap().gains_pair(), Some(sell));
    }

    #[test]
    fn cap_gains_of_gain_split_survives_status_reset() {
        let mut fx = Fx::new();
        fx.trade(1, "100", "1000");
        let sell = fx.trade(2, "-60", "-720");
        let rec = fx.compute(sell).unwrap().record().cloned().unwrap();
        let settings = fx.settings.clone();
        assert_eq!(cap_gains(&mut fx.book, rec.gain_split, &settings, day(28)), n("-120"));
        let txs = fx.book.transactions().count();

        for id in [sell, rec.lot_split, rec.gain_split] {
            let s = fx.book.split_mut(id).unwrap();
            s.set_gains_status(GainsStatus::Unknown);
            s.set_gains_pair(None);
        }

        assert_eq!(cap_gains(&mut fx.book, rec.gain_split, &settings, day(28)), n("-120"));
        assert_eq!(cap_gains(&mut fx.book, rec.lot_split, &settings, day(28)), n("120"));
        assert_eq!(cap_gains(&mut fx.book, sell, &settings, day(28)), n("120"));
        assert_eq!(fx.book.transactions().count(), txs);
    }

    #[test]
    fn orphaned_gains_record_without_any_reference_fails() {
        let mut fx = Fx::new();
        fx.trade(1, "100", "1000");
        let sell = fx.trade(2, "-60", "-720");
        let rec = fx.compute(sell).unwrap().record().cloned().unwrap();

        for id in [rec.lot_split, rec.gain_split] {
            let s = fx.book.split_mut(id).unwrap();
            s.set_gains_pair(None);
            s.set_gains_source_ref(None);
        }
        assert_eq!(
            fx.compute(rec.gain_split),
            Err(GainsError::MissingGainsSource(rec.gain_split))
        );
    }

    #[test]
    fn opening_split_and_zero_gain_make_nothing() {
        let mut fx = Fx::new();
        let buy = fx.trade(1, "100", "1000");
        let sell = fx.trade(2, "-50", "-500");
        let txs = fx.book.transactions().count();

        assert_eq!(fx.compute(buy).unwrap(), GainsOutcome::Skipped(SkipReason::OpeningSplit));
        assert_eq!(fx.compute(sell).unwrap(), GainsOutcome::ZeroGain);
        assert_eq!(fx.book.transactions().count(), txs);
        assert!(cap_gains(&mut fx.book, sell, &fx.settings.clone(), day(28)).is_zero());
    }

    #[test]
    fn currency_mismatch_is_skipped() {
        let mut fx = Fx::new();
        fx.trade(1, "100", "1000");
        let sell = fx.trade_in(Commodity::currency("EUR", 100), 2, "-10", "-90");
        assert_eq!(
            fx.compute(sell).unwrap(),
            GainsOutcome::Skipped(SkipReason::CurrencyMismatch)
        );
    }

    #[test]
    fn missing_currency_is_skipped() {
        let mut fx = Fx::new();
        fx.trade(1, "100", "1000");
        let sell = fx.trade(2, "-10", "-90");
        let tx = fx.book.split(sell).unwrap().transaction();
        fx.book.transaction_mut(tx).unwrap().clear_currency();
        assert_eq!(
            fx.compute(sell).unwrap(),
            GainsOutcome::Skipped(SkipReason::MissingCurrency)
        );
    }

    #[test]
    fn unassigned_and_unknown_splits_are_skipped() {
        let mut fx = Fx::new();
        let t = fx.book.new_transaction(usd(), day(1), day(1), "raw");
        let raw = fx
            .book
            .append_split(t, NewSplit::new(fx.stock, n("5"), n("50")))
            .unwrap();
        assert_eq!(fx.compute(raw).unwrap(), GainsOutcome::Skipped(SkipReason::NotInLot));
        assert_eq!(
            fx.compute(SplitId::new()).unwrap(),
            GainsOutcome::Skipped(SkipReason::UnknownSplit)
        );
    }

    #[test]
    fn cap_gains_reads_either_side() {
        let mut fx = Fx::new();
        fx.trade(1, "100", "1000");
        let sell = fx.trade(2, "-60", "-720");
        let settings = fx.settings.clone();

        assert_eq!(cap_gains(&mut fx.book, sell, &settings, day(28)), n("120"));
        let ls = cap_gains_split(&fx.book, sell).unwrap();
        assert_eq!(cap_gains(&mut fx.book, ls, &settings, day(28)), n("120"));
        let gs = fx.book.other_split(ls).unwrap();
        assert_eq!(cap_gains(&mut fx.book, gs, &settings, day(28)), n("-120"));
    }

    #[test]
    fn override_gain_account_in_currency_is_used() {
        let mut fx = Fx::new();
        let root = fx.book.root();
        let mine = fx
            .book
            .create_account(root, NewAccount::new("Trading Gains", AccountKind::Income, usd()))
            .unwrap();
        fx.trade(1, "100", "1000");
        let sell = fx.trade(2, "-60", "-720");

        let out = compute_cap_gains(&mut fx.book, sell, Some(mine), &fx.settings.clone(), day(28))
            .unwrap();
        let rec = out.record().unwrap();
        assert_eq!(fx.book.split(rec.gain_split).unwrap().account(), mine);
        assert!(fx.book.lookup_path("Orphaned Gains-USD").is_none());
    }
}
