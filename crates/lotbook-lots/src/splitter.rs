//! Dividing a split that overflows a lot.
//!
//! [`divide`] computes both halves as exact rationals before anything is
//! touched; [`apply_division`] then rewrites the original split to carry the
//! first half and appends the remainder to the same transaction and account.

use chrono::{DateTime, Utc};
use tracing::debug;

use lotbook_ledger::{Book, LedgerError, NewSplit, Numeric, SplitId};

/// Two halves of one split. `amount_a + amount_b` and `value_a + value_b`
/// equal the original figures exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Division {
    pub amount_a: Numeric,
    pub value_a: Numeric,
    pub amount_b: Numeric,
    pub value_b: Numeric,
}

/// Divide `(amount, value)` so the first half carries `amount_a` and a value
/// in proportion. `amount_a` must lie strictly between zero and `amount`.
pub fn divide(amount: &Numeric, value: &Numeric, amount_a: &Numeric) -> Option<Division> {
    let sign = amount.signum();
    if sign == 0 || amount_a.signum() != sign || amount_a.abs() >= amount.abs() {
        return None;
    }
    let value_a = amount_a.mul_div(value, amount).ok()?;
    Some(Division {
        amount_b: amount - amount_a,
        value_b: value - &value_a,
        amount_a: amount_a.clone(),
        value_a,
    })
}

/// Apply `division` to `split`; returns the appended remainder split.
///
/// The remainder copies memo, action and reconcile state but no metadata.
/// Both splits record each other in their `lot-split` audit list.
pub fn apply_division(
    book: &mut Book,
    split: SplitId,
    division: &Division,
    now: DateTime<Utc>,
) -> Result<SplitId, LedgerError> {
    let s = book.split(split).ok_or(LedgerError::UnknownSplit(split))?;
    let tx = s.transaction();
    let spec = NewSplit::new(
        s.account(),
        division.amount_b.clone(),
        division.value_b.clone(),
    )
    .memo(s.memo())
    .action(s.action());
    let reconcile = s.reconcile();
    let date_reconciled = s.date_reconciled();

    book.with_transaction_edit(tx, |book| -> Result<SplitId, LedgerError> {
        if let Some(s) = book.split_mut(split) {
            s.set_amount(division.amount_a.clone());
            s.set_value(division.value_a.clone());
        }
        let remainder = book.append_split(tx, spec)?;
        if let Some(r) = book.split_mut(remainder) {
            r.set_reconcile(reconcile);
            r.set_date_reconciled(date_reconciled);
        }
        book.record_division(split, remainder, now);
        debug!(
            %split, %remainder,
            amount_a = %division.amount_a, amount_b = %division.amount_b,
            "split divided"
        );
        Ok(remainder)
    })
}
