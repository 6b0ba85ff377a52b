use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, LotId, SplitId, TransactionId};
use crate::kvp::KvpFrame;
use crate::numeric::Numeric;

/// Reconciliation state of a split.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileState {
    #[default]
    New,
    Cleared,
    Reconciled,
    Frozen,
    Voided,
}

/// Which figures of a split changed since its gains were last computed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dirty {
    pub amount: bool,
    pub value: bool,
}

impl Dirty {
    pub const AMOUNT: Dirty = Dirty {
        amount: true,
        value: false,
    };
    pub const VALUE: Dirty = Dirty {
        amount: false,
        value: true,
    };
    pub const BOTH: Dirty = Dirty {
        amount: true,
        value: true,
    };

    pub fn merge(self, other: Dirty) -> Dirty {
        Dirty {
            amount: self.amount || other.amount,
            value: self.value || other.value,
        }
    }
}

/// Realized-gains bookkeeping state of a split.
///
/// `Unknown` is the state of every split until its persisted gains
/// cross-references are inspected; marking an unknown split dirty leaves it
/// unknown, since determination always starts from dirty anyway.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GainsStatus {
    #[default]
    Unknown,
    /// Source split whose gains transaction matches its figures.
    Clean,
    /// Source split whose gains must be recomputed.
    Dirty(Dirty),
    /// One of the two splits of a gains transaction; `Some` once its figures
    /// were changed outside the gains computation.
    GainsRecord(Option<Dirty>),
}

impl GainsStatus {
    pub fn is_unknown(&self) -> bool {
        matches!(self, GainsStatus::Unknown)
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self, GainsStatus::Dirty(_) | GainsStatus::GainsRecord(Some(_)))
    }

    pub fn is_gains_record(&self) -> bool {
        matches!(self, GainsStatus::GainsRecord(_))
    }

    pub fn mark(&mut self, d: Dirty) {
        *self = match *self {
            GainsStatus::Unknown => GainsStatus::Unknown,
            GainsStatus::Clean => GainsStatus::Dirty(d),
            GainsStatus::Dirty(prev) => GainsStatus::Dirty(prev.merge(d)),
            GainsStatus::GainsRecord(prev) => {
                GainsStatus::GainsRecord(Some(prev.map_or(d, |p| p.merge(d))))
            }
        };
    }
}

/// Parameters for [`Book::append_split`](crate::Book::append_split).
#[derive(Clone, Debug)]
pub struct NewSplit {
    pub account: AccountId,
    pub amount: Numeric,
    pub value: Numeric,
    pub memo: String,
    pub action: String,
}

impl NewSplit {
    pub fn new(account: AccountId, amount: Numeric, value: Numeric) -> Self {
        Self {
            account,
            amount,
            value,
            memo: String::new(),
            action: String::new(),
        }
    }

    pub fn memo<S: Into<String>>(mut self, memo: S) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn action<S: Into<String>>(mut self, action: S) -> Self {
        self.action = action.into();
        self
    }
}

/// One leg of a transaction.
///
/// `amount` is in the account's commodity, `value` in the transaction's
/// currency.  `gains_split` (on a source split) and `gains_source` (on the
/// lot-side split of a gains transaction) are the persisted gains
/// cross-references; `gains_pair` is a cache of whichever applies and is
/// never serialized.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Split {
    pub(crate) id: SplitId,
    pub(crate) transaction: TransactionId,
    pub(crate) account: AccountId,
    pub(crate) lot: Option<LotId>,
    pub(crate) memo: String,
    pub(crate) action: String,
    pub(crate) reconcile: ReconcileState,
    pub(crate) date_reconciled: Option<DateTime<Utc>>,
    pub(crate) amount: Numeric,
    pub(crate) value: Numeric,
    pub(crate) gains_split: Option<SplitId>,
    pub(crate) gains_source: Option<SplitId>,
    pub(crate) kvp: KvpFrame,
    #[serde(skip)]
    pub(crate) gains: GainsStatus,
    #[serde(skip)]
    pub(crate) gains_pair: Option<SplitId>,
}

impl Split {
    pub(crate) fn new(id: SplitId, transaction: TransactionId, spec: NewSplit) -> Self {
        Self {
            id,
            transaction,
            account: spec.account,
            lot: None,
            memo: spec.memo,
            action: spec.action,
            reconcile: ReconcileState::New,
            date_reconciled: None,
            amount: spec.amount,
            value: spec.value,
            gains_split: None,
            gains_source: None,
            kvp: KvpFrame::new(),
            gains: GainsStatus::Unknown,
            gains_pair: None,
        }
    }

    pub fn id(&self) -> SplitId {
        self.id
    }

    pub fn transaction(&self) -> TransactionId {
        self.transaction
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn lot(&self) -> Option<LotId> {
        self.lot
    }

    pub fn memo(&self) -> &str {
        &self.memo
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn reconcile(&self) -> ReconcileState {
        self.reconcile
    }

    pub fn date_reconciled(&self) -> Option<DateTime<Utc>> {
        self.date_reconciled
    }

    pub fn amount(&self) -> &Numeric {
        &self.amount
    }

    pub fn value(&self) -> &Numeric {
        &self.value
    }

    pub fn gains_status(&self) -> GainsStatus {
        self.gains
    }

    pub fn gains_pair(&self) -> Option<SplitId> {
        self.gains_pair
    }

    pub fn gains_split_ref(&self) -> Option<SplitId> {
        self.gains_split
    }

    pub fn gains_source_ref(&self) -> Option<SplitId> {
        self.gains_source
    }

    pub fn kvp(&self) -> &KvpFrame {
        &self.kvp
    }

    pub fn kvp_mut(&mut self) -> &mut KvpFrame {
        &mut self.kvp
    }

    /// Set the quantity; the split's gains become stale.
    pub fn set_amount(&mut self, amount: Numeric) {
        self.amount = amount;
        self.gains.mark(Dirty::AMOUNT);
    }

    /// Set the currency value; the split's gains become stale.
    pub fn set_value(&mut self, value: Numeric) {
        self.value = value;
        self.gains.mark(Dirty::VALUE);
    }

    pub fn set_memo<S: Into<String>>(&mut self, memo: S) {
        self.memo = memo.into();
    }

    pub fn set_action<S: Into<String>>(&mut self, action: S) {
        self.action = action.into();
    }

    pub fn set_reconcile(&mut self, state: ReconcileState) {
        self.reconcile = state;
    }

    pub fn set_date_reconciled(&mut self, ts: Option<DateTime<Utc>>) {
        self.date_reconciled = ts;
    }

    pub fn set_gains_status(&mut self, status: GainsStatus) {
        self.gains = status;
    }

    pub fn mark_dirty(&mut self, d: Dirty) {
        self.gains.mark(d);
    }

    pub fn set_gains_pair(&mut self, pair: Option<SplitId>) {
        self.gains_pair = pair;
    }

    pub fn set_gains_split_ref(&mut self, lot_split: Option<SplitId>) {
        self.gains_split = lot_split;
    }

    pub fn set_gains_source_ref(&mut self, source: Option<SplitId>) {
        self.gains_source = source;
    }
}
