//! The in-memory ledger graph.
//!
//! # Purpose
//! `Book` owns every account, transaction, split and lot, keyed by stable
//! ids.  Entities refer to each other by id only, so all membership changes
//! (a split joining a transaction, an account, a lot) go through `Book`
//! methods that keep both sides of each relation in step.
//!
//! # Edit sessions
//! Accounts and transactions carry a nesting edit counter.  Mutating code in
//! this workspace brackets its work with [`Book::with_account_edit`] /
//! [`Book::with_transaction_edit`], which release the session on every exit
//! path of the closure, including early `?` returns.  Committing a
//! transaction's outermost session logs a warning when its values no longer
//! sum to zero.
//!
//! # Determinism
//! No randomness other than id generation and no wall-clock reads: callers
//! supply every timestamp.  Iteration orders (account children, account
//! splits and lots, transactions, lot members) are insertion orders.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::account::{Account, AccountKind, NewAccount};
use crate::commodity::Commodity;
use crate::error::LedgerError;
use crate::ids::{AccountId, LotId, SplitId, TransactionId};
use crate::kvp::{KvpFrame, KvpValue};
use crate::lot::Lot;
use crate::numeric::Numeric;
use crate::split::{NewSplit, Split};
use crate::transaction::Transaction;

/// Separator between account names in a full account path.
pub const ACCOUNT_SEPARATOR: char = ':';

/// Split metadata list recording that a split was divided from / into a peer.
pub const LOT_SPLIT_SLOT: &str = "lot-split";

#[derive(Clone, Debug)]
pub struct Book {
    root: AccountId,
    accounts: BTreeMap<AccountId, Account>,
    transactions: BTreeMap<TransactionId, Transaction>,
    transaction_order: Vec<TransactionId>,
    splits: BTreeMap<SplitId, Split>,
    lots: BTreeMap<LotId, Lot>,
}

impl Default for Book {
    fn default() -> Self {
        Self::new()
    }
}

impl Book {
    /// An empty book holding only the root account.
    pub fn new() -> Self {
        let root = AccountId::new();
        let mut accounts = BTreeMap::new();
        accounts.insert(
            root,
            Account::new(
                root,
                None,
                NewAccount {
                    name: "Root".to_string(),
                    kind: AccountKind::Root,
                    commodity: None,
                    description: String::new(),
                    notes: String::new(),
                },
            ),
        );
        Self {
            root,
            accounts,
            transactions: BTreeMap::new(),
            transaction_order: Vec::new(),
            splits: BTreeMap::new(),
            lots: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> AccountId {
        self.root
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn account_mut(&mut self, id: AccountId) -> Option<&mut Account> {
        self.accounts.get_mut(&id)
    }

    /// Create an account under `parent`. Names are unique among siblings.
    pub fn create_account(
        &mut self,
        parent: AccountId,
        spec: NewAccount,
    ) -> Result<AccountId, LedgerError> {
        if spec.name.trim().is_empty() {
            return Err(LedgerError::EmptyAccountName);
        }
        if !self.accounts.contains_key(&parent) {
            return Err(LedgerError::UnknownAccount(parent));
        }
        if self.child_by_name(parent, &spec.name).is_some() {
            return Err(LedgerError::DuplicateAccount(spec.name));
        }

        let id = AccountId::new();
        debug!(account = %id, name = %spec.name, "create account");
        self.accounts.insert(id, Account::new(id, Some(parent), spec));
        if let Some(p) = self.accounts.get_mut(&parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    /// Direct child of `parent` named `name`.
    pub fn child_by_name(&self, parent: AccountId, name: &str) -> Option<AccountId> {
        self.accounts
            .get(&parent)?
            .children
            .iter()
            .copied()
            .find(|c| self.accounts.get(c).map(|a| a.name == name).unwrap_or(false))
    }

    /// Resolve a `Parent:Child` path starting below the root.
    pub fn lookup_path(&self, path: &str) -> Option<AccountId> {
        let mut cur = self.root;
        for name in path.split(ACCOUNT_SEPARATOR) {
            cur = self.child_by_name(cur, name.trim())?;
        }
        Some(cur)
    }

    /// `Parent:Child` path of an account (empty for the root).
    pub fn full_name(&self, id: AccountId) -> String {
        let mut names = Vec::new();
        let mut cur = self.accounts.get(&id);
        while let Some(acc) = cur {
            if acc.parent.is_none() {
                break;
            }
            names.push(acc.name.as_str());
            cur = acc.parent.and_then(|p| self.accounts.get(&p));
        }
        names.reverse();
        names.join(&ACCOUNT_SEPARATOR.to_string())
    }

    /// Top of the tree that `id` hangs from.
    pub fn account_root(&self, id: AccountId) -> Option<AccountId> {
        let mut cur = self.accounts.get(&id)?;
        while let Some(parent) = cur.parent {
            cur = self.accounts.get(&parent)?;
        }
        Some(cur.id)
    }

    /// Every account below the root, depth first in child order.
    pub fn account_ids(&self) -> Vec<AccountId> {
        let mut out = Vec::new();
        let mut stack: Vec<AccountId> = match self.accounts.get(&self.root) {
            Some(root) => root.children.iter().rev().copied().collect(),
            None => Vec::new(),
        };
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(acc) = self.accounts.get(&id) {
                stack.extend(acc.children.iter().rev().copied());
            }
        }
        out
    }

    /// `true` when any split of the account sits in a transaction whose
    /// currency differs from the account's commodity.
    pub fn account_has_trades(&self, id: AccountId) -> bool {
        let Some(acc) = self.accounts.get(&id) else {
            return false;
        };
        let Some(commodity) = acc.commodity.as_ref() else {
            return false;
        };
        acc.splits.iter().any(|s| {
            self.split_transaction(*s)
                .and_then(|t| t.currency.as_ref())
                .map(|cur| !cur.equiv(commodity))
                .unwrap_or(false)
        })
    }

    // -----------------------------------------------------------------------
    // Transactions and splits
    // -----------------------------------------------------------------------

    pub fn new_transaction<S: Into<String>>(
        &mut self,
        currency: Commodity,
        date_posted: DateTime<Utc>,
        date_entered: DateTime<Utc>,
        description: S,
    ) -> TransactionId {
        let id = TransactionId::new();
        self.transactions.insert(
            id,
            Transaction::new(id, currency, description.into(), date_posted, date_entered),
        );
        self.transaction_order.push(id);
        id
    }

    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.get(&id)
    }

    pub fn transaction_mut(&mut self, id: TransactionId) -> Option<&mut Transaction> {
        self.transactions.get_mut(&id)
    }

    /// Transactions in creation order.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transaction_order
            .iter()
            .filter_map(|id| self.transactions.get(id))
    }

    /// Append a split to `transaction`, booking it to `spec.account`.
    pub fn append_split(
        &mut self,
        transaction: TransactionId,
        spec: NewSplit,
    ) -> Result<SplitId, LedgerError> {
        if !self.transactions.contains_key(&transaction) {
            return Err(LedgerError::UnknownTransaction(transaction));
        }
        let account = spec.account;
        if !self.accounts.contains_key(&account) {
            return Err(LedgerError::UnknownAccount(account));
        }

        let id = SplitId::new();
        self.splits.insert(id, Split::new(id, transaction, spec));
        if let Some(t) = self.transactions.get_mut(&transaction) {
            t.splits.push(id);
        }
        if let Some(a) = self.accounts.get_mut(&account) {
            a.splits.push(id);
        }
        Ok(id)
    }

    pub fn split(&self, id: SplitId) -> Option<&Split> {
        self.splits.get(&id)
    }

    pub fn split_mut(&mut self, id: SplitId) -> Option<&mut Split> {
        self.splits.get_mut(&id)
    }

    pub fn split_transaction(&self, id: SplitId) -> Option<&Transaction> {
        self.transactions.get(&self.splits.get(&id)?.transaction)
    }

    /// The other split of a two-split transaction.
    pub fn other_split(&self, id: SplitId) -> Option<SplitId> {
        let t = self.split_transaction(id)?;
        match t.splits.as_slice() {
            [a, b] if *a == id => Some(*b),
            [a, b] if *b == id => Some(*a),
            _ => None,
        }
    }

    /// Sum of split values; zero for a balanced transaction.
    pub fn transaction_imbalance(&self, id: TransactionId) -> Numeric {
        self.transactions
            .get(&id)
            .map(|t| {
                t.splits
                    .iter()
                    .filter_map(|s| self.splits.get(s))
                    .map(|s| &s.value)
                    .sum()
            })
            .unwrap_or_default()
    }

    /// Record that `a` and `b` were divided from one split at `ts`.
    pub fn record_division(&mut self, a: SplitId, b: SplitId, ts: DateTime<Utc>) {
        for (this, peer) in [(a, b), (b, a)] {
            if let Some(s) = self.splits.get_mut(&this) {
                let mut entry = KvpFrame::new();
                entry.set("date", KvpValue::Timestamp(ts));
                entry.set("peer_guid", KvpValue::Guid(peer.as_uuid()));
                s.kvp.push(LOT_SPLIT_SLOT, KvpValue::Frame(entry));
            }
        }
    }

    /// Splits this split was divided from or into.
    pub fn division_peers(&self, id: SplitId) -> Vec<SplitId> {
        let Some(s) = self.splits.get(&id) else {
            return Vec::new();
        };
        s.kvp
            .get_list(LOT_SPLIT_SLOT)
            .iter()
            .filter_map(|v| match v {
                KvpValue::Frame(f) => f.get_guid("peer_guid").map(SplitId::from_uuid),
                _ => None,
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Lots
    // -----------------------------------------------------------------------

    pub fn new_lot(&mut self, account: AccountId) -> Result<LotId, LedgerError> {
        let acc = self
            .accounts
            .get_mut(&account)
            .ok_or(LedgerError::UnknownAccount(account))?;
        let id = LotId::new();
        acc.lots.push(id);
        self.lots.insert(id, Lot::new(id, account));
        Ok(id)
    }

    pub fn lot(&self, id: LotId) -> Option<&Lot> {
        self.lots.get(&id)
    }

    pub fn lot_mut(&mut self, id: LotId) -> Option<&mut Lot> {
        self.lots.get_mut(&id)
    }

    /// Add `split` to `lot`, removing it from any lot it was in before.
    pub fn lot_add_split(&mut self, lot: LotId, split: SplitId) -> Result<(), LedgerError> {
        let lot_account = self.lots.get(&lot).ok_or(LedgerError::UnknownLot(lot))?.account;
        let s = self.splits.get(&split).ok_or(LedgerError::UnknownSplit(split))?;
        if s.account != lot_account {
            return Err(LedgerError::LotAccountMismatch {
                split,
                split_account: s.account,
                lot,
                lot_account,
            });
        }
        let previous = s.lot;
        if previous == Some(lot) {
            return Ok(());
        }
        if let Some(old) = previous.and_then(|p| self.lots.get_mut(&p)) {
            old.splits.retain(|m| *m != split);
        }
        if let Some(l) = self.lots.get_mut(&lot) {
            l.splits.push(split);
        }
        if let Some(s) = self.splits.get_mut(&split) {
            s.lot = Some(lot);
        }
        Ok(())
    }

    /// Sum of member amounts.
    pub fn lot_balance(&self, lot: LotId) -> Numeric {
        self.lots
            .get(&lot)
            .map(|l| {
                l.splits
                    .iter()
                    .filter_map(|s| self.splits.get(s))
                    .map(|s| &s.amount)
                    .sum()
            })
            .unwrap_or_default()
    }

    /// A lot is closed when its balance is exactly zero.
    pub fn lot_is_closed(&self, lot: LotId) -> bool {
        self.lot_balance(lot).is_zero()
    }

    /// Member posted earliest; members posted at the same instant keep
    /// insertion order.
    pub fn lot_earliest_split(&self, lot: LotId) -> Option<SplitId> {
        self.lots
            .get(&lot)?
            .splits
            .iter()
            .enumerate()
            .filter_map(|(idx, s)| {
                let posted = self.split_transaction(*s)?.date_posted;
                Some(((posted, idx), *s))
            })
            .min_by_key(|(key, _)| *key)
            .map(|(_, s)| s)
    }

    /// Posting date of the lot's opening split.
    pub fn lot_opening_date(&self, lot: LotId) -> Option<DateTime<Utc>> {
        let opening = self.lot_earliest_split(lot)?;
        Some(self.split_transaction(opening)?.date_posted)
    }

    // -----------------------------------------------------------------------
    // Edit sessions
    // -----------------------------------------------------------------------

    pub fn begin_account_edit(&mut self, id: AccountId) {
        if let Some(a) = self.accounts.get_mut(&id) {
            a.edit_level += 1;
        }
    }

    pub fn commit_account_edit(&mut self, id: AccountId) {
        if let Some(a) = self.accounts.get_mut(&id) {
            if a.edit_level == 0 {
                warn!(account = %id, "commit without matching begin");
                return;
            }
            a.edit_level -= 1;
        }
    }

    pub fn begin_transaction_edit(&mut self, id: TransactionId) {
        if let Some(t) = self.transactions.get_mut(&id) {
            t.edit_level += 1;
        }
    }

    pub fn commit_transaction_edit(&mut self, id: TransactionId) {
        let Some(t) = self.transactions.get_mut(&id) else {
            return;
        };
        if t.edit_level == 0 {
            warn!(transaction = %id, "commit without matching begin");
            return;
        }
        t.edit_level -= 1;
        if t.edit_level == 0 {
            let imbalance = self.transaction_imbalance(id);
            if !imbalance.is_zero() {
                warn!(transaction = %id, %imbalance, "transaction committed out of balance");
            }
        }
    }

    /// Run `f` inside an edit session on `id`.
    pub fn with_account_edit<R>(&mut self, id: AccountId, f: impl FnOnce(&mut Book) -> R) -> R {
        self.begin_account_edit(id);
        let out = f(self);
        self.commit_account_edit(id);
        out
    }

    /// Run `f` inside an edit session on `id`.
    pub fn with_transaction_edit<R>(
        &mut self,
        id: TransactionId,
        f: impl FnOnce(&mut Book) -> R,
    ) -> R {
        self.begin_transaction_edit(id);
        let out = f(self);
        self.commit_transaction_edit(id);
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
