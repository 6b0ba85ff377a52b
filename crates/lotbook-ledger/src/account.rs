use serde::{Deserialize, Serialize};

use crate::commodity::Commodity;
use crate::ids::{AccountId, LotId, SplitId};
use crate::kvp::KvpFrame;

/// Account classification.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountKind {
    Root,
    Asset,
    Bank,
    Cash,
    Stock,
    Mutual,
    Currency,
    Liability,
    Equity,
    Income,
    Expense,
}

/// Parameters for [`Book::create_account`](crate::Book::create_account).
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub name: String,
    pub kind: AccountKind,
    pub commodity: Option<Commodity>,
    pub description: String,
    pub notes: String,
}

impl NewAccount {
    pub fn new<S: Into<String>>(name: S, kind: AccountKind, commodity: Commodity) -> Self {
        Self {
            name: name.into(),
            kind,
            commodity: Some(commodity),
            description: String::new(),
            notes: String::new(),
        }
    }

    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.notes = notes.into();
        self
    }
}

/// A node of the account tree.
///
/// Split and lot membership is maintained by the [`Book`](crate::Book);
/// both lists keep insertion order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub(crate) id: AccountId,
    pub(crate) name: String,
    pub(crate) kind: AccountKind,
    pub(crate) commodity: Option<Commodity>,
    pub(crate) description: String,
    pub(crate) notes: String,
    pub(crate) parent: Option<AccountId>,
    pub(crate) children: Vec<AccountId>,
    pub(crate) splits: Vec<SplitId>,
    pub(crate) lots: Vec<LotId>,
    pub(crate) kvp: KvpFrame,
    #[serde(skip)]
    pub(crate) edit_level: u32,
}

impl Account {
    pub(crate) fn new(id: AccountId, parent: Option<AccountId>, spec: NewAccount) -> Self {
        Self {
            id,
            name: spec.name,
            kind: spec.kind,
            commodity: spec.commodity,
            description: spec.description,
            notes: spec.notes,
            parent,
            children: Vec::new(),
            splits: Vec::new(),
            lots: Vec::new(),
            kvp: KvpFrame::new(),
            edit_level: 0,
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    pub fn commodity(&self) -> Option<&Commodity> {
        self.commodity.as_ref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn parent(&self) -> Option<AccountId> {
        self.parent
    }

    pub fn children(&self) -> &[AccountId] {
        &self.children
    }

    pub fn splits(&self) -> &[SplitId] {
        &self.splits
    }

    /// Lots in creation order.
    pub fn lots(&self) -> &[LotId] {
        &self.lots
    }

    pub fn kvp(&self) -> &KvpFrame {
        &self.kvp
    }

    pub fn kvp_mut(&mut self) -> &mut KvpFrame {
        &mut self.kvp
    }

    pub fn set_description<S: Into<String>>(&mut self, description: S) {
        self.description = description.into();
    }

    pub fn set_notes<S: Into<String>>(&mut self, notes: S) {
        self.notes = notes.into();
    }

    pub fn is_editing(&self) -> bool {
        self.edit_level > 0
    }
}
