use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commodity::Commodity;
use crate::ids::{SplitId, TransactionId};
use crate::kvp::KvpFrame;

/// A balanced set of splits sharing one currency.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub(crate) id: TransactionId,
    pub(crate) currency: Option<Commodity>,
    pub(crate) description: String,
    pub(crate) date_posted: DateTime<Utc>,
    pub(crate) date_entered: DateTime<Utc>,
    pub(crate) splits: Vec<SplitId>,
    pub(crate) kvp: KvpFrame,
    #[serde(skip)]
    pub(crate) edit_level: u32,
}

impl Transaction {
    pub(crate) fn new(
        id: TransactionId,
        currency: Commodity,
        description: String,
        date_posted: DateTime<Utc>,
        date_entered: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            currency: Some(currency),
            description,
            date_posted,
            date_entered,
            splits: Vec::new(),
            kvp: KvpFrame::new(),
            edit_level: 0,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn currency(&self) -> Option<&Commodity> {
        self.currency.as_ref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn date_posted(&self) -> DateTime<Utc> {
        self.date_posted
    }

    pub fn date_entered(&self) -> DateTime<Utc> {
        self.date_entered
    }

    pub fn splits(&self) -> &[SplitId] {
        &self.splits
    }

    pub fn kvp(&self) -> &KvpFrame {
        &self.kvp
    }

    pub fn kvp_mut(&mut self) -> &mut KvpFrame {
        &mut self.kvp
    }

    pub fn set_currency(&mut self, currency: Commodity) {
        self.currency = Some(currency);
    }

    /// Drop the currency; gains are not computed for such a transaction.
    pub fn clear_currency(&mut self) {
        self.currency = None;
    }

    pub fn set_description<S: Into<String>>(&mut self, description: S) {
        self.description = description.into();
    }

    pub fn set_date_posted(&mut self, ts: DateTime<Utc>) {
        self.date_posted = ts;
    }

    pub fn set_date_entered(&mut self, ts: DateTime<Utc>) {
        self.date_entered = ts;
    }

    pub fn is_editing(&self) -> bool {
        self.edit_level > 0
    }
}
