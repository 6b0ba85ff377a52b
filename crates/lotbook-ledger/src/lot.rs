use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, LotId, SplitId};
use crate::kvp::{KvpFrame, KvpValue};

/// Metadata path of a lot's display title.
pub const LOT_TITLE_SLOT: &str = "title";

/// Splits of one account matched against each other for cost basis.
///
/// Balance and the opening split are derived from member splits by the
/// [`Book`](crate::Book); a lot stores only membership in insertion order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lot {
    pub(crate) id: LotId,
    pub(crate) account: AccountId,
    pub(crate) splits: Vec<SplitId>,
    pub(crate) kvp: KvpFrame,
}

impl Lot {
    pub(crate) fn new(id: LotId, account: AccountId) -> Self {
        Self {
            id,
            account,
            splits: Vec::new(),
            kvp: KvpFrame::new(),
        }
    }

    pub fn id(&self) -> LotId {
        self.id
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn splits(&self) -> &[SplitId] {
        &self.splits
    }

    pub fn title(&self) -> Option<&str> {
        self.kvp.get_str(LOT_TITLE_SLOT)
    }

    pub fn set_title<S: Into<String>>(&mut self, title: S) {
        self.kvp.set(LOT_TITLE_SLOT, KvpValue::Str(title.into()));
    }

    pub fn kvp(&self) -> &KvpFrame {
        &self.kvp
    }

    pub fn kvp_mut(&mut self) -> &mut KvpFrame {
        &mut self.kvp
    }
}
