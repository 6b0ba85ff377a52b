//! Per-currency default gain/loss accounts.
//!
//! Each lot account may name, per currency, the account its realized gains
//! are booked to.  The association lives in the account's metadata under
//! `lot-mgmt/gains-act/<currency unique name>`.  When none is set, a shared
//! top-level Income account named `"<prefix>-<mnemonic>"` is found or created
//! and remembered.

use thiserror::Error;
use tracing::info;

use lotbook_ledger::{
    AccountId, AccountKind, Book, Commodity, KvpValue, LedgerError, NewAccount,
};

use crate::settings::LotSettings;

/// Metadata frame of per-currency gain account ids.
pub const GAINS_ACCOUNT_SLOT: &str = "lot-mgmt/gains-act";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GainAccountError {
    #[error("currency has an empty mnemonic")]
    EmptyCurrency,
    #[error("account {0} has no root")]
    NoRoot(AccountId),
    #[error("account {0} has no commodity and cannot hold gains")]
    NoCommodity(AccountId),
    #[error("account '{name}' exists but is denominated in {found}, not {wanted}")]
    NameConflict {
        name: String,
        found: String,
        wanted: String,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

fn slot_path(currency: &Commodity) -> String {
    format!("{GAINS_ACCOUNT_SLOT}/{}", currency.unique_name())
}

/// Gain account recorded on `account` for `currency`, if it still exists.
pub fn default_gain_account(
    book: &Book,
    account: AccountId,
    currency: &Commodity,
) -> Option<AccountId> {
    let id = book
        .account(account)?
        .kvp()
        .get_guid(&slot_path(currency))
        .map(AccountId::from_uuid)?;
    book.account(id).map(|a| a.id())
}

/// Record `gain_account` as `account`'s gain account for the gain account's
/// own commodity.
pub fn set_default_gain_account(
    book: &mut Book,
    account: AccountId,
    gain_account: AccountId,
) -> Result<(), GainAccountError> {
    let currency = book
        .account(gain_account)
        .ok_or(LedgerError::UnknownAccount(gain_account))?
        .commodity()
        .cloned()
        .ok_or(GainAccountError::NoCommodity(gain_account))?;
    if book.account(account).is_none() {
        return Err(LedgerError::UnknownAccount(account).into());
    }

    book.with_account_edit(account, |book| {
        if let Some(acc) = book.account_mut(account) {
            acc.kvp_mut()
                .set(&slot_path(&currency), KvpValue::Guid(gain_account.as_uuid()));
        }
    });
    Ok(())
}

/// Gain account for gains realized on `account` in `currency`, creating and
/// recording the shared fallback account when none is set.
pub fn resolve_gain_account(
    book: &mut Book,
    account: AccountId,
    currency: &Commodity,
    settings: &LotSettings,
) -> Result<AccountId, GainAccountError> {
    if let Some(found) = default_gain_account(book, account, currency) {
        return Ok(found);
    }
    if currency.mnemonic.trim().is_empty() {
        return Err(GainAccountError::EmptyCurrency);
    }
    let root = book
        .account_root(account)
        .ok_or(GainAccountError::NoRoot(account))?;

    let name = format!("{}-{}", settings.orphan_account_prefix, currency.mnemonic);
    let gain_account = match book.child_by_name(root, &name) {
        Some(existing) => {
            let found = book.account(existing).and_then(|a| a.commodity());
            match found {
                Some(c) if c.equiv(currency) => existing,
                other => {
                    return Err(GainAccountError::NameConflict {
                        name,
                        found: other.map(|c| c.unique_name()).unwrap_or_else(|| "nothing".into()),
                        wanted: currency.unique_name(),
                    })
                }
            }
        }
        None => {
            let spec = NewAccount::new(name.as_str(), AccountKind::Income, currency.clone())
                .description(settings.gains_description.as_str())
                .notes(
                    "Collects realized gains and losses for lot accounts \
                     that have no gain account set for this currency.",
                );
            let id = book.with_account_edit(root, |book| book.create_account(root, spec))?;
            info!(account = %id, %name, "fallback gain account created");
            id
        }
    };

    set_default_gain_account(book, account, gain_account)?;
    Ok(gain_account)
}
