//! Plain-data journal import.
//!
//! A [`Journal`] is the serde form of a small book: commodities, an account
//! tree given as `Parent:Child` paths (parents first), and transactions whose
//! splits name accounts by path and figures as exact decimal strings.
//! [`load_journal`] builds on a staged copy of the book and swaps it in only
//! when every account and transaction was accepted, so a rejected journal
//! leaves the book exactly as it was.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::account::{AccountKind, NewAccount};
use crate::book::{Book, ACCOUNT_SEPARATOR};
use crate::commodity::Commodity;
use crate::error::LedgerError;
use crate::ids::{AccountId, TransactionId};
use crate::numeric::{Numeric, RoundMode};
use crate::split::NewSplit;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    #[serde(default)]
    pub commodities: Vec<Commodity>,
    #[serde(default)]
    pub accounts: Vec<JournalAccount>,
    #[serde(default)]
    pub transactions: Vec<JournalTransaction>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JournalAccount {
    pub path: String,
    pub kind: AccountKind,
    /// Mnemonic of one of the journal's commodities.
    #[serde(default)]
    pub commodity: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JournalTransaction {
    pub posted: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    /// Mnemonic of the transaction currency.
    pub currency: String,
    pub splits: Vec<JournalSplit>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JournalSplit {
    pub account: String,
    pub amount: Numeric,
    pub value: Numeric,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub action: String,
}

/// Insert the journal into `book`; returns the new transactions in journal
/// order. `entered` stamps every transaction's entry date. On error `book`
/// is unchanged.
pub fn load_journal(
    book: &mut Book,
    journal: &Journal,
    entered: DateTime<Utc>,
) -> Result<Vec<TransactionId>, LedgerError> {
    let mut staged = book.clone();
    let created = load_into(&mut staged, journal, entered)?;
    *book = staged;
    Ok(created)
}

fn load_into(
    book: &mut Book,
    journal: &Journal,
    entered: DateTime<Utc>,
) -> Result<Vec<TransactionId>, LedgerError> {
    let commodities: BTreeMap<&str, &Commodity> = journal
        .commodities
        .iter()
        .map(|c| (c.mnemonic.as_str(), c))
        .collect();
    let lookup_commodity = |m: &str| -> Result<Commodity, LedgerError> {
        commodities
            .get(m)
            .map(|c| (*c).clone())
            .ok_or_else(|| LedgerError::UnknownCommodity(m.to_string()))
    };

    for acc in &journal.accounts {
        let (parent, name) = match acc.path.rsplit_once(ACCOUNT_SEPARATOR) {
            Some((parent_path, name)) => (
                book.lookup_path(parent_path)
                    .ok_or_else(|| LedgerError::UnknownAccountPath(parent_path.to_string()))?,
                name,
            ),
            None => (book.root(), acc.path.as_str()),
        };
        let commodity = acc
            .commodity
            .as_deref()
            .map(lookup_commodity)
            .transpose()?;
        book.create_account(
            parent,
            NewAccount {
                name: name.trim().to_string(),
                kind: acc.kind,
                commodity,
                description: acc.description.clone(),
                notes: String::new(),
            },
        )?;
    }

    let mut created = Vec::with_capacity(journal.transactions.len());
    for jt in &journal.transactions {
        let currency = lookup_commodity(&jt.currency)?;
        let splits = validate_transaction(book, jt, &currency)?;

        let tx = book.new_transaction(currency, jt.posted, entered, jt.description.clone());
        book.with_transaction_edit(tx, |book| -> Result<(), LedgerError> {
            for spec in splits {
                book.append_split(tx, spec)?;
            }
            Ok(())
        })?;
        debug!(transaction = %tx, description = %jt.description, "journal transaction loaded");
        created.push(tx);
    }
    Ok(created)
}

fn validate_transaction(
    book: &Book,
    jt: &JournalTransaction,
    currency: &Commodity,
) -> Result<Vec<NewSplit>, LedgerError> {
    if jt.splits.len() < 2 {
        return Err(LedgerError::TooFewSplits {
            description: jt.description.clone(),
            count: jt.splits.len(),
        });
    }

    let mut out = Vec::with_capacity(jt.splits.len());
    let mut imbalance = Numeric::zero();
    for js in &jt.splits {
        let account: AccountId = book
            .lookup_path(&js.account)
            .ok_or_else(|| LedgerError::UnknownAccountPath(js.account.clone()))?;
        if let Some(c) = book.account(account).and_then(|a| a.commodity()) {
            js.amount.convert(c.fraction, RoundMode::Never)?;
        }
        js.value.convert(currency.fraction, RoundMode::Never)?;
        imbalance += &js.value;
        out.push(
            NewSplit::new(account, js.amount.clone(), js.value.clone())
                .memo(js.memo.clone())
                .action(js.action.clone()),
        );
    }
    if !imbalance.is_zero() {
        return Err(LedgerError::Unbalanced {
            description: jt.description.clone(),
            imbalance,
        });
    }
    Ok(out)
}
