//! Gains-status determination from persisted cross-references.

use lotbook_ledger::{Book, Dirty, GainsStatus, SplitId};

/// Resolve an `Unknown` gains status from the split's persisted
/// cross-references, caching the paired split:
///
/// * a `gains_split` reference makes it a dirty source paired with that split;
/// * a `gains_source` reference, its own or that of the other split of its
///   transaction, makes it a gains record paired with that source;
/// * otherwise it is a dirty source with no pair.
///
/// Already-determined splits are left alone.
pub fn determine_gains_status(book: &mut Book, split: SplitId) {
    let Some(s) = book.split(split) else {
        return;
    };
    if !s.gains_status().is_unknown() {
        return;
    }

    let live = |id: Option<SplitId>| id.filter(|id| book.split(*id).is_some());
    let (status, pair) = if let Some(lot_split) = live(s.gains_split_ref()) {
        (GainsStatus::Dirty(Dirty::BOTH), Some(lot_split))
    } else if let Some(source) = gains_source_of(book, split) {
        (GainsStatus::GainsRecord(None), Some(source))
    } else {
        (GainsStatus::Dirty(Dirty::BOTH), None)
    };

    if let Some(s) = book.split_mut(split) {
        s.set_gains_status(status);
        s.set_gains_pair(pair);
    }
}

/// Lot-side split of the split's gains transaction, if one was recorded.
pub fn gains_split_of(book: &Book, split: SplitId) -> Option<SplitId> {
    book.split(split)?
        .gains_split_ref()
        .filter(|id| book.split(*id).is_some())
}

/// Source split of a gains-transaction split: its own `gains_source`
/// reference, else that of the other split of its transaction.
pub fn gains_source_of(book: &Book, split: SplitId) -> Option<SplitId> {
    let live = |id: Option<SplitId>| id.filter(|id| book.split(*id).is_some());
    live(book.split(split)?.gains_source_ref()).or_else(|| {
        let other = book.other_split(split)?;
        live(book.split(other)?.gains_source_ref())
    })
}
