use chrono::{DateTime, TimeZone, Utc};
use lotbook_ledger::{AccountKind, Book, Commodity, NewAccount, NewSplit, Numeric};
use lotbook_lots::{LotEngine, LotSettings, GainsOutcome, SkipReason};

fn n(s: &str) -> Numeric {
    s.parse().unwrap()
}

fn at(m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, m, d, 0, 0, 0).unwrap()
}

#[test]
fn scenario_repeat_computation_never_duplicates() {
    let mut book = Book::new();
    let root = book.root();
    let usd = Commodity::currency("USD", 100);
    let stock = book
        .create_account(root, NewAccount::new("ACME", AccountKind::Stock, Commodity::security("NYSE", "ACME", 1)))
        .unwrap();
    let cash = book
        .create_account(root, NewAccount::new("Broker", AccountKind::Bank, usd.clone()))
        .unwrap();

    let mut legs = Vec::new();
    for (d, a, v) in [(1, "30", "300"), (5, "-10", "-110"), (9, "-10", "-95")] {
        let t = book.new_transaction(usd.clone(), at(3, d), at(3, d), "trade");
        legs.push(book.append_split(t, NewSplit::new(stock, n(a), n(v))).unwrap());
        book.append_split(t, NewSplit::new(cash, -n(v), -n(v))).unwrap();
    }

    let engine = LotEngine::new(LotSettings::default()).with_clock(|| at(4, 1));
    let run = engine.process_account(&mut book, stock).unwrap();
    assert!(run.is_clean());
    let gains_txs = |book: &Book| {
        book.transactions()
            .filter(|t| t.description() == "Realized Gain/Loss")
            .count()
    };
    assert_eq!(gains_txs(&book), 2);
    let before: Vec<Numeric> = legs.iter().map(|s| engine.cap_gains(&mut book, *s)).collect();
    assert_eq!(before, vec![n("0"), n("10"), n("-5")]);

    for s in &legs[1..] {
        assert_eq!(
            engine.compute_gains(&mut book, *s, None).unwrap(),
            GainsOutcome::Skipped(SkipReason::Fresh)
        );
    }
    assert_eq!(gains_txs(&book), 2);

    // An edit dirties the source; recomputation rewrites the same transaction.
    let lot_split = lotbook_lots::cap_gains_split(&book, legs[1]).unwrap();
    let tx = book.split(lot_split).unwrap().transaction();
    book.split_mut(legs[1]).unwrap().set_value(n("-120"));
    let out = engine.compute_gains(&mut book, legs[1], None).unwrap();
    assert!(matches!(out, GainsOutcome::Updated(ref r) if r.transaction == tx && r.gain == n("20")));
    assert_eq!(gains_txs(&book), 2);
}
