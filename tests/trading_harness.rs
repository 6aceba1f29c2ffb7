//! End-to-end decision loop tests
//!
//! Drives single iterations of the trade runner synchronously against
//! scripted collaborators: ledger tail -> direction inference -> quote
//! -> condition -> execute/hold -> ledger append.


use std::time::Duration;

use mock_broker::{amount, past_tx, MemoryLedger, MockBroker};
use rust_decimal::Decimal;
use swingbot::runner::{CycleError, CycleOutcome, TradeRunner, TradeSettings};
use swingbot::{BrokerError, LedgerError, LedgerStore};

/// 5% margin over USD, one-minute polling
fn settings(simulate: bool, force_exchange: bool) -> TradeSettings {
    TradeSettings {
        main_currency: "USD".parse().unwrap(),
        percent_margin: Decimal::from(5),
        simulate,
        force_exchange,
        repeat_every: Duration::from_secs(60),
    }
}

/// Ledger whose last record bought 0.002 BTC for 100 USD, so the next
/// intent is Sell with a 105 USD target
fn ledger_after_buying() -> MemoryLedger {
    MemoryLedger::with_seed(vec![past_tx(
        amount("100", "USD"),
        amount("0.002", "BTC"),
    )])
}

/// Ledger whose last record sold 0.002 BTC for 100 USD, so the next
/// intent is Buy with a 95 USD target
fn ledger_after_selling() -> MemoryLedger {
    MemoryLedger::with_seed(vec![past_tx(
        amount("0.002", "BTC"),
        amount("100", "USD"),
    )])
}

#[tokio::test]
async fn test_simulated_sell_appends_synthetic_trade_without_exchange() {
    // Valuation quote 110 beats the 105 target; the second script entry
    // answers the synthetic conversion of the commodity into USD
    let broker = MockBroker::new().with_quote("110").with_quote("110.2");
    let ledger = ledger_after_buying();
    let mut runner = TradeRunner::new(broker.clone(), ledger.clone(), settings(true, false));

    let outcome = runner.run_cycle().await.unwrap();

    let recorded = match outcome {
        CycleOutcome::Traded(tx) => tx,
        other => panic!("expected a trade, got {other:?}"),
    };
    assert_eq!(recorded.from_amount, amount("0.002", "BTC"));
    assert_eq!(recorded.to_amount, amount("110.2", "USD"));

    // The synthetic trade was persisted but the exchange endpoint was
    // never touched
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.last().unwrap(), recorded);
    assert_eq!(broker.exchange_call_count(), 0);
    assert_eq!(broker.quote_call_count(), 2);
}

#[tokio::test]
async fn test_sell_holds_below_target() {
    let broker = MockBroker::new().with_quote("100");
    let ledger = ledger_after_buying();
    let mut runner = TradeRunner::new(broker.clone(), ledger.clone(), settings(true, false));

    let outcome = runner.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::Held);
    assert_eq!(ledger.len(), 1);
    assert_eq!(broker.quote_call_count(), 1);
    assert_eq!(broker.exchange_call_count(), 0);
}

#[tokio::test]
async fn test_buy_fires_only_below_reduced_target() {
    // After a sale the margin is negated: target is 95 USD, so a 94
    // quote buys back and a 96 quote holds
    let broker = MockBroker::new().with_quote("94").with_quote("0.00213");
    let ledger = ledger_after_selling();
    let mut runner = TradeRunner::new(broker.clone(), ledger.clone(), settings(true, false));

    let outcome = runner.run_cycle().await.unwrap();
    let recorded = match outcome {
        CycleOutcome::Traded(tx) => tx,
        other => panic!("expected a trade, got {other:?}"),
    };
    // Buying back spends the proceeds of the last sale
    assert_eq!(recorded.from_amount, amount("100", "USD"));
    assert_eq!(recorded.to_amount, amount("0.00213", "BTC"));

    let broker = MockBroker::new().with_quote("96");
    let ledger = ledger_after_selling();
    let mut runner = TradeRunner::new(broker.clone(), ledger.clone(), settings(true, false));
    assert_eq!(runner.run_cycle().await.unwrap(), CycleOutcome::Held);
    assert_eq!(ledger.len(), 1);
}

#[tokio::test]
async fn test_live_sell_goes_through_the_exchange() {
    let broker = MockBroker::new().with_quote("110").with_quote("110.2");
    let ledger = ledger_after_buying();
    let mut runner = TradeRunner::new(broker.clone(), ledger.clone(), settings(false, false));

    let outcome = runner.run_cycle().await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Traded(_)));
    assert_eq!(broker.exchange_call_count(), 1);
    // The exchange gave up the commodity for the main currency
    let calls = broker.exchange_calls();
    assert_eq!(calls[0].0, amount("0.002", "BTC"));
    assert_eq!(calls[0].1.code(), "USD");
    assert_eq!(ledger.len(), 2);
}

#[tokio::test]
async fn test_force_exchange_fires_despite_condition() {
    // 100 is below the 105 sell target, but force overrides
    let broker = MockBroker::new().with_quote("100").with_quote("100.1");
    let ledger = ledger_after_buying();
    let mut runner = TradeRunner::new(broker.clone(), ledger.clone(), settings(true, true));

    let outcome = runner.run_cycle().await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Traded(_)));
    assert_eq!(ledger.len(), 2);
    // Still simulated: forcing does not bypass simulation mode
    assert_eq!(broker.exchange_call_count(), 0);
}

#[tokio::test]
async fn test_empty_ledger_is_fatal_before_any_network_call() {
    let broker = MockBroker::new().with_quote("110");
    let ledger = MemoryLedger::new();
    let mut runner = TradeRunner::new(broker.clone(), ledger, settings(false, false));

    let err = runner.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::Ledger(LedgerError::Empty)));
    assert!(err.is_fatal());
    assert_eq!(broker.quote_call_count(), 0);
    assert_eq!(broker.exchange_call_count(), 0);
}

#[tokio::test]
async fn test_ambiguous_ledger_tail_is_fatal() {
    let broker = MockBroker::new();
    let ledger = MemoryLedger::with_seed(vec![past_tx(
        amount("100", "USD"),
        amount("100", "USD"),
    )]);
    let mut runner = TradeRunner::new(broker.clone(), ledger, settings(false, false));

    let err = runner.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::Intent(_)));
    assert!(err.is_fatal());
    assert_eq!(broker.quote_call_count(), 0);
}

#[tokio::test]
async fn test_quote_failure_is_transient_and_leaves_ledger_untouched() {
    let broker = MockBroker::new().with_quote_failure();
    let ledger = ledger_after_buying();
    let mut runner = TradeRunner::new(broker.clone(), ledger.clone(), settings(false, false));

    let err = runner.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::Quote(_)));
    assert!(!err.is_fatal());
    assert_eq!(ledger.len(), 1);
    assert_eq!(broker.exchange_call_count(), 0);
}

#[tokio::test]
async fn test_exchange_failure_records_nothing() {
    let broker = MockBroker::new()
        .with_quote("110")
        .with_exchange_failure(|| BrokerError::RateChanged("rate moved".to_string()));
    let ledger = ledger_after_buying();
    let mut runner = TradeRunner::new(broker.clone(), ledger.clone(), settings(false, false));

    let err = runner.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::Exchange(_)));
    assert!(!err.is_fatal());
    // Only a confirmed exchange result may be appended
    assert_eq!(ledger.len(), 1);
    assert_eq!(broker.exchange_call_count(), 1);
}

#[tokio::test]
async fn test_consecutive_cycles_alternate_direction_in_simulation() {
    // Sell at 110, then the synthetic record flips the position and the
    // next cycle looks to buy back below the reduced target
    let broker = MockBroker::new()
        .with_quote("110") // sell valuation: fires (> 105)
        .with_quote("110.2") // synthetic conversion to USD
        .with_quote("104") // buy valuation: fires (< 110.2 - 5% = 104.69)
        .with_quote("0.0021"); // synthetic conversion back to BTC
    let ledger = ledger_after_buying();
    let mut runner = TradeRunner::new(broker.clone(), ledger.clone(), settings(true, false));

    let first = runner.run_cycle().await.unwrap();
    let second = runner.run_cycle().await.unwrap();

    assert!(matches!(first, CycleOutcome::Traded(_)));
    assert!(matches!(second, CycleOutcome::Traded(_)));
    assert_eq!(ledger.len(), 3);

    let history = ledger.transactions();
    assert_eq!(history[1].from_amount.currency.code(), "BTC");
    assert_eq!(history[1].to_amount.currency.code(), "USD");
    assert_eq!(history[2].from_amount, amount("110.2", "USD"));
    assert_eq!(history[2].to_amount, amount("0.0021", "BTC"));
    assert_eq!(broker.exchange_call_count(), 0);
}
