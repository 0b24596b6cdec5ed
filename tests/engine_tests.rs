//! 执行循环集成测试

mod support;

use breakoutcta::core::config::StrategyConfig;
use breakoutcta::core::error::BrokerError;
use breakoutcta::core::types::{PositionSide, Timeframe};
use breakoutcta::strategies::breakout::signal_generator::MarketRejection;
use breakoutcta::strategies::breakout::{
    BreakoutStrategy, CycleOutcome, MemorySink, PositionState, RunState, SessionConfig,
    SkipReason, StopReason, StopUpdate, TradeJournal,
};
use std::sync::Arc;
use std::time::Duration;
use support::{
    bars_from_closes, buy_setup_bars, flat_bars, sell_setup_bars, ScriptedBroker, START_BALANCE,
};

const EPS: f64 = 1e-9;

fn session() -> SessionConfig {
    SessionConfig::new("EURUSD", Timeframe::M5, 0.1).with_cycle_delay(Duration::from_millis(1))
}

async fn strategy(broker: &Arc<ScriptedBroker>) -> (BreakoutStrategy, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new(500));
    let journal = TradeJournal::new("EURUSD", sink.clone());
    let strategy = BreakoutStrategy::new(
        broker.clone(),
        StrategyConfig::default(),
        session(),
        journal,
    )
    .await
    .unwrap();
    (strategy, sink)
}

async fn open_long(broker: &Arc<ScriptedBroker>, strategy: &mut BreakoutStrategy) -> u64 {
    broker.set_bars(buy_setup_bars());
    match strategy.run_cycle().await.unwrap() {
        CycleOutcome::Opened { position_id, side } => {
            assert_eq!(side, PositionSide::Long);
            position_id
        }
        other => panic!("expected long entry, got {:?}", other),
    }
}

fn stop_updates(outcome: CycleOutcome) -> Vec<StopUpdate> {
    match outcome {
        CycleOutcome::Managed { stop_updates } => stop_updates,
        other => panic!("expected managed position, got {:?}", other),
    }
}

#[tokio::test]
async fn test_opens_long_on_moving_average_cross() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, sink) = strategy(&broker).await;

    let id = open_long(&broker, &mut strategy).await;
    assert_eq!(id, 1);

    let orders = broker.orders();
    assert_eq!(orders.len(), 1);
    assert!((orders[0].price - 1.2000).abs() < EPS);
    assert!((orders[0].stop_loss - 1.1950).abs() < EPS);
    assert!((orders[0].take_profit - 1.2100).abs() < EPS);

    assert!(sink.contains("🎯 Price: 1.20000 | MA20: "));
    assert!(sink.contains("✅ Buy opened at 1.20000"));
    assert_eq!(strategy.position_state().label(), "open");
}

#[tokio::test]
async fn test_opens_short_on_moving_average_cross() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, sink) = strategy(&broker).await;

    broker.set_bars(sell_setup_bars());
    let outcome = strategy.run_cycle().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Opened {
            position_id: 1,
            side: PositionSide::Short
        }
    );
    let orders = broker.orders();
    assert!((orders[0].stop_loss - 1.2050).abs() < EPS);
    assert!((orders[0].take_profit - 1.1900).abs() < EPS);
    assert!(sink.contains("✅ Sell opened at 1.20000"));
}

#[tokio::test]
async fn test_head_and_shoulders_opens_short() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, sink) = strategy(&broker).await;

    let mut bars = flat_bars(60, 1.2000);
    bars[53].high = 1.2010;
    bars[55].high = 1.2030;
    bars[57].high = 1.2012;
    broker.set_bars(bars);

    let outcome = strategy.run_cycle().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Opened {
            position_id: 1,
            side: PositionSide::Short
        }
    );
    assert!(sink.contains("Pattern: head_and_shoulders"));
}

#[tokio::test]
async fn test_no_signal_on_flat_market() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, sink) = strategy(&broker).await;

    assert_eq!(strategy.run_cycle().await.unwrap(), CycleOutcome::NoSignal);
    assert!(broker.orders().is_empty());
    assert!(sink.contains("Pattern: none"));
}

#[tokio::test]
async fn test_single_position_while_open() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, _sink) = strategy(&broker).await;

    open_long(&broker, &mut strategy).await;
    // 信号仍然成立，但已有持仓
    for _ in 0..3 {
        let outcome = strategy.run_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Managed { .. }));
    }
    assert_eq!(broker.orders().len(), 1);
    assert_eq!(broker.max_open_positions(), 1);
}

#[tokio::test]
async fn test_break_even_through_loop() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, sink) = strategy(&broker).await;
    let id = open_long(&broker, &mut strategy).await;

    broker.set_bars(flat_bars(60, 1.2014));
    assert!(stop_updates(strategy.run_cycle().await.unwrap()).is_empty());

    broker.set_bars(flat_bars(60, 1.2016));
    let updates = stop_updates(strategy.run_cycle().await.unwrap());
    assert_eq!(updates.len(), 1);
    assert!(matches!(updates[0], StopUpdate::BreakEven(_)));
    assert!((updates[0].price() - 1.2002).abs() < EPS);
    assert_eq!(broker.modifications().len(), 1);
    assert_eq!(broker.modifications()[0].0, id);
    assert!(sink.contains("🔒 Break Even activated for Buy!"));

    // 不重复触发
    assert!(stop_updates(strategy.run_cycle().await.unwrap()).is_empty());
    assert_eq!(broker.modifications().len(), 1);

    let summary = strategy.status().position.unwrap();
    assert!(summary.break_even_applied);
    assert!(!summary.trailing_active);
    assert!((summary.stop_loss - 1.2002).abs() < EPS);
}

#[tokio::test]
async fn test_trailing_stop_through_loop() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, sink) = strategy(&broker).await;
    open_long(&broker, &mut strategy).await;

    broker.set_bars(flat_bars(60, 1.2030));
    let updates = stop_updates(strategy.run_cycle().await.unwrap());
    assert_eq!(updates.len(), 2);
    assert!(matches!(updates[0], StopUpdate::BreakEven(_)));
    assert!(matches!(updates[1], StopUpdate::Trailing(_)));
    assert!((updates[1].price() - 1.2020).abs() < EPS);
    assert!(sink.contains("🏹 Trailing Stop adjusted for Buy!"));

    // 回落：止损不放松
    broker.set_bars(flat_bars(60, 1.2025));
    assert!(stop_updates(strategy.run_cycle().await.unwrap()).is_empty());

    broker.set_bars(flat_bars(60, 1.2040));
    let updates = stop_updates(strategy.run_cycle().await.unwrap());
    assert_eq!(updates.len(), 1);
    assert!((updates[0].price() - 1.2030).abs() < EPS);

    let summary = strategy.status().position.unwrap();
    assert!(summary.break_even_applied && summary.trailing_active);
    assert!((summary.stop_loss - 1.2030).abs() < EPS);
}

#[tokio::test]
async fn test_rejected_modification_keeps_stop() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, sink) = strategy(&broker).await;
    open_long(&broker, &mut strategy).await;

    broker.reject_next_modifies(1);
    broker.set_bars(flat_bars(60, 1.2016));
    assert!(stop_updates(strategy.run_cycle().await.unwrap()).is_empty());
    assert!(sink.contains("❌ Stop loss modification failed: Requote"));
    let summary = strategy.status().position.unwrap();
    assert!((summary.stop_loss - 1.1950).abs() < EPS);
    assert!(!summary.break_even_applied);

    // 下一周期自然重试
    let updates = stop_updates(strategy.run_cycle().await.unwrap());
    assert_eq!(updates.len(), 1);
    assert!(strategy.status().position.unwrap().break_even_applied);
}

#[tokio::test]
async fn test_rejected_order_returns_to_flat() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, sink) = strategy(&broker).await;

    broker.reject_next_order("No money");
    broker.set_bars(buy_setup_bars());
    let outcome = strategy.run_cycle().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::EntryRejected {
            reason: "No money".to_string()
        }
    );
    assert_eq!(strategy.position_state(), &PositionState::Flat);
    assert!(broker.open_positions().is_empty());
    assert!(sink.contains("❌ Order failed: No money"));

    // 信号仍然成立时下一周期重试
    assert!(matches!(
        strategy.run_cycle().await.unwrap(),
        CycleOutcome::Opened { .. }
    ));
}

#[tokio::test]
async fn test_symbol_selection_failure_rejects_entry() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, sink) = strategy(&broker).await;

    broker.fail_select_symbol();
    broker.set_bars(buy_setup_bars());
    match strategy.run_cycle().await.unwrap() {
        CycleOutcome::EntryRejected { reason } => {
            assert!(reason.contains("symbol selection failed"), "{}", reason)
        }
        other => panic!("expected rejected entry, got {:?}", other),
    }
    assert_eq!(strategy.position_state(), &PositionState::Flat);
    assert!(broker.open_positions().is_empty());
    assert!(broker.orders().is_empty());
    assert!(sink.contains("❌ Symbol selection failed"));
    assert_eq!(strategy.status().faults, 0);

    assert!(matches!(
        strategy.run_cycle().await.unwrap(),
        CycleOutcome::Opened { .. }
    ));
    assert_eq!(broker.open_positions().len(), 1);
}

#[tokio::test]
async fn test_connection_loss_while_ordering_returns_to_flat() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, sink) = strategy(&broker).await;

    broker.fail_next_order_with(BrokerError::ConnectionError("link down".to_string()));
    broker.set_bars(buy_setup_bars());
    let result = strategy.run_cycle().await;
    assert!(matches!(result, Err(BrokerError::ConnectionError(_))));
    assert_eq!(strategy.position_state(), &PositionState::Flat);
    assert!(broker.open_positions().is_empty());
    assert!(!sink.contains("❌ Order failed"));

    // 故障不残留开仓中状态，下一周期正常开仓
    assert!(matches!(
        strategy.run_cycle().await.unwrap(),
        CycleOutcome::Opened { .. }
    ));
    assert_eq!(broker.open_positions().len(), 1);
}

#[tokio::test]
async fn test_insufficient_bars_skips_cycle() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, sink) = strategy(&broker).await;

    broker.set_bars(flat_bars(30, 1.2000));
    let outcome = strategy.run_cycle().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Skipped(SkipReason::InsufficientBars {
            received: 30,
            required: 50
        })
    );
    assert!(sink.contains("⚠️ Insufficient candles loaded."));
}

#[tokio::test]
async fn test_wide_spread_suppresses_signals() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, sink) = strategy(&broker).await;

    broker.set_bars(buy_setup_bars());
    broker.set_tick(1.2000, 1.2030);
    let outcome = strategy.run_cycle().await.unwrap();
    assert!(matches!(
        outcome,
        CycleOutcome::Skipped(SkipReason::MarketData(MarketRejection::SpreadTooWide { .. }))
    ));
    assert!(broker.orders().is_empty());
    assert!(sink.contains("⚡ High spread or invalid price. Waiting..."));
}

#[tokio::test]
async fn test_zero_price_suppresses_signals() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, _sink) = strategy(&broker).await;

    let mut closes = vec![1.2000; 59];
    closes.push(0.0);
    broker.set_bars(bars_from_closes(&closes));
    broker.set_tick(1.2000, 1.2001);
    let outcome = strategy.run_cycle().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Skipped(SkipReason::MarketData(MarketRejection::InvalidPrice(0.0)))
    );
}

#[tokio::test]
async fn test_closed_position_allows_new_entry() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, _sink) = strategy(&broker).await;
    let id = open_long(&broker, &mut strategy).await;

    broker.close_all();
    assert_eq!(
        strategy.run_cycle().await.unwrap(),
        CycleOutcome::PositionClosed { position_id: id }
    );
    assert_eq!(strategy.position_state().label(), "closed");
    let status = strategy.status();
    assert_eq!((status.positions_opened, status.positions_closed), (1, 1));

    let second = open_long(&broker, &mut strategy).await;
    assert_ne!(second, id);
    assert_eq!(broker.max_open_positions(), 1);
    let status = strategy.status();
    assert_eq!((status.positions_opened, status.positions_closed), (2, 1));
}

#[tokio::test]
async fn test_target_reached_leaves_position_open() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, sink) = strategy(&broker).await;
    open_long(&broker, &mut strategy).await;

    broker.set_balance(10_305.0);
    match strategy.run_cycle().await.unwrap() {
        CycleOutcome::TargetReached { profit_percent } => {
            assert!((profit_percent - 3.05).abs() < 1e-9)
        }
        other => panic!("expected target, got {:?}", other),
    }
    assert_eq!(broker.open_positions().len(), 1);
    assert_eq!(strategy.position_state().label(), "open");
    assert!(!strategy.session().active);
    assert!(sink.contains("✅ Daily target reached! Stopping operations."));
}

#[tokio::test]
async fn test_below_target_keeps_trading() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, _sink) = strategy(&broker).await;

    broker.set_balance(10_299.0);
    assert_eq!(strategy.run_cycle().await.unwrap(), CycleOutcome::NoSignal);
    assert!(strategy.session().active);
}

#[tokio::test]
async fn test_loop_survives_injected_fault() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, sink) = strategy(&broker).await;

    broker.fail_next_fetches(1);
    broker.reach_target_after_fetches(3, START_BALANCE * 1.04);

    let summary = strategy.run().await;
    assert_eq!(summary.reason, StopReason::TargetReached);
    assert_eq!(summary.faults, 1);
    assert_eq!(summary.cycles, 4);
    assert_eq!(summary.positions_closed, 0);
    assert_eq!(broker.fetch_calls(), 3);

    let status = strategy.status();
    assert_eq!(status.run_state, RunState::Stopped);
    assert!(status.last_error.unwrap().contains("connection reset"));
    assert!(sink.contains("❌ Strategy error"));
}

#[tokio::test]
async fn test_operator_stop_ends_loop() {
    let broker = Arc::new(ScriptedBroker::new());
    let (mut strategy, _sink) = strategy(&broker).await;

    let handle = strategy.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.request_stop();
    });

    let summary = strategy.run().await;
    assert_eq!(summary.reason, StopReason::OperatorRequest);
    assert!(summary.cycles > 0);
    assert_eq!(summary.final_balance, Some(START_BALANCE));
    assert_eq!(strategy.status().run_state, RunState::Stopped);
    assert!(!strategy.session().active);
}

#[tokio::test]
async fn test_unreachable_broker_fails_setup() {
    let broker = Arc::new(ScriptedBroker::new());
    broker.fail_ping();

    let result = BreakoutStrategy::new(
        broker.clone(),
        StrategyConfig::default(),
        session(),
        TradeJournal::silent("EURUSD"),
    )
    .await;
    assert!(matches!(result, Err(BrokerError::SetupError(_))));
    assert_eq!(broker.fetch_calls(), 0);
}
