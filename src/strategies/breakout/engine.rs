//! 突破策略执行引擎
//!
//! 单线程循环：风控 → K线 → 行情检查 → 信号 → 开仓或管理持仓 → 等待。
//! 单个周期的错误只记录，不终止循环。

use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::core::broker::BrokerGateway;
use crate::core::config::StrategyConfig;
use crate::core::error::BrokerError;
use crate::core::types::{OrderRequest, PositionSide, Result};
use crate::strategies::breakout::config::SessionConfig;
use crate::strategies::breakout::journal::TradeJournal;
use crate::strategies::breakout::position_manager::{PositionManager, PositionState};
use crate::strategies::breakout::risk_control::DailyTargetGuard;
use crate::strategies::breakout::signal_generator::{
    check_market, IndicatorSnapshot, MarketRejection, MarketSnapshot, SignalGenerator,
};
use crate::strategies::breakout::state::{
    PositionSummary, RunState, RunSummary, SessionState, StopReason, StrategyStatus,
};
use crate::strategies::breakout::stop_manager::{StopManager, StopUpdate};
use crate::utils::indicators::PriceSeries;
use crate::utils::instrument::InstrumentInfo;

pub const STRATEGY_NAME: &str = "breakout";

/// 停止请求句柄，唯一跨线程共享的可变状态
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// 跳过周期的原因
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    InsufficientBars { received: usize, required: usize },
    MarketData(MarketRejection),
}

/// 单个周期的结果
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    TargetReached { profit_percent: f64 },
    Skipped(SkipReason),
    NoSignal,
    Opened { position_id: u64, side: PositionSide },
    EntryRejected { reason: String },
    /// 持仓管理完成，`stop_updates` 为本周期成功修改的止损
    Managed { stop_updates: Vec<StopUpdate> },
    PositionClosed { position_id: u64 },
}

/// 突破策略
pub struct BreakoutStrategy {
    broker: Arc<dyn BrokerGateway>,
    session_config: SessionConfig,
    instrument: InstrumentInfo,
    signals: SignalGenerator,
    stops: StopManager,
    positions: PositionManager,
    guard: DailyTargetGuard,
    journal: TradeJournal,
    session: SessionState,
    run_state: RunState,
    stop_handle: StopHandle,
    cycles: u64,
    faults: u64,
    positions_opened: u64,
    last_error: Option<String>,
    started_at: Instant,
}

impl BreakoutStrategy {
    /// 创建策略并执行启动检查，连接失败时直接返回错误
    pub async fn new(
        broker: Arc<dyn BrokerGateway>,
        config: StrategyConfig,
        session_config: SessionConfig,
        journal: TradeJournal,
    ) -> Result<Self> {
        config.validate()?;
        session_config.validate()?;

        broker.ping().await.map_err(|e| {
            BrokerError::SetupError(format!("无法连接经纪商 {}: {}", broker.name(), e))
        })?;
        let starting_balance = broker
            .account_balance()
            .await
            .map_err(|e| BrokerError::SetupError(format!("无法获取账户余额: {}", e)))?;

        let instrument = session_config.instrument();
        let guard = DailyTargetGuard::new(config.risk.clone(), starting_balance)?;
        let stops = StopManager::new(
            &config,
            instrument.pip_size,
            session_config.initial_stop_pips,
            session_config.take_profit_pips,
        );
        let signals =
            SignalGenerator::new(session_config.fast_ma_period, session_config.slow_ma_period);

        let session = SessionState {
            symbol: session_config.symbol.clone(),
            timeframe: session_config.timeframe,
            volume: session_config.volume,
            starting_balance,
            active: true,
        };

        info!(
            "🚀 {} 策略初始化: {} {} 手数 {} 起始余额 {:.2} (经纪商 {})",
            STRATEGY_NAME,
            session.symbol,
            session.timeframe,
            session.volume,
            starting_balance,
            broker.name()
        );

        Ok(Self {
            broker,
            session_config,
            instrument,
            signals,
            stops,
            positions: PositionManager::new(),
            guard,
            journal,
            session,
            run_state: RunState::Running,
            stop_handle: StopHandle::new(),
            cycles: 0,
            faults: 0,
            positions_opened: 0,
            last_error: None,
            started_at: Instant::now(),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn position_state(&self) -> &PositionState {
        self.positions.state()
    }

    pub fn status(&self) -> StrategyStatus {
        StrategyStatus::new(STRATEGY_NAME, self.session.clone())
            .with_run_state(self.run_state)
            .with_position(self.positions.active().map(PositionSummary::from))
            .with_counters(self.cycles, self.faults)
            .with_trade_counts(self.positions_opened, self.positions.closed_count())
            .with_uptime(self.started_at.elapsed())
            .with_last_error(self.last_error.clone())
    }

    /// 运行主循环，直到达成日内目标或收到停止请求
    pub async fn run(&mut self) -> RunSummary {
        self.run_state = RunState::Running;
        self.journal.info(&format!(
            "▶️ Strategy started on {} ({})",
            self.session.symbol, self.session.timeframe
        ));

        let reason = loop {
            if self.stop_handle.is_stop_requested() {
                break StopReason::OperatorRequest;
            }

            match self.run_cycle().await {
                Ok(CycleOutcome::TargetReached { .. }) => break StopReason::TargetReached,
                Ok(outcome) => debug!("周期 #{} 完成: {:?}", self.cycles, outcome),
                Err(e) => {
                    self.faults += 1;
                    self.last_error = Some(e.to_string());
                    let retry = if e.is_retryable() { "下周期重试" } else { "不可重试" };
                    warn!(
                        "周期 #{} 出错 ({:?}, {}): {}",
                        self.cycles,
                        e.severity(),
                        retry,
                        e
                    );
                    self.journal.error(&format!("❌ Strategy error: {}", e));
                }
            }

            tokio::time::sleep(self.session_config.cycle_delay()).await;
        };

        self.run_state = RunState::Stopping;
        self.session.active = false;
        if reason == StopReason::OperatorRequest {
            self.journal.info("⏹️ Strategy stopped by operator.");
        }

        let final_balance = match self.broker.account_balance().await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!("停止时获取余额失败: {}", e);
                None
            }
        };

        self.run_state = RunState::Stopped;
        info!(
            "🏁 策略已停止: {:?}, 周期 {}, 错误 {}, 开仓 {}, 平仓 {}",
            reason,
            self.cycles,
            self.faults,
            self.positions_opened,
            self.positions.closed_count()
        );

        RunSummary {
            reason,
            cycles: self.cycles,
            faults: self.faults,
            positions_opened: self.positions_opened,
            positions_closed: self.positions.closed_count(),
            final_balance,
        }
    }

    /// 执行单个周期
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        self.cycles += 1;

        // 1. 日内目标
        let balance = self.broker.account_balance().await?;
        let risk = self.guard.check(balance);
        if risk.halt {
            self.session.active = false;
            self.journal
                .info("✅ Daily target reached! Stopping operations.");
            if let Some(managed) = self.positions.active() {
                // 达到目标不平仓，交给止损止盈处理
                info!(
                    "持仓 #{} 保持不变 (SL {:.5} TP {:.5})",
                    managed.position.id, managed.position.stop_loss, managed.position.take_profit
                );
            }
            return Ok(CycleOutcome::TargetReached {
                profit_percent: risk.profit_percent,
            });
        }

        // 2. K线
        let bars = self
            .broker
            .fetch_bars(
                &self.session.symbol,
                self.session.timeframe,
                self.session_config.bar_window,
            )
            .await?;
        if bars.len() < self.session_config.min_bars {
            self.journal.warn("⚠️ Insufficient candles loaded.");
            return Ok(CycleOutcome::Skipped(SkipReason::InsufficientBars {
                received: bars.len(),
                required: self.session_config.min_bars,
            }));
        }
        let series = PriceSeries::from_bars(&bars);

        // 3. 行情检查
        let tick = self.broker.current_tick(&self.session.symbol).await?;
        let price = series.last_close().unwrap_or(0.0);
        let max_spread = self
            .instrument
            .pips_to_price(self.session_config.max_spread_pips);
        let market = match check_market(price, &tick, max_spread) {
            Ok(market) => market,
            Err(rejection) => {
                debug!("行情不可信: {}", rejection);
                self.journal.warn("⚡ High spread or invalid price. Waiting...");
                return Ok(CycleOutcome::Skipped(SkipReason::MarketData(rejection)));
            }
        };

        // 4. 指标
        let snapshot = self.signals.analyze(&series);
        self.journal.info(&self.price_snapshot_line(&market, &snapshot));

        // 5. 开仓或管理
        if self.positions.is_flat() {
            self.evaluate_entry(&series, &snapshot, &market).await
        } else {
            self.manage_position(market.price).await
        }
    }

    fn price_snapshot_line(&self, market: &MarketSnapshot, snapshot: &IndicatorSnapshot) -> String {
        let ma = |value: Option<f64>| match value {
            Some(v) => self.instrument.format_price(v),
            None => "n/a".to_string(),
        };
        let pattern = match snapshot.pattern {
            Some(pattern) => pattern.to_string(),
            None => "none".to_string(),
        };
        format!(
            "🎯 Price: {} | MA{}: {} | MA{}: {} | Pattern: {}",
            self.instrument.format_price(market.price),
            self.session_config.fast_ma_period,
            ma(snapshot.ma_fast),
            self.session_config.slow_ma_period,
            ma(snapshot.ma_slow),
            pattern
        )
    }

    async fn evaluate_entry(
        &mut self,
        series: &PriceSeries,
        snapshot: &IndicatorSnapshot,
        market: &MarketSnapshot,
    ) -> Result<CycleOutcome> {
        let candidates = self.signals.candidates(series, snapshot);
        let signal = match candidates.first() {
            Some(signal) => *signal,
            None => return Ok(CycleOutcome::NoSignal),
        };
        if candidates.len() > 1 {
            debug!("同周期多个信号，只采用第一个: {:?}", candidates);
        }

        info!("📡 入场信号: {} ({})", signal.side, signal.source);
        self.open_position(signal.side, market.price).await
    }

    async fn open_position(&mut self, side: PositionSide, price: f64) -> Result<CycleOutcome> {
        let symbol = self.session.symbol.clone();

        if let Err(e) = self.broker.select_symbol(&symbol).await {
            let reason = format!("symbol selection failed: {}", e);
            self.journal.error("❌ Symbol selection failed");
            return Ok(CycleOutcome::EntryRejected { reason });
        }

        let (stop_loss, take_profit) = self.stops.initial_levels(side, price);
        let request = OrderRequest {
            symbol,
            side,
            volume: self.session.volume,
            price,
            stop_loss,
            take_profit,
        };

        self.positions.begin_open(request.clone())?;
        match self.broker.place_order(request).await {
            Ok(position_id) => {
                self.positions.confirm_open(position_id)?;
                self.positions_opened += 1;
                self.journal.info(&format!(
                    "✅ {} opened at {}",
                    side,
                    self.instrument.format_price(price)
                ));
                Ok(CycleOutcome::Opened { position_id, side })
            }
            Err(e) => {
                self.positions.reject_open();
                match e.rejection_reason() {
                    Some(reason) => {
                        let reason = reason.to_string();
                        self.journal.error(&format!("❌ Order failed: {}", reason));
                        Ok(CycleOutcome::EntryRejected { reason })
                    }
                    None => Err(e),
                }
            }
        }
    }

    async fn manage_position(&mut self, current_price: f64) -> Result<CycleOutcome> {
        let position_id = match self.positions.active() {
            Some(managed) => managed.position.id,
            None => return Ok(CycleOutcome::NoSignal),
        };

        if self.broker.get_position(position_id).await?.is_none() {
            self.positions.mark_closed();
            self.journal
                .info(&format!("ℹ️ Position #{} closed by broker.", position_id));
            return Ok(CycleOutcome::PositionClosed { position_id });
        }

        let mut stop_updates = Vec::new();

        let break_even = self
            .positions
            .active()
            .and_then(|managed| self.stops.break_even_update(&managed.position, current_price));
        if let Some(update) = break_even {
            if self.apply_stop(position_id, update).await {
                stop_updates.push(update);
            }
        }

        // 保本成功后用更新后的止损评估追踪
        let trailing = self
            .positions
            .active()
            .and_then(|managed| self.stops.trailing_update(&managed.position, current_price));
        if let Some(update) = trailing {
            if self.apply_stop(position_id, update).await {
                stop_updates.push(update);
            }
        }

        Ok(CycleOutcome::Managed { stop_updates })
    }

    /// 向经纪商提交止损修改，成功后才更新内存状态
    async fn apply_stop(&mut self, position_id: u64, update: StopUpdate) -> bool {
        let side = match self.positions.active() {
            Some(managed) => managed.position.side,
            None => return false,
        };

        if let Err(e) = self
            .broker
            .modify_stop_loss(position_id, update.price())
            .await
        {
            let reason = e
                .rejection_reason()
                .map(str::to_string)
                .unwrap_or_else(|| e.to_string());
            self.journal
                .error(&format!("❌ Stop loss modification failed: {}", reason));
            self.last_error = Some(e.to_string());
            return false;
        }

        if !self.positions.apply_stop_update(update) {
            return false;
        }

        let notice = match update {
            StopUpdate::BreakEven(_) => format!("🔒 Break Even activated for {}!", side),
            StopUpdate::Trailing(_) => format!("🏹 Trailing Stop adjusted for {}!", side),
        };
        self.journal.info(&notice);
        true
    }
}
