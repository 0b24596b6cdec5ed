//! 模拟经纪商
//!
//! 随机游走行情、固定点差、止损止盈触发结算。可设置种子以复现，
//! 并支持注入订单拒绝、止损修改拒绝和断线。

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use crate::core::broker::BrokerGateway;
use crate::core::error::BrokerError;
use crate::core::types::{Bar, OrderRequest, Position, PositionSide, Result, Tick, Timeframe};
use crate::safe_lock;

/// 模拟经纪商配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperBrokerConfig {
    pub base_price: f64,
    pub balance: f64,
    pub spread_pips: f64,
    /// 每根K线的最大随机波动（点）
    pub volatility_pips: f64,
    /// 每手合约数量
    pub contract_size: f64,
    pub pip_size: f64,
    pub seed: Option<u64>,
    /// 保留的K线数量
    pub history: usize,
    /// 每次拉取K线时推进一根新K线
    pub advance_on_fetch: bool,
    pub symbols: Vec<String>,
}

impl Default for PaperBrokerConfig {
    fn default() -> Self {
        Self {
            base_price: 1.2000,
            balance: 10_000.0,
            spread_pips: 1.0,
            volatility_pips: 5.0,
            contract_size: 100_000.0,
            pip_size: 0.0001,
            seed: None,
            history: 200,
            advance_on_fetch: true,
            symbols: vec![
                "EURUSD".to_string(),
                "GBPUSD".to_string(),
                "USDJPY".to_string(),
            ],
        }
    }
}

#[derive(Debug)]
struct PaperState {
    rng: StdRng,
    price: f64,
    bars: VecDeque<Bar>,
    balance: f64,
    positions: BTreeMap<u64, Position>,
    next_id: u64,
    reject_next_order: Option<String>,
    reject_next_modify: Option<String>,
    connected: bool,
}

/// 模拟经纪商
#[derive(Debug)]
pub struct PaperBroker {
    config: PaperBrokerConfig,
    state: Mutex<PaperState>,
}

impl Default for PaperBroker {
    fn default() -> Self {
        Self::new(PaperBrokerConfig::default())
    }
}

impl PaperBroker {
    pub fn new(config: PaperBrokerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut state = PaperState {
            rng,
            price: config.base_price,
            bars: VecDeque::with_capacity(config.history),
            balance: config.balance,
            positions: BTreeMap::new(),
            next_id: 1000,
            reject_next_order: None,
            reject_next_modify: None,
            connected: true,
        };

        for _ in 0..config.history {
            let bar = next_bar(&config, &mut state);
            state.bars.push_back(bar);
        }

        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// 设置当前价格（生成一根平K线并结算持仓）
    pub fn set_price(&self, price: f64) -> Result<()> {
        let mut state = safe_lock!(self.state)?;
        let bar = Bar {
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
            timestamp: Utc::now(),
        };
        state.price = price;
        self.push_bar(&mut state, bar);
        Ok(())
    }

    /// 下一笔订单被拒绝
    pub fn inject_order_rejection(&self, reason: &str) -> Result<()> {
        safe_lock!(self.state)?.reject_next_order = Some(reason.to_string());
        Ok(())
    }

    /// 下一次止损修改被拒绝
    pub fn inject_modify_rejection(&self, reason: &str) -> Result<()> {
        safe_lock!(self.state)?.reject_next_modify = Some(reason.to_string());
        Ok(())
    }

    pub fn disconnect(&self) -> Result<()> {
        safe_lock!(self.state)?.connected = false;
        Ok(())
    }

    pub fn reconnect(&self) -> Result<()> {
        safe_lock!(self.state)?.connected = true;
        Ok(())
    }

    pub fn open_positions(&self) -> Result<Vec<Position>> {
        Ok(safe_lock!(self.state)?.positions.values().cloned().collect())
    }

    pub fn current_price(&self) -> Result<f64> {
        Ok(safe_lock!(self.state)?.price)
    }

    fn push_bar(&self, state: &mut PaperState, bar: Bar) {
        self.settle(state, &bar);
        state.bars.push_back(bar);
        while state.bars.len() > self.config.history.max(1) {
            state.bars.pop_front();
        }
    }

    /// 用K线高低点检查止损止盈，先判断止损
    fn settle(&self, state: &mut PaperState, bar: &Bar) {
        let hits: Vec<(u64, f64)> = state
            .positions
            .values()
            .filter_map(|position| {
                let (stop_hit, target_hit) = match position.side {
                    PositionSide::Long => {
                        (bar.low <= position.stop_loss, bar.high >= position.take_profit)
                    }
                    PositionSide::Short => {
                        (bar.high >= position.stop_loss, bar.low <= position.take_profit)
                    }
                };
                if stop_hit {
                    Some((position.id, position.stop_loss))
                } else if target_hit {
                    Some((position.id, position.take_profit))
                } else {
                    None
                }
            })
            .collect();

        for (id, exit_price) in hits {
            if let Some(position) = state.positions.remove(&id) {
                self.realise(state, &position, exit_price);
            }
        }
    }

    fn realise(&self, state: &mut PaperState, position: &Position, exit_price: f64) {
        let pnl = position.side.favorable_move(position.entry_price, exit_price)
            * position.volume
            * self.config.contract_size;
        state.balance += pnl;
        info!(
            "📕 模拟平仓 #{} {} @ {:.5} 盈亏 {:.2} 余额 {:.2}",
            position.id, position.side, exit_price, pnl, state.balance
        );
    }

    fn ensure_connected(state: &PaperState) -> Result<()> {
        if state.connected {
            Ok(())
        } else {
            Err(BrokerError::ConnectionError("模拟经纪商已断开".to_string()))
        }
    }

    fn validate_stops(side: PositionSide, price: f64, stop_loss: f64) -> bool {
        match side {
            PositionSide::Long => stop_loss < price,
            PositionSide::Short => stop_loss > price,
        }
    }
}

fn next_bar(config: &PaperBrokerConfig, state: &mut PaperState) -> Bar {
    let volatility = config.volatility_pips.max(0.0) * config.pip_size;
    let open = state.price;
    let mut close = open + state.rng.gen_range(-volatility..=volatility);
    if close <= config.pip_size {
        close = config.pip_size;
    }
    let wick = volatility / 2.0;
    let high = open.max(close) + state.rng.gen_range(0.0..=wick);
    let low = (open.min(close) - state.rng.gen_range(0.0..=wick)).max(config.pip_size / 2.0);
    state.price = close;

    Bar {
        open,
        high,
        low,
        close,
        volume: state.rng.gen_range(100.0..=1000.0_f64).round(),
        timestamp: Utc::now(),
    }
}

#[async_trait]
impl BrokerGateway for PaperBroker {
    fn name(&self) -> &str {
        "paper"
    }

    async fn ping(&self) -> Result<()> {
        let state = safe_lock!(self.state)?;
        Self::ensure_connected(&state)
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>> {
        let mut state = safe_lock!(self.state)?;
        Self::ensure_connected(&state)?;

        if self.config.advance_on_fetch {
            let bar = next_bar(&self.config, &mut state);
            self.push_bar(&mut state, bar);
        }

        let skip = state.bars.len().saturating_sub(count);
        let now = Utc::now();
        let step = timeframe.minutes() as i64;
        let total = state.bars.len() - skip;
        let bars: Vec<Bar> = state
            .bars
            .iter()
            .skip(skip)
            .enumerate()
            .map(|(i, bar)| Bar {
                timestamp: now - ChronoDuration::minutes(step * (total - 1 - i) as i64),
                ..bar.clone()
            })
            .collect();

        debug!("模拟K线: {} {} x{}", symbol, timeframe, bars.len());
        Ok(bars)
    }

    async fn current_tick(&self, _symbol: &str) -> Result<Tick> {
        let state = safe_lock!(self.state)?;
        Self::ensure_connected(&state)?;
        Ok(Tick {
            bid: state.price,
            ask: state.price + self.config.spread_pips * self.config.pip_size,
            timestamp: Utc::now(),
        })
    }

    async fn account_balance(&self) -> Result<f64> {
        let state = safe_lock!(self.state)?;
        Self::ensure_connected(&state)?;
        Ok(state.balance)
    }

    async fn select_symbol(&self, symbol: &str) -> Result<()> {
        let state = safe_lock!(self.state)?;
        Self::ensure_connected(&state)?;
        if self
            .config
            .symbols
            .iter()
            .any(|known| known.eq_ignore_ascii_case(symbol))
        {
            Ok(())
        } else {
            Err(BrokerError::SymbolUnavailable(symbol.to_string()))
        }
    }

    async fn place_order(&self, request: OrderRequest) -> Result<u64> {
        let mut state = safe_lock!(self.state)?;
        Self::ensure_connected(&state)?;

        if let Some(reason) = state.reject_next_order.take() {
            warn!("模拟订单被拒绝: {}", reason);
            return Err(BrokerError::OrderRejected { reason });
        }

        if !request.volume.is_finite() || request.volume <= 0.0 {
            return Err(BrokerError::OrderRejected {
                reason: "Invalid volume".to_string(),
            });
        }

        let target_ok = match request.side {
            PositionSide::Long => request.take_profit > request.price,
            PositionSide::Short => request.take_profit < request.price,
        };
        if !Self::validate_stops(request.side, request.price, request.stop_loss) || !target_ok {
            return Err(BrokerError::OrderRejected {
                reason: "Invalid stops".to_string(),
            });
        }

        let id = state.next_id;
        state.next_id += 1;
        let position = Position {
            id,
            symbol: request.symbol,
            side: request.side,
            entry_price: request.price,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            volume: request.volume,
        };
        info!(
            "📗 模拟开仓 #{} {} {} @ {:.5}",
            id, position.side, position.symbol, position.entry_price
        );
        state.positions.insert(id, position);
        Ok(id)
    }

    async fn modify_stop_loss(&self, position_id: u64, new_stop_loss: f64) -> Result<()> {
        let mut state = safe_lock!(self.state)?;
        Self::ensure_connected(&state)?;

        if let Some(reason) = state.reject_next_modify.take() {
            return Err(BrokerError::ModifyRejected {
                position_id,
                reason,
            });
        }

        let price = state.price;
        let position = state
            .positions
            .get_mut(&position_id)
            .ok_or_else(|| BrokerError::ModifyRejected {
                position_id,
                reason: "Position not found".to_string(),
            })?;

        if !Self::validate_stops(position.side, price, new_stop_loss) {
            return Err(BrokerError::ModifyRejected {
                position_id,
                reason: "Invalid stops".to_string(),
            });
        }

        position.stop_loss = new_stop_loss;
        Ok(())
    }

    async fn get_position(&self, position_id: u64) -> Result<Option<Position>> {
        let state = safe_lock!(self.state)?;
        Self::ensure_connected(&state)?;
        Ok(state.positions.get(&position_id).cloned())
    }
}
