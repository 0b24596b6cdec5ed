//! 测试用脚本化经纪商
#![allow(dead_code)]

use async_trait::async_trait;
use breakoutcta::core::broker::BrokerGateway;
use breakoutcta::core::error::BrokerError;
use breakoutcta::core::types::{Bar, OrderRequest, Position, Result, Tick, Timeframe};
use chrono::{Duration, TimeZone, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

pub const START_BALANCE: f64 = 10_000.0;

#[derive(Debug, Default)]
struct Script {
    balance: f64,
    /// fetch 调用次数达到该值后余额变为 `target_balance`
    target_after_fetches: Option<(usize, f64)>,
    bars: Vec<Bar>,
    tick: Option<Tick>,
    failing_fetches: usize,
    ping_fails: bool,
    rejected_orders: VecDeque<String>,
    failing_orders: VecDeque<BrokerError>,
    failing_selections: usize,
    rejected_modifies: usize,
    positions: BTreeMap<u64, Position>,
    next_id: u64,
    fetch_calls: usize,
    orders: Vec<OrderRequest>,
    modifications: Vec<(u64, f64)>,
    max_open_positions: usize,
}

/// 可编程的假经纪商
#[derive(Debug)]
pub struct ScriptedBroker {
    script: Mutex<Script>,
}

impl ScriptedBroker {
    pub fn new() -> Self {
        let broker = Self {
            script: Mutex::new(Script {
                balance: START_BALANCE,
                next_id: 1,
                ..Script::default()
            }),
        };
        broker.set_bars(flat_bars(60, 1.2000));
        broker
    }

    /// 设置K线窗口，报价跟随最后收盘价（1点点差）
    pub fn set_bars(&self, bars: Vec<Bar>) {
        let mut script = self.script.lock().unwrap();
        let last = bars.last().map(|bar| bar.close).unwrap_or(1.2);
        script.tick = Some(tick(last, last + 0.0001));
        script.bars = bars;
    }

    pub fn set_tick(&self, bid: f64, ask: f64) {
        self.script.lock().unwrap().tick = Some(tick(bid, ask));
    }

    pub fn set_balance(&self, balance: f64) {
        self.script.lock().unwrap().balance = balance;
    }

    pub fn reach_target_after_fetches(&self, fetches: usize, balance: f64) {
        self.script.lock().unwrap().target_after_fetches = Some((fetches, balance));
    }

    pub fn fail_next_fetches(&self, count: usize) {
        self.script.lock().unwrap().failing_fetches = count;
    }

    pub fn fail_ping(&self) {
        self.script.lock().unwrap().ping_fails = true;
    }

    pub fn reject_next_order(&self, reason: &str) {
        self.script
            .lock()
            .unwrap()
            .rejected_orders
            .push_back(reason.to_string());
    }

    /// 下一笔订单以指定错误失败（非拒单类错误）
    pub fn fail_next_order_with(&self, error: BrokerError) {
        self.script.lock().unwrap().failing_orders.push_back(error);
    }

    /// 下一次品种选择失败
    pub fn fail_select_symbol(&self) {
        self.script.lock().unwrap().failing_selections += 1;
    }

    pub fn reject_next_modifies(&self, count: usize) {
        self.script.lock().unwrap().rejected_modifies = count;
    }

    /// 模拟止损/止盈触发
    pub fn close_all(&self) {
        self.script.lock().unwrap().positions.clear();
    }

    pub fn open_positions(&self) -> Vec<Position> {
        self.script
            .lock()
            .unwrap()
            .positions
            .values()
            .cloned()
            .collect()
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.script.lock().unwrap().orders.clone()
    }

    pub fn modifications(&self) -> Vec<(u64, f64)> {
        self.script.lock().unwrap().modifications.clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.script.lock().unwrap().fetch_calls
    }

    pub fn max_open_positions(&self) -> usize {
        self.script.lock().unwrap().max_open_positions
    }
}

#[async_trait]
impl BrokerGateway for ScriptedBroker {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn ping(&self) -> Result<()> {
        if self.script.lock().unwrap().ping_fails {
            Err(BrokerError::ConnectionError("terminal offline".to_string()))
        } else {
            Ok(())
        }
    }

    async fn fetch_bars(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>> {
        let mut script = self.script.lock().unwrap();
        script.fetch_calls += 1;
        if script.failing_fetches > 0 {
            script.failing_fetches -= 1;
            return Err(BrokerError::ConnectionError("connection reset".to_string()));
        }
        let skip = script.bars.len().saturating_sub(count);
        Ok(script.bars[skip..].to_vec())
    }

    async fn current_tick(&self, _symbol: &str) -> Result<Tick> {
        self.script
            .lock()
            .unwrap()
            .tick
            .ok_or_else(|| BrokerError::InvalidMarketData("no tick".to_string()))
    }

    async fn account_balance(&self) -> Result<f64> {
        let script = self.script.lock().unwrap();
        match script.target_after_fetches {
            Some((fetches, balance)) if script.fetch_calls >= fetches => Ok(balance),
            _ => Ok(script.balance),
        }
    }

    async fn select_symbol(&self, symbol: &str) -> Result<()> {
        let mut script = self.script.lock().unwrap();
        if script.failing_selections > 0 {
            script.failing_selections -= 1;
            return Err(BrokerError::SymbolUnavailable(symbol.to_string()));
        }
        Ok(())
    }

    async fn place_order(&self, request: OrderRequest) -> Result<u64> {
        let mut script = self.script.lock().unwrap();
        if let Some(error) = script.failing_orders.pop_front() {
            return Err(error);
        }
        if let Some(reason) = script.rejected_orders.pop_front() {
            return Err(BrokerError::OrderRejected { reason });
        }
        let id = script.next_id;
        script.next_id += 1;
        script.positions.insert(
            id,
            Position {
                id,
                symbol: request.symbol.clone(),
                side: request.side,
                entry_price: request.price,
                stop_loss: request.stop_loss,
                take_profit: request.take_profit,
                volume: request.volume,
            },
        );
        script.orders.push(request);
        script.max_open_positions = script.max_open_positions.max(script.positions.len());
        Ok(id)
    }

    async fn modify_stop_loss(&self, position_id: u64, new_stop_loss: f64) -> Result<()> {
        let mut guard = self.script.lock().unwrap();
        let script = &mut *guard;
        if script.rejected_modifies > 0 {
            script.rejected_modifies -= 1;
            return Err(BrokerError::ModifyRejected {
                position_id,
                reason: "Requote".to_string(),
            });
        }
        match script.positions.get_mut(&position_id) {
            Some(position) => {
                position.stop_loss = new_stop_loss;
                script.modifications.push((position_id, new_stop_loss));
                Ok(())
            }
            None => Err(BrokerError::ModifyRejected {
                position_id,
                reason: "Position not found".to_string(),
            }),
        }
    }

    async fn get_position(&self, position_id: u64) -> Result<Option<Position>> {
        Ok(self
            .script
            .lock()
            .unwrap()
            .positions
            .get(&position_id)
            .cloned())
    }
}

fn tick(bid: f64, ask: f64) -> Tick {
    Tick {
        bid,
        ask,
        timestamp: Utc::now(),
    }
}

/// 由收盘价序列生成K线，高低点为收盘价 ±2 点
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            open: close,
            high: close + 0.0002,
            low: close - 0.0002,
            close,
            volume: 100.0,
            timestamp: start + Duration::minutes(5 * i as i64),
        })
        .collect()
}

pub fn flat_bars(count: usize, price: f64) -> Vec<Bar> {
    bars_from_closes(&vec![price; count])
}

/// 快线在慢线上方，倒数第二根收盘在快线下方，最后一根上涨：做多
pub fn buy_setup_bars() -> Vec<Bar> {
    let mut closes = vec![1.1900; 30];
    closes.extend(std::iter::repeat(1.2010).take(18));
    closes.push(1.1990);
    closes.push(1.2000);
    bars_from_closes(&closes)
}

/// 做空镜像
pub fn sell_setup_bars() -> Vec<Bar> {
    let mut closes = vec![1.2100; 30];
    closes.extend(std::iter::repeat(1.1990).take(18));
    closes.push(1.2010);
    closes.push(1.2000);
    bars_from_closes(&closes)
}
