//! 会话与运行状态

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::core::types::{PositionSide, Timeframe};
use crate::strategies::breakout::position_manager::ManagedPosition;

/// 会话状态，`starting_balance` 在会话开始时确定，之后不变
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub volume: f64,
    pub starting_balance: f64,
    pub active: bool,
}

/// 执行循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Running,
    Stopping,
    Stopped,
}

/// 循环停止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    TargetReached,
    OperatorRequest,
}

/// 持仓摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSummary {
    pub id: u64,
    pub side: PositionSide,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub volume: f64,
    pub break_even_applied: bool,
    pub trailing_active: bool,
}

impl From<&ManagedPosition> for PositionSummary {
    fn from(managed: &ManagedPosition) -> Self {
        Self {
            id: managed.position.id,
            side: managed.position.side,
            entry_price: managed.position.entry_price,
            stop_loss: managed.position.stop_loss,
            take_profit: managed.position.take_profit,
            volume: managed.position.volume,
            break_even_applied: managed.break_even_applied,
            trailing_active: managed.trailing_active,
        }
    }
}

/// 策略状态快照（供界面读取）
#[derive(Debug, Clone, Serialize)]
pub struct StrategyStatus {
    pub name: String,
    pub run_state: RunState,
    pub session: SessionState,
    pub position: Option<PositionSummary>,
    pub cycles: u64,
    pub faults: u64,
    pub positions_opened: u64,
    pub positions_closed: u64,
    pub uptime: Option<Duration>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl StrategyStatus {
    pub fn new(name: impl Into<String>, session: SessionState) -> Self {
        Self {
            name: name.into(),
            run_state: RunState::Running,
            session,
            position: None,
            cycles: 0,
            faults: 0,
            positions_opened: 0,
            positions_closed: 0,
            uptime: None,
            updated_at: Utc::now(),
            last_error: None,
        }
    }

    pub fn with_run_state(mut self, run_state: RunState) -> Self {
        self.run_state = run_state;
        self
    }

    pub fn with_position(mut self, position: Option<PositionSummary>) -> Self {
        self.position = position;
        self
    }

    pub fn with_counters(mut self, cycles: u64, faults: u64) -> Self {
        self.cycles = cycles;
        self.faults = faults;
        self
    }

    pub fn with_trade_counts(mut self, opened: u64, closed: u64) -> Self {
        self.positions_opened = opened;
        self.positions_closed = closed;
        self
    }

    pub fn with_uptime(mut self, uptime: Duration) -> Self {
        self.uptime = Some(uptime);
        self
    }

    pub fn with_last_error(mut self, last_error: Option<String>) -> Self {
        self.last_error = last_error;
        self
    }
}

/// 循环结束后的汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub reason: StopReason,
    pub cycles: u64,
    pub faults: u64,
    pub positions_opened: u64,
    pub positions_closed: u64,
    pub final_balance: Option<f64>,
}
