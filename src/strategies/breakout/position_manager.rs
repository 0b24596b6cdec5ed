//! 仓位管理模块
//!
//! 单仓位状态机：Flat → Opening → Open → Closed。

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::core::error::BrokerError;
use crate::core::types::{OrderRequest, Position};
use crate::strategies::breakout::stop_manager::{improves_stop, StopUpdate};

/// 策略持有的仓位
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedPosition {
    pub position: Position,
    pub break_even_applied: bool,
    pub trailing_active: bool,
    pub opened_at: DateTime<Utc>,
}

/// 仓位生命周期状态
#[derive(Debug, Clone, PartialEq)]
pub enum PositionState {
    Flat,
    /// 订单已提交，等待经纪商确认
    Opening(OrderRequest),
    Open(ManagedPosition),
    /// 经纪商报告仓位已不存在
    Closed(ManagedPosition),
}

impl PositionState {
    pub fn label(&self) -> &'static str {
        match self {
            PositionState::Flat => "flat",
            PositionState::Opening(_) => "opening",
            PositionState::Open(_) => "open",
            PositionState::Closed(_) => "closed",
        }
    }
}

/// 仓位管理器
#[derive(Debug)]
pub struct PositionManager {
    state: PositionState,
    closed_count: u64,
}

impl Default for PositionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionManager {
    pub fn new() -> Self {
        Self {
            state: PositionState::Flat,
            closed_count: 0,
        }
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    /// 可以接受新的入场信号
    pub fn is_flat(&self) -> bool {
        matches!(self.state, PositionState::Flat | PositionState::Closed(_))
    }

    /// 当前持仓
    pub fn active(&self) -> Option<&ManagedPosition> {
        match &self.state {
            PositionState::Open(managed) => Some(managed),
            _ => None,
        }
    }

    pub fn closed_count(&self) -> u64 {
        self.closed_count
    }

    /// Flat → Opening
    pub fn begin_open(&mut self, request: OrderRequest) -> Result<(), BrokerError> {
        if !self.is_flat() {
            return Err(BrokerError::StateError(format!(
                "已有仓位处于 {} 状态，拒绝新订单",
                self.state.label()
            )));
        }
        debug!(
            "提交订单: {} {} {} @ {:.5}",
            request.side, request.volume, request.symbol, request.price
        );
        self.state = PositionState::Opening(request);
        Ok(())
    }

    /// Opening → Open，止损止盈取自订单请求
    pub fn confirm_open(&mut self, position_id: u64) -> Result<&ManagedPosition, BrokerError> {
        let request = match &self.state {
            PositionState::Opening(request) => request.clone(),
            other => {
                return Err(BrokerError::StateError(format!(
                    "仓位处于 {} 状态，无法确认开仓",
                    other.label()
                )))
            }
        };

        let position = Position {
            id: position_id,
            symbol: request.symbol,
            side: request.side,
            entry_price: request.price,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            volume: request.volume,
        };
        info!(
            "仓位已确认: #{} {} @ {:.5} SL {:.5} TP {:.5}",
            position.id, position.side, position.entry_price, position.stop_loss, position.take_profit
        );

        self.state = PositionState::Open(ManagedPosition {
            position,
            break_even_applied: false,
            trailing_active: false,
            opened_at: Utc::now(),
        });
        match &self.state {
            PositionState::Open(managed) => Ok(managed),
            _ => Err(BrokerError::StateError("开仓确认失败".to_string())),
        }
    }

    /// Opening → Flat
    pub fn reject_open(&mut self) {
        if let PositionState::Opening(request) = &self.state {
            warn!("订单被拒绝，{} {} 回到空仓", request.side, request.symbol);
            self.state = PositionState::Flat;
        }
    }

    /// 经纪商确认修改后更新内存中的止损
    ///
    /// 返回 false 表示新止损不比当前更优，未做任何修改。
    pub fn apply_stop_update(&mut self, update: StopUpdate) -> bool {
        let managed = match &mut self.state {
            PositionState::Open(managed) => managed,
            _ => return false,
        };

        let new_stop = update.price();
        if !improves_stop(managed.position.side, new_stop, managed.position.stop_loss) {
            warn!(
                "拒绝放松止损: #{} {:.5} -> {:.5}",
                managed.position.id, managed.position.stop_loss, new_stop
            );
            return false;
        }

        managed.position.stop_loss = new_stop;
        match update {
            StopUpdate::BreakEven(_) => managed.break_even_applied = true,
            StopUpdate::Trailing(_) => managed.trailing_active = true,
        }
        true
    }

    /// Open → Closed
    pub fn mark_closed(&mut self) -> Option<u64> {
        let previous = std::mem::replace(&mut self.state, PositionState::Flat);
        match previous {
            PositionState::Open(managed) => {
                let id = managed.position.id;
                info!("仓位 #{} 已被经纪商平仓", id);
                self.closed_count += 1;
                self.state = PositionState::Closed(managed);
                Some(id)
            }
            other => {
                self.state = other;
                None
            }
        }
    }
}
