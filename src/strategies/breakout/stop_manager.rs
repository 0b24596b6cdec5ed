//! 止损止盈管理模块

use log::debug;

use crate::core::config::{BreakEvenConfig, StrategyConfig, TrailingStopConfig};
use crate::core::types::{Position, PositionSide};

/// 价格比较容差，用于吸收浮点误差
pub const PRICE_EPSILON: f64 = 1e-9;

/// 止损更新类型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopUpdate {
    /// 保本止损
    BreakEven(f64),
    /// 追踪止损
    Trailing(f64),
}

impl StopUpdate {
    pub fn price(&self) -> f64 {
        match self {
            StopUpdate::BreakEven(price) | StopUpdate::Trailing(price) => *price,
        }
    }
}

/// `candidate` 是否严格比 `current` 更具保护性
pub fn improves_stop(side: PositionSide, candidate: f64, current: f64) -> bool {
    (candidate - current) * side.direction() > PRICE_EPSILON
}

/// 止损管理器
///
/// 所有点数配置在每次检查时按点值换算成价格距离。
#[derive(Debug, Clone)]
pub struct StopManager {
    break_even: BreakEvenConfig,
    trailing: TrailingStopConfig,
    pip_size: f64,
    initial_stop_pips: f64,
    take_profit_pips: f64,
}

impl StopManager {
    /// 创建新的止损管理器
    pub fn new(
        config: &StrategyConfig,
        pip_size: f64,
        initial_stop_pips: f64,
        take_profit_pips: f64,
    ) -> Self {
        Self {
            break_even: config.break_even.clone(),
            trailing: config.trailing_stop.clone(),
            pip_size,
            initial_stop_pips,
            take_profit_pips,
        }
    }

    fn pips(&self, pips: f64) -> f64 {
        pips * self.pip_size
    }

    /// 计算开仓时的止损与止盈
    pub fn initial_levels(&self, side: PositionSide, entry_price: f64) -> (f64, f64) {
        let direction = side.direction();
        let stop_loss = entry_price - direction * self.pips(self.initial_stop_pips);
        let take_profit = entry_price + direction * self.pips(self.take_profit_pips);
        (stop_loss, take_profit)
    }

    /// 保本检查：有利移动达到激活距离时，将止损移到入场价加保护偏移
    pub fn break_even_update(&self, position: &Position, current_price: f64) -> Option<StopUpdate> {
        if !self.break_even.enabled {
            return None;
        }

        let activation = self.pips(self.break_even.activation_pips);
        let offset = self.pips(self.break_even.offset_pips);
        let favorable = position.side.favorable_move(position.entry_price, current_price);

        if favorable < activation - PRICE_EPSILON {
            return None;
        }

        let target = position.entry_price + position.side.direction() * offset;
        if !improves_stop(position.side, target, position.stop_loss) {
            return None;
        }

        debug!(
            "保本条件满足: #{} 有利移动 {:.5} >= {:.5}, 止损 {:.5} -> {:.5}",
            position.id, favorable, activation, position.stop_loss, target
        );
        Some(StopUpdate::BreakEven(target))
    }

    /// 追踪止损检查：只在新止损严格更优时更新
    pub fn trailing_update(&self, position: &Position, current_price: f64) -> Option<StopUpdate> {
        if !self.trailing.enabled {
            return None;
        }

        let start = self.pips(self.trailing.start_pips);
        let distance = self.pips(self.trailing.distance_pips);
        let favorable = position.side.favorable_move(position.entry_price, current_price);

        if favorable < start - PRICE_EPSILON {
            return None;
        }

        let candidate = current_price - position.side.direction() * distance;
        if !improves_stop(position.side, candidate, position.stop_loss) {
            return None;
        }

        debug!(
            "更新追踪止损: #{} {:.5} -> {:.5}",
            position.id, position.stop_loss, candidate
        );
        Some(StopUpdate::Trailing(candidate))
    }
}
