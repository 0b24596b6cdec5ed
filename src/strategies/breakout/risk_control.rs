//! 日内目标风控
//!
//! 每个周期最先执行。达到目标只停止新的交易，不平掉现有仓位。

use log::{debug, info};

use crate::core::config::RiskConfig;
use crate::core::error::BrokerError;

/// 单次风控检查结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskCheck {
    pub current_balance: f64,
    pub profit_percent: f64,
    /// 会话应停止
    pub halt: bool,
}

/// 日内目标守卫，持有会话起始余额
#[derive(Debug, Clone)]
pub struct DailyTargetGuard {
    config: RiskConfig,
    starting_balance: f64,
}

impl DailyTargetGuard {
    pub fn new(config: RiskConfig, starting_balance: f64) -> Result<Self, BrokerError> {
        if !starting_balance.is_finite() || starting_balance <= 0.0 {
            return Err(BrokerError::SetupError(format!(
                "起始余额无效: {}",
                starting_balance
            )));
        }
        Ok(Self {
            config,
            starting_balance,
        })
    }

    /// 相对起始余额的盈亏百分比
    pub fn profit_percent(&self, current_balance: f64) -> f64 {
        (current_balance - self.starting_balance) * 100.0 / self.starting_balance
    }

    pub fn check(&self, current_balance: f64) -> RiskCheck {
        let profit_percent = self.profit_percent(current_balance);
        let halt = self.config.stop_on_target && profit_percent >= self.config.daily_target_percent;

        if halt {
            info!(
                "🎯 日内目标达成: {:.2}% >= {:.2}%",
                profit_percent, self.config.daily_target_percent
            );
        } else {
            debug!(
                "日内盈亏 {:.2}% (目标 {:.2}%)",
                profit_percent, self.config.daily_target_percent
            );
        }

        RiskCheck {
            current_balance,
            profit_percent,
            halt,
        }
    }
}
