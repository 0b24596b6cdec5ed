//! 突破策略会话配置

use crate::core::error::BrokerError;
use crate::core::types::Timeframe;
use crate::utils::instrument::InstrumentInfo;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 会话参数，会话开始时捕获一次
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionConfig {
    /// 交易品种
    pub symbol: String,

    /// K线周期
    pub timeframe: Timeframe,

    /// 下单手数
    pub volume: f64,

    /// 点值覆盖，未设置时按品种默认
    #[serde(default)]
    pub pip_size: Option<f64>,

    /// 报价小数位覆盖
    #[serde(default)]
    pub price_digits: Option<u32>,

    /// 每次拉取的K线数量
    #[serde(default = "default_bar_window")]
    pub bar_window: usize,

    /// 处理所需的最少K线数量
    #[serde(default = "default_min_bars")]
    pub min_bars: usize,

    /// 周期间隔（毫秒）
    #[serde(default = "default_cycle_delay_ms")]
    pub cycle_delay_ms: u64,

    /// 点差上限（点）
    #[serde(default = "default_max_spread_pips")]
    pub max_spread_pips: f64,

    /// 开仓止损距离（点）
    #[serde(default = "default_initial_stop_pips")]
    pub initial_stop_pips: f64,

    /// 开仓止盈距离（点）
    #[serde(default = "default_take_profit_pips")]
    pub take_profit_pips: f64,

    /// 快速均线周期
    #[serde(default = "default_fast_ma")]
    pub fast_ma_period: usize,

    /// 慢速均线周期
    #[serde(default = "default_slow_ma")]
    pub slow_ma_period: usize,
}

fn default_bar_window() -> usize {
    100
}
fn default_min_bars() -> usize {
    50
}
fn default_cycle_delay_ms() -> u64 {
    5_000
}
fn default_max_spread_pips() -> f64 {
    20.0
}
fn default_initial_stop_pips() -> f64 {
    50.0
}
fn default_take_profit_pips() -> f64 {
    100.0
}
fn default_fast_ma() -> usize {
    20
}
fn default_slow_ma() -> usize {
    50
}

impl SessionConfig {
    pub fn new(symbol: &str, timeframe: Timeframe, volume: f64) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            timeframe,
            volume,
            pip_size: None,
            price_digits: None,
            bar_window: default_bar_window(),
            min_bars: default_min_bars(),
            cycle_delay_ms: default_cycle_delay_ms(),
            max_spread_pips: default_max_spread_pips(),
            initial_stop_pips: default_initial_stop_pips(),
            take_profit_pips: default_take_profit_pips(),
            fast_ma_period: default_fast_ma(),
            slow_ma_period: default_slow_ma(),
        }
    }

    pub fn with_cycle_delay(mut self, delay: Duration) -> Self {
        self.cycle_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }

    /// 用已加载的品种信息填充覆盖项
    pub fn with_instrument(mut self, info: &InstrumentInfo) -> Self {
        self.pip_size = Some(info.pip_size);
        self.price_digits = Some(info.price_digits);
        self
    }

    /// 品种信息（应用点值与小数位覆盖）
    pub fn instrument(&self) -> InstrumentInfo {
        let mut info = InstrumentInfo::default_for_symbol(&self.symbol);
        if let Some(pip_size) = self.pip_size {
            info.pip_size = pip_size;
        }
        if let Some(price_digits) = self.price_digits {
            info.price_digits = price_digits;
        }
        info
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.symbol.trim().is_empty() {
            return Err(invalid("symbol", "交易品种不能为空"));
        }

        if !self.volume.is_finite() || self.volume <= 0.0 {
            return Err(invalid("volume", &format!("手数必须为正数: {}", self.volume)));
        }

        if let Some(pip_size) = self.pip_size {
            if !pip_size.is_finite() || pip_size <= 0.0 {
                return Err(invalid("pip_size", &format!("点值必须为正数: {}", pip_size)));
            }
        }

        if let Some(price_digits) = self.price_digits {
            if price_digits > 10 {
                return Err(invalid(
                    "price_digits",
                    &format!("报价小数位超出范围: {}", price_digits),
                ));
            }
        }

        if self.fast_ma_period == 0 || self.fast_ma_period >= self.slow_ma_period {
            return Err(invalid("fast_ma_period", "快速均线周期必须小于慢速均线周期"));
        }

        if self.min_bars < self.slow_ma_period {
            return Err(invalid("min_bars", "最少K线数量不能小于慢速均线周期"));
        }

        if self.bar_window < self.min_bars {
            return Err(invalid("bar_window", "拉取数量不能小于最少K线数量"));
        }

        for (field, value) in [
            ("max_spread_pips", self.max_spread_pips),
            ("initial_stop_pips", self.initial_stop_pips),
            ("take_profit_pips", self.take_profit_pips),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(field, &format!("必须为正数: {}", value)));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> BrokerError {
    BrokerError::ValidationError {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
