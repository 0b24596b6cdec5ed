use crate::core::types::Bar;
/// 技术指标模块
/// 无状态的指标计算函数，输入为按时间升序的价格序列
use serde::{Deserialize, Serialize};

/// 按列拆分的K线序列
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub closes: Vec<f64>,
}

impl PriceSeries {
    pub fn from_bars(bars: &[Bar]) -> Self {
        let mut series = Self {
            highs: Vec::with_capacity(bars.len()),
            lows: Vec::with_capacity(bars.len()),
            closes: Vec::with_capacity(bars.len()),
        };
        for bar in bars {
            series.highs.push(bar.high);
            series.lows.push(bar.low);
            series.closes.push(bar.close);
        }
        series
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// 最新收盘价
    pub fn last_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }
}

/// 静态技术指标计算函数（无状态）
pub mod functions {
    /// 计算简单移动平均线 (SMA)，样本不足时返回 None
    pub fn sma(prices: &[f64], period: usize) -> Option<f64> {
        if prices.len() < period || period == 0 {
            return None;
        }

        let sum: f64 = prices[prices.len() - period..].iter().sum();
        Some(sum / period as f64)
    }

    /// 从序列末尾回看 `offset` 根的值（offset=1 为最后一个）
    pub fn lookback(values: &[f64], offset: usize) -> Option<f64> {
        if offset == 0 || values.len() < offset {
            return None;
        }
        values.get(values.len() - offset).copied()
    }
}
