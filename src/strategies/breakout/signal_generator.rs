//! 信号生成模块
//!
//! 均线交叉与头肩形态识别，纯函数，不依赖持仓状态。

use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::types::{PositionSide, Tick};
use crate::strategies::breakout::stop_manager::PRICE_EPSILON;
use crate::utils::indicators::functions::{lookback, sma};
use crate::utils::indicators::PriceSeries;

/// 形态识别最少需要的K线数量
pub const PATTERN_MIN_BARS: usize = 7;

/// 两肩高度差相对头部突出幅度的容忍比例
pub const PATTERN_TOLERANCE: f64 = 0.4;

const LEFT_SHOULDER_OFFSET: usize = 7;
const HEAD_OFFSET: usize = 5;
const RIGHT_SHOULDER_OFFSET: usize = 3;

/// 图表形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartPattern {
    /// 头肩顶，看跌
    HeadAndShoulders,
    /// 头肩底，看涨
    InverseHeadAndShoulders,
}

impl ChartPattern {
    /// 形态对应的入场方向
    pub fn bias(&self) -> PositionSide {
        match self {
            ChartPattern::HeadAndShoulders => PositionSide::Short,
            ChartPattern::InverseHeadAndShoulders => PositionSide::Long,
        }
    }
}

impl std::fmt::Display for ChartPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ChartPattern::HeadAndShoulders => write!(f, "head_and_shoulders"),
            ChartPattern::InverseHeadAndShoulders => write!(f, "inverse_head_and_shoulders"),
        }
    }
}

/// 信号来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    MovingAverageCross,
    Pattern(ChartPattern),
}

impl std::fmt::Display for SignalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SignalSource::MovingAverageCross => write!(f, "ma_cross"),
            SignalSource::Pattern(pattern) => write!(f, "{}", pattern),
        }
    }
}

/// 入场信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySignal {
    pub side: PositionSide,
    pub source: SignalSource,
}

/// 一个周期的指标快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub ma_fast: Option<f64>,
    pub ma_slow: Option<f64>,
    pub pattern: Option<ChartPattern>,
}

/// 行情不可信的原因（跳过本周期，不是错误）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarketRejection {
    InvalidPrice(f64),
    InvalidQuote { bid: f64, ask: f64 },
    SpreadTooWide { spread: f64, ceiling: f64 },
}

impl std::fmt::Display for MarketRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MarketRejection::InvalidPrice(price) => write!(f, "invalid price {}", price),
            MarketRejection::InvalidQuote { bid, ask } => {
                write!(f, "invalid quote bid={} ask={}", bid, ask)
            }
            MarketRejection::SpreadTooWide { spread, ceiling } => {
                write!(f, "spread {:.5} above ceiling {:.5}", spread, ceiling)
            }
        }
    }
}

/// 通过检查的行情快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSnapshot {
    pub price: f64,
    pub bid: f64,
    pub ask: f64,
    pub spread: f64,
}

/// 计算最近 `period` 个收盘价的算术平均，样本不足返回 None
pub fn moving_average(closes: &[f64], period: usize) -> Option<f64> {
    sma(closes, period)
}

/// 在固定回看位置（7、5、3）识别头肩形态
pub fn detect_pattern(highs: &[f64], lows: &[f64]) -> Option<ChartPattern> {
    if highs.len() < PATTERN_MIN_BARS || lows.len() < PATTERN_MIN_BARS {
        return None;
    }

    let (left, head, right) = anchors(highs)?;
    if is_head_and_shoulders(left, head, right) {
        return Some(ChartPattern::HeadAndShoulders);
    }

    let (left, head, right) = anchors(lows)?;
    if is_inverse_head_and_shoulders(left, head, right) {
        return Some(ChartPattern::InverseHeadAndShoulders);
    }

    None
}

fn anchors(values: &[f64]) -> Option<(f64, f64, f64)> {
    Some((
        lookback(values, LEFT_SHOULDER_OFFSET)?,
        lookback(values, HEAD_OFFSET)?,
        lookback(values, RIGHT_SHOULDER_OFFSET)?,
    ))
}

fn is_head_and_shoulders(left: f64, head: f64, right: f64) -> bool {
    head > left && head > right && (left - right).abs() < (head - left) * PATTERN_TOLERANCE
}

fn is_inverse_head_and_shoulders(left: f64, head: f64, right: f64) -> bool {
    head < left && head < right && (left - right).abs() < (left - head) * PATTERN_TOLERANCE
}

/// 按优先级列出本周期触发的所有入场信号：先均线交叉，后形态
pub fn entry_candidates(
    closes: &[f64],
    ma_fast: Option<f64>,
    ma_slow: Option<f64>,
    pattern: Option<ChartPattern>,
) -> Vec<EntrySignal> {
    let mut candidates = Vec::with_capacity(2);

    if let (Some(fast), Some(slow), Some(last), Some(prev)) =
        (ma_fast, ma_slow, lookback(closes, 1), lookback(closes, 2))
    {
        let side = if fast > slow && prev < fast && last > prev {
            Some(PositionSide::Long)
        } else if fast < slow && prev > fast && last < prev {
            Some(PositionSide::Short)
        } else {
            None
        };

        if let Some(side) = side {
            candidates.push(EntrySignal {
                side,
                source: SignalSource::MovingAverageCross,
            });
        }
    }

    if let Some(pattern) = pattern {
        candidates.push(EntrySignal {
            side: pattern.bias(),
            source: SignalSource::Pattern(pattern),
        });
    }

    candidates
}

/// 本周期应采用的入场信号（第一个触发的）
pub fn entry_signal(
    closes: &[f64],
    ma_fast: Option<f64>,
    ma_slow: Option<f64>,
    pattern: Option<ChartPattern>,
) -> Option<EntrySignal> {
    entry_candidates(closes, ma_fast, ma_slow, pattern)
        .into_iter()
        .next()
}

/// 检查行情是否可信：价格为正、报价有效、点差不超过上限
pub fn check_market(
    price: f64,
    tick: &Tick,
    max_spread: f64,
) -> Result<MarketSnapshot, MarketRejection> {
    if !price.is_finite() || price <= 0.0 {
        return Err(MarketRejection::InvalidPrice(price));
    }

    if !tick.bid.is_finite() || !tick.ask.is_finite() || tick.bid <= 0.0 || tick.ask < tick.bid {
        return Err(MarketRejection::InvalidQuote {
            bid: tick.bid,
            ask: tick.ask,
        });
    }

    // 恰好等于上限的点差放行
    let spread = tick.spread();
    if spread > max_spread + PRICE_EPSILON {
        return Err(MarketRejection::SpreadTooWide {
            spread,
            ceiling: max_spread,
        });
    }

    Ok(MarketSnapshot {
        price,
        bid: tick.bid,
        ask: tick.ask,
        spread,
    })
}

/// 信号生成器
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    fast_period: usize,
    slow_period: usize,
}

impl SignalGenerator {
    /// 创建新的信号生成器
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            fast_period,
            slow_period,
        }
    }

    /// 计算本周期指标
    pub fn analyze(&self, series: &PriceSeries) -> IndicatorSnapshot {
        let snapshot = IndicatorSnapshot {
            ma_fast: moving_average(&series.closes, self.fast_period),
            ma_slow: moving_average(&series.closes, self.slow_period),
            pattern: detect_pattern(&series.highs, &series.lows),
        };
        debug!("指标快照: {:?}", snapshot);
        snapshot
    }

    /// 本周期所有候选入场信号
    pub fn candidates(&self, series: &PriceSeries, snapshot: &IndicatorSnapshot) -> Vec<EntrySignal> {
        entry_candidates(
            &series.closes,
            snapshot.ma_fast,
            snapshot.ma_slow,
            snapshot.pattern,
        )
    }
}
