use chrono::{DateTime, Utc};
/// 统一的类型定义模块
/// 经纪商网关与策略之间交换的数据结构
use serde::{Deserialize, Serialize};

// ============= 基础类型定义 =============

/// 结果类型别名
pub type Result<T> = std::result::Result<T, crate::core::error::BrokerError>;

// ============= 行情数据 =============

/// K线数据（OHLCV），读取后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

/// 报价快照
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub bid: f64,
    pub ask: f64,
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

// ============= 订单与持仓 =============

/// 持仓方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// 价格向有利方向移动时的符号
    pub fn direction(&self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }

    /// 相对入场价的有利移动距离（亏损时为负）
    pub fn favorable_move(&self, entry_price: f64, current_price: f64) -> f64 {
        (current_price - entry_price) * self.direction()
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "Buy"),
            PositionSide::Short => write!(f, "Sell"),
        }
    }
}

/// 持仓，止损是唯一允许变化的字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: u64,
    pub symbol: String,
    pub side: PositionSide,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub volume: f64,
}

/// 下单请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: PositionSide,
    pub volume: f64,
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

// ============= K线周期 =============

/// K线周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    pub fn from_string(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "M1" | "1M" => Ok(Timeframe::M1),
            "M5" | "5M" => Ok(Timeframe::M5),
            "M15" | "15M" => Ok(Timeframe::M15),
            "M30" | "30M" => Ok(Timeframe::M30),
            "H1" | "1H" => Ok(Timeframe::H1),
            "H4" | "4H" => Ok(Timeframe::H4),
            "D1" | "1D" => Ok(Timeframe::D1),
            _ => Err(crate::core::error::BrokerError::ValidationError {
                field: "timeframe".to_string(),
                reason: format!("Invalid timeframe: {}", s),
            }),
        }
    }

    /// 周期长度（分钟）
    pub fn minutes(&self) -> u32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }

    /// 界面展示用名称
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1 (1 Minute)",
            Timeframe::M5 => "M5 (5 Minutes)",
            Timeframe::M15 => "M15 (15 Minutes)",
            Timeframe::M30 => "M30 (30 Minutes)",
            Timeframe::H1 => "H1 (1 Hour)",
            Timeframe::H4 => "H4 (4 Hours)",
            Timeframe::D1 => "D1 (Daily)",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = crate::core::error::BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        Timeframe::from_string(s)
    }
}
