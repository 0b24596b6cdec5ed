// 核心模块 - 数据结构、错误、经纪商接口与配置
pub mod broker;
pub mod config;
pub mod error;
pub mod types;

pub use self::broker::BrokerGateway;
pub use self::config::*;
pub use self::error::*;
pub use self::types::{Bar, OrderRequest, Position, PositionSide, Tick, Timeframe};
