// 工具模块 - 通用工具函数
pub mod indicators;
pub mod instrument;
pub mod safe_macros;
pub mod unified_logger;

pub use instrument::{format_price, InstrumentInfo};
pub use unified_logger::{init_global_logger, LogConfig};
