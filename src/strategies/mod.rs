// 核心策略模块
pub mod breakout;

pub use breakout::{BreakoutStrategy, SessionConfig, StopHandle};
