pub mod core;
pub mod exchanges;
pub mod strategies;
pub mod utils;

// 选择性导出，避免命名冲突
pub use crate::core::{broker::*, config::*, error::*, types::*};
pub use exchanges::*;
pub use strategies::breakout;
