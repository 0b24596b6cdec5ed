// 经纪商实现
pub mod paper;

pub use paper::{PaperBroker, PaperBrokerConfig};
