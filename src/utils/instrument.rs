/// 交易品种信息模块
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 交易品种信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub symbol: String,
    pub description: String,
    /// 一个点对应的价格增量
    pub pip_size: f64,
    /// 报价小数位
    pub price_digits: u32,
}

impl InstrumentInfo {
    /// 从文件加载品种信息，文件不存在时使用默认值
    pub fn load_from_file(dir: &str, symbol: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = format!("{}/{}.json", dir, symbol);

        if Path::new(&config_path).exists() {
            let content = fs::read_to_string(&config_path)?;
            let info: InstrumentInfo = serde_json::from_str(&content)?;
            return Ok(info);
        }

        Ok(Self::default_for_symbol(symbol))
    }

    /// 根据品种代码生成默认信息
    pub fn default_for_symbol(symbol: &str) -> Self {
        let upper = symbol.to_uppercase();
        let (pip_size, price_digits) = if upper.contains("JPY") {
            (0.01, 3)
        } else {
            (0.0001, 5)
        };

        let description = match upper.as_str() {
            "EURUSD" => "Euro vs US Dollar",
            "GBPUSD" => "Great Britain Pound vs US Dollar",
            "USDJPY" => "US Dollar vs Japanese Yen",
            _ => "",
        };

        Self {
            symbol: upper,
            description: description.to_string(),
            pip_size,
            price_digits,
        }
    }

    /// 点数转换为价格距离
    pub fn pips_to_price(&self, pips: f64) -> f64 {
        pips * self.pip_size
    }

    pub fn format_price(&self, price: f64) -> String {
        format_price(price, self.price_digits)
    }
}

/// 按指定小数位格式化价格
pub fn format_price(price: f64, digits: u32) -> String {
    format!("{:.*}", digits as usize, price)
}
