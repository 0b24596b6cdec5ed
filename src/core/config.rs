use crate::core::error::BrokerError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 环境变量覆盖前缀，例如 `BREAKOUT_RISK__DAILY_TARGET_PERCENT=2.5`
pub const ENV_PREFIX: &str = "BREAKOUT";

/// 策略参数，会话开始时读取一次，运行期间只读
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct StrategyConfig {
    #[serde(default)]
    pub break_even: BreakEvenConfig,
    #[serde(default)]
    pub trailing_stop: TrailingStopConfig,
    #[serde(default)]
    pub risk: RiskConfig,
}

/// 保本止损配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BreakEvenConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 触发保本所需的有利移动（点）
    #[serde(default = "default_break_even_activation")]
    pub activation_pips: f64,
    /// 止损相对入场价的保护偏移（点）
    #[serde(default = "default_break_even_offset")]
    pub offset_pips: f64,
}

impl Default for BreakEvenConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            activation_pips: default_break_even_activation(),
            offset_pips: default_break_even_offset(),
        }
    }
}

/// 追踪止损配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrailingStopConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 启动追踪所需的有利移动（点）
    #[serde(default = "default_trailing_start")]
    pub start_pips: f64,
    /// 止损与当前价之间的距离（点）
    #[serde(default = "default_trailing_distance")]
    pub distance_pips: f64,
}

impl Default for TrailingStopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_pips: default_trailing_start(),
            distance_pips: default_trailing_distance(),
        }
    }
}

/// 日内目标风控配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RiskConfig {
    /// 日目标收益（百分比）
    #[serde(default = "default_daily_target")]
    pub daily_target_percent: f64,
    /// 达到目标后是否停止
    #[serde(default = "default_true")]
    pub stop_on_target: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            daily_target_percent: default_daily_target(),
            stop_on_target: true,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_break_even_activation() -> f64 {
    15.0
}
fn default_break_even_offset() -> f64 {
    2.0
}
fn default_trailing_start() -> f64 {
    25.0
}
fn default_trailing_distance() -> f64 {
    10.0
}
fn default_daily_target() -> f64 {
    3.0
}

impl StrategyConfig {
    /// 加载配置：可选的YAML/JSON文件 + 环境变量覆盖，文件不存在时使用默认值
    pub fn load(path: &str) -> Result<Self, BrokerError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// 从文件加载配置，失败时记录错误并回退到默认配置
    pub fn load_or_default(path: &str) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("加载策略配置失败，使用默认配置: {}", e);
                Self::default()
            }
        }
    }

    /// 保存配置，按扩展名选择JSON或YAML
    pub fn save(&self, path: &str) -> Result<(), BrokerError> {
        self.validate()?;

        let is_json = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let content = if is_json {
            serde_json::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self)?
        };

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), BrokerError> {
        check_pips("break_even.activation_pips", self.break_even.activation_pips)?;
        check_pips("break_even.offset_pips", self.break_even.offset_pips)?;
        check_pips("trailing_stop.start_pips", self.trailing_stop.start_pips)?;
        check_pips("trailing_stop.distance_pips", self.trailing_stop.distance_pips)?;

        if self.trailing_stop.enabled && self.trailing_stop.distance_pips <= 0.0 {
            return Err(BrokerError::ValidationError {
                field: "trailing_stop.distance_pips".to_string(),
                reason: "追踪距离必须大于0".to_string(),
            });
        }

        let target = self.risk.daily_target_percent;
        if !target.is_finite() || target <= 0.0 {
            return Err(BrokerError::ValidationError {
                field: "risk.daily_target_percent".to_string(),
                reason: format!("日目标必须为正数: {}", target),
            });
        }

        Ok(())
    }
}

fn check_pips(field: &str, value: f64) -> Result<(), BrokerError> {
    if !value.is_finite() || value < 0.0 {
        return Err(BrokerError::ValidationError {
            field: field.to_string(),
            reason: format!("点数不能为负: {}", value),
        });
    }
    Ok(())
}
