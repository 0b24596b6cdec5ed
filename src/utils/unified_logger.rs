use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use serde::{Deserialize, Serialize};
/// 统一日志管理模块
/// 进程级日志初始化：控制台 + 按大小滚动的文件
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_PATTERN: &str = "[{d(%Y-%m-%d %H:%M:%S%.3f)}] [{l}] [{M}] {m}{n}";

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub root_dir: String,
    pub default_level: String,
    pub max_file_size_mb: u64,
    pub retained_files: u32,
    pub console_output: bool,
    pub pattern: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            root_dir: "logs".to_string(),
            default_level: "INFO".to_string(),
            max_file_size_mb: 10,
            retained_files: 30,
            console_output: true,
            pattern: DEFAULT_PATTERN.to_string(),
        }
    }
}

impl LogConfig {
    /// 策略日志文件路径
    pub fn strategy_log_path(&self, strategy_name: &str) -> PathBuf {
        PathBuf::from(&self.root_dir)
            .join("strategies")
            .join(format!("{}.log", strategy_name))
    }

    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.default_level).unwrap_or(LevelFilter::Info)
    }
}

/// 构建log4rs配置（不安装全局日志器）
pub fn build_logger_config(
    config: &LogConfig,
    strategy_name: &str,
) -> Result<Config, Box<dyn std::error::Error>> {
    let log_path = config.strategy_log_path(strategy_name);
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let roll_pattern = format!(
        "{}/strategies/{}.{{}}.log",
        config.root_dir, strategy_name
    );
    let roller = FixedWindowRoller::builder().build(&roll_pattern, config.retained_files.max(1))?;
    let trigger = SizeTrigger::new(config.max_file_size_mb.max(1) * 1024 * 1024);
    let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roller));

    let file_appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(&config.pattern)))
        .build(&log_path, Box::new(policy))?;

    let mut builder =
        Config::builder().appender(Appender::builder().build("file", Box::new(file_appender)));
    let mut root = Root::builder().appender("file");

    if config.console_output {
        let console = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(&config.pattern)))
            .build();
        builder = builder.appender(Appender::builder().build("console", Box::new(console)));
        root = root.appender("console");
    }

    Ok(builder.build(root.build(config.level_filter()))?)
}

/// 初始化全局日志（进程内只调用一次）
pub fn init_global_logger(
    config: &LogConfig,
    strategy_name: &str,
) -> Result<log4rs::Handle, Box<dyn std::error::Error>> {
    let log_config = build_logger_config(config, strategy_name)?;
    let handle = log4rs::init_config(log_config)?;
    log::info!(
        "日志已初始化: {} (级别 {})",
        config.strategy_log_path(strategy_name).display(),
        config.default_level
    );
    Ok(handle)
}
