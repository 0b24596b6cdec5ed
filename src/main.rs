use breakoutcta::{
    core::config::StrategyConfig,
    core::types::Timeframe,
    exchanges::{PaperBroker, PaperBrokerConfig},
    strategies::breakout::{BreakoutStrategy, NullSink, SessionConfig, TradeJournal, STRATEGY_NAME},
    utils::instrument::InstrumentInfo,
    utils::unified_logger::{init_global_logger, LogConfig},
};
use clap::{Arg, Command};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 解析命令行参数
    let matches = Command::new("BreakoutCTA")
        .version(env!("CARGO_PKG_VERSION"))
        .about("突破/趋势交易策略")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("策略配置文件路径 (YAML/JSON)")
                .default_value("config/breakout.yml"),
        )
        .arg(
            Arg::new("symbol")
                .short('s')
                .long("symbol")
                .value_name("SYMBOL")
                .help("交易品种")
                .default_value("EURUSD"),
        )
        .arg(
            Arg::new("timeframe")
                .short('t')
                .long("timeframe")
                .value_name("TIMEFRAME")
                .help("K线周期: M1, M5, M15, M30, H1, H4, D1")
                .default_value("M5"),
        )
        .arg(
            Arg::new("volume")
                .short('v')
                .long("volume")
                .value_name("LOTS")
                .help("下单手数")
                .value_parser(clap::value_parser!(f64))
                .default_value("0.1"),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .help("日志目录")
                .default_value("logs"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .default_value("INFO"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("N")
                .help("模拟行情随机种子")
                .value_parser(clap::value_parser!(u64)),
        )
        .get_matches();

    let config_file = arg_string(&matches, "config", "config/breakout.yml");
    let symbol = arg_string(&matches, "symbol", "EURUSD");
    let timeframe: Timeframe = arg_string(&matches, "timeframe", "M5").parse()?;
    let volume = matches.get_one::<f64>("volume").copied().unwrap_or(0.1);
    let seed = matches.get_one::<u64>("seed").copied();

    // 初始化统一日志系统
    let log_config = LogConfig {
        root_dir: arg_string(&matches, "log-dir", "logs"),
        default_level: arg_string(&matches, "log-level", "INFO"),
        ..LogConfig::default()
    };
    let _log_handle = init_global_logger(&log_config, STRATEGY_NAME)?;

    log::info!(
        "启动策略: {} {} {} 手数 {}, 配置: {}",
        STRATEGY_NAME,
        symbol,
        timeframe.label(),
        volume,
        config_file
    );

    let strategy_config = StrategyConfig::load_or_default(&config_file);

    // 品种信息文件可选，缺失时按品种默认
    let instrument = InstrumentInfo::load_from_file("config/instruments", &symbol)
        .unwrap_or_else(|e| {
            log::warn!("读取品种信息失败，使用默认值: {}", e);
            InstrumentInfo::default_for_symbol(&symbol)
        });
    let session_config =
        SessionConfig::new(&symbol, timeframe, volume).with_instrument(&instrument);

    let broker = Arc::new(PaperBroker::new(PaperBrokerConfig {
        seed,
        pip_size: session_config.instrument().pip_size,
        ..PaperBrokerConfig::default()
    }));
    let journal = TradeJournal::new(session_config.symbol.clone(), Arc::new(NullSink));

    let mut strategy =
        match BreakoutStrategy::new(broker, strategy_config, session_config, journal).await {
            Ok(strategy) => strategy,
            Err(e) => {
                log::error!("❌ 策略启动失败: {}", e);
                return Err(e.into());
            }
        };

    // Ctrl-C 请求停止
    let stop_handle = strategy.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("收到停止信号，当前周期结束后退出");
            stop_handle.request_stop();
        }
    });

    let summary = strategy.run().await;
    log::info!(
        "运行结束: {:?}, 周期 {}, 错误 {}, 开仓 {}, 平仓 {}, 余额 {:?}",
        summary.reason,
        summary.cycles,
        summary.faults,
        summary.positions_opened,
        summary.positions_closed,
        summary.final_balance
    );

    Ok(())
}

fn arg_string(matches: &clap::ArgMatches, name: &str, default: &str) -> String {
    matches
        .get_one::<String>(name)
        .cloned()
        .unwrap_or_else(|| default.to_string())
}
