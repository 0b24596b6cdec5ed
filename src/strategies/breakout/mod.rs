//! 突破/趋势策略模块

pub mod config;
pub mod engine;
pub mod journal;
pub mod position_manager;
pub mod risk_control;
pub mod signal_generator;
pub mod state;
pub mod stop_manager;

pub use self::config::SessionConfig;
pub use engine::{BreakoutStrategy, CycleOutcome, SkipReason, StopHandle, STRATEGY_NAME};
pub use journal::{LogSink, MemorySink, NullSink, TradeJournal};
pub use position_manager::{ManagedPosition, PositionManager, PositionState};
pub use risk_control::{DailyTargetGuard, RiskCheck};
pub use signal_generator::{ChartPattern, EntrySignal, SignalGenerator, SignalSource};
pub use state::{RunState, RunSummary, SessionState, StopReason, StrategyStatus};
pub use stop_manager::{StopManager, StopUpdate};
