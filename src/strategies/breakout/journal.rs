//! 交易日志
//!
//! 面向用户的带时间戳消息，同时转发到 `log` 门面。

use chrono::Local;
use log::Level;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// 日志接收端，展示方式（控制台、文件、界面）由实现决定
pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// 丢弃所有消息
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn write_line(&self, _line: &str) {}
}

/// 有界内存日志
#[derive(Debug)]
pub struct MemorySink {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// 是否有包含 `needle` 的消息
    pub fn contains(&self, needle: &str) -> bool {
        match self.lines.lock() {
            Ok(lines) => lines.iter().any(|line| line.contains(needle)),
            Err(_) => false,
        }
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        match self.lines.lock() {
            Ok(lines) => lines.iter().filter(|line| line.contains(needle)).count(),
            Err(_) => 0,
        }
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            if lines.len() >= self.capacity {
                lines.pop_front();
            }
            lines.push_back(line.to_string());
        }
    }
}

/// 策略交易日志
#[derive(Clone)]
pub struct TradeJournal {
    symbol: String,
    sink: Arc<dyn LogSink>,
}

impl std::fmt::Debug for TradeJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeJournal")
            .field("symbol", &self.symbol)
            .finish()
    }
}

impl TradeJournal {
    pub fn new(symbol: impl Into<String>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            symbol: symbol.into(),
            sink,
        }
    }

    /// 只写入 `log` 门面
    pub fn silent(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Arc::new(NullSink))
    }

    pub fn info(&self, message: &str) {
        self.record(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.record(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.record(Level::Error, message);
    }

    fn record(&self, level: Level, message: &str) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message);
        log::log!(level, "[{}] {}", self.symbol, message);
        self.sink.write_line(&line);
    }
}
