use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("经纪商连接错误: {0}")]
    ConnectionError(String),

    #[error("超时错误: 操作 '{operation}' 超时 ({timeout_seconds}秒)")]
    TimeoutError {
        operation: String,
        timeout_seconds: u64,
    },

    #[error("订单被拒绝: {reason}")]
    OrderRejected { reason: String },

    #[error("止损修改被拒绝: 持仓 {position_id} - {reason}")]
    ModifyRejected { position_id: u64, reason: String },

    #[error("交易品种不可用: {0}")]
    SymbolUnavailable(String),

    #[error("行情数据无效: {0}")]
    InvalidMarketData(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("参数验证错误: {field} - {reason}")]
    ValidationError { field: String, reason: String },

    #[error("配置加载错误: {0}")]
    ConfigSourceError(#[from] config::ConfigError),

    #[error("YAML配置错误: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("启动失败: {0}")]
    SetupError(String),

    #[error("状态错误: {0}")]
    StateError(String),

    #[error("其他错误: {0}")]
    Other(String),
}

impl BrokerError {
    /// 判断错误是否可以在下一周期自然重试
    pub fn is_retryable(&self) -> bool {
        match self {
            BrokerError::ConnectionError(_) => true,
            BrokerError::TimeoutError { .. } => true,
            BrokerError::OrderRejected { .. } => true,
            BrokerError::ModifyRejected { .. } => true,
            BrokerError::InvalidMarketData(_) => true,
            _ => false,
        }
    }

    /// 经纪商给出的拒绝原因（仅拒绝类错误）
    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            BrokerError::OrderRejected { reason } => Some(reason),
            BrokerError::ModifyRejected { reason, .. } => Some(reason),
            BrokerError::SymbolUnavailable(symbol) => Some(symbol),
            _ => None,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BrokerError::InvalidMarketData(_) => ErrorSeverity::Info,
            BrokerError::ConnectionError(_) => ErrorSeverity::Warning,
            BrokerError::TimeoutError { .. } => ErrorSeverity::Warning,
            BrokerError::OrderRejected { .. } => ErrorSeverity::Warning,
            BrokerError::ModifyRejected { .. } => ErrorSeverity::Warning,
            BrokerError::ConfigError(_) => ErrorSeverity::Critical,
            BrokerError::ConfigSourceError(_) => ErrorSeverity::Critical,
            BrokerError::ValidationError { .. } => ErrorSeverity::Critical,
            BrokerError::SetupError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,     // 信息性错误，跳过本周期即可
    Warning,  // 警告性错误，下一周期会自然重试
    Error,    // 一般错误，记录后继续
    Critical, // 严重错误，无法启动
}
