/// 安全的锁获取宏，锁中毒时转换为 BrokerError
#[macro_export]
macro_rules! safe_lock {
    ($mutex:expr) => {
        $mutex.lock().map_err(|e| {
            log::error!("Failed to acquire lock: {}", e);
            $crate::core::error::BrokerError::StateError(format!("Lock poisoned: {}", e))
        })
    };
}
