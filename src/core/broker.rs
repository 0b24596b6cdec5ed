use crate::core::types::{Bar, OrderRequest, Position, Result, Tick, Timeframe};
use async_trait::async_trait;

/// 经纪商网关通用接口trait
///
/// 策略核心只依赖这组能力，不直接依赖任何具体终端库。
/// 所有调用的超时由实现方负责。
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// 获取网关名称
    fn name(&self) -> &str;

    /// 测试连接（会话启动前调用）
    async fn ping(&self) -> Result<()>;

    /// 获取最近 `count` 根K线，按时间升序
    async fn fetch_bars(&self, symbol: &str, timeframe: Timeframe, count: usize)
        -> Result<Vec<Bar>>;

    /// 获取当前报价
    async fn current_tick(&self, symbol: &str) -> Result<Tick>;

    /// 获取账户余额
    async fn account_balance(&self) -> Result<f64>;

    /// 确认交易品种可交易
    async fn select_symbol(&self, symbol: &str) -> Result<()> {
        // 默认实现：所有品种可交易
        log::debug!("{} 使用默认品种选择: {}", self.name(), symbol);
        Ok(())
    }

    /// 下单，成功返回订单号（同时作为持仓ID）
    async fn place_order(&self, request: OrderRequest) -> Result<u64>;

    /// 修改持仓止损
    async fn modify_stop_loss(&self, position_id: u64, new_stop_loss: f64) -> Result<()>;

    /// 查询持仓，已平仓返回 None
    async fn get_position(&self, position_id: u64) -> Result<Option<Position>>;
}
