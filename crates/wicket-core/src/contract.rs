use crate::error::CoreError;
use crate::prefix::HttpPrefix;

/// `ListenerContext` 是监听器核心对“一次已接受、尚未处理完的请求”的最小契约。
///
/// # 设计背景（Why）
/// - 核心只负责把上下文在生产者与消费者之间正确交接，并在停机时批量清理，
///   不关心 HTTP 解析、TLS 或路由——那些都藏在上下文实现的背后；
/// - 契约收窄到三个操作，测试可以用纯内存桩完整驱动核心的全部状态机路径。
///
/// # 契约说明（What）
/// - `set_error_status`：记录将要回写给客户端的错误状态码；
/// - `send_error`：按已记录的状态码发送错误响应并优雅关闭，写失败以
///   [`CoreError`] 上报，由监听器按策略吞掉或记录；
/// - `close`：关闭底层连接，`force = true` 时不做任何冲刷或响应。
///
/// # 并发约定（How）
/// - 上下文在交接前由生产者侧独占、交接后由消费者侧独占，核心仅在持有
///   注册表锁的停机清扫中触碰它，因此三个操作都以 `&self` 暴露，
///   实现内部自行保证幂等与线程安全。
pub trait ListenerContext: Send + Sync + 'static {
    /// 记录将要回写的错误状态码。
    fn set_error_status(&self, status: u16);

    /// 发送已记录的错误响应并优雅关闭连接。
    fn send_error(&self) -> Result<(), CoreError>;

    /// 关闭底层连接；`force` 为真时直接断开，不冲刷、不响应。
    fn close(&self, force: bool);
}

/// `Acceptor` 是监听器与端点管理设施之间的绑定契约。
///
/// # 设计背景（Why）
/// - 历史实现依赖进程级全局注册表完成端点绑定，测试无法替换；
///   这里改为构造期注入的显式协作方，伪实现可以逐次断言绑定与解绑；
/// - 接入器在绑定成功后负责创建上下文并通过监听器的注册入口回送，
///   核心从不直接触碰套接字。
///
/// # 契约说明（What）
/// - `bind`：按前缀集合绑定端点；失败返回 [`CoreError`]，监听器保持未启动；
/// - `unbind`：解除绑定；在停机路径调用，不允许失败（尽力而为）。
///
/// # 风险提示（Trade-offs）
/// - `bind` 在监听器锁内调用，以保证“绑定成功 ⇔ 进入监听态”的原子性；
///   实现应只做注册性工作，把耗时 IO 推迟到自己的接受循环中。
pub trait Acceptor: Send + Sync + 'static {
    /// 按前缀集合绑定端点。
    fn bind(&self, prefixes: &[HttpPrefix]) -> Result<(), CoreError>;

    /// 解除端点绑定。
    fn unbind(&self, prefixes: &[HttpPrefix]);
}
