#![deny(unsafe_code)]
#![doc = "wicket-core: 受管 HTTP/WebSocket 监听器的核心契约。"]
#![doc = ""]
#![doc = "本 crate 只承载稳定契约：错误域、URI 前缀模型、认证词汇，"]
#![doc = "以及监听器消费的两个窄协作接口（请求上下文与端点接入器）。"]
#![doc = "状态机、队列与停机清扫的实现位于 `wicket-listener`。"]

pub mod auth;
pub mod contract;
pub mod error;
pub mod prefix;
/// 测试桩命名空间，集中暴露官方维护的录制型实现，供单元与集成测试复用。
pub mod test_stubs;

pub use auth::{
    AuthenticationScheme, ClientIdentity, CredentialsFinder, DEFAULT_REALM, NetworkCredentials,
    effective_realm,
};
pub use contract::{Acceptor, ListenerContext};
pub use error::{CoreError, ErrorCategory};
pub use prefix::{HttpPrefix, PrefixError, PrefixScheme};

/// 以 [`CoreError`] 为缺省错误类型的结果别名。
pub type Result<T, E = CoreError> = core::result::Result<T, E>;
