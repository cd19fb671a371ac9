#![deny(unsafe_code)]
#![doc = "wicket-listener: 受管 HTTP/WebSocket 监听器的同步与生命周期引擎。"]
#![doc = ""]
#![doc = "接入器经 `register_context` 送入上下文，应用侧经 `get_context` /"]
#![doc = "`begin_get_context` + `end_get_context` 取出上下文；"]
#![doc = "监听器在一把粗粒度锁下维护状态机、注册表与互斥的双队列，"]
#![doc = "并在停止 / 关闭 / 中止 / 析构四条停机路径上提供确定的清扫语义。"]
#![doc = ""]
#![doc = "契约类型（错误域、前缀、认证词汇、协作接口）见 `wicket-core`。"]

mod config;
mod error;
mod handle;
mod listener;

pub use config::{ListenerConfig, SchemeSelector, TlsSettings};
pub use handle::{CompletionCallback, ContextHandle, HandleUserState};
pub use listener::HttpListener;
