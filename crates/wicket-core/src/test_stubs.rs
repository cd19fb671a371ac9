//! 官方维护的测试桩命名空间。
//!
//! # 设计背景（Why）
//! - 监听器核心的全部状态机路径都可以用纯内存协作方驱动，
//!   集中维护录制型桩对象可避免在各个测试里重复定义；
//! - 契约演进时单点更新，所有测试同步适配。
//!
//! # 使用方式（How）
//! - `RecordingContext` 记录错误状态码、错误响应与关闭调用的次数；
//! - `RecordingAcceptor` 记录绑定 / 解绑次数，并可配置为绑定失败。

use crate::contract::{Acceptor, ListenerContext};
use crate::error::{CoreError, ErrorCategory, codes};
use crate::prefix::HttpPrefix;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 录制型请求上下文桩。
///
/// # 契约说明（What）
/// - 所有操作只改内存计数，不做任何 IO；
/// - `fail_send` 为真时 `send_error` 返回写失败错误，用于验证停机清扫的
///   吞错 / 记录策略；
/// - `id` 由调用方指定，用于 FIFO 顺序断言。
#[derive(Debug, Default)]
pub struct RecordingContext {
    id: usize,
    fail_send: bool,
    error_status: Mutex<Option<u16>>,
    send_error_calls: AtomicUsize,
    graceful_closes: AtomicUsize,
    forced_closes: AtomicUsize,
}

impl RecordingContext {
    /// 以序号构造桩上下文。
    pub fn new(id: usize) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// 构造 `send_error` 必定失败的桩上下文。
    pub fn failing_send(id: usize) -> Self {
        Self {
            id,
            fail_send: true,
            ..Self::default()
        }
    }

    /// 返回构造时指定的序号。
    pub fn id(&self) -> usize {
        self.id
    }

    /// 返回最近记录的错误状态码。
    pub fn error_status(&self) -> Option<u16> {
        match self.error_status.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// 返回 `send_error` 的调用次数。
    pub fn send_error_calls(&self) -> usize {
        self.send_error_calls.load(Ordering::Acquire)
    }

    /// 返回优雅关闭（`force = false`）的调用次数。
    pub fn graceful_closes(&self) -> usize {
        self.graceful_closes.load(Ordering::Acquire)
    }

    /// 返回强制关闭（`force = true`）的调用次数。
    pub fn forced_closes(&self) -> usize {
        self.forced_closes.load(Ordering::Acquire)
    }
}

impl ListenerContext for RecordingContext {
    fn set_error_status(&self, status: u16) {
        let mut guard = match self.error_status.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(status);
    }

    fn send_error(&self) -> Result<(), CoreError> {
        self.send_error_calls.fetch_add(1, Ordering::AcqRel);
        if self.fail_send {
            return Err(CoreError::new(
                codes::CONTEXT_WRITE_FAILED,
                "recording context configured to fail",
            )
            .with_category(ErrorCategory::Retryable));
        }
        Ok(())
    }

    fn close(&self, force: bool) {
        if force {
            self.forced_closes.fetch_add(1, Ordering::AcqRel);
        } else {
            self.graceful_closes.fetch_add(1, Ordering::AcqRel);
        }
    }
}

/// 录制型接入器桩。
#[derive(Debug, Default)]
pub struct RecordingAcceptor {
    fail_bind: bool,
    bind_calls: AtomicUsize,
    unbind_calls: AtomicUsize,
}

impl RecordingAcceptor {
    /// 构造正常工作的桩接入器。
    pub fn new() -> Self {
        Self::default()
    }

    /// 构造 `bind` 必定失败的桩接入器。
    pub fn failing_bind() -> Self {
        Self {
            fail_bind: true,
            ..Self::default()
        }
    }

    /// 返回 `bind` 的调用次数。
    pub fn bind_calls(&self) -> usize {
        self.bind_calls.load(Ordering::Acquire)
    }

    /// 返回 `unbind` 的调用次数。
    pub fn unbind_calls(&self) -> usize {
        self.unbind_calls.load(Ordering::Acquire)
    }
}

impl Acceptor for RecordingAcceptor {
    fn bind(&self, _prefixes: &[HttpPrefix]) -> Result<(), CoreError> {
        self.bind_calls.fetch_add(1, Ordering::AcqRel);
        if self.fail_bind {
            return Err(CoreError::new(
                codes::ACCEPTOR_BIND_FAILED,
                "recording acceptor configured to fail",
            )
            .with_category(ErrorCategory::Retryable));
        }
        Ok(())
    }

    fn unbind(&self, _prefixes: &[HttpPrefix]) {
        self.unbind_calls.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 桩上下文完整记录三类操作。
    #[test]
    fn recording_context_tracks_operations() {
        let context = RecordingContext::new(7);
        context.set_error_status(503);
        context.send_error().expect("send must succeed");
        context.close(true);
        context.close(false);

        assert_eq!(context.id(), 7);
        assert_eq!(context.error_status(), Some(503));
        assert_eq!(context.send_error_calls(), 1);
        assert_eq!(context.forced_closes(), 1);
        assert_eq!(context.graceful_closes(), 1);
    }

    /// 配置为失败的桩上下文返回稳定写失败错误码。
    #[test]
    fn failing_context_reports_write_failure() {
        let context = RecordingContext::failing_send(1);
        let error = context.send_error().expect_err("send must fail");

        assert_eq!(error.code(), codes::CONTEXT_WRITE_FAILED);
        assert_eq!(context.send_error_calls(), 1);
    }

    /// 配置为失败的桩接入器仍然记录调用次数。
    #[test]
    fn failing_acceptor_counts_bind_attempts() {
        let acceptor = RecordingAcceptor::failing_bind();
        let error = acceptor.bind(&[]).expect_err("bind must fail");

        assert_eq!(error.code(), codes::ACCEPTOR_BIND_FAILED);
        assert_eq!(acceptor.bind_calls(), 1);
        assert_eq!(acceptor.unbind_calls(), 0);
    }
}
