//! 监听器生命周期与停机清扫的集成测试。
//!
//! # 教案级导览
//!
//! - **Why**：四条停机路径（停止 / 关闭 / 中止 / 析构）的清扫语义是核心的
//!   对外承诺：未认领上下文拿到 503、在场连接被强制断开、等待者被确定性
//!   唤醒，且全程幂等；
//! - **How**：以 `wicket_core::test_stubs` 的录制型桩驱动监听器，逐条断言
//!   清扫后的计数与错误码；
//! - **What**：覆盖优雅 / 强制清扫、等待者解除阻塞、关闭后拒绝、幂等收尾、
//!   句柄校验与回调重入等场景。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use wicket_core::auth::DEFAULT_REALM;
use wicket_core::error::codes;
use wicket_core::prefix::HttpPrefix;
use wicket_core::test_stubs::{RecordingAcceptor, RecordingContext};
use wicket_listener::{HttpListener, ListenerConfig};

fn local_prefix() -> HttpPrefix {
    HttpPrefix::parse("http://localhost:8080/").expect("valid prefix")
}

fn started_listener(acceptor: Arc<RecordingAcceptor>) -> HttpListener<RecordingContext> {
    let listener = HttpListener::new(ListenerConfig::new().with_prefix(local_prefix()), acceptor);
    listener.start().expect("start must succeed");
    listener
}

/// 优雅清扫：未认领上下文拿到 503 并被关闭，注册表与双队列清空。
#[test]
fn graceful_drain_sends_503_to_unclaimed_contexts() {
    let acceptor = Arc::new(RecordingAcceptor::new());
    let listener = started_listener(Arc::clone(&acceptor));
    let first = Arc::new(RecordingContext::new(1));
    let second = Arc::new(RecordingContext::new(2));
    assert!(listener.register_context(Arc::clone(&first)));
    assert!(listener.register_context(Arc::clone(&second)));

    listener.stop().expect("stop must succeed");

    for context in [&first, &second] {
        assert_eq!(context.error_status(), Some(503));
        assert_eq!(context.send_error_calls(), 1);
        assert_eq!(context.forced_closes(), 1);
    }
    assert_eq!(listener.queued_contexts(), 0);
    assert_eq!(listener.pending_waiters(), 0);
    assert_eq!(listener.registered_contexts(), 0);
    assert_eq!(acceptor.unbind_calls(), 1);
    assert!(!listener.is_listening());
    assert!(!listener.is_disposed());
}

/// 强制清扫：未认领上下文不回写任何响应，直接被强制断开。
#[test]
fn forced_drain_skips_error_responses() {
    let acceptor = Arc::new(RecordingAcceptor::new());
    let listener = started_listener(Arc::clone(&acceptor));
    let first = Arc::new(RecordingContext::new(1));
    let second = Arc::new(RecordingContext::new(2));
    listener.register_context(Arc::clone(&first));
    listener.register_context(Arc::clone(&second));

    listener.abort();

    for context in [&first, &second] {
        assert_eq!(context.error_status(), None);
        assert_eq!(context.send_error_calls(), 0);
        assert_eq!(context.forced_closes(), 1);
    }
    assert_eq!(listener.registered_contexts(), 0);
    assert!(listener.is_disposed());
}

/// 已交付消费者但尚未宣告结束的上下文同样被注册表清扫强制断开。
#[tokio::test]
async fn drain_closes_delivered_but_unfinished_contexts() {
    let listener = started_listener(Arc::new(RecordingAcceptor::new()));
    listener.register_context(Arc::new(RecordingContext::new(1)));
    let delivered = listener.get_context().await.expect("context expected");

    listener.stop().expect("stop must succeed");

    // 已交付的上下文不在未认领队列里，因此没有 503，只有强制断开。
    assert_eq!(delivered.error_status(), None);
    assert_eq!(delivered.forced_closes(), 1);
    assert_eq!(listener.registered_contexts(), 0);
}

/// 阻塞在 `get_context` 的消费者被停止唤醒，拿到“已停止”（平台错误号 995）。
#[tokio::test(flavor = "multi_thread")]
async fn stop_unblocks_blocked_get_context() {
    let listener = Arc::new(started_listener(Arc::new(RecordingAcceptor::new())));
    let consumer = Arc::clone(&listener);
    let join = tokio::spawn(async move { consumer.get_context().await });

    while listener.pending_waiters() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    listener.stop().expect("stop must succeed");

    let error = join
        .await
        .expect("consumer task must not panic")
        .expect_err("consumer must observe the stop");
    assert_eq!(error.code(), codes::LISTENER_STOPPED);
    assert_eq!(error.platform_code(), Some(995));
}

/// 关闭同样唤醒等待者，但交付“已关闭”而不是“已停止”。
#[tokio::test(flavor = "multi_thread")]
async fn close_unblocks_waiters_with_disposed() {
    let listener = Arc::new(started_listener(Arc::new(RecordingAcceptor::new())));
    let consumer = Arc::clone(&listener);
    let join = tokio::spawn(async move { consumer.get_context().await });

    while listener.pending_waiters() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    listener.close();

    let error = join
        .await
        .expect("consumer task must not panic")
        .expect_err("consumer must observe the close");
    assert_eq!(error.code(), codes::LISTENER_DISPOSED);
    assert!(listener.is_disposed());
}

/// 关闭后：启动与消费者入口被拒绝，注册静默拒收。
#[tokio::test]
async fn post_disposal_operations_are_rejected() {
    let listener = started_listener(Arc::new(RecordingAcceptor::new()));
    listener.close();

    let start_error = listener.start().expect_err("start must be rejected");
    assert_eq!(start_error.code(), codes::LISTENER_DISPOSED);

    let begin_error = listener
        .begin_get_context(None, None)
        .expect_err("begin must be rejected");
    assert_eq!(begin_error.code(), codes::LISTENER_DISPOSED);

    let get_error = listener
        .get_context()
        .await
        .expect_err("get must be rejected");
    assert_eq!(get_error.code(), codes::LISTENER_DISPOSED);

    let stop_error = listener.stop().expect_err("stop must be rejected");
    assert_eq!(stop_error.code(), codes::LISTENER_DISPOSED);

    assert!(!listener.register_context(Arc::new(RecordingContext::new(1))));
}

/// 重复收尾不做任何额外清扫工作，也不失败。
#[test]
fn teardown_is_idempotent() {
    let acceptor = Arc::new(RecordingAcceptor::new());
    let listener = started_listener(Arc::clone(&acceptor));
    let context = Arc::new(RecordingContext::new(1));
    listener.register_context(Arc::clone(&context));

    listener.close();
    listener.close();
    listener.abort();

    assert_eq!(context.send_error_calls(), 1);
    assert_eq!(context.forced_closes(), 1);
    assert_eq!(acceptor.unbind_calls(), 1);
}

/// 析构等价于中止：强制清扫，未认领上下文不回写响应。
#[test]
fn drop_behaves_like_abort() {
    let acceptor = Arc::new(RecordingAcceptor::new());
    let context = Arc::new(RecordingContext::new(1));
    {
        let listener = started_listener(Arc::clone(&acceptor));
        listener.register_context(Arc::clone(&context));
    }

    assert_eq!(context.error_status(), None);
    assert_eq!(context.send_error_calls(), 0);
    assert_eq!(context.forced_closes(), 1);
    assert_eq!(acceptor.unbind_calls(), 1);
}

/// 同一句柄只允许消费一次。
#[tokio::test]
async fn end_get_context_rejects_reuse() {
    let listener = started_listener(Arc::new(RecordingAcceptor::new()));
    listener.register_context(Arc::new(RecordingContext::new(1)));
    let handle = listener
        .begin_get_context(None, None)
        .expect("begin must succeed");

    listener
        .end_get_context(&handle)
        .await
        .expect("first consumption must succeed");
    let error = listener
        .end_get_context(&handle)
        .await
        .expect_err("second consumption must be rejected");
    assert_eq!(error.code(), codes::HANDLE_REUSED);
}

/// 非本监听器签发的句柄被拒绝。
#[tokio::test]
async fn end_get_context_rejects_foreign_handle() {
    let issuer = started_listener(Arc::new(RecordingAcceptor::new()));
    let other = started_listener(Arc::new(RecordingAcceptor::new()));
    issuer.register_context(Arc::new(RecordingContext::new(1)));
    let handle = issuer
        .begin_get_context(None, None)
        .expect("begin must succeed");

    let error = other
        .end_get_context(&handle)
        .await
        .expect_err("foreign handle must be rejected");
    assert_eq!(error.code(), codes::HANDLE_INVALID);
}

/// 消费者入口的前置校验：未配置前缀与未启动分别以不同错误拒绝。
#[tokio::test]
async fn consumer_preconditions_are_distinguished() {
    let empty: HttpListener<RecordingContext> =
        HttpListener::new(ListenerConfig::new(), Arc::new(RecordingAcceptor::new()));
    empty.start().expect("start must succeed");
    let error = empty
        .begin_get_context(None, None)
        .expect_err("begin must be rejected");
    assert_eq!(error.code(), codes::LISTENER_NO_PREFIX);

    let stopped: HttpListener<RecordingContext> = HttpListener::new(
        ListenerConfig::new().with_prefix(local_prefix()),
        Arc::new(RecordingAcceptor::new()),
    );
    let error = stopped
        .get_context()
        .await
        .expect_err("get must be rejected");
    assert_eq!(error.code(), codes::LISTENER_NOT_STARTED);
}

/// 绑定失败时错误上抛，监听器保持未启动并可重试。
#[test]
fn bind_failure_keeps_listener_stopped() {
    let acceptor = Arc::new(RecordingAcceptor::failing_bind());
    let listener: HttpListener<RecordingContext> = HttpListener::new(
        ListenerConfig::new().with_prefix(local_prefix()),
        acceptor.clone(),
    );

    let error = listener.start().expect_err("start must fail");
    assert_eq!(error.code(), codes::ACCEPTOR_BIND_FAILED);
    assert!(!listener.is_listening());
    assert_eq!(acceptor.bind_calls(), 1);
    assert_eq!(acceptor.unbind_calls(), 0);
}

/// 优雅清扫中的写失败默认被吞掉，不阻断清扫；关闭策略下也只记日志。
#[test]
fn write_failures_during_drain_do_not_abort_the_sweep() {
    for ignore in [true, false] {
        let listener: HttpListener<RecordingContext> = HttpListener::new(
            ListenerConfig::new()
                .with_prefix(local_prefix())
                .with_ignore_write_errors(ignore),
            Arc::new(RecordingAcceptor::new()),
        );
        listener.start().expect("start must succeed");
        let broken = Arc::new(RecordingContext::failing_send(1));
        let healthy = Arc::new(RecordingContext::new(2));
        listener.register_context(Arc::clone(&broken));
        listener.register_context(Arc::clone(&healthy));

        listener.stop().expect("stop must succeed");

        assert_eq!(broken.send_error_calls(), 1);
        assert_eq!(healthy.send_error_calls(), 1);
        assert_eq!(broken.forced_closes(), 1);
        assert_eq!(healthy.forced_closes(), 1);
    }
}

/// 停机清扫触发的完成回调在锁外执行，可以安全地重入监听器。
#[test]
fn drain_callbacks_may_reenter_the_listener() {
    let listener = Arc::new(started_listener(Arc::new(RecordingAcceptor::new())));
    let observed = Arc::new(AtomicBool::new(false));
    let reentrant = Arc::clone(&listener);
    let flag = Arc::clone(&observed);
    let handle = listener
        .begin_get_context(
            Some(Box::new(move |handle| {
                // 回调重入监听器的锁保护访问器：若回调仍持有锁，这里将死锁。
                assert_eq!(reentrant.pending_waiters(), 0);
                assert!(!reentrant.is_listening());
                assert!(handle.is_completed());
                flag.store(true, Ordering::Release);
            })),
            None,
        )
        .expect("begin must succeed");

    listener.stop().expect("stop must succeed");

    assert!(observed.load(Ordering::Acquire));
    assert!(handle.is_completed());
    assert!(!handle.completed_synchronously());
}

/// 停止后的监听器可以重新启动并恢复完整服务。
#[tokio::test]
async fn listener_is_restartable_after_stop() {
    let acceptor = Arc::new(RecordingAcceptor::new());
    let listener = started_listener(Arc::clone(&acceptor));
    listener.stop().expect("stop must succeed");
    assert!(!listener.register_context(Arc::new(RecordingContext::new(1))));

    listener.start().expect("restart must succeed");
    assert!(listener.register_context(Arc::new(RecordingContext::new(2))));
    let context = listener.get_context().await.expect("context expected");
    assert_eq!(context.id(), 2);
    assert_eq!(acceptor.bind_calls(), 2);
}

/// realm 未配置时监听器暴露历史默认值。
#[test]
fn realm_defaults_to_secret_area() {
    let listener = started_listener(Arc::new(RecordingAcceptor::new()));
    assert_eq!(listener.realm(), DEFAULT_REALM);
    assert_eq!(listener.realm(), "SECRET AREA");
}
