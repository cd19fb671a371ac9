use wicket_core::error::{CoreError, ErrorCategory, codes};

/// “监听器已停止”沿用的历史平台错误号（操作已中止）。
pub(crate) const STOPPED_PLATFORM_CODE: i32 = 995;

/// 构造“监听器已关闭”错误。
pub(crate) fn disposed_error() -> CoreError {
    CoreError::new(codes::LISTENER_DISPOSED, "the listener is closed")
}

/// 构造“监听器未启动”错误（消费者侧前置检查）。
pub(crate) fn not_started_error() -> CoreError {
    CoreError::new(codes::LISTENER_NOT_STARTED, "the listener has not been started")
}

/// 构造“监听器已停止”错误。
///
/// 等待中的消费者在停机清扫中收到该错误；平台错误号固定为 995，
/// 分类为取消，便于调用方与普通失败区分。
pub(crate) fn stopped_error() -> CoreError {
    CoreError::new(codes::LISTENER_STOPPED, "the listener is stopped")
        .with_category(ErrorCategory::Cancelled)
        .with_platform_code(STOPPED_PLATFORM_CODE)
}

/// 构造“未配置 URI 前缀”错误。
pub(crate) fn no_prefix_error() -> CoreError {
    CoreError::new(
        codes::LISTENER_NO_PREFIX,
        "the listener has no uri prefix on which listens",
    )
}

/// 构造“句柄并非本监听器签发”错误。
pub(crate) fn invalid_handle_error() -> CoreError {
    CoreError::new(
        codes::HANDLE_INVALID,
        "the handle was not issued by this listener",
    )
}

/// 构造“句柄已被消费”错误。
pub(crate) fn reused_handle_error() -> CoreError {
    CoreError::new(codes::HANDLE_REUSED, "the handle cannot be reused")
}
