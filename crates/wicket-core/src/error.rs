use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

/// `CoreError` 是监听器核心跨层共享的稳定错误域，所有可观察的失败最终都以它的形态呈现。
///
/// # 设计背景（Why）
/// - 生产者侧（接入器）、消费者侧（取请求的调用方）与停机路径会在不同层次产生失败，
///   需要合流为统一的错误码，日志与告警系统才能执行精确的自动化治理。
/// - 历史实现以平台错误号（如 995 表示“操作已中止”）向调用方表达“监听器已停止”，
///   为了兼容这类调用方，错误体上保留可选的平台错误号通道。
///
/// # 契约说明（What）
/// - `code`：`'static` 稳定字符串，遵循 `<域>.<语义>` 约定（参见 [`codes`]）；
/// - `message`：面向排障人员的自然语言描述，不得包含敏感信息；
/// - `cause`：可选底层原因，经由 `source()` 暴露完整链路；
/// - `category`：粗粒度分类，驱动重试 / 放弃 / 取消等自动化策略；
/// - `platform_code`：可选的历史平台错误号，仅在需要兼容时填充。
///
/// # 设计取舍与风险（Trade-offs）
/// - 使用 `Cow<'static, str>` 保存消息，静态文案零分配，动态文案仅一次堆分配；
/// - 错误体不可 `Clone`（底层原因是 trait object），需要复制语义的调用方应在
///   构造点重新生成错误，而不是共享同一实例。
#[derive(Debug)]
pub struct CoreError {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<Box<dyn StdError + Send + Sync>>,
    category: Option<ErrorCategory>,
    platform_code: Option<i32>,
}

impl CoreError {
    /// 构造核心错误。
    ///
    /// # 契约定义（What）
    /// - **输入**：`code` 必须来自 [`codes`] 模块或遵循 `<域>.<语义>` 约定；
    ///   `message` 可为 `&'static str` 或堆分配字符串。
    /// - **后置条件**：返回的错误不含底层原因、分类与平台错误号，
    ///   由调用方按需通过 `with_*` 方法叠加。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
            category: None,
            platform_code: None,
        }
    }

    /// 附带底层原因并返回新的错误。
    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 标记结构化分类信息，驱动调用方的自动化处置策略。
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// 附带历史平台错误号。
    ///
    /// 监听器在“等待中被停止”的场景沿用 995（操作已中止）以兼容既有调用方，
    /// 其余场景一般不需要设置。
    pub fn with_platform_code(mut self, platform_code: i32) -> Self {
        self.platform_code = Some(platform_code);
        self
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 返回面向排障人员的描述。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 返回底层原因（若有）。
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync)> {
        self.cause.as_deref()
    }

    /// 返回错误分类；未显式标注时回退为 [`ErrorCategory::NonRetryable`]。
    ///
    /// # 契约说明（What）
    /// - 回退语义表示“默认不触发自动化策略”，调用方无须区分“未标注”与
    ///   “显式不可重试”两种来源。
    pub fn category(&self) -> ErrorCategory {
        self.category.unwrap_or(ErrorCategory::NonRetryable)
    }

    /// 返回历史平台错误号（若有）。
    pub fn platform_code(&self) -> Option<i32> {
        self.platform_code
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl StdError for CoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// 错误的粗粒度处置分类。
///
/// # 设计背景（Why）
/// - 将“可以重试 / 不可重试 / 因取消而终止”的判定显式化，
///   避免调用方通过解析错误码字符串推断语义。
///
/// # 契约说明（What）
/// - `Retryable`：瞬态失败，调用方可在退避后重试；
/// - `NonRetryable`：确定性失败，重试不会改变结果；
/// - `Cancelled`：操作因停机或主动取消而终止，重试应先恢复前置状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// 瞬态失败，可重试。
    Retryable,
    /// 确定性失败，不可重试。
    NonRetryable,
    /// 因停机或取消而终止。
    Cancelled,
}

/// 监听器核心的稳定错误码清单。
///
/// # 设计背景（Why）
/// - 错误码是对外契约的一部分：测试、日志治理与跨语言桥接都以码值为锚点，
///   集中定义可防止散落各处的字符串漂移。
///
/// # 契约说明（What）
/// - 所有码值遵循 `wicket.<域>.<语义>` 命名；一经发布不可改动，只能追加。
pub mod codes {
    /// 监听器已被关闭（`close`/`abort`/Drop 之后的任何操作）。
    pub const LISTENER_DISPOSED: &str = "wicket.listener.disposed";
    /// 监听器从未启动或当前处于停止状态（消费者侧前置检查失败）。
    pub const LISTENER_NOT_STARTED: &str = "wicket.listener.not_started";
    /// 监听器在等待期间被停止（历史平台错误号 995）。
    pub const LISTENER_STOPPED: &str = "wicket.listener.stopped";
    /// 监听器未配置任何 URI 前缀。
    pub const LISTENER_NO_PREFIX: &str = "wicket.listener.no_prefix";
    /// 完成句柄并非由当前监听器签发。
    pub const HANDLE_INVALID: &str = "wicket.listener.invalid_handle";
    /// 完成句柄已被消费，不可复用。
    pub const HANDLE_REUSED: &str = "wicket.listener.handle_reused";
    /// URI 前缀非法。
    pub const PREFIX_INVALID: &str = "wicket.prefix.invalid";
    /// 接入器绑定端点失败。
    pub const ACCEPTOR_BIND_FAILED: &str = "wicket.acceptor.bind_failed";
    /// 向客户端写错误响应失败。
    pub const CONTEXT_WRITE_FAILED: &str = "wicket.context.write_failed";
}
