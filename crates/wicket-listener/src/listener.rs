use crate::config::ListenerConfig;
use crate::error::{
    disposed_error, invalid_handle_error, no_prefix_error, not_started_error, stopped_error,
};
use crate::handle::{CompletionCallback, ContextHandle, HandleUserState};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace, warn};
use wicket_core::auth::{AuthenticationScheme, CredentialsFinder};
use wicket_core::contract::{Acceptor, ListenerContext};
use wicket_core::error::CoreError;

/// 进程内单调递增的监听器编号，用于校验句柄的签发方。
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// 优雅停机时回写给未被认领上下文的状态码。
const SERVICE_UNAVAILABLE: u16 = 503;

/// `HttpListener` 是受管 HTTP/WebSocket 服务器的接受与交接核心。
///
/// # 设计背景（Why）
/// - 它坐在“产出入站请求上下文的接入器”与“消费上下文的应用代码”之间，
///   在正常运行与四种停机路径（停止 / 关闭 / 中止 / 析构）下都要保证
///   正确、无锁洞、FIFO 的两侧撮合；
/// - 难点在并发不变量：上下文不丢失、不重复投递、消费者不被永久阻塞，
///   全部由一把粗粒度锁守住。
///
/// # 体系定位（Architecture）
/// - 接入器通过 [`register_context`](Self::register_context) 送入上下文；
/// - 消费者通过 [`get_context`](Self::get_context) /
///   [`begin_get_context`](Self::begin_get_context) +
///   [`end_get_context`](Self::end_get_context) 取出上下文；
/// - 内部维护四个结构：监听 / 关闭两个状态位、在场上下文注册表、
///   未认领上下文队列与等待中消费者队列。
///
/// # 并发契约（How）
/// - 一把互斥锁串行化状态位与三个集合的全部变更；
///   临界区只做队列变更与完成状态赋值，从不做网络 IO；
/// - 完成回调与接入器解绑都推迟到锁释放之后执行，
///   回调因此可以安全地重入监听器；
/// - 两个队列满足二部互斥：任一时刻至多一个非空——注册总是先满足
///   最老的等待者，请求总是先消费最老的排队上下文。
///
/// # 风险提示（Trade-offs）
/// - `bind` 在锁内调用以保证“绑定成功 ⇔ 进入监听态”的原子性，
///   接入器实现必须保持绑定为注册性轻操作；
/// - 等待中的请求没有超时与取消：只有匹配的注册或停机清扫能解除等待。
pub struct HttpListener<C: ListenerContext> {
    id: u64,
    config: ListenerConfig<C>,
    acceptor: Arc<dyn Acceptor>,
    listening: AtomicBool,
    disposed: AtomicBool,
    sync: Mutex<ListenerSync<C>>,
}

/// 注册表与双队列：仅在持有监听器锁时可变。
struct ListenerSync<C> {
    registry: Vec<Arc<C>>,
    context_queue: VecDeque<Arc<C>>,
    wait_queue: VecDeque<ContextHandle<C>>,
}

/// 停机清扫交给等待者的失败种类。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WaiterFailure {
    /// 停止（可重启）：历史平台错误号 995。
    Stopped,
    /// 关闭 / 中止（终态）。
    Disposed,
}

impl WaiterFailure {
    fn to_error(self) -> CoreError {
        match self {
            Self::Stopped => stopped_error(),
            Self::Disposed => disposed_error(),
        }
    }
}

/// 推迟到锁外执行的完成回调及其句柄。
type Finisher<C> = (ContextHandle<C>, CompletionCallback<C>);

impl<C: ListenerContext> HttpListener<C> {
    /// 以配置与注入的接入器构造监听器；初始为“未监听、未关闭”。
    pub fn new(config: ListenerConfig<C>, acceptor: Arc<dyn Acceptor>) -> Self {
        Self {
            id: NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed),
            config,
            acceptor,
            listening: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            sync: Mutex::new(ListenerSync {
                registry: Vec::new(),
                context_queue: VecDeque::new(),
                wait_queue: VecDeque::new(),
            }),
        }
    }

    /// 开始接收入站请求。
    ///
    /// # 契约说明（What）
    /// - 已在监听时为无害空操作；
    /// - 绑定失败时错误原样上抛，监听器保持未启动，可修正后重试；
    /// - 关闭后调用以“已关闭”拒绝。
    pub fn start(&self) -> Result<(), CoreError> {
        self.ensure_not_disposed()?;
        if self.listening.load(Ordering::Acquire) {
            return Ok(());
        }

        let guard = self.lock_sync();
        self.ensure_not_disposed()?;
        if self.listening.load(Ordering::Acquire) {
            return Ok(());
        }

        self.acceptor.bind(self.config.prefixes())?;
        self.listening.store(true, Ordering::Release);
        drop(guard);

        debug!(listener_id = self.id, "listener started");
        Ok(())
    }

    /// 停止接收入站请求并执行优雅清扫；监听器可再次启动。
    ///
    /// # 执行逻辑（How）
    /// 1. 锁内将监听位清零，随后按顺序执行三段清扫：
    ///    未认领队列（回写 503）→ 注册表（强制断开）→ 等待队列（995 完成）；
    /// 2. 锁外解绑接入器并调用等待者的完成回调。
    pub fn stop(&self) -> Result<(), CoreError> {
        self.ensure_not_disposed()?;
        if !self.listening.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut finishers = Vec::new();
        {
            let mut sync = self.lock_sync();
            if !self.listening.load(Ordering::Acquire) {
                return Ok(());
            }
            self.listening.store(false, Ordering::Release);
            self.drain_locked(&mut sync, false, WaiterFailure::Stopped, &mut finishers);
        }

        self.acceptor.unbind(self.config.prefixes());
        debug!(listener_id = self.id, "listener stopped");
        Self::finish(finishers);
        Ok(())
    }

    /// 停止并关闭监听器（优雅清扫）；终态，幂等。
    pub fn close(&self) {
        self.close_internal(false);
    }

    /// 立即中止监听器（强制清扫，未认领上下文不回写任何响应）；终态，幂等。
    pub fn abort(&self) {
        self.close_internal(true);
    }

    /// 注册一个新到达的上下文（生产者入口）。
    ///
    /// # 契约说明（What）
    /// - 返回 `false` 表示监听器未在监听，上下文被拒收，
    ///   其善后由接入器自行负责——这是双方契约，不是核心职责；
    /// - 返回 `true` 表示上下文已被跟踪：要么立即交付最老的等待者
    ///   （异步完成），要么进入未认领队列尾部。
    ///
    /// 本方法从不失败，竞态下的二次检查在锁内完成。
    pub fn register_context(&self, context: Arc<C>) -> bool {
        if !self.listening.load(Ordering::Acquire) {
            return false;
        }

        let finisher;
        {
            let mut sync = self.lock_sync();
            if !self.listening.load(Ordering::Acquire) {
                return false;
            }

            sync.registry.push(Arc::clone(&context));
            finisher = match sync.wait_queue.pop_front() {
                Some(handle) => handle
                    .complete(Ok(context), false)
                    .map(|callback| (handle, callback)),
                None => {
                    sync.context_queue.push_back(context);
                    None
                }
            };
            debug_assert!(sync.context_queue.is_empty() || sync.wait_queue.is_empty());
        }

        if let Some((handle, callback)) = finisher {
            callback(&handle);
        }
        true
    }

    /// 将上下文从注册表移除（消费者宣告请求生命周期结束）。
    ///
    /// 已被停机清扫移除时为无害空操作。
    pub fn unregister_context(&self, context: &Arc<C>) {
        let mut sync = self.lock_sync();
        sync.registry.retain(|entry| !Arc::ptr_eq(entry, context));
    }

    /// 异步发起“取一个上下文”的请求（消费者入口）。
    ///
    /// # 契约说明（What）
    /// - 前置校验在取锁之前完成：必须配置过前缀、必须处于监听态；
    /// - 锁内与并发停止竞争的再检查失败时，以与停机清扫同类的
    ///   “已停止”错误拒绝，而不是返回一个活句柄；
    /// - 队列命中时句柄立即完成（`completed_synchronously = true`），
    ///   注册的回调在本调用返回前、锁释放后执行；
    /// - 否则句柄进入等待队列尾部，由后续注册或停机清扫完成。
    pub fn begin_get_context(
        &self,
        callback: Option<CompletionCallback<C>>,
        state: Option<HandleUserState>,
    ) -> Result<ContextHandle<C>, CoreError> {
        self.ensure_not_disposed()?;
        if self.config.prefixes().is_empty() {
            return Err(no_prefix_error());
        }
        if !self.listening.load(Ordering::Acquire) {
            return Err(not_started_error());
        }

        let handle = ContextHandle::new(self.id, callback, state);
        let finisher;
        {
            let mut sync = self.lock_sync();
            if !self.listening.load(Ordering::Acquire) {
                return Err(stopped_error());
            }

            finisher = match sync.context_queue.pop_front() {
                Some(context) => handle.complete(Ok(context), true),
                None => {
                    sync.wait_queue.push_back(handle.clone());
                    None
                }
            };
            debug_assert!(sync.context_queue.is_empty() || sync.wait_queue.is_empty());
        }

        if let Some(callback) = finisher {
            callback(&handle);
        }
        Ok(handle)
    }

    /// 消费一个完成句柄，取回上下文或重抛完成错误。
    ///
    /// # 契约说明（What）
    /// - 句柄必须由本监听器签发（否则“无效句柄”）、且未被消费过
    ///   （否则“句柄已消费”）；
    /// - 未完成时在此挂起；唯一的解除路径是匹配的注册或停机清扫。
    pub async fn end_get_context(&self, handle: &ContextHandle<C>) -> Result<Arc<C>, CoreError> {
        self.ensure_not_disposed()?;
        if handle.listener_id() != self.id {
            return Err(invalid_handle_error());
        }
        handle.mark_end_called()?;

        handle.wait_ready().await;
        handle.take_result()
    }

    /// 取一个上下文的便捷组合：发起请求并立即消费。
    pub async fn get_context(&self) -> Result<Arc<C>, CoreError> {
        self.ensure_not_disposed()?;
        if self.config.prefixes().is_empty() {
            return Err(no_prefix_error());
        }
        if !self.listening.load(Ordering::Acquire) {
            return Err(not_started_error());
        }

        let handle = self.begin_get_context(None, None)?;
        self.end_get_context(&handle).await
    }

    /// 为一个请求裁决生效的认证方案。
    ///
    /// # 契约说明（What）
    /// - 未配置选择器时统一使用默认方案；
    /// - 选择器失败时收敛到 [`AuthenticationScheme::None`]（失败即拒绝），
    ///   并以 WARN 日志留痕；
    /// - 关闭后调用以“已关闭”拒绝。
    pub fn select_authentication_scheme(
        &self,
        context: &C,
    ) -> Result<AuthenticationScheme, CoreError> {
        self.ensure_not_disposed()?;
        let Some(selector) = self.config.scheme_selector() else {
            return Ok(self.config.auth_scheme());
        };

        match selector(context) {
            Ok(scheme) => Ok(scheme),
            Err(error) => {
                warn!(
                    listener_id = self.id,
                    code = error.code(),
                    "authentication scheme selector failed; downgrading to `none`"
                );
                Ok(AuthenticationScheme::None)
            }
        }
    }

    /// 返回生效的认证质询域名。
    pub fn realm(&self) -> &str {
        self.config.realm()
    }

    /// 返回凭据查找器（若有）。
    pub fn credentials_finder(&self) -> Option<Arc<CredentialsFinder>> {
        self.config.credentials_finder()
    }

    /// 返回监听器配置。
    pub fn config(&self) -> &ListenerConfig<C> {
        &self.config
    }

    /// 是否处于监听态。
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    /// 是否已关闭。
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// 未认领上下文队列的长度（诊断用）。
    pub fn queued_contexts(&self) -> usize {
        self.lock_sync().context_queue.len()
    }

    /// 等待中消费者队列的长度（诊断用）。
    pub fn pending_waiters(&self) -> usize {
        self.lock_sync().wait_queue.len()
    }

    /// 注册表中在场上下文的数量（诊断用）。
    pub fn registered_contexts(&self) -> usize {
        self.lock_sync().registry.len()
    }

    /// 关闭 / 中止共用的终态路径；幂等，从不失败。
    fn close_internal(&self, force: bool) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }

        let mut finishers = Vec::new();
        let was_listening;
        {
            let mut sync = self.lock_sync();
            if self.disposed.load(Ordering::Acquire) {
                return;
            }

            was_listening = self.listening.load(Ordering::Acquire);
            if was_listening {
                self.listening.store(false, Ordering::Release);
                self.drain_locked(&mut sync, force, WaiterFailure::Disposed, &mut finishers);
            }
            self.disposed.store(true, Ordering::Release);
        }

        if was_listening {
            self.acceptor.unbind(self.config.prefixes());
        }
        debug!(listener_id = self.id, force, "listener closed");
        Self::finish(finishers);
    }

    /// 停机清扫。顺序必须保持：未认领队列 → 注册表 → 等待队列，
    /// 注册表清扫兜底关闭所有在场上下文（含刚回写过 503 的）。
    fn drain_locked(
        &self,
        sync: &mut ListenerSync<C>,
        force: bool,
        failure: WaiterFailure,
        finishers: &mut Vec<Finisher<C>>,
    ) {
        let parked: Vec<Arc<C>> = sync.context_queue.drain(..).collect();
        if !force {
            for context in &parked {
                context.set_error_status(SERVICE_UNAVAILABLE);
                if let Err(error) = context.send_error() {
                    if self.config.ignore_write_errors() {
                        trace!(
                            listener_id = self.id,
                            code = error.code(),
                            "error response dropped during drain"
                        );
                    } else {
                        warn!(
                            listener_id = self.id,
                            code = error.code(),
                            "failed to send error response during drain"
                        );
                    }
                }
            }
        }

        let registered = sync.registry.len();
        for context in sync.registry.drain(..) {
            context.close(true);
        }

        let waiting = sync.wait_queue.len();
        for handle in sync.wait_queue.drain(..) {
            if let Some(callback) = handle.complete(Err(failure.to_error()), false) {
                finishers.push((handle, callback));
            }
        }

        debug!(
            listener_id = self.id,
            parked = parked.len(),
            registered,
            waiting,
            force,
            "listener drained"
        );
    }

    /// 在锁外执行推迟的完成回调。
    fn finish(finishers: Vec<Finisher<C>>) {
        for (handle, callback) in finishers {
            callback(&handle);
        }
    }

    fn ensure_not_disposed(&self) -> Result<(), CoreError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(disposed_error());
        }
        Ok(())
    }

    fn lock_sync(&self) -> MutexGuard<'_, ListenerSync<C>> {
        match self.sync.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// 析构等价于中止：强制清扫，不回写任何响应。
impl<C: ListenerContext> Drop for HttpListener<C> {
    fn drop(&mut self) {
        self.close_internal(true);
    }
}
