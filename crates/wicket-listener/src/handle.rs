use crate::error::reused_handle_error;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use wicket_core::error::CoreError;

/// 完成回调：句柄完成（拿到上下文或错误）时被调用一次。
///
/// 回调在监听器锁释放之后执行，可以安全地重入监听器。
pub type CompletionCallback<C> = Box<dyn FnOnce(&ContextHandle<C>) + Send + 'static>;

/// 调用方随句柄携带的不透明状态值。
pub type HandleUserState = Arc<dyn Any + Send + Sync>;

/// `ContextHandle` 是“请求一个上下文”与“上下文最终送达”之间的一次性桥梁。
///
/// # 设计背景（Why）
/// - 消费者发起请求时可能没有现成的上下文，核心需要一个可挂起、可回调、
///   恰好完成一次的凭据来衔接两端；
/// - 完成方可能是后续的注册（生产者驱动）、同步的队列命中（消费者驱动）
///   或停机清扫（错误驱动），三者共用同一条完成路径。
///
/// # 契约说明（What）
/// - **恰好一次完成**：Pending → Ready 只发生一次，后续完成尝试是无害空操作；
/// - **恰好一次消费**：结果只能被取走一次，重复消费以稳定错误拒绝；
/// - `completed_synchronously`：仅当完成发生在发起调用内部（队列命中）时为真；
/// - 句柄可克隆，克隆体共享同一份完成状态（等待队列与调用方各持一份）。
///
/// # 执行逻辑（How）
/// - 完成状态由互斥锁保护的三相状态机承载（Pending / Ready / Taken）；
/// - 挂起点采用 `tokio::sync::Notify`：完成方投递许可，消费方循环
///   “检查状态 → 等待通知”，不会丢失唤醒也不会忙等。
///
/// # 风险提示（Trade-offs）
/// - 完成回调从状态机中取出后由完成方在锁外调用，
///   这意味着回调观察到的句柄必然已处于完成态。
pub struct ContextHandle<C> {
    core: Arc<HandleCore<C>>,
}

struct HandleCore<C> {
    listener_id: u64,
    user_state: Option<HandleUserState>,
    notify: Notify,
    slots: Mutex<HandleSlots<C>>,
}

struct HandleSlots<C> {
    phase: CompletionPhase<C>,
    callback: Option<CompletionCallback<C>>,
    completed_synchronously: bool,
    end_called: bool,
}

enum CompletionPhase<C> {
    Pending,
    Ready(Result<Arc<C>, CoreError>),
    Taken,
}

impl<C> ContextHandle<C> {
    pub(crate) fn new(
        listener_id: u64,
        callback: Option<CompletionCallback<C>>,
        user_state: Option<HandleUserState>,
    ) -> Self {
        Self {
            core: Arc::new(HandleCore {
                listener_id,
                user_state,
                notify: Notify::new(),
                slots: Mutex::new(HandleSlots {
                    phase: CompletionPhase::Pending,
                    callback,
                    completed_synchronously: false,
                    end_called: false,
                }),
            }),
        }
    }

    /// 句柄是否已经完成（拿到上下文或错误）。
    pub fn is_completed(&self) -> bool {
        !matches!(self.lock_slots().phase, CompletionPhase::Pending)
    }

    /// 完成是否发生在发起调用内部（队列命中的同步完成）。
    pub fn completed_synchronously(&self) -> bool {
        self.lock_slots().completed_synchronously
    }

    /// 返回调用方携带的不透明状态值。
    pub fn state(&self) -> Option<HandleUserState> {
        self.core.user_state.clone()
    }

    pub(crate) fn listener_id(&self) -> u64 {
        self.core.listener_id
    }

    /// 尝试完成句柄；只有第一次调用会生效。
    ///
    /// # 契约说明（What）
    /// - 返回 `Some(callback)` 表示本次调用赢得了完成权，调用方必须在
    ///   释放监听器锁之后调用该回调；
    /// - 返回 `None` 表示句柄已完成（或未注册回调），本次调用为空操作，
    ///   传入的 `result` 被丢弃。
    pub(crate) fn complete(
        &self,
        result: Result<Arc<C>, CoreError>,
        synchronously: bool,
    ) -> Option<CompletionCallback<C>> {
        let callback = {
            let mut slots = self.lock_slots();
            if !matches!(slots.phase, CompletionPhase::Pending) {
                return None;
            }
            slots.phase = CompletionPhase::Ready(result);
            slots.completed_synchronously = synchronously;
            slots.callback.take()
        };
        self.core.notify.notify_one();
        callback
    }

    /// 标记句柄进入消费流程；第二次调用以“句柄已消费”拒绝。
    pub(crate) fn mark_end_called(&self) -> Result<(), CoreError> {
        let mut slots = self.lock_slots();
        if slots.end_called {
            return Err(reused_handle_error());
        }
        slots.end_called = true;
        Ok(())
    }

    /// 挂起直到句柄完成；已完成时立即返回。
    pub(crate) async fn wait_ready(&self) {
        loop {
            if !matches!(self.lock_slots().phase, CompletionPhase::Pending) {
                return;
            }
            // 完成方通过 notify_one 投递许可；即便许可先于本次等待到达，
            // notified() 也会立即返回，随后循环重新检查状态。
            self.core.notify.notified().await;
        }
    }

    /// 取走完成结果（Ready → Taken）。
    pub(crate) fn take_result(&self) -> Result<Arc<C>, CoreError> {
        let mut slots = self.lock_slots();
        match std::mem::replace(&mut slots.phase, CompletionPhase::Taken) {
            CompletionPhase::Ready(result) => result,
            CompletionPhase::Taken => Err(reused_handle_error()),
            CompletionPhase::Pending => {
                // wait_ready 之后才允许调用；恢复状态并拒绝，避免吞掉完成信号。
                slots.phase = CompletionPhase::Pending;
                Err(reused_handle_error())
            }
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, HandleSlots<C>> {
        match self.core.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<C> Clone for ContextHandle<C> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<C> fmt::Debug for ContextHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHandle")
            .field("listener_id", &self.core.listener_id)
            .field("is_completed", &self.is_completed())
            .finish()
    }
}
