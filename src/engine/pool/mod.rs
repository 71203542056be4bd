//! ### English
//! Worker-thread pool: lends out long-lived worker threads, takes them back, and reuses them so
//! that each thread keeps its (expensive) GPU context across leases.
//!
//! ### 中文
//! 工作线程池：出借长期存活的工作线程、回收并复用它们，使每个线程在多次租约之间保留其（昂贵的）GPU 上下文。

mod config;
mod handle;

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::ThreadId;

use crate::engine::error::{PoolError, PoolResult};
use crate::engine::worker::{
    Affinity, Completion, StateFactory, Task, WorkerInfo, WorkerThread,
};

pub use config::PoolConfig;
pub use handle::WorkerHandle;

/// ### English
/// Pool-side lifecycle of one worker. `Releasing` is not tracked here: once the release callback
/// is queued the worker is `Idle` and leasable, and FIFO order keeps the next lease behind it.
///
/// ### 中文
/// 单个工作线程在线程池侧的生命周期。`Releasing` 不在此跟踪：release 回调入队后工作线程即为 `Idle`
/// 且可再次出借，FIFO 顺序保证下一次租约排在它之后。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Leased,
    Retired,
}

struct WorkerEntry<S> {
    worker: WorkerThread<S>,
    /// ### English
    /// Generation of the current (or most recent) lease.
    ///
    /// ### 中文
    /// 当前（或最近一次）租约的代数。
    generation: u32,
    state: WorkerState,
}

struct PoolInner<S> {
    /// ### English
    /// Arena of every worker this pool ever created, indexed by `WorkerHandle::index`.
    ///
    /// ### 中文
    /// 本线程池创建过的所有工作线程的 arena，以 `WorkerHandle::index` 索引。
    entries: Vec<WorkerEntry<S>>,
    /// ### English
    /// LIFO stack of idle entry indices.
    ///
    /// ### 中文
    /// 空闲条目索引的 LIFO 栈。
    idle: Vec<u32>,
    shut_down: bool,
}

impl<S> PoolInner<S> {
    fn live_workers(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.state != WorkerState::Retired)
            .count()
    }

    fn leased_entry_mut(&mut self, handle: WorkerHandle) -> PoolResult<&mut WorkerEntry<S>> {
        if self.shut_down {
            return Err(PoolError::ShutDown);
        }
        match self.entries.get_mut(handle.index() as usize) {
            Some(entry)
                if entry.state == WorkerState::Leased
                    && entry.generation == handle.generation() =>
            {
                Ok(entry)
            }
            _ => Err(PoolError::NotLeased {
                index: handle.index(),
                generation: handle.generation(),
            }),
        }
    }
}

/// ### English
/// Identity of the worker behind a lease.
///
/// ### 中文
/// 租约背后工作线程的身份。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerIdentity {
    pub name: String,
    pub affinity: Affinity,
    pub ordinal: usize,
    pub thread_id: ThreadId,
}

/// ### English
/// Snapshot of pool membership.
///
/// ### 中文
/// 线程池成员状态快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub leased: usize,
    pub retired: usize,
    /// ### English
    /// Live workers tagged `Affinity::Odd`.
    ///
    /// ### 中文
    /// 标记为 `Affinity::Odd` 的存活工作线程数。
    pub odd: usize,
    pub even: usize,
}

impl PoolStats {
    pub fn live(&self) -> usize {
        self.idle + self.leased
    }
}

/// ### English
/// Grow-on-demand pool of worker threads.
///
/// One mutex guards pool membership (the idle stack), the working flags and lease validation.
/// It is never held while a task runs; task execution is serialized per worker by construction.
///
/// ### 中文
/// 按需增长的工作线程池。
///
/// 一把互斥锁保护线程池成员（空闲栈）、工作标记与租约校验；任务执行期间从不持有该锁，
/// 任务执行按工作线程天然串行化。
pub struct ThreadPool<S: 'static> {
    config: PoolConfig,
    make_state: StateFactory<S>,
    inner: Mutex<PoolInner<S>>,
}

impl<S: 'static> ThreadPool<S> {
    /// ### English
    /// Creates an empty pool. No thread is spawned until the first `acquire`.
    ///
    /// #### Parameters
    /// - `config`: Pool configuration.
    /// - `make_state`: Builds each worker's thread state, on that worker's thread.
    ///
    /// ### 中文
    /// 创建一个空线程池。首次 `acquire` 之前不会创建任何线程。
    ///
    /// #### 参数
    /// - `config`：线程池配置。
    /// - `make_state`：在各工作线程自身上构建其线程状态。
    pub fn new(
        config: PoolConfig,
        make_state: impl Fn(&WorkerInfo) -> S + Send + Sync + 'static,
    ) -> Self {
        tracing::info!(
            prefix = %config.thread_name_prefix,
            max_threads = config.max_threads.map(|cap| cap.get()),
            "created worker pool"
        );
        Self {
            config,
            make_state: Arc::new(make_state),
            inner: Mutex::new(PoolInner {
                entries: Vec::new(),
                idle: Vec::new(),
                shut_down: false,
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner<S>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("worker pool mutex was poisoned; recovering");
            poisoned.into_inner()
        })
    }

    /// ### English
    /// Leases a worker: pops the most recently released idle worker, or spawns a new one when the
    /// idle stack is empty. `on_acquire` is queued as the first task of the lease.
    ///
    /// Never waits on other work. Fails only when a configured cap is reached, the OS refuses a
    /// new thread, or the pool is shut down.
    ///
    /// #### Parameters
    /// - `name`: Name for the lease (and for the worker, if one is created).
    /// - `on_acquire`: First task of the lease.
    ///
    /// ### 中文
    /// 租用一个工作线程：弹出最近释放的空闲工作线程；空闲栈为空时创建新线程。`on_acquire` 作为本次租约的第一个任务入队。
    ///
    /// 从不等待其他工作。仅在达到配置上限、系统拒绝创建线程或线程池已关闭时失败。
    ///
    /// #### 参数
    /// - `name`：租约名（若创建新工作线程，也作为其名字）。
    /// - `on_acquire`：本次租约的第一个任务。
    pub fn acquire(
        &self,
        name: &str,
        on_acquire: impl FnOnce(&mut S) + Send + 'static,
    ) -> PoolResult<WorkerHandle> {
        let mut inner = self.lock();
        if inner.shut_down {
            return Err(PoolError::ShutDown);
        }

        let index = match inner.idle.pop() {
            Some(index) => index,
            None => self.spawn_worker(&mut inner, name)?,
        };

        let entry = &mut inner.entries[index as usize];
        debug_assert_eq!(entry.state, WorkerState::Idle);
        entry.generation = handle::next_generation(entry.generation);
        entry.state = WorkerState::Leased;
        let handle = WorkerHandle::new(index, entry.generation);

        if let Err(err) = entry.worker.set_is_working(true, Some(Task::new(on_acquire))) {
            entry.state = WorkerState::Retired;
            tracing::error!(worker = %entry.worker.name(), index, "leased worker is gone: {err}");
            return Err(err);
        }

        tracing::debug!(
            lease = name,
            worker = %entry.worker.name(),
            index,
            generation = handle.generation(),
            "acquired worker"
        );
        Ok(handle)
    }

    fn spawn_worker(&self, inner: &mut PoolInner<S>, name: &str) -> PoolResult<u32> {
        if let Some(cap) = self.config.max_threads {
            if inner.live_workers() >= cap.get() {
                return Err(PoolError::Exhausted { cap: cap.get() });
            }
        }

        let ordinal = inner.entries.len();
        let index = u32::try_from(ordinal).map_err(|_| PoolError::Exhausted {
            cap: u32::MAX as usize,
        })?;
        let info = WorkerInfo {
            name: name.to_string(),
            affinity: Affinity::for_ordinal(ordinal),
            ordinal,
        };
        let worker = WorkerThread::spawn(
            info,
            self.config.thread_name(ordinal),
            self.config.stack_size,
            self.make_state.clone(),
        )?;

        inner.entries.push(WorkerEntry {
            worker,
            generation: 0,
            state: WorkerState::Idle,
        });
        Ok(index)
    }

    /// ### English
    /// Ends a lease: queues `on_release` behind the lease's pending tasks, invalidates `handle`,
    /// and pushes the worker back onto the idle stack right away.
    ///
    /// The worker may be leased again while `on_release` is still pending; anything the next
    /// lessee queues runs after it, so `on_release` must leave the thread state quiescent
    /// (no bound surface, no pending frame).
    ///
    /// Releasing a handle that is not currently leased (stale or double release) is rejected with
    /// `NotLeased` and leaves the pool untouched.
    ///
    /// ### 中文
    /// 结束一次租约：将 `on_release` 排在本次租约待执行任务之后，使 `handle` 失效，并立即把工作线程压回空闲栈。
    ///
    /// `on_release` 仍待执行时工作线程就可能被再次租用；下一个租用者入队的任务都在它之后执行，
    /// 因此 `on_release` 必须让线程状态回到静止（无绑定 surface、无待处理帧）。
    ///
    /// 释放一个当前未被租用的句柄（过期或重复释放）会以 `NotLeased` 拒绝，线程池状态不变。
    pub fn release(
        &self,
        handle: WorkerHandle,
        on_release: impl FnOnce(&mut S) + Send + 'static,
    ) -> PoolResult<()> {
        let mut inner = self.lock();
        let entry = match inner.leased_entry_mut(handle) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::error!(
                    index = handle.index(),
                    generation = handle.generation(),
                    "rejected release: {err}"
                );
                return Err(err);
            }
        };

        if let Err(err) = entry.worker.set_is_working(false, Some(Task::new(on_release))) {
            entry.state = WorkerState::Retired;
            tracing::error!(worker = %entry.worker.name(), "released worker is gone: {err}");
            return Err(err);
        }
        entry.state = WorkerState::Idle;
        tracing::debug!(
            worker = %entry.worker.name(),
            index = handle.index(),
            generation = handle.generation(),
            "released worker"
        );
        inner.idle.push(handle.index());
        Ok(())
    }

    /// ### English
    /// Queues `task` on the leased worker. Fire-and-forget: the caller never waits.
    ///
    /// Validation and enqueue happen under the pool lock, so a task sent through a handle that
    /// is being released lands before the release callback or is rejected; it can never run
    /// inside the next lease.
    ///
    /// ### 中文
    /// 将 `task` 入队到被租用的工作线程。发后即忘：调用方从不等待。
    ///
    /// 校验与入队都在线程池锁内完成，因此通过正在被释放的句柄发送的任务要么排在 release 回调之前，
    /// 要么被拒绝；绝不会在下一次租约中执行。
    pub fn queue(
        &self,
        handle: WorkerHandle,
        task: impl FnOnce(&mut S) + Send + 'static,
    ) -> PoolResult<()> {
        let mut inner = self.lock();
        let entry = inner.leased_entry_mut(handle)?;
        entry.worker.queue(Task::new(task))
    }

    /// ### English
    /// Queues `task` and returns a [`Completion`] for its result.
    ///
    /// ### 中文
    /// 将 `task` 入队并返回其结果的 [`Completion`]。
    pub fn submit<R: Send + 'static>(
        &self,
        handle: WorkerHandle,
        task: impl FnOnce(&mut S) -> R + Send + 'static,
    ) -> PoolResult<Completion<R>> {
        let (response, completion) = Completion::channel();
        self.queue(handle, move |state| {
            let _ = response.send(task(state));
        })?;
        Ok(completion)
    }

    /// ### English
    /// Identity of the worker behind `handle`.
    ///
    /// ### 中文
    /// `handle` 背后工作线程的身份。
    pub fn identity(&self, handle: WorkerHandle) -> PoolResult<WorkerIdentity> {
        let mut inner = self.lock();
        let entry = inner.leased_entry_mut(handle)?;
        let info = entry.worker.info();
        Ok(WorkerIdentity {
            name: info.name.clone(),
            affinity: info.affinity,
            ordinal: info.ordinal,
            thread_id: entry.worker.thread_id(),
        })
    }

    pub fn is_leased(&self, handle: WorkerHandle) -> bool {
        self.lock().leased_entry_mut(handle).is_ok()
    }

    pub fn stats(&self) -> PoolStats {
        let inner = self.lock();
        let mut stats = PoolStats::default();
        for entry in &inner.entries {
            match entry.state {
                WorkerState::Idle => stats.idle += 1,
                WorkerState::Leased => stats.leased += 1,
                WorkerState::Retired => {
                    stats.retired += 1;
                    continue;
                }
            }
            match entry.worker.affinity() {
                Affinity::Odd => stats.odd += 1,
                Affinity::Even => stats.even += 1,
            }
        }
        stats
    }

    /// ### English
    /// Retires every worker: each one drains its queue (nothing is purged), destroys its thread
    /// state on its own thread, and is joined. Outstanding handles become invalid. Idempotent;
    /// also runs on drop.
    ///
    /// A long-running task delays this call by its full duration.
    ///
    /// ### 中文
    /// 退役所有工作线程：各自 drain 队列（不丢弃任何任务）、在自身线程上销毁线程状态，然后被 join。
    /// 未归还的句柄全部失效。幂等；drop 时也会执行。
    ///
    /// 长时间运行的任务会使本调用延迟相应时长。
    pub fn shutdown(&self) {
        let mut workers: Vec<WorkerThread<S>> = {
            let mut inner = self.lock();
            if inner.shut_down {
                return;
            }
            inner.shut_down = true;
            inner.idle.clear();
            inner.entries.drain(..).map(|entry| entry.worker).collect()
        };

        tracing::info!(workers = workers.len(), "shutting down worker pool");
        for worker in &mut workers {
            worker.terminate();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }
}

impl<S: 'static> Drop for ThreadPool<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pool() -> ThreadPool<Vec<u32>> {
        ThreadPool::new(PoolConfig::default(), |_| Vec::new())
    }

    #[test]
    fn first_acquire_spawns_even_then_odd() {
        let pool = pool();
        let a = pool.acquire("a", |_| {}).unwrap();
        let b = pool.acquire("b", |_| {}).unwrap();
        assert_eq!(pool.identity(a).unwrap().affinity, Affinity::Even);
        assert_eq!(pool.identity(b).unwrap().affinity, Affinity::Odd);
        let stats = pool.stats();
        assert_eq!((stats.leased, stats.idle, stats.odd, stats.even), (2, 0, 1, 1));
    }

    #[test]
    fn idle_stack_is_lifo() {
        let pool = pool();
        let a = pool.acquire("a", |_| {}).unwrap();
        let b = pool.acquire("b", |_| {}).unwrap();
        pool.release(a, |_| {}).unwrap();
        pool.release(b, |_| {}).unwrap();

        let next = pool.acquire("c", |_| {}).unwrap();
        assert_eq!(next.index(), b.index());
        assert_ne!(next.generation(), b.generation());
    }

    #[test]
    fn stale_handle_is_rejected_everywhere() {
        let pool = pool();
        let a = pool.acquire("a", |_| {}).unwrap();
        pool.release(a, |_| {}).unwrap();

        assert!(matches!(
            pool.release(a, |_| {}),
            Err(PoolError::NotLeased { .. })
        ));
        assert!(matches!(pool.queue(a, |_| {}), Err(PoolError::NotLeased { .. })));
        assert!(!pool.is_leased(a));
        assert_eq!(pool.stats().idle, 1);
    }

    #[test]
    fn forged_handle_is_rejected() {
        let pool = pool();
        let _a = pool.acquire("a", |_| {}).unwrap();
        assert!(matches!(
            pool.queue(WorkerHandle::from_raw(9, 1), |_| {}),
            Err(PoolError::NotLeased { index: 9, .. })
        ));
    }

    #[test]
    fn cap_is_enforced_but_idle_workers_are_reused() {
        let pool = ThreadPool::new(PoolConfig::default().with_max_threads(1), |_| ());
        let a = pool.acquire("a", |_| {}).unwrap();
        assert!(matches!(
            pool.acquire("b", |_| {}),
            Err(PoolError::Exhausted { cap: 1 })
        ));
        pool.release(a, |_| {}).unwrap();
        assert!(pool.acquire("b", |_| {}).is_ok());
    }

    #[test]
    fn submit_returns_the_task_result() {
        let pool = pool();
        let a = pool.acquire("a", |log| log.push(7)).unwrap();
        let len = pool
            .submit(a, |log| log.len())
            .unwrap()
            .wait_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(len, 1);
    }

    #[test]
    fn shutdown_invalidates_handles() {
        let pool = pool();
        let a = pool.acquire("a", |_| {}).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert!(pool.is_shut_down());
        assert!(matches!(pool.queue(a, |_| {}), Err(PoolError::ShutDown)));
        assert!(matches!(pool.acquire("b", |_| {}), Err(PoolError::ShutDown)));
        assert_eq!(pool.stats(), PoolStats::default());
    }
}
