//! ### English
//! Task payloads carried over a worker's queue.
//!
//! ### 中文
//! 工作线程队列中传递的任务载荷。

use std::time::Duration;

use crossbeam_channel as channel;

use crate::engine::error::{PoolError, PoolResult};

/// ### English
/// One unit of work for a worker thread.
///
/// The closure owns everything it captured; it receives exclusive access to the worker's thread
/// state (and so to its GPU context) while it runs.
///
/// ### 中文
/// 工作线程的一个工作单元。
///
/// 闭包持有其捕获的所有数据；执行期间独占访问工作线程的线程状态（及其 GPU 上下文）。
pub struct Task<S> {
    run: Box<dyn FnOnce(&mut S) + Send + 'static>,
}

impl<S> Task<S> {
    pub fn new(run: impl FnOnce(&mut S) + Send + 'static) -> Self {
        Self { run: Box::new(run) }
    }

    pub(crate) fn run(self, state: &mut S) {
        (self.run)(state)
    }
}

/// ### English
/// Messages consumed by the worker loop.
///
/// ### 中文
/// 工作线程循环消费的消息。
pub(crate) enum Message<S> {
    /// ### English
    /// Runs one task.
    ///
    /// ### 中文
    /// 执行一个任务。
    Run(Task<S>),
    /// ### English
    /// Retires the worker. Queued before it means drained before it.
    ///
    /// ### 中文
    /// 退役该工作线程。排在它之前的任务都会先被执行完。
    Terminate,
}

/// ### English
/// Receiving side of a task that produces a value (see `ThreadPool::submit`).
///
/// ### 中文
/// 产出返回值的任务的接收端（见 `ThreadPool::submit`）。
pub struct Completion<R> {
    response: channel::Receiver<R>,
}

impl<R> Completion<R> {
    pub(crate) fn channel() -> (channel::Sender<R>, Self) {
        let (tx, rx) = channel::bounded(1);
        (tx, Self { response: rx })
    }

    /// ### English
    /// Blocks until the task has run. Fails with `Disconnected` if the task was dropped without
    /// producing a value (it panicked, or the worker retired first).
    ///
    /// ### 中文
    /// 阻塞直到任务执行完毕。若任务未产出值就被丢弃（panic 或工作线程先退役），返回 `Disconnected`。
    pub fn wait(self) -> PoolResult<R> {
        self.response.recv().map_err(|_| PoolError::Disconnected)
    }

    /// ### English
    /// Like [`Self::wait`], bounded by `timeout`.
    ///
    /// ### 中文
    /// 与 [`Self::wait`] 相同，但最多等待 `timeout`。
    pub fn wait_timeout(self, timeout: Duration) -> PoolResult<R> {
        self.response.recv_timeout(timeout).map_err(|err| match err {
            channel::RecvTimeoutError::Timeout => PoolError::Timeout(timeout),
            channel::RecvTimeoutError::Disconnected => PoolError::Disconnected,
        })
    }

    /// ### English
    /// Non-blocking poll.
    ///
    /// ### 中文
    /// 非阻塞轮询。
    pub fn try_take(&self) -> Option<R> {
        self.response.try_recv().ok()
    }
}
