//! ### English
//! Dedicated worker threads. Each one owns a private FIFO queue and a thread state that never
//! leaves the thread (GPU contexts cannot migrate between OS threads).
//!
//! ### 中文
//! 独立工作线程。每个线程持有私有 FIFO 队列，以及永不离开该线程的线程状态
//!（GPU 上下文无法在 OS 线程之间迁移）。

mod task;

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel as channel;

use crate::engine::error::{PoolError, PoolResult};

pub use task::{Completion, Task};
pub(crate) use task::Message;

/// ### English
/// Coarse load-distribution tag assigned once, at creation, from the pool's creation counter.
///
/// ### 中文
/// 粗粒度的负载分配标签；创建时根据线程池的创建计数器分配一次。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Affinity {
    Even,
    Odd,
}

impl Affinity {
    pub fn for_ordinal(ordinal: usize) -> Self {
        if ordinal % 2 == 0 {
            Self::Even
        } else {
            Self::Odd
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Even => "even",
            Self::Odd => "odd",
        }
    }
}

/// ### English
/// Identity of a worker, handed to the thread-state factory on the worker thread.
///
/// ### 中文
/// 工作线程的身份信息；在工作线程上传给线程状态工厂。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerInfo {
    /// ### English
    /// Name given by the acquirer that caused this worker to be created.
    ///
    /// ### 中文
    /// 触发创建该工作线程的获取方给出的名字。
    pub name: String,
    pub affinity: Affinity,
    /// ### English
    /// Creation order within the owning pool (0-based).
    ///
    /// ### 中文
    /// 在所属线程池中的创建序号（从 0 开始）。
    pub ordinal: usize,
}

/// ### English
/// Factory that builds a worker's thread state. Runs on the worker thread itself, so the state
/// does not need to be `Send`.
///
/// ### 中文
/// 构建工作线程状态的工厂。在工作线程自身上执行，因此状态无需实现 `Send`。
pub type StateFactory<S> = Arc<dyn Fn(&WorkerInfo) -> S + Send + Sync>;

#[derive(Default)]
struct WorkerCounters {
    queued: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// ### English
/// A long-lived OS thread that executes queued tasks one at a time, in submission order.
///
/// The `is_working` flag is lease bookkeeping set by the pool; mutual exclusion comes from the
/// fact that only this thread ever pops from its queue.
///
/// ### 中文
/// 长期存活的 OS 线程，按提交顺序逐个执行队列中的任务。
///
/// `is_working` 标记是线程池设置的租约簿记；互斥来自“只有该线程会从自己的队列中取任务”这一结构。
pub struct WorkerThread<S> {
    info: WorkerInfo,
    /// ### English
    /// Producer side of the worker's unbounded FIFO.
    ///
    /// ### 中文
    /// 工作线程无界 FIFO 的生产端。
    sender: channel::Sender<Message<S>>,
    /// ### English
    /// Join handle; `None` once the worker has been retired.
    ///
    /// ### 中文
    /// join handle；工作线程退役后为 `None`。
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
    is_working: bool,
    counters: Arc<WorkerCounters>,
}

impl<S: 'static> WorkerThread<S> {
    /// ### English
    /// Spawns the OS thread. The thread state is built by `make_state` on the new thread before
    /// the first task runs; this call itself does not wait for it.
    ///
    /// #### Parameters
    /// - `info`: Worker identity.
    /// - `thread_name`: OS-level thread name.
    /// - `stack_size`: Optional stack size override.
    /// - `make_state`: Thread-state factory.
    ///
    /// ### 中文
    /// 创建 OS 线程。线程状态由 `make_state` 在新线程上、首个任务执行之前构建；本调用不会等待它。
    ///
    /// #### 参数
    /// - `info`：工作线程身份。
    /// - `thread_name`：OS 层面的线程名。
    /// - `stack_size`：可选的栈大小覆盖。
    /// - `make_state`：线程状态工厂。
    pub fn spawn(
        info: WorkerInfo,
        thread_name: String,
        stack_size: Option<usize>,
        make_state: StateFactory<S>,
    ) -> io::Result<Self> {
        let (sender, receiver) = channel::unbounded::<Message<S>>();
        let counters = Arc::new(WorkerCounters::default());

        let mut builder = thread::Builder::new().name(thread_name);
        if let Some(stack_size) = stack_size {
            builder = builder.stack_size(stack_size);
        }

        let info_for_thread = info.clone();
        let counters_for_thread = counters.clone();
        let thread = builder.spawn(move || {
            run_worker(info_for_thread, receiver, counters_for_thread, make_state);
        })?;
        let thread_id = thread.thread().id();

        tracing::debug!(
            worker = %info.name,
            ordinal = info.ordinal,
            affinity = info.affinity.as_str(),
            "spawned worker thread"
        );

        Ok(Self {
            info,
            sender,
            thread: Some(thread),
            thread_id,
            is_working: false,
            counters,
        })
    }

    /// ### English
    /// Appends `task` to the tail of the queue. Never runs it inline.
    ///
    /// ### 中文
    /// 将 `task` 追加到队列尾部。永远不会在调用方线程内联执行。
    pub fn queue(&self, task: Task<S>) -> PoolResult<()> {
        self.sender
            .send(Message::Run(task))
            .map_err(|_| PoolError::Disconnected)?;
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// ### English
    /// Lease transition hook. The optional callback is queued behind everything already pending,
    /// so on the transition to "not working" it is the last task of the lease.
    ///
    /// ### 中文
    /// 租约状态切换钩子。可选回调会排在所有已入队任务之后；切换到“非工作”时它就是本次租约的最后一个任务。
    pub fn set_is_working(&mut self, working: bool, callback: Option<Task<S>>) -> PoolResult<()> {
        self.is_working = working;
        match callback {
            Some(callback) => self.queue(callback),
            None => Ok(()),
        }
    }
}

impl<S> WorkerThread<S> {
    /// ### English
    /// Stops the worker after its queue drains and joins it. Idempotent.
    ///
    /// Called from the worker thread itself, the thread is detached instead of joined.
    ///
    /// ### 中文
    /// 在队列 drain 完毕后停止工作线程并 join。幂等。
    ///
    /// 若在工作线程自身上调用，则改为 detach 而非 join。
    pub fn terminate(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.sender.send(Message::Terminate);
        self.is_working = false;

        if thread::current().id() == self.thread_id {
            tracing::warn!(
                worker = %self.info.name,
                "worker retired from its own thread; detaching"
            );
            return;
        }
        if thread.join().is_err() {
            tracing::error!(worker = %self.info.name, "worker thread panicked outside a task");
        }
    }

    pub fn info(&self) -> &WorkerInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn affinity(&self) -> Affinity {
        self.info.affinity
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn is_working(&self) -> bool {
        self.is_working
    }

    pub fn is_retired(&self) -> bool {
        self.thread.is_none()
    }

    /// ### English
    /// Tasks queued but not yet finished (approximate while the worker is running).
    ///
    /// ### 中文
    /// 已入队但尚未完成的任务数（工作线程运行时为近似值）。
    pub fn pending_tasks(&self) -> u64 {
        let queued = self.counters.queued.load(Ordering::Relaxed);
        let completed = self.counters.completed.load(Ordering::Acquire);
        queued.saturating_sub(completed)
    }

    pub fn completed_tasks(&self) -> u64 {
        self.counters.completed.load(Ordering::Acquire)
    }

    pub fn panicked_tasks(&self) -> u64 {
        self.counters.panicked.load(Ordering::Relaxed)
    }
}

impl<S> Drop for WorkerThread<S> {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// ### English
/// Worker thread body: build the state, then pop and run one task at a time until `Terminate`.
/// A panicking task is contained so the loop keeps serving the queue.
///
/// ### 中文
/// 工作线程主体：构建线程状态，然后逐个取出并执行任务，直到收到 `Terminate`。
/// panic 的任务会被隔离，循环继续服务队列。
fn run_worker<S>(
    info: WorkerInfo,
    receiver: channel::Receiver<Message<S>>,
    counters: Arc<WorkerCounters>,
    make_state: StateFactory<S>,
) {
    let mut state = make_state(&info);

    while let Ok(message) = receiver.recv() {
        match message {
            Message::Run(task) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.run(&mut state)));
                if let Err(payload) = outcome {
                    counters.panicked.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        worker = %info.name,
                        panic = panic_message(payload.as_ref()),
                        "worker task panicked"
                    );
                }
                counters.completed.fetch_add(1, Ordering::Release);
            }
            Message::Terminate => break,
        }
    }

    // State (and any GPU context inside it) is torn down here, on its own thread.
    drop(state);
    tracing::debug!(worker = %info.name, ordinal = info.ordinal, "worker thread retired");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
