//! ### English
//! C ABI surface for `rive_gpu_workers`.
//!
//! All exported symbols are `extern "C"` functions; structs are `#[repr(C)]`.
//! Calls return `RIVE_WORKER_STATUS_*` codes (see `engine::flags`); `0` is success.
//! Strings passed from the embedder must be NUL-terminated UTF-8 (C string).
//! Callbacks run on the leased worker thread, with that worker's GL context current.
//!
//! ### 中文
//! `rive_gpu_workers` 的 C ABI 接口层。
//!
//! 所有导出符号均为 `extern "C"` 函数；结构体使用 `#[repr(C)]`。
//! 调用返回 `RIVE_WORKER_STATUS_*` 状态码（见 `engine::flags`）；`0` 表示成功。
//! 宿主传入的字符串必须是以 NUL 结尾的 UTF-8（C 字符串）。
//! 回调在被租用的工作线程上执行，且该线程的 GL 上下文处于 current 状态。
mod abi;
mod pool;
mod surface;
mod worker;

use std::ffi::{CStr, c_char, c_void};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::flags::{
    RIVE_WORKER_STATUS_DISCONNECTED, RIVE_WORKER_STATUS_EXHAUSTED, RIVE_WORKER_STATUS_NOT_LEASED,
    RIVE_WORKER_STATUS_SHUT_DOWN, RIVE_WORKER_STATUS_SPAWN_FAILED, RIVE_WORKER_STATUS_TIMEOUT,
};
use crate::engine::{PoolError, RenderPool, RenderThreadState, WorkerHandle};

/// ### English
/// C ABI version for `rive_gpu_workers`.
///
/// ### 中文
/// `rive_gpu_workers` 的 C ABI 版本号。
const RIVE_WORKER_ABI_VERSION: u32 = 1;

/// ### English
/// Upper bound for blocking calls that pass `timeout_ms = 0`.
///
/// ### 中文
/// 传入 `timeout_ms = 0` 的阻塞调用所使用的默认上限。
const DEFAULT_BLOCKING_TIMEOUT: Duration = Duration::from_secs(5);

#[repr(C)]
/// ### English
/// Opaque pool handle owning every worker thread it created.
///
/// ### 中文
/// 不透明线程池句柄，持有其创建的所有工作线程。
pub struct RiveWorkerPool {
    /// ### English
    /// Shared render pool.
    ///
    /// ### 中文
    /// 共享的渲染线程池。
    pool: Arc<RenderPool>,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// ### English
/// Lease handle passed by value. `generation = 0` is never issued and marks "no lease".
///
/// ### 中文
/// 按值传递的租约句柄。`generation = 0` 永不分配，表示“无租约”。
pub struct RiveWorkerHandle {
    pub index: u32,
    pub generation: u32,
}

impl From<WorkerHandle> for RiveWorkerHandle {
    fn from(value: WorkerHandle) -> Self {
        Self {
            index: value.index(),
            generation: value.generation(),
        }
    }
}

impl From<RiveWorkerHandle> for WorkerHandle {
    fn from(value: RiveWorkerHandle) -> Self {
        WorkerHandle::from_raw(value.index, value.generation)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
/// ### English
/// Embedder callback plus its opaque argument. A NULL `callback` means "nothing to run".
///
/// The embedder keeps `user_data` valid until the callback has run.
///
/// ### 中文
/// 宿主回调及其不透明参数。`callback` 为 NULL 表示“无需执行”。
///
/// 宿主需保证 `user_data` 在回调执行之前一直有效。
pub struct RiveWorkerCallback {
    pub callback: Option<unsafe extern "C" fn(user_data: *mut c_void)>,
    pub user_data: *mut c_void,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// ### English
/// Pool membership snapshot.
///
/// ### 中文
/// 线程池成员状态快照。
pub struct RiveWorkerPoolStats {
    pub idle: u32,
    pub leased: u32,
    pub retired: u32,
    pub odd: u32,
    pub even: u32,
}

/// ### English
/// Callback moved onto a worker thread. `user_data` travels as an address.
///
/// ### 中文
/// 被移动到工作线程上的回调。`user_data` 以地址形式传递。
struct HostCallback {
    callback: unsafe extern "C" fn(*mut c_void),
    user_data: usize,
}

impl HostCallback {
    fn from_raw(raw: RiveWorkerCallback) -> Option<Self> {
        raw.callback.map(|callback| Self {
            callback,
            user_data: raw.user_data as usize,
        })
    }

    /// ### English
    /// Runs the callback with the worker's GL context made current.
    ///
    /// ### 中文
    /// 在工作线程 GL 上下文 current 的情况下执行回调。
    fn invoke(self, state: &mut RenderThreadState) {
        if let Err(err) = state.gpu_mut().make_current() {
            tracing::warn!(
                lease = ?state.lease(),
                "running host callback without a current context: {err}"
            );
        }
        unsafe { (self.callback)(self.user_data as *mut c_void) };
    }
}

fn status_of(err: &PoolError) -> i32 {
    match err {
        PoolError::Spawn(_) => RIVE_WORKER_STATUS_SPAWN_FAILED,
        PoolError::Exhausted { .. } => RIVE_WORKER_STATUS_EXHAUSTED,
        PoolError::NotLeased { .. } => RIVE_WORKER_STATUS_NOT_LEASED,
        PoolError::ShutDown => RIVE_WORKER_STATUS_SHUT_DOWN,
        PoolError::Disconnected => RIVE_WORKER_STATUS_DISCONNECTED,
        PoolError::Timeout(_) => RIVE_WORKER_STATUS_TIMEOUT,
    }
}

fn timeout_from_ms(timeout_ms: u32) -> Duration {
    match timeout_ms {
        0 => DEFAULT_BLOCKING_TIMEOUT,
        ms => Duration::from_millis(u64::from(ms)),
    }
}

unsafe fn cstr_to_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }

    let value = unsafe { CStr::from_ptr(ptr) }.to_str().ok()?;
    if value.is_empty() {
        return None;
    }

    Some(value)
}
