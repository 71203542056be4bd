//! ### English
//! C ABI bindings for pool lifecycle (create/destroy/stats).
//!
//! ### 中文
//! 线程池生命周期相关的 C ABI 绑定（create/destroy/stats）。

use std::sync::Arc;

use crate::engine::flags::{
    RIVE_WORKER_POOL_FLAG_HEADLESS, RIVE_WORKER_STATUS_INVALID_ARGUMENT, RIVE_WORKER_STATUS_OK,
};
use crate::engine::rendering::{GpuBackend, HeadlessBackend};
use crate::engine::{PoolConfig, RenderPool};

use super::{RiveWorkerPool, RiveWorkerPoolStats};

#[unsafe(no_mangle)]
/// ### English
/// Creates an empty worker pool. No thread is started until the first acquire.
///
/// `thread_cap` bounds the number of live worker threads.
/// - `0` means "no cap" (grow on demand).
/// - Otherwise, acquire fails with `RIVE_WORKER_STATUS_EXHAUSTED` once `thread_cap` workers are
///   leased.
///
/// `pool_flags` is a `RIVE_WORKER_POOL_FLAG_*` bitmask. Without `HEADLESS` the pool needs real GL
/// (the `surfman` feature); returns NULL when that backend is not compiled in.
///
/// ### 中文
/// 创建一个空的工作线程池。首次 acquire 之前不会启动任何线程。
///
/// `thread_cap` 限制存活工作线程的数量：
/// - `0` 表示“不封顶”（按需增长）。
/// - 非 0 时，`thread_cap` 个工作线程都被租用后，acquire 返回 `RIVE_WORKER_STATUS_EXHAUSTED`。
///
/// `pool_flags` 为 `RIVE_WORKER_POOL_FLAG_*` 位掩码。未设置 `HEADLESS` 时需要真实 GL（`surfman` feature）；
/// 若该后端未编译进来则返回 NULL。
pub extern "C" fn rive_worker_pool_create(thread_cap: u32, pool_flags: u32) -> *mut RiveWorkerPool {
    let Some(backend) = backend_for_flags(pool_flags) else {
        return std::ptr::null_mut();
    };

    let config = PoolConfig::default().with_max_threads(thread_cap as usize);
    let pool = Arc::new(RenderPool::with_backend(config, backend));
    Box::into_raw(Box::new(RiveWorkerPool { pool }))
}

fn backend_for_flags(pool_flags: u32) -> Option<Arc<dyn GpuBackend>> {
    if pool_flags & RIVE_WORKER_POOL_FLAG_HEADLESS != 0 {
        return Some(Arc::new(HeadlessBackend::new()));
    }

    #[cfg(feature = "surfman")]
    {
        use crate::engine::flags::RIVE_WORKER_POOL_FLAG_SOFTWARE_GL;
        use crate::engine::rendering::SurfmanBackend;

        let backend = if pool_flags & RIVE_WORKER_POOL_FLAG_SOFTWARE_GL != 0 {
            SurfmanBackend::new().software()
        } else {
            SurfmanBackend::new()
        };
        Some(Arc::new(backend))
    }

    #[cfg(not(feature = "surfman"))]
    {
        tracing::error!(pool_flags, "GL backend requested but this build has no `surfman` feature");
        None
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Destroys a pool created by `rive_worker_pool_create`.
///
/// Every worker drains its queue (queued callbacks still run), destroys its GL context on its own
/// thread and is joined. Outstanding handles become invalid.
///
/// ### 中文
/// 销毁由 `rive_worker_pool_create` 创建的线程池。
///
/// 每个工作线程都会 drain 队列（已入队回调仍会执行），在自身线程上销毁 GL 上下文，然后被 join。
/// 未归还的句柄全部失效。
pub unsafe extern "C" fn rive_worker_pool_destroy(pool: *mut RiveWorkerPool) {
    if pool.is_null() {
        return;
    }
    let pool = unsafe { Box::from_raw(pool) };
    pool.pool.shutdown();
}

#[unsafe(no_mangle)]
/// ### English
/// Writes a membership snapshot into `out_stats`.
///
/// ### 中文
/// 将成员状态快照写入 `out_stats`。
pub unsafe extern "C" fn rive_worker_pool_stats(
    pool: *mut RiveWorkerPool,
    out_stats: *mut RiveWorkerPoolStats,
) -> i32 {
    if pool.is_null() || out_stats.is_null() {
        return RIVE_WORKER_STATUS_INVALID_ARGUMENT;
    }

    let stats = unsafe { (*pool).pool.stats() };
    let clamp = |value: usize| u32::try_from(value).unwrap_or(u32::MAX);
    unsafe {
        *out_stats = RiveWorkerPoolStats {
            idle: clamp(stats.idle),
            leased: clamp(stats.leased),
            retired: clamp(stats.retired),
            odd: clamp(stats.odd),
            even: clamp(stats.even),
        };
    }
    RIVE_WORKER_STATUS_OK
}
