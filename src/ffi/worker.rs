//! ### English
//! C ABI bindings for leases: acquire, queue, release.
//!
//! ### 中文
//! 租约相关的 C ABI 绑定：acquire、queue、release。

use std::ffi::c_char;

use crate::engine::flags::{RIVE_WORKER_STATUS_INVALID_ARGUMENT, RIVE_WORKER_STATUS_OK};
use crate::engine::RenderThreadState;

use super::{HostCallback, RiveWorkerCallback, RiveWorkerHandle, RiveWorkerPool, status_of};

#[unsafe(no_mangle)]
/// ### English
/// Leases a worker thread (reusing the most recently released idle one, else starting a new one)
/// and queues `on_acquire` as the lease's first task.
///
/// Never waits on other work. On success writes the lease into `out_handle`; on failure writes a
/// handle with `generation = 0`.
///
/// #### Parameters
/// - `name`: NUL-terminated UTF-8 lease name (non-empty).
/// - `on_acquire`: Runs on the worker with its GL context current; may have a NULL callback.
///
/// ### 中文
/// 租用一个工作线程（优先复用最近释放的空闲线程，否则启动新线程），并将 `on_acquire` 作为本次租约的第一个任务入队。
///
/// 从不等待其他工作。成功时把租约写入 `out_handle`；失败时写入 `generation = 0` 的句柄。
///
/// #### 参数
/// - `name`：NUL 结尾的 UTF-8 租约名（非空）。
/// - `on_acquire`：在工作线程上、其 GL 上下文 current 时执行；回调可为 NULL。
pub unsafe extern "C" fn rive_worker_acquire(
    pool: *mut RiveWorkerPool,
    name: *const c_char,
    on_acquire: RiveWorkerCallback,
    out_handle: *mut RiveWorkerHandle,
) -> i32 {
    if pool.is_null() || out_handle.is_null() {
        return RIVE_WORKER_STATUS_INVALID_ARGUMENT;
    }
    unsafe { *out_handle = RiveWorkerHandle::default() };
    let Some(name) = (unsafe { super::cstr_to_str(name) }) else {
        return RIVE_WORKER_STATUS_INVALID_ARGUMENT;
    };

    let callback = HostCallback::from_raw(on_acquire);
    let lease = name.to_string();
    let acquired = unsafe {
        (*pool)
            .pool
            .acquire(name, move |state: &mut RenderThreadState| {
                state.begin_lease(lease, None);
                if let Some(callback) = callback {
                    callback.invoke(state);
                }
            })
    };
    match acquired {
        Ok(handle) => {
            unsafe { *out_handle = handle.into() };
            RIVE_WORKER_STATUS_OK
        }
        Err(err) => status_of(&err),
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Queues `task` on a leased worker. Fire-and-forget; tasks on one handle run in call order.
///
/// ### 中文
/// 将 `task` 入队到被租用的工作线程。发后即忘；同一句柄上的任务按调用顺序执行。
pub unsafe extern "C" fn rive_worker_queue(
    pool: *mut RiveWorkerPool,
    handle: RiveWorkerHandle,
    task: RiveWorkerCallback,
) -> i32 {
    if pool.is_null() {
        return RIVE_WORKER_STATUS_INVALID_ARGUMENT;
    }
    let Some(callback) = HostCallback::from_raw(task) else {
        return RIVE_WORKER_STATUS_INVALID_ARGUMENT;
    };

    let queued = unsafe {
        (*pool)
            .pool
            .queue(handle.into(), move |state: &mut RenderThreadState| {
                callback.invoke(state)
            })
    };
    match queued {
        Ok(()) => RIVE_WORKER_STATUS_OK,
        Err(err) => status_of(&err),
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Ends a lease. `on_release` runs after every task already queued on the handle (with the GL
/// context current), then the worker's surface is detached; anything a later lessee of the same
/// worker queues runs after both. The handle is invalid once this returns.
///
/// Releasing a handle that is not leased returns `RIVE_WORKER_STATUS_NOT_LEASED` and changes
/// nothing.
///
/// ### 中文
/// 结束一次租约。`on_release` 在该句柄上所有已入队任务之后执行（GL 上下文 current），随后解绑该工作线程的 surface；
/// 同一工作线程后续租用者入队的任务都在二者之后执行。本调用返回后句柄即失效。
///
/// 释放未被租用的句柄会返回 `RIVE_WORKER_STATUS_NOT_LEASED`，且不做任何改变。
pub unsafe extern "C" fn rive_worker_release(
    pool: *mut RiveWorkerPool,
    handle: RiveWorkerHandle,
    on_release: RiveWorkerCallback,
) -> i32 {
    if pool.is_null() {
        return RIVE_WORKER_STATUS_INVALID_ARGUMENT;
    }

    let callback = HostCallback::from_raw(on_release);
    let released = unsafe {
        (*pool)
            .pool
            .release(handle.into(), move |state: &mut RenderThreadState| {
                if let Some(callback) = callback {
                    callback.invoke(state);
                }
                state.end_lease();
            })
    };
    match released {
        Ok(()) => RIVE_WORKER_STATUS_OK,
        Err(err) => status_of(&err),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use super::*;
    use crate::engine::flags::{
        RIVE_WORKER_STATUS_EXHAUSTED, RIVE_WORKER_STATUS_NOT_LEASED,
    };
    use crate::ffi::pool::rive_worker_pool_destroy;
    use crate::ffi::tests::{counting_callback, headless_pool, no_callback};

    fn wait_for(counter: &AtomicUsize, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < expected && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(counter.load(Ordering::SeqCst), expected);
    }

    #[test]
    fn callbacks_run_for_acquire_queue_and_release() {
        let counter = AtomicUsize::new(0);
        let pool = headless_pool(0);
        let mut handle = RiveWorkerHandle::default();

        let status = unsafe {
            rive_worker_acquire(pool, c"draw-1".as_ptr(), counting_callback(&counter), &mut handle)
        };
        assert_eq!(status, RIVE_WORKER_STATUS_OK);
        assert_ne!(handle.generation, 0);

        for _ in 0..3 {
            let status = unsafe { rive_worker_queue(pool, handle, counting_callback(&counter)) };
            assert_eq!(status, RIVE_WORKER_STATUS_OK);
        }
        let status = unsafe { rive_worker_release(pool, handle, counting_callback(&counter)) };
        assert_eq!(status, RIVE_WORKER_STATUS_OK);

        wait_for(&counter, 5);
        unsafe { rive_worker_pool_destroy(pool) };
    }

    #[test]
    fn double_release_is_rejected() {
        let pool = headless_pool(0);
        let mut handle = RiveWorkerHandle::default();
        unsafe { rive_worker_acquire(pool, c"a".as_ptr(), no_callback(), &mut handle) };

        assert_eq!(
            unsafe { rive_worker_release(pool, handle, no_callback()) },
            RIVE_WORKER_STATUS_OK
        );
        assert_eq!(
            unsafe { rive_worker_release(pool, handle, no_callback()) },
            RIVE_WORKER_STATUS_NOT_LEASED
        );
        unsafe { rive_worker_pool_destroy(pool) };
    }

    #[test]
    fn invalid_arguments_do_not_touch_the_pool() {
        let pool = headless_pool(0);
        let mut handle = RiveWorkerHandle {
            index: 1,
            generation: 1,
        };
        assert_eq!(
            unsafe { rive_worker_acquire(pool, std::ptr::null(), no_callback(), &mut handle) },
            RIVE_WORKER_STATUS_INVALID_ARGUMENT
        );
        assert_eq!(handle, RiveWorkerHandle::default());
        assert_eq!(
            unsafe { rive_worker_queue(pool, handle, no_callback()) },
            RIVE_WORKER_STATUS_INVALID_ARGUMENT
        );
        assert_eq!(unsafe { (*pool).pool.stats().live() }, 0);
        unsafe { rive_worker_pool_destroy(pool) };
    }

    #[test]
    fn thread_cap_reports_exhaustion() {
        let pool = headless_pool(1);
        let mut first = RiveWorkerHandle::default();
        let mut second = RiveWorkerHandle::default();
        unsafe { rive_worker_acquire(pool, c"a".as_ptr(), no_callback(), &mut first) };
        assert_eq!(
            unsafe { rive_worker_acquire(pool, c"b".as_ptr(), no_callback(), &mut second) },
            RIVE_WORKER_STATUS_EXHAUSTED
        );
        assert_eq!(second.generation, 0);
        unsafe { rive_worker_pool_destroy(pool) };
    }
}
