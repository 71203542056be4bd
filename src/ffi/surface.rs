//! ### English
//! C ABI bindings for binding a native window (or an offscreen surface) to a leased worker.
//!
//! ### 中文
//! 将原生窗口（或离屏 surface）绑定到被租用工作线程的 C ABI 绑定。

use std::ffi::c_void;

use dpi::PhysicalSize;

use crate::engine::flags::{
    RIVE_WORKER_STATUS_GPU_FAILURE, RIVE_WORKER_STATUS_INVALID_ARGUMENT, RIVE_WORKER_STATUS_OK,
};
use crate::engine::rendering::SurfaceTarget;
use crate::engine::{GpuError, RenderThreadState};

use super::{RiveWorkerHandle, RiveWorkerPool, status_of, timeout_from_ms};

fn gpu_status(result: Result<(), GpuError>) -> i32 {
    match result {
        Ok(()) => RIVE_WORKER_STATUS_OK,
        Err(_) => RIVE_WORKER_STATUS_GPU_FAILURE,
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Binds a surface to the leased worker's GL context and sets the viewport, blocking until the
/// worker has done it (or `timeout_ms` elapses; `0` selects a 5 s default).
///
/// `native_window` is an `ANativeWindow*` kept alive by the embedder until the surface is
/// detached; NULL binds an offscreen surface of the given size. A GPU failure returns
/// `RIVE_WORKER_STATUS_GPU_FAILURE`; calling again retries, including context creation.
///
/// `RIVE_WORKER_STATUS_TIMEOUT` only means the wait gave up: the binding stays queued and still
/// runs on the worker later. The window must be detached with `rive_worker_detach_surface`
/// before it is freed, even after a timeout.
///
/// ### 中文
/// 将 surface 绑定到被租用工作线程的 GL 上下文并设置视口；阻塞直到工作线程完成（或超过 `timeout_ms`；`0` 表示默认 5 秒）。
///
/// `native_window` 为 `ANativeWindow*`，宿主需保证其在 surface 解绑前一直有效；传入 NULL 则绑定给定尺寸的离屏 surface。
/// GPU 失败返回 `RIVE_WORKER_STATUS_GPU_FAILURE`；再次调用即重试（包括上下文创建）。
///
/// `RIVE_WORKER_STATUS_TIMEOUT` 仅表示等待放弃：绑定任务仍在队列中，稍后仍会在工作线程上执行。
/// 即使超时，也必须在释放窗口前调用 `rive_worker_detach_surface` 解绑。
pub unsafe extern "C" fn rive_worker_bind_surface(
    pool: *mut RiveWorkerPool,
    handle: RiveWorkerHandle,
    native_window: *mut c_void,
    width: u32,
    height: u32,
    timeout_ms: u32,
) -> i32 {
    if pool.is_null() || width == 0 || height == 0 {
        return RIVE_WORKER_STATUS_INVALID_ARGUMENT;
    }

    let size = PhysicalSize::new(width, height);
    let target = if native_window.is_null() {
        SurfaceTarget::Offscreen(size)
    } else {
        SurfaceTarget::NativeWindow {
            window: native_window as usize,
            size,
        }
    };

    let submitted = unsafe {
        (*pool)
            .pool
            .submit(handle.into(), move |state: &mut RenderThreadState| {
                state.gpu_mut().bind_surface(target).map(|_| ())
            })
    };
    let outcome =
        submitted.and_then(|completion| completion.wait_timeout(timeout_from_ms(timeout_ms)));
    match outcome {
        Ok(result) => {
            if let Err(err) = &result {
                tracing::warn!(index = handle.index, "surface binding failed: {err}");
            }
            gpu_status(result)
        }
        Err(err) => status_of(&err),
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Detaches the bound surface (the GL context is kept), blocking like `rive_worker_bind_surface`.
/// Call before the native window is destroyed.
///
/// On `RIVE_WORKER_STATUS_TIMEOUT` the detach is still queued and has not run yet; the window
/// must stay alive until it does. Calling again queues a second detach behind the first, so a
/// later `RIVE_WORKER_STATUS_OK` means both have run.
///
/// ### 中文
/// 解绑已绑定的 surface（保留 GL 上下文），阻塞行为与 `rive_worker_bind_surface` 相同。请在原生窗口销毁前调用。
///
/// 返回 `RIVE_WORKER_STATUS_TIMEOUT` 时解绑任务仍在队列中、尚未执行；在其执行前窗口必须保持有效。
/// 再次调用会在其后排入第二次解绑，因此之后返回 `RIVE_WORKER_STATUS_OK` 表示两次都已执行。
pub unsafe extern "C" fn rive_worker_detach_surface(
    pool: *mut RiveWorkerPool,
    handle: RiveWorkerHandle,
    timeout_ms: u32,
) -> i32 {
    if pool.is_null() {
        return RIVE_WORKER_STATUS_INVALID_ARGUMENT;
    }

    let submitted = unsafe {
        (*pool)
            .pool
            .submit(handle.into(), |state: &mut RenderThreadState| {
                state.gpu_mut().detach_surface()
            })
    };
    match submitted.and_then(|completion| completion.wait_timeout(timeout_from_ms(timeout_ms))) {
        Ok(result) => gpu_status(result),
        Err(err) => status_of(&err),
    }
}
