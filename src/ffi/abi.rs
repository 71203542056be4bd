//! ### English
//! ABI version and Panama-friendly constant getters.
//!
//! ### 中文
//! ABI 版本号与 Panama 友好的常量获取函数。

use crate::engine::flags;

#[unsafe(no_mangle)]
/// ### English
/// Returns the C ABI version.
///
/// ### 中文
/// 返回 C ABI 版本号。
pub extern "C" fn rive_worker_abi_version() -> u32 {
    super::RIVE_WORKER_ABI_VERSION
}

#[unsafe(no_mangle)]
/// ### English
/// Returns `RIVE_WORKER_POOL_FLAG_HEADLESS`.
/// (Constant getter; avoids relying on C headers.)
///
/// ### 中文
/// 返回 `RIVE_WORKER_POOL_FLAG_HEADLESS`。
/// （常量获取函数；避免依赖 C 头文件。）
pub extern "C" fn rive_worker_pool_flag_headless() -> u32 {
    flags::RIVE_WORKER_POOL_FLAG_HEADLESS
}

#[unsafe(no_mangle)]
/// ### English
/// Returns `RIVE_WORKER_POOL_FLAG_SOFTWARE_GL`.
///
/// ### 中文
/// 返回 `RIVE_WORKER_POOL_FLAG_SOFTWARE_GL`。
pub extern "C" fn rive_worker_pool_flag_software_gl() -> u32 {
    flags::RIVE_WORKER_POOL_FLAG_SOFTWARE_GL
}

#[unsafe(no_mangle)]
/// ### English
/// Returns `RIVE_WORKER_STATUS_NOT_LEASED`, the code for stale or double-released handles.
///
/// ### 中文
/// 返回 `RIVE_WORKER_STATUS_NOT_LEASED`（过期或重复释放句柄对应的状态码）。
pub extern "C" fn rive_worker_status_not_leased() -> i32 {
    flags::RIVE_WORKER_STATUS_NOT_LEASED
}

#[unsafe(no_mangle)]
/// ### English
/// Returns `RIVE_WORKER_STATUS_GPU_FAILURE`.
///
/// ### 中文
/// 返回 `RIVE_WORKER_STATUS_GPU_FAILURE`。
pub extern "C" fn rive_worker_status_gpu_failure() -> i32 {
    flags::RIVE_WORKER_STATUS_GPU_FAILURE
}
