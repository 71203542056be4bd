//! ### English
//! Constants shared with the embedder through the C ABI: pool creation flags (a `u32` bitmask)
//! and the `i32` status codes returned by `rive_worker_*` calls.
//!
//! ### 中文
//! 通过 C ABI 与宿主共享的常量：线程池创建标志（`u32` 位掩码）以及 `rive_worker_*` 调用返回的 `i32` 状态码。

/// ### English
/// Use the in-memory GPU backend instead of real GL contexts (hosts without a GL driver, tests).
///
/// ### 中文
/// 使用内存中的 GPU 后端而非真实 GL 上下文（无 GL 驱动的主机、测试）。
pub const RIVE_WORKER_POOL_FLAG_HEADLESS: u32 = 1 << 0;

/// ### English
/// Request the platform's software GL adapter (ignored together with `HEADLESS`).
///
/// ### 中文
/// 请求使用平台的软件 GL 适配器（与 `HEADLESS` 同时设置时忽略）。
pub const RIVE_WORKER_POOL_FLAG_SOFTWARE_GL: u32 = 1 << 1;

pub const RIVE_WORKER_STATUS_OK: i32 = 0;
/// ### English
/// NULL pointer, invalid UTF-8 name, or a zero-sized surface.
///
/// ### 中文
/// 空指针、非法 UTF-8 名称或尺寸为 0 的 surface。
pub const RIVE_WORKER_STATUS_INVALID_ARGUMENT: i32 = -1;
/// ### English
/// The handle is stale, forged, or was already released.
///
/// ### 中文
/// 句柄已过期、伪造或已被释放。
pub const RIVE_WORKER_STATUS_NOT_LEASED: i32 = -2;
pub const RIVE_WORKER_STATUS_SHUT_DOWN: i32 = -3;
pub const RIVE_WORKER_STATUS_EXHAUSTED: i32 = -4;
pub const RIVE_WORKER_STATUS_SPAWN_FAILED: i32 = -5;
pub const RIVE_WORKER_STATUS_DISCONNECTED: i32 = -6;
pub const RIVE_WORKER_STATUS_GPU_FAILURE: i32 = -7;
pub const RIVE_WORKER_STATUS_TIMEOUT: i32 = -8;
