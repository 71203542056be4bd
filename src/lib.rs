/// ### English
/// `rive_gpu_workers` crate root.
/// Exposes the C ABI via `ffi`; the pool, workers and GPU contexts live under `engine`.
///
/// ### 中文
/// `rive_gpu_workers` 的 crate 根。
/// 通过 `ffi` 导出 C ABI；线程池、工作线程与 GPU 上下文位于 `engine` 模块。
pub mod engine;
mod ffi;

pub use engine::{
    GpuError, PoolConfig, PoolError, PoolResult, PoolStats, RenderPool, RenderThreadState,
    SurfaceController, ThreadPool, WorkerHandle, WorkerIdentity,
};
