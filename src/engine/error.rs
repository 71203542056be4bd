//! ### English
//! Error types for the worker pool and the GPU context slots.
//!
//! ### 中文
//! 工作线程池与 GPU 上下文槽位的错误类型。

use std::io;
use std::time::Duration;

pub type PoolResult<T> = Result<T, PoolError>;

/// ### English
/// Failures reported by [`crate::engine::pool::ThreadPool`] and the worker threads it owns.
///
/// ### 中文
/// 由 [`crate::engine::pool::ThreadPool`] 及其工作线程报告的失败。
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("worker pool exhausted: all {cap} threads are leased")]
    Exhausted { cap: usize },

    #[error("worker handle {index}:{generation} is not currently leased")]
    NotLeased { index: u32, generation: u32 },

    #[error("worker pool is shut down")]
    ShutDown,

    #[error("worker thread stopped before the task completed")]
    Disconnected,

    #[error("timed out after {0:?} waiting for a worker task")]
    Timeout(Duration),
}

/// ### English
/// GPU context failures. These indicate unusable driver/hardware state and are handed back to
/// whoever requested the binding; nothing retries them automatically.
///
/// ### 中文
/// GPU 上下文失败。表示驱动/硬件状态不可用，会回传给请求绑定的调用方；不会自动重试。
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    #[error("failed to create GPU context: {0}")]
    ContextCreation(String),

    #[error("failed to bind surface: {0}")]
    SurfaceBinding(String),

    #[error("failed to make GPU context current: {0}")]
    MakeCurrent(String),

    #[error("failed to present frame: {0}")]
    Present(String),

    #[error("no surface is bound to the GPU context")]
    NoSurface,
}

impl GpuError {
    pub fn context(msg: impl Into<String>) -> Self {
        Self::ContextCreation(msg.into())
    }

    pub fn binding(msg: impl Into<String>) -> Self {
        Self::SurfaceBinding(msg.into())
    }

    pub fn make_current(msg: impl Into<String>) -> Self {
        Self::MakeCurrent(msg.into())
    }

    pub fn present(msg: impl Into<String>) -> Self {
        Self::Present(msg.into())
    }
}
