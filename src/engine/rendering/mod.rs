//! ### English
//! GPU context abstraction used by the worker threads.
//!
//! A [`GpuBackend`] is shared by the whole pool and creates contexts; each [`GpuContext`] it
//! returns is created on, owned by, and only ever touched from one worker thread.
//!
//! ### 中文
//! 工作线程使用的 GPU 上下文抽象。
//!
//! [`GpuBackend`] 由整个线程池共享并负责创建上下文；它返回的每个 [`GpuContext`] 都在某个工作线程上创建、
//! 由其持有，并且只会在该线程上被访问。

mod headless;
mod slot;
#[cfg(feature = "surfman")]
mod surfman_backend;
mod thread_state;

use std::sync::atomic::{AtomicU64, Ordering};

use dpi::PhysicalSize;

use crate::engine::error::GpuError;

pub use headless::{HeadlessBackend, HeadlessCounters};
pub use slot::GpuContextSlot;
#[cfg(feature = "surfman")]
pub use surfman_backend::SurfmanBackend;
pub use thread_state::{RenderPool, RenderThreadState};

/// ### English
/// Process-unique identity of one native context, stable for the context's whole life.
///
/// ### 中文
/// 单个原生上下文在进程内唯一的身份，在上下文整个生命周期内保持不变。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// ### English
/// What a context renders into.
///
/// ### 中文
/// 上下文的渲染目标。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceTarget {
    /// ### English
    /// Offscreen surface of the given size.
    ///
    /// ### 中文
    /// 指定尺寸的离屏 surface。
    Offscreen(PhysicalSize<u32>),
    /// ### English
    /// Platform window (`ANativeWindow*` on Android) passed across the C ABI as an address.
    /// The embedder keeps the window alive until the surface is detached.
    ///
    /// ### 中文
    /// 平台窗口（Android 上为 `ANativeWindow*`），以地址形式经 C ABI 传入。
    /// 宿主需保证窗口在 surface 解绑之前一直有效。
    NativeWindow {
        window: usize,
        size: PhysicalSize<u32>,
    },
}

impl SurfaceTarget {
    pub fn size(&self) -> PhysicalSize<u32> {
        match *self {
            Self::Offscreen(size) | Self::NativeWindow { size, .. } => size,
        }
    }

    /// ### English
    /// Same target with a new size.
    ///
    /// ### 中文
    /// 相同目标、新尺寸。
    pub fn resized(self, size: PhysicalSize<u32>) -> Self {
        match self {
            Self::Offscreen(_) => Self::Offscreen(size),
            Self::NativeWindow { window, .. } => Self::NativeWindow { window, size },
        }
    }
}

/// ### English
/// Creates per-thread GPU contexts. `create_context` is always called on the worker thread that
/// will own the result.
///
/// ### 中文
/// 创建每线程的 GPU 上下文。`create_context` 总是在将持有该结果的工作线程上调用。
pub trait GpuBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn create_context(&self) -> Result<Box<dyn GpuContext>, GpuError>;
}

/// ### English
/// One native rendering context plus at most one bound surface.
///
/// Implementations are not `Send`: every method runs on the owning worker thread.
///
/// ### 中文
/// 一个原生渲染上下文，外加至多一个已绑定的 surface。
///
/// 实现类型不要求 `Send`：所有方法都在持有它的工作线程上运行。
pub trait GpuContext {
    fn id(&self) -> ContextId;

    fn make_current(&mut self) -> Result<(), GpuError>;

    /// ### English
    /// Binds `target`, replacing any surface already bound. The context survives either way.
    ///
    /// ### 中文
    /// 绑定 `target`，替换已绑定的 surface。无论如何上下文都会保留。
    fn bind_surface(&mut self, target: SurfaceTarget) -> Result<(), GpuError>;

    /// ### English
    /// Detaches and destroys the bound surface, if any.
    ///
    /// ### 中文
    /// 解绑并销毁已绑定的 surface（若有）。
    fn unbind_surface(&mut self) -> Result<(), GpuError>;

    fn set_viewport(&mut self, size: PhysicalSize<u32>);

    fn clear(&mut self, rgba: [f32; 4]);

    /// ### English
    /// GL entry points for drawing code, when the backend has real GL.
    ///
    /// ### 中文
    /// 供绘制代码使用的 GL 入口（仅当后端拥有真实 GL 时）。
    fn gl(&self) -> Option<&glow::Context>;

    fn present(&mut self) -> Result<(), GpuError>;

    /// ### English
    /// Destroys the native context. Called once, when the owning worker retires.
    ///
    /// ### 中文
    /// 销毁原生上下文。仅在持有它的工作线程退役时调用一次。
    fn destroy(&mut self);
}

/// ### English
/// Drawing access to a context for the duration of one frame.
///
/// ### 中文
/// 单帧期间对上下文的绘制访问。
pub struct Frame<'a> {
    context: &'a mut dyn GpuContext,
    size: PhysicalSize<u32>,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(context: &'a mut dyn GpuContext, size: PhysicalSize<u32>) -> Self {
        Self { context, size }
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn context_id(&self) -> ContextId {
        self.context.id()
    }

    pub fn clear(&mut self, rgba: [f32; 4]) {
        self.context.clear(rgba);
    }

    pub fn gl(&self) -> Option<&glow::Context> {
        self.context.gl()
    }
}
