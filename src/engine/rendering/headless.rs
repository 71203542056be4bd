//! ### English
//! GPU backend without a GPU: contexts are plain in-memory records. Used on hosts with no GL
//! driver (CI) and by the tests, which read its counters to observe what the workers did.
//!
//! ### 中文
//! 没有 GPU 的 GPU 后端：上下文只是内存中的记录。用于没有 GL 驱动的主机（CI）与测试；
//! 测试通过读取其计数器观察工作线程的行为。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use dpi::PhysicalSize;

use crate::engine::error::GpuError;

use super::{ContextId, GpuBackend, GpuContext, SurfaceTarget};

/// ### English
/// Counters shared by a backend and every context it created.
///
/// ### 中文
/// 后端及其创建的所有上下文共享的计数器。
#[derive(Default)]
pub struct HeadlessCounters {
    created: AtomicUsize,
    destroyed: AtomicUsize,
    bound: AtomicUsize,
    unbound: AtomicUsize,
    presented: AtomicUsize,
    /// ### English
    /// Operations attempted from a thread other than the context's owner.
    ///
    /// ### 中文
    /// 在非上下文所属线程上尝试的操作次数。
    foreign_thread_uses: AtomicUsize,
}

impl HeadlessCounters {
    pub fn contexts_created(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }

    pub fn contexts_destroyed(&self) -> usize {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn surfaces_bound(&self) -> usize {
        self.bound.load(Ordering::Acquire)
    }

    pub fn surfaces_unbound(&self) -> usize {
        self.unbound.load(Ordering::Acquire)
    }

    pub fn frames_presented(&self) -> usize {
        self.presented.load(Ordering::Acquire)
    }

    pub fn foreign_thread_uses(&self) -> usize {
        self.foreign_thread_uses.load(Ordering::Acquire)
    }
}

/// ### English
/// In-memory GPU backend.
///
/// ### 中文
/// 内存中的 GPU 后端。
#[derive(Default)]
pub struct HeadlessBackend {
    counters: Arc<HeadlessCounters>,
    /// ### English
    /// Number of upcoming `create_context` calls that fail.
    ///
    /// ### 中文
    /// 接下来会失败的 `create_context` 调用次数。
    failures_left: AtomicUsize,
    /// ### English
    /// Number of upcoming `bind_surface` calls that fail, shared with every context.
    ///
    /// ### 中文
    /// 接下来会失败的 `bind_surface` 调用次数，由所有上下文共享。
    bind_failures_left: Arc<AtomicUsize>,
    unbind_failures_left: Arc<AtomicUsize>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// ### English
    /// Backend whose first `failures` context creations fail, to exercise driver failure paths.
    ///
    /// ### 中文
    /// 前 `failures` 次上下文创建会失败的后端，用于覆盖驱动失败路径。
    pub fn failing(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            ..Self::default()
        }
    }

    /// ### English
    /// Makes the next `failures` surface bindings fail. A failing binding first tears down the
    /// surface bound before it, like a driver that loses the old surface mid-rebind.
    ///
    /// ### 中文
    /// 使接下来的 `failures` 次 surface 绑定失败。失败的绑定会先拆除之前绑定的 surface，
    /// 模拟驱动在重新绑定途中丢失旧 surface 的情形。
    pub fn fail_next_binds(&self, failures: usize) {
        self.bind_failures_left.store(failures, Ordering::Release);
    }

    /// ### English
    /// Makes the next `failures` surface unbindings fail, leaving the surface bound.
    ///
    /// ### 中文
    /// 使接下来的 `failures` 次 surface 解绑失败；surface 保持绑定。
    pub fn fail_next_unbinds(&self, failures: usize) {
        self.unbind_failures_left.store(failures, Ordering::Release);
    }

    pub fn counters(&self) -> &HeadlessCounters {
        &self.counters
    }
}

impl GpuBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn create_context(&self) -> Result<Box<dyn GpuContext>, GpuError> {
        if take_one(&self.failures_left) {
            return Err(GpuError::context("headless backend: injected failure"));
        }

        self.counters.created.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(HeadlessContext {
            id: ContextId::next(),
            owner: thread::current().id(),
            counters: self.counters.clone(),
            bind_failures_left: self.bind_failures_left.clone(),
            unbind_failures_left: self.unbind_failures_left.clone(),
            surface: None,
            viewport: PhysicalSize::new(0, 0),
            destroyed: false,
        }))
    }
}

/// Consumes one unit of a failure budget; `true` when the budget was not yet spent.
fn take_one(budget: &AtomicUsize) -> bool {
    budget
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
        .is_ok()
}

struct HeadlessContext {
    id: ContextId,
    owner: ThreadId,
    counters: Arc<HeadlessCounters>,
    bind_failures_left: Arc<AtomicUsize>,
    unbind_failures_left: Arc<AtomicUsize>,
    surface: Option<SurfaceTarget>,
    viewport: PhysicalSize<u32>,
    destroyed: bool,
}

impl HeadlessContext {
    fn check_owner(&self) -> Result<(), GpuError> {
        if thread::current().id() == self.owner {
            return Ok(());
        }
        self.counters
            .foreign_thread_uses
            .fetch_add(1, Ordering::AcqRel);
        Err(GpuError::make_current(format!(
            "context {} used off its owning thread",
            self.id.get()
        )))
    }
}

impl GpuContext for HeadlessContext {
    fn id(&self) -> ContextId {
        self.id
    }

    fn make_current(&mut self) -> Result<(), GpuError> {
        if self.destroyed {
            return Err(GpuError::make_current("context was destroyed"));
        }
        self.check_owner()
    }

    fn bind_surface(&mut self, target: SurfaceTarget) -> Result<(), GpuError> {
        self.check_owner()?;
        if self.surface.is_some() {
            self.unbind_surface()?;
        }
        if take_one(&self.bind_failures_left) {
            return Err(GpuError::binding("headless backend: injected binding failure"));
        }
        self.surface = Some(target);
        self.counters.bound.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn unbind_surface(&mut self) -> Result<(), GpuError> {
        self.check_owner()?;
        if self.surface.is_some() && take_one(&self.unbind_failures_left) {
            return Err(GpuError::binding("headless backend: injected unbinding failure"));
        }
        if self.surface.take().is_some() {
            self.counters.unbound.fetch_add(1, Ordering::AcqRel);
        }
        Ok(())
    }

    fn set_viewport(&mut self, size: PhysicalSize<u32>) {
        if self.check_owner().is_ok() {
            self.viewport = size;
        }
    }

    fn clear(&mut self, _rgba: [f32; 4]) {
        let _ = self.check_owner();
    }

    fn gl(&self) -> Option<&glow::Context> {
        None
    }

    fn present(&mut self) -> Result<(), GpuError> {
        self.check_owner()?;
        if self.surface.is_none() {
            return Err(GpuError::NoSurface);
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(GpuError::present("viewport was never configured"));
        }
        self.counters.presented.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        let _ = self.unbind_surface();
        self.destroyed = true;
        self.counters.destroyed.fetch_add(1, Ordering::AcqRel);
    }
}

impl Drop for HeadlessContext {
    fn drop(&mut self) {
        self.destroy();
    }
}
