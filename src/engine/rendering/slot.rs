//! ### English
//! Per-worker GPU context slot: lazily created context + optional surface binding.
//!
//! ### 中文
//! 每个工作线程的 GPU 上下文槽位：延迟创建的上下文 + 可选的 surface 绑定。

use std::sync::Arc;

use dpi::PhysicalSize;

use crate::engine::error::GpuError;

use super::{ContextId, Frame, GpuBackend, GpuContext, SurfaceTarget};

/// ### English
/// Owns one worker thread's GPU context for that thread's entire life.
///
/// The context is created on first use and survives surface rebinding and lease cycles; it is
/// destroyed only when the slot is retired (worker shutdown). A failed creation leaves the slot
/// empty, so the next caller request tries again.
///
/// ### 中文
/// 在工作线程整个生命周期内持有其 GPU 上下文。
///
/// 上下文在首次使用时创建，跨 surface 重新绑定与多次租约保留；仅在槽位退役（工作线程关闭）时销毁。
/// 创建失败时槽位保持为空，下一次调用方请求会重新尝试。
pub struct GpuContextSlot {
    backend: Arc<dyn GpuBackend>,
    context: Option<Box<dyn GpuContext>>,
    surface: Option<SurfaceTarget>,
}

impl GpuContextSlot {
    pub fn new(backend: Arc<dyn GpuBackend>) -> Self {
        Self {
            backend,
            context: None,
            surface: None,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// ### English
    /// Identity of the live context, `None` before first use.
    ///
    /// ### 中文
    /// 当前上下文的身份；首次使用前为 `None`。
    pub fn context_id(&self) -> Option<ContextId> {
        self.context.as_ref().map(|context| context.id())
    }

    pub fn surface(&self) -> Option<SurfaceTarget> {
        self.surface
    }

    /// ### English
    /// Returns the context, creating it first if needed.
    ///
    /// ### 中文
    /// 返回上下文；必要时先创建。
    pub fn ensure_context(&mut self) -> Result<&mut dyn GpuContext, GpuError> {
        let context = match self.context.take() {
            Some(context) => context,
            None => {
                let context = self.backend.create_context().inspect_err(|err| {
                    tracing::warn!(backend = self.backend.name(), "GPU context creation failed: {err}");
                })?;
                tracing::debug!(
                    backend = self.backend.name(),
                    context = context.id().get(),
                    "created GPU context"
                );
                context
            }
        };
        Ok(&mut **self.context.insert(context))
    }

    pub fn make_current(&mut self) -> Result<(), GpuError> {
        self.ensure_context()?.make_current()
    }

    /// ### English
    /// Binds `target` (or rebinds on a size/window change) and sets the viewport to its size.
    /// Returns the bound size.
    ///
    /// #### Parameters
    /// - `target`: Surface to render into; both dimensions must be non-zero.
    ///
    /// ### 中文
    /// 绑定 `target`（尺寸或窗口变化时重新绑定），并将视口设置为其尺寸。返回绑定后的尺寸。
    ///
    /// #### 参数
    /// - `target`：渲染目标 surface；宽高都必须非 0。
    pub fn bind_surface(&mut self, target: SurfaceTarget) -> Result<PhysicalSize<u32>, GpuError> {
        let size = target.size();
        if size.width == 0 || size.height == 0 {
            return Err(GpuError::binding(format!(
                "zero-sized surface {}x{}",
                size.width, size.height
            )));
        }

        let already_bound = self.surface == Some(target);
        if !already_bound {
            // A failed rebind may already have torn down the previous surface.
            self.surface = None;
        }
        let context = self.ensure_context()?;
        context.make_current()?;
        if !already_bound {
            context.bind_surface(target)?;
        }
        context.set_viewport(size);
        self.surface = Some(target);
        Ok(size)
    }

    /// ### English
    /// Detaches the bound surface but keeps the context. No-op when nothing is bound.
    ///
    /// ### 中文
    /// 解绑 surface，但保留上下文。未绑定任何 surface 时为 no-op。
    pub fn detach_surface(&mut self) -> Result<(), GpuError> {
        if self.surface.is_none() {
            return Ok(());
        }
        if let Some(context) = self.context.as_deref_mut() {
            context.unbind_surface()?;
        }
        self.surface = None;
        Ok(())
    }

    /// ### English
    /// Makes the context current on the bound surface and hands out a [`Frame`].
    ///
    /// ### 中文
    /// 使上下文在已绑定的 surface 上 current，并返回一个 [`Frame`]。
    pub fn begin_frame(&mut self) -> Result<Frame<'_>, GpuError> {
        let Some(surface) = self.surface else {
            return Err(GpuError::NoSurface);
        };
        let context = self.ensure_context()?;
        context.make_current()?;
        Ok(Frame::new(context, surface.size()))
    }

    pub fn present(&mut self) -> Result<(), GpuError> {
        if self.surface.is_none() {
            return Err(GpuError::NoSurface);
        }
        match self.context.as_deref_mut() {
            Some(context) => context.present(),
            None => Err(GpuError::NoSurface),
        }
    }

    /// ### English
    /// Detaches the surface and destroys the context. Only for worker retirement.
    ///
    /// ### 中文
    /// 解绑 surface 并销毁上下文。仅用于工作线程退役。
    pub fn retire(&mut self) {
        if let Err(err) = self.detach_surface() {
            tracing::warn!("failed to detach surface while retiring GPU context: {err}");
        }
        if let Some(mut context) = self.context.take() {
            tracing::debug!(context = context.id().get(), "destroying GPU context");
            context.destroy();
        }
    }
}

impl Drop for GpuContextSlot {
    fn drop(&mut self) {
        self.retire();
    }
}
