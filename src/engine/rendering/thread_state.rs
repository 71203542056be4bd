//! ### English
//! Thread state of a render worker: its GPU context slot plus whatever the current lease plays.
//!
//! ### 中文
//! 渲染工作线程的线程状态：其 GPU 上下文槽位，以及当前租约所播放的内容。

use std::sync::Arc;
use std::time::Duration;

use crate::engine::animation::Scene;
use crate::engine::error::GpuError;
use crate::engine::pool::{PoolConfig, ThreadPool};

use super::{GpuBackend, GpuContextSlot};

/// ### English
/// Pool of render workers.
///
/// ### 中文
/// 渲染工作线程池。
pub type RenderPool = ThreadPool<RenderThreadState>;

/// ### English
/// Lives on one worker thread for that thread's whole life. The GPU slot persists across leases;
/// the scene and lease name are reset by [`Self::end_lease`].
///
/// ### 中文
/// 在某个工作线程的整个生命周期内存在于该线程上。GPU 槽位跨租约保留；场景与租约名由 [`Self::end_lease`] 重置。
pub struct RenderThreadState {
    gpu: GpuContextSlot,
    scene: Option<Box<dyn Scene>>,
    lease: Option<String>,
    frames_rendered: u64,
}

impl RenderThreadState {
    pub fn new(backend: Arc<dyn GpuBackend>) -> Self {
        Self {
            gpu: GpuContextSlot::new(backend),
            scene: None,
            lease: None,
            frames_rendered: 0,
        }
    }

    pub fn gpu(&self) -> &GpuContextSlot {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut GpuContextSlot {
        &mut self.gpu
    }

    pub fn lease(&self) -> Option<&str> {
        self.lease.as_deref()
    }

    pub fn has_scene(&self) -> bool {
        self.scene.is_some()
    }

    /// ### English
    /// Frames presented by this worker across all leases.
    ///
    /// ### 中文
    /// 该工作线程在所有租约中呈现的帧数。
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// ### English
    /// Start-of-lease hook (runs as the lease's first task).
    ///
    /// ### 中文
    /// 租约开始钩子（作为本次租约的第一个任务运行）。
    pub fn begin_lease(&mut self, name: impl Into<String>, scene: Option<Box<dyn Scene>>) {
        let name = name.into();
        if let Some(previous) = self.lease.as_deref() {
            tracing::warn!(previous, next = %name, "lease started before the previous one ended");
        }
        self.lease = Some(name);
        self.scene = scene;
    }

    /// ### English
    /// End-of-lease hook: detaches the surface and drops the scene, keeping the GPU context.
    ///
    /// ### 中文
    /// 租约结束钩子：解绑 surface 并丢弃场景，保留 GPU 上下文。
    pub fn end_lease(&mut self) {
        if let Err(err) = self.gpu.detach_surface() {
            tracing::warn!(lease = ?self.lease, "failed to detach surface on release: {err}");
        }
        self.scene = None;
        self.lease = None;
    }

    /// ### English
    /// Advances the scene by `elapsed` and, when a surface is bound, draws and presents it.
    /// Returns whether the scene still wants frames (`false` without a scene).
    ///
    /// ### 中文
    /// 将场景推进 `elapsed`；若已绑定 surface，则绘制并呈现。返回场景是否仍需要后续帧（无场景时为 `false`）。
    pub fn render_frame(&mut self, elapsed: Duration) -> Result<bool, GpuError> {
        let Some(scene) = self.scene.as_mut() else {
            return Ok(false);
        };
        let playing = scene.advance(elapsed);
        if self.gpu.surface().is_none() {
            return Ok(playing);
        }

        let mut frame = self.gpu.begin_frame()?;
        scene.draw(&mut frame);
        self.gpu.present()?;
        self.frames_rendered += 1;
        Ok(playing)
    }
}

impl ThreadPool<RenderThreadState> {
    /// ### English
    /// Render pool whose workers each create their GPU context from `backend`.
    ///
    /// ### 中文
    /// 渲染线程池；每个工作线程都通过 `backend` 创建自己的 GPU 上下文。
    pub fn with_backend(config: PoolConfig, backend: Arc<dyn GpuBackend>) -> Self {
        tracing::debug!(backend = backend.name(), "render pool backend selected");
        Self::new(config, move |_info| RenderThreadState::new(backend.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rendering::{Frame, HeadlessBackend, SurfaceTarget};
    use dpi::PhysicalSize;

    struct Ticks(u32);

    impl Scene for Ticks {
        fn advance(&mut self, _elapsed: Duration) -> bool {
            self.0 = self.0.saturating_sub(1);
            self.0 > 0
        }

        fn draw(&mut self, frame: &mut Frame<'_>) {
            frame.clear([0.0, 0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn frames_without_a_scene_do_nothing() {
        let backend = Arc::new(HeadlessBackend::new());
        let mut state = RenderThreadState::new(backend.clone());
        assert_eq!(state.render_frame(Duration::ZERO), Ok(false));
        assert_eq!(backend.counters().contexts_created(), 0);
    }

    #[test]
    fn frames_advance_offscreen_until_a_surface_is_bound() {
        let backend = Arc::new(HeadlessBackend::new());
        let mut state = RenderThreadState::new(backend.clone());
        state.begin_lease("draw-1", Some(Box::new(Ticks(3))));

        assert_eq!(state.render_frame(Duration::from_millis(16)), Ok(true));
        assert_eq!(backend.counters().frames_presented(), 0);

        state
            .gpu_mut()
            .bind_surface(SurfaceTarget::Offscreen(PhysicalSize::new(32, 32)))
            .unwrap();
        assert_eq!(state.render_frame(Duration::from_millis(16)), Ok(true));
        assert_eq!(state.render_frame(Duration::from_millis(16)), Ok(false));
        assert_eq!(backend.counters().frames_presented(), 2);
        assert_eq!(state.frames_rendered(), 2);
    }

    #[test]
    fn end_lease_keeps_the_context() {
        let backend = Arc::new(HeadlessBackend::new());
        let mut state = RenderThreadState::new(backend.clone());
        state.begin_lease("a", Some(Box::new(Ticks(1))));
        state
            .gpu_mut()
            .bind_surface(SurfaceTarget::Offscreen(PhysicalSize::new(8, 8)))
            .unwrap();
        let context = state.gpu().context_id();

        state.end_lease();
        assert_eq!(state.lease(), None);
        assert!(!state.has_scene());
        assert_eq!(state.gpu().surface(), None);
        assert_eq!(state.gpu().context_id(), context);
        assert_eq!(backend.counters().surfaces_unbound(), 1);
    }
}
