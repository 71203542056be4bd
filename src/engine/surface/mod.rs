//! ### English
//! Render surface controller: one per on-screen (or offscreen) animation surface.
//!
//! It leases a render worker for the surface's attached lifetime and only ever talks to the GPU
//! through tasks queued on that worker.
//!
//! ### 中文
//! 渲染 surface 控制器：每个屏幕上（或离屏）的动画 surface 一个。
//!
//! 它在 surface 附着期间租用一个渲染工作线程，并且只通过在该线程上入队的任务访问 GPU。

mod pending;

use std::sync::Arc;
use std::time::Duration;

use dpi::PhysicalSize;

use crate::engine::animation::Scene;
use crate::engine::error::{GpuError, PoolError, PoolResult};
use crate::engine::pool::{WorkerHandle, WorkerIdentity};
use crate::engine::rendering::{RenderPool, RenderThreadState, SurfaceTarget};
use crate::engine::worker::Completion;

use pending::PendingFrame;

/// ### English
/// Drives one surface: configure on surface change, advance+draw per host frame, detach and
/// release on teardown. Dropping the controller releases the lease.
///
/// ### 中文
/// 驱动一个 surface：surface 变化时重新配置，每个宿主帧推进并绘制，销毁时解绑并释放。
/// drop 控制器会释放租约。
pub struct SurfaceController {
    pool: Arc<RenderPool>,
    handle: WorkerHandle,
    name: String,
    frame: Arc<PendingFrame>,
    /// ### English
    /// Set once the lease was handed back, so `Drop` does not release it twice.
    ///
    /// ### 中文
    /// 租约归还后置位，避免 `Drop` 再次释放。
    released: bool,
}

impl SurfaceController {
    /// ### English
    /// Leases a worker and installs `scene` on it as the first task of the lease.
    ///
    /// #### Parameters
    /// - `pool`: Render pool to lease from.
    /// - `name`: Lease name (shows up in logs and worker identity).
    /// - `scene`: What this surface plays.
    ///
    /// ### 中文
    /// 租用一个工作线程，并把 `scene` 作为本次租约的第一个任务安装到该线程上。
    ///
    /// #### 参数
    /// - `pool`：租用来源的渲染线程池。
    /// - `name`：租约名（出现在日志与工作线程身份中）。
    /// - `scene`：该 surface 播放的内容。
    pub fn attach(
        pool: Arc<RenderPool>,
        name: &str,
        scene: impl Scene + 'static,
    ) -> PoolResult<Self> {
        let lease = name.to_string();
        let scene: Box<dyn Scene> = Box::new(scene);
        let handle = pool.acquire(name, move |state: &mut RenderThreadState| {
            state.begin_lease(lease, Some(scene));
        })?;
        Ok(Self {
            pool,
            handle,
            name: name.to_string(),
            frame: Arc::new(PendingFrame::default()),
            released: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle
    }

    pub fn identity(&self) -> PoolResult<WorkerIdentity> {
        self.pool.identity(self.handle)
    }

    /// ### English
    /// Host surface was created or resized: (re)binds it on the worker and sets the viewport.
    /// The returned completion carries the GPU outcome; a failure is also logged, and calling
    /// again retries (including context creation).
    ///
    /// ### 中文
    /// 宿主 surface 已创建或尺寸改变：在工作线程上（重新）绑定并设置视口。
    /// 返回的 completion 携带 GPU 结果；失败同时会被记录日志，再次调用即重试（包括上下文创建）。
    pub fn surface_changed(
        &self,
        target: SurfaceTarget,
    ) -> PoolResult<Completion<Result<PhysicalSize<u32>, GpuError>>> {
        let name = self.name.clone();
        self.pool.submit(self.handle, move |state| {
            state.gpu_mut().bind_surface(target).inspect_err(|err| {
                tracing::warn!(surface = %name, "surface configuration failed: {err}");
            })
        })
    }

    /// ### English
    /// Host surface is going away: detaches it on the worker, keeping the GPU context. Wait on the
    /// completion before letting the native window die.
    ///
    /// ### 中文
    /// 宿主 surface 即将销毁：在工作线程上解绑，保留 GPU 上下文。请在原生窗口销毁前等待该 completion。
    pub fn surface_destroyed(&self) -> PoolResult<Completion<Result<(), GpuError>>> {
        self.pool
            .submit(self.handle, |state| state.gpu_mut().detach_surface())
    }

    /// ### English
    /// Host frame callback. Queues one advance+draw task unless one is already pending, in which
    /// case `elapsed` is folded into it. Returns whether a new task was queued.
    ///
    /// ### 中文
    /// 宿主帧回调。入队一个推进+绘制任务；若已有待执行任务，则把 `elapsed` 合并进去。返回是否新入队了任务。
    pub fn request_frame(&self, elapsed: Duration) -> PoolResult<bool> {
        if !self.frame.request(elapsed) {
            tracing::trace!(surface = %self.name, "frame already pending, coalesced");
            return Ok(false);
        }

        let frame = self.frame.clone();
        let name = self.name.clone();
        let queued = self.pool.queue(self.handle, move |state| {
            let elapsed = frame.take();
            match state.render_frame(elapsed) {
                Ok(playing) => frame.finish(playing, state.gpu().surface().is_some()),
                Err(err) => {
                    tracing::warn!(surface = %name, "frame failed: {err}");
                    frame.finish(false, false);
                }
            }
        });
        if let Err(err) = queued {
            self.frame.cancel();
            return Err(err);
        }
        Ok(true)
    }

    /// ### English
    /// Result of the most recent advance: whether the scene still wants frames.
    ///
    /// ### 中文
    /// 最近一次推进的结果：场景是否仍需要后续帧。
    pub fn is_playing(&self) -> bool {
        self.frame.is_playing()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frame.frames()
    }

    /// ### English
    /// Queues `task` on this surface's worker and returns its completion.
    ///
    /// ### 中文
    /// 在该 surface 的工作线程上入队 `task` 并返回其 completion。
    pub fn submit<R: Send + 'static>(
        &self,
        task: impl FnOnce(&mut RenderThreadState) -> R + Send + 'static,
    ) -> PoolResult<Completion<R>> {
        self.pool.submit(self.handle, task)
    }

    /// ### English
    /// Ends the lease: the release task detaches the surface and drops the scene behind every
    /// task already queued.
    ///
    /// ### 中文
    /// 结束租约：release 任务排在所有已入队任务之后，解绑 surface 并丢弃场景。
    pub fn detach(mut self) -> PoolResult<()> {
        self.release_lease()
    }

    fn release_lease(&mut self) -> PoolResult<()> {
        if std::mem::replace(&mut self.released, true) {
            return Ok(());
        }
        self.pool
            .release(self.handle, |state: &mut RenderThreadState| state.end_lease())
    }
}

impl Drop for SurfaceController {
    fn drop(&mut self) {
        if let Err(err) = self.release_lease() {
            if !matches!(err, PoolError::ShutDown) {
                tracing::warn!(surface = %self.name, "failed to release worker on drop: {err}");
            }
        }
    }
}
