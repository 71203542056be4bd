/// ### English
/// Engine modules: worker threads, the pool that leases them, per-thread GPU contexts, and the
/// surface controller that drives animation playback through them.
///
/// ### 中文
/// 引擎模块：工作线程、出借它们的线程池、每线程 GPU 上下文，以及借助它们驱动动画播放的 surface 控制器。
pub mod animation;
pub mod error;
pub mod flags;
pub mod pool;
pub mod rendering;
pub mod surface;
pub mod worker;

pub use error::{GpuError, PoolError, PoolResult};
pub use pool::{PoolConfig, PoolStats, ThreadPool, WorkerHandle, WorkerIdentity};
pub use rendering::{RenderPool, RenderThreadState};
pub use surface::SurfaceController;
