use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel as channel;
use dpi::PhysicalSize;
use rive_gpu_workers::engine::animation::{Artboard, InputHandle, Playback, StateMachineScene};
use rive_gpu_workers::engine::rendering::{Frame, HeadlessBackend, SurfaceTarget};
use rive_gpu_workers::{GpuError, PoolConfig, RenderPool, SurfaceController};

const WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn render_pool(backend: &Arc<HeadlessBackend>) -> Arc<RenderPool> {
    init_tracing();
    Arc::new(RenderPool::with_backend(PoolConfig::default(), backend.clone()))
}

struct Board;

impl Artboard for Board {
    fn draw(&mut self, frame: &mut Frame<'_>) {
        assert!(frame.size().width > 0 && frame.size().height > 0);
    }
}

/// Plays for `remaining` seconds of animation time, then settles.
struct Clip {
    remaining: f32,
}

impl Playback for Clip {
    type Artboard = Board;

    fn advance(&mut self, elapsed_seconds: f32) -> bool {
        self.remaining -= elapsed_seconds;
        self.remaining > 0.0
    }

    fn apply(&mut self, _artboard: &mut Board) {}

    fn input_count(&self) -> usize {
        0
    }

    fn input(&self, _index: usize) -> Option<InputHandle> {
        None
    }
}

fn clip(seconds: f32) -> StateMachineScene<Clip> {
    StateMachineScene::new(Clip { remaining: seconds }, Board)
}

fn offscreen(width: u32, height: u32) -> SurfaceTarget {
    SurfaceTarget::Offscreen(PhysicalSize::new(width, height))
}

#[test]
fn gpu_context_survives_release_and_reacquire() {
    let backend = Arc::new(HeadlessBackend::new());
    let pool = render_pool(&backend);

    let first = SurfaceController::attach(pool.clone(), "draw-1", clip(10.0)).unwrap();
    first
        .surface_changed(offscreen(100, 100))
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap()
        .unwrap();
    let first_context = first
        .submit(|state| state.gpu().context_id())
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap();
    let first_thread = first.identity().unwrap().thread_id;
    first.detach().unwrap();

    let second = SurfaceController::attach(pool.clone(), "draw-2", clip(10.0)).unwrap();
    second
        .surface_changed(offscreen(50, 50))
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap()
        .unwrap();
    let second_context = second
        .submit(|state| state.gpu().context_id())
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap();

    assert!(first_context.is_some());
    assert_eq!(second_context, first_context);
    assert_eq!(second.identity().unwrap().thread_id, first_thread);
    assert_eq!(backend.counters().contexts_created(), 1);
}

#[test]
fn release_detach_runs_before_the_next_lessee() {
    let backend = Arc::new(HeadlessBackend::new());
    let pool = render_pool(&backend);

    let handle = pool
        .acquire("draw-1", |state| {
            state.begin_lease("draw-1", None);
            state
                .gpu_mut()
                .bind_surface(offscreen(16, 16))
                .unwrap();
        })
        .unwrap();
    pool.release(handle, |state| {
        thread::sleep(Duration::from_millis(50));
        state.end_lease();
    })
    .unwrap();

    let (seen_tx, seen_rx) = channel::bounded(1);
    let next = pool
        .acquire("draw-2", move |state| {
            let _ = seen_tx.send((state.gpu().surface(), state.lease().map(str::to_string)));
            state.begin_lease("draw-2", None);
        })
        .unwrap();
    assert_eq!(next.index(), handle.index());

    let (surface, lease) = seen_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(surface, None);
    assert_eq!(lease, None);
    assert_eq!(backend.counters().surfaces_unbound(), 1);
}

#[test]
fn context_creation_failure_reaches_the_caller_and_is_retried() {
    let backend = Arc::new(HeadlessBackend::failing(1));
    let pool = render_pool(&backend);
    let controller = SurfaceController::attach(pool, "fragile", clip(1.0)).unwrap();

    let first = controller
        .surface_changed(offscreen(32, 32))
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap();
    assert!(matches!(first, Err(GpuError::ContextCreation(_))));
    assert_eq!(backend.counters().contexts_created(), 0);

    let second = controller
        .surface_changed(offscreen(32, 32))
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap();
    assert_eq!(second, Ok(PhysicalSize::new(32, 32)));
    assert_eq!(backend.counters().contexts_created(), 1);
}

#[test]
fn failed_rebind_can_be_retried_with_the_previous_surface() {
    let backend = Arc::new(HeadlessBackend::new());
    let pool = render_pool(&backend);
    let controller = SurfaceController::attach(pool, "rebind", clip(10.0)).unwrap();
    controller
        .surface_changed(offscreen(40, 40))
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap()
        .unwrap();

    backend.fail_next_binds(1);
    let failed = controller
        .surface_changed(offscreen(80, 80))
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap();
    assert!(matches!(failed, Err(GpuError::SurfaceBinding(_))));

    let retried = controller
        .surface_changed(offscreen(40, 40))
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap();
    assert_eq!(retried, Ok(PhysicalSize::new(40, 40)));
    assert_eq!(backend.counters().surfaces_bound(), 2);

    assert!(controller.request_frame(Duration::from_millis(16)).unwrap());
    controller
        .submit(|_| ())
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap();
    assert_eq!(controller.frames_rendered(), 1);
    assert_eq!(backend.counters().frames_presented(), 1);
}

#[test]
fn frame_requests_coalesce_while_one_is_pending() {
    let backend = Arc::new(HeadlessBackend::new());
    let pool = render_pool(&backend);
    let controller = SurfaceController::attach(pool, "coalesce", clip(100.0)).unwrap();
    controller
        .surface_changed(offscreen(20, 20))
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap()
        .unwrap();

    let (gate_tx, gate_rx) = channel::bounded::<()>(0);
    controller
        .submit(move |_| {
            let _ = gate_rx.recv();
        })
        .unwrap();

    assert!(controller.request_frame(Duration::from_millis(16)).unwrap());
    assert!(!controller.request_frame(Duration::from_millis(16)).unwrap());
    assert!(!controller.request_frame(Duration::from_millis(16)).unwrap());
    gate_tx.send(()).unwrap();

    controller
        .submit(|_| ())
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap();
    assert_eq!(controller.frames_rendered(), 1);
    assert_eq!(backend.counters().frames_presented(), 1);
    assert!(controller.is_playing());
}

#[test]
fn playback_settles_and_reports_not_playing() {
    let backend = Arc::new(HeadlessBackend::new());
    let pool = render_pool(&backend);
    let controller = SurfaceController::attach(pool, "short", clip(0.05)).unwrap();
    controller
        .surface_changed(offscreen(20, 20))
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap()
        .unwrap();

    for _ in 0..5 {
        controller.request_frame(Duration::from_millis(16)).unwrap();
        controller
            .submit(|_| ())
            .unwrap()
            .wait_timeout(WAIT)
            .unwrap();
    }
    assert!(!controller.is_playing());
    assert_eq!(controller.frames_rendered(), 5);
}

#[test]
fn gpu_work_never_leaves_the_worker_threads() {
    let backend = Arc::new(HeadlessBackend::new());
    let pool = render_pool(&backend);

    let controllers: Vec<_> = (0..4)
        .map(|i| {
            let controller =
                SurfaceController::attach(pool.clone(), &format!("card-{i}"), clip(5.0)).unwrap();
            controller
                .surface_changed(offscreen(10 + i, 10))
                .unwrap()
                .wait_timeout(WAIT)
                .unwrap()
                .unwrap();
            controller
        })
        .collect();
    for controller in &controllers {
        controller.request_frame(Duration::from_millis(16)).unwrap();
        controller.surface_destroyed().unwrap().wait_timeout(WAIT).unwrap().unwrap();
    }
    drop(controllers);
    pool.shutdown();

    let counters = backend.counters();
    assert_eq!(counters.foreign_thread_uses(), 0);
    assert_eq!(counters.contexts_created(), 4);
    assert_eq!(counters.contexts_destroyed(), 4);
    assert_eq!(counters.frames_presented(), 4);
}
