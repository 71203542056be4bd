//! ### English
//! Boundary to the external animation runtime.
//!
//! The runtime itself (interpolation, scene graph, rasterizer) lives outside this crate. These
//! traits describe the little the workers need from it: advance a playable instance, apply it to
//! an artboard, and draw the artboard into a frame.
//!
//! ### 中文
//! 与外部动画运行时的边界。
//!
//! 运行时本身（插值、场景图、光栅化）不在本 crate 中。这些 trait 只描述工作线程需要的部分：
//! 推进可播放实例、将其应用到 artboard，以及把 artboard 绘制到帧中。

use std::time::Duration;

use crate::engine::rendering::Frame;

/// ### English
/// Opaque runtime handle to one state-machine input.
///
/// ### 中文
/// 指向某个状态机输入的不透明运行时句柄。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InputHandle(pub u64);

/// ### English
/// Drawable target of a playable instance.
///
/// ### 中文
/// 可播放实例的可绘制目标。
pub trait Artboard: Send {
    fn draw(&mut self, frame: &mut Frame<'_>);
}

/// ### English
/// A playable instance (state machine or linear animation) built by the runtime from a file
/// definition and an artboard.
///
/// ### 中文
/// 由运行时根据文件定义与 artboard 构建的可播放实例（状态机或线性动画）。
pub trait Playback: Send {
    type Artboard: Artboard;

    /// ### English
    /// Advances by `elapsed_seconds`. Returns `false` once the instance has settled.
    ///
    /// ### 中文
    /// 推进 `elapsed_seconds` 秒。实例进入静止后返回 `false`。
    fn advance(&mut self, elapsed_seconds: f32) -> bool;

    fn apply(&mut self, artboard: &mut Self::Artboard);

    fn input_count(&self) -> usize;

    /// ### English
    /// Input at `index`, `None` when out of range.
    ///
    /// ### 中文
    /// 位于 `index` 的输入；越界时为 `None`。
    fn input(&self, index: usize) -> Option<InputHandle>;
}

/// ### English
/// What a render surface plays. Moved onto the leased worker and only touched there.
///
/// ### 中文
/// 渲染 surface 所播放的内容。会被移动到租用的工作线程上，并且只在该线程上访问。
pub trait Scene: Send {
    /// ### English
    /// Steps the scene. Returns whether it still wants frames.
    ///
    /// ### 中文
    /// 推进场景。返回其是否仍需要后续帧。
    fn advance(&mut self, elapsed: Duration) -> bool;

    fn draw(&mut self, frame: &mut Frame<'_>);
}

/// ### English
/// [`Scene`] made of a playable instance driving an artboard: advance, apply, draw.
///
/// ### 中文
/// 由可播放实例驱动 artboard 组成的 [`Scene`]：推进、应用、绘制。
pub struct StateMachineScene<P: Playback> {
    playback: P,
    artboard: P::Artboard,
    clear_color: [f32; 4],
}

impl<P: Playback> StateMachineScene<P> {
    pub fn new(playback: P, artboard: P::Artboard) -> Self {
        Self {
            playback,
            artboard,
            clear_color: [0.0, 0.0, 0.0, 0.0],
        }
    }

    /// ### English
    /// Color the surface is cleared to before the artboard draws (default: transparent).
    ///
    /// ### 中文
    /// artboard 绘制前清屏使用的颜色（默认透明）。
    pub fn with_clear_color(mut self, rgba: [f32; 4]) -> Self {
        self.clear_color = rgba;
        self
    }

    pub fn playback(&self) -> &P {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut P {
        &mut self.playback
    }

    pub fn artboard(&self) -> &P::Artboard {
        &self.artboard
    }

    /// ### English
    /// Every input the instance exposes, in index order.
    ///
    /// ### 中文
    /// 实例暴露的全部输入，按索引顺序。
    pub fn inputs(&self) -> impl Iterator<Item = InputHandle> + '_ {
        (0..self.playback.input_count()).filter_map(|index| self.playback.input(index))
    }
}

impl<P: Playback> Scene for StateMachineScene<P> {
    fn advance(&mut self, elapsed: Duration) -> bool {
        let playing = self.playback.advance(elapsed.as_secs_f32());
        self.playback.apply(&mut self.artboard);
        playing
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        frame.clear(self.clear_color);
        self.artboard.draw(frame);
    }
}
