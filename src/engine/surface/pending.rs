//! ### English
//! Coalesced frame requests shared between the host frame callback and the leased worker.
//!
//! ### 中文
//! 宿主帧回调与被租用工作线程之间共享的合并帧请求。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// ### English
/// At most one frame task is in flight per surface; elapsed time requested meanwhile accumulates
/// and is consumed by that task.
///
/// ### 中文
/// 每个 surface 至多有一个帧任务在途；期间请求的耗时会累加，并由该任务一次性消费。
#[derive(Default)]
pub(super) struct PendingFrame {
    /// ### English
    /// `true` while a frame task is queued and has not started.
    ///
    /// ### 中文
    /// 帧任务已入队且尚未开始执行时为 `true`。
    queued: AtomicBool,
    elapsed_nanos: AtomicU64,
    playing: AtomicBool,
    rendered: AtomicU64,
}

impl PendingFrame {
    /// ### English
    /// Adds `elapsed` to the backlog. Returns `true` iff the caller must queue a frame task.
    ///
    /// ### 中文
    /// 将 `elapsed` 累加到积压中。仅当调用方需要入队一个帧任务时返回 `true`。
    pub(super) fn request(&self, elapsed: Duration) -> bool {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .elapsed_nanos
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |total| {
                Some(total.saturating_add(nanos))
            });
        !self.queued.swap(true, Ordering::AcqRel)
    }

    /// ### English
    /// Undoes a `request` whose task could not be queued.
    ///
    /// ### 中文
    /// 撤销一次任务未能入队的 `request`。
    pub(super) fn cancel(&self) {
        self.queued.store(false, Ordering::Release);
    }

    /// ### English
    /// Called by the frame task when it starts: reopens the slot, then drains the backlog.
    ///
    /// ### 中文
    /// 帧任务开始时调用：先重新开放槽位，再取走积压的耗时。
    pub(super) fn take(&self) -> Duration {
        self.queued.store(false, Ordering::Release);
        Duration::from_nanos(self.elapsed_nanos.swap(0, Ordering::AcqRel))
    }

    pub(super) fn finish(&self, playing: bool, rendered: bool) {
        self.playing.store(playing, Ordering::Release);
        if rendered {
            self.rendered.fetch_add(1, Ordering::AcqRel);
        }
    }

    #[cfg(test)]
    pub(super) fn is_queued(&self) -> bool {
        self.queued.load(Ordering::Acquire)
    }

    pub(super) fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub(super) fn frames(&self) -> u64 {
        self.rendered.load(Ordering::Acquire)
    }
}
