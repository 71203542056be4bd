//! ### English
//! Generation-tagged lease handles.
//!
//! ### 中文
//! 带代数（generation）标记的租约句柄。

/// ### English
/// Opaque handle for one lease of one worker.
///
/// `index` points into the pool's worker arena; `generation` is bumped on every acquire, so a
/// handle kept past its release no longer matches and is rejected instead of reaching the next
/// lessee's worker. Generation `0` is never issued.
///
/// ### 中文
/// 某个工作线程一次租约的不透明句柄。
///
/// `index` 指向线程池的工作线程 arena；每次 acquire 都会递增 `generation`，因此 release 之后仍被持有的句柄
/// 将无法匹配并被拒绝，而不会作用到下一个租用者的工作线程上。代数 `0` 永不分配。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkerHandle {
    index: u32,
    generation: u32,
}

impl WorkerHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// ### English
    /// Rebuilds a handle from its raw parts (C ABI round trip). Validity is checked by the pool.
    ///
    /// ### 中文
    /// 由原始字段重建句柄（C ABI 往返使用）。有效性由线程池检查。
    pub fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// ### English
/// Next lease generation, skipping the reserved `0` on wrap.
///
/// ### 中文
/// 下一个租约代数；回绕时跳过保留值 `0`。
pub(super) fn next_generation(current: u32) -> u32 {
    match current.wrapping_add(1) {
        0 => 1,
        next => next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_skips_zero_on_wrap() {
        assert_eq!(next_generation(0), 1);
        assert_eq!(next_generation(41), 42);
        assert_eq!(next_generation(u32::MAX), 1);
    }
}
