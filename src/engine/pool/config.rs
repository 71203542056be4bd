//! ### English
//! Pool configuration.
//!
//! ### 中文
//! 线程池配置。

use std::num::NonZeroUsize;

/// ### English
/// Creation parameters for a [`super::ThreadPool`].
///
/// ### 中文
/// [`super::ThreadPool`] 的创建参数。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// ### English
    /// Prefix for OS-level thread names (`"{prefix}-{ordinal}"`).
    ///
    /// ### 中文
    /// OS 层线程名前缀（`"{prefix}-{ordinal}"`）。
    pub thread_name_prefix: String,
    /// ### English
    /// Upper bound on live worker threads. `None` lets the pool grow without limit, which is
    /// what the embedder gets when it passes `thread_cap = 0` through the C ABI.
    ///
    /// ### 中文
    /// 存活工作线程的上限。`None` 表示线程池无限增长；通过 C ABI 传入 `thread_cap = 0` 时即为该行为。
    pub max_threads: Option<NonZeroUsize>,
    /// ### English
    /// Optional stack size for worker threads.
    ///
    /// ### 中文
    /// 工作线程的可选栈大小。
    pub stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "gpu-worker".to_string(),
            max_threads: None,
            stack_size: None,
        }
    }
}

impl PoolConfig {
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// ### English
    /// Caps live worker threads; `0` means "no cap".
    ///
    /// ### 中文
    /// 限制存活工作线程数量；`0` 表示“不封顶”。
    pub fn with_max_threads(mut self, cap: usize) -> Self {
        self.max_threads = NonZeroUsize::new(cap);
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    pub(super) fn thread_name(&self, ordinal: usize) -> String {
        format!("{}-{ordinal}", self.thread_name_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_cap_means_unbounded() {
        let config = PoolConfig::default().with_max_threads(0);
        assert_eq!(config.max_threads, None);
        let config = config.with_max_threads(4);
        assert_eq!(config.max_threads.map(NonZeroUsize::get), Some(4));
    }

    #[test]
    fn thread_names_use_prefix_and_ordinal() {
        let config = PoolConfig::default().with_thread_name_prefix("render");
        assert_eq!(config.thread_name(3), "render-3");
    }
}
