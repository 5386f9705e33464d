//! 让出式互斥锁
//!
//! 持锁者可能在磁盘 I/O 中让出处理器，此时其它线程若原地自旋，
//! 持锁者永远得不到运行。因此锁被占用时调用让出钩子，
//! 把处理器交给别的线程，轮到自己时再试。

use alloc::sync::Arc;

use spin::{Mutex, MutexGuard};

/// 让出处理器的钩子
pub type YieldHook = Arc<dyn Fn() + Send + Sync>;

pub struct YieldMutex<T> {
    inner: Mutex<T>,
    /// 为空时退化为普通自旋锁
    yield_hook: Option<YieldHook>,
}

impl<T> YieldMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            yield_hook: None,
        }
    }

    pub fn with_yield(value: T, yield_hook: YieldHook) -> Self {
        Self {
            inner: Mutex::new(value),
            yield_hook: Some(yield_hook),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        loop {
            if let Some(guard) = self.inner.try_lock() {
                return guard;
            }
            match &self.yield_hook {
                Some(yield_now) => yield_now(),
                None => core::hint::spin_loop(),
            }
        }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock()
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}
