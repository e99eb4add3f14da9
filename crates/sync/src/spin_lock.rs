//! 带数据的自旋锁

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use crate::raw_spin_lock::{RawSpinLock, RawSpinLockGuard};

/// 保护一份数据的自旋锁
///
/// 不可重入：同一执行流在持锁时再次 `lock()` 会死锁。
/// 持锁期间本地中断关闭，临界区应只做内存操作。
#[derive(Debug)]
pub struct SpinLock<T> {
    raw: RawSpinLock,
    data: UnsafeCell<T>,
}

// SAFETY: 对 data 的访问都经过 raw 锁互斥
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// 用给定数据创建锁
    pub const fn new(data: T) -> Self {
        SpinLock {
            raw: RawSpinLock::new(),
            data: UnsafeCell::new(data),
        }
    }

    /// 取得锁并返回访问数据的守卫
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let raw_guard = self.raw.lock();
        SpinLockGuard {
            _raw_guard: raw_guard,
            // SAFETY: 已持有锁
            data: unsafe { &mut *self.data.get() },
        }
    }

    /// 尝试取锁一次
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        self.raw.try_lock().map(|raw_guard| SpinLockGuard {
            _raw_guard: raw_guard,
            // SAFETY: 已持有锁
            data: unsafe { &mut *self.data.get() },
        })
    }

    /// 通过独占引用访问数据，无需加锁
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// 消耗锁并取出数据
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    /// 锁当前是否被持有（仅供断言和调试）
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// [`SpinLock`] 的 RAII 守卫，离开作用域时释放锁
pub struct SpinLockGuard<'a, T> {
    _raw_guard: RawSpinLockGuard<'a>,
    data: &'a mut T,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.data
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.data
    }
}
