//! 关中断自旋锁
//!
//! 帧表锁与交换锁都建立在它之上。加锁顺序固定为“先关中断、再抢锁”，
//! 这样持锁期间本地中断处理程序不会再次尝试同一把锁。

use crate::intr_guard::IntrGuard;
use core::hint;
use core::sync::atomic::{AtomicBool, Ordering};

/// 不可重入的原始自旋锁
#[derive(Debug)]
pub struct RawSpinLock {
    locked: AtomicBool,
}

impl RawSpinLock {
    /// 创建一把未上锁的锁
    pub const fn new() -> Self {
        RawSpinLock {
            locked: AtomicBool::new(false),
        }
    }

    /// 关中断并自旋直到取得锁
    pub fn lock(&self) -> RawSpinLockGuard<'_> {
        let intr_guard = IntrGuard::new();
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // 只读等待，避免在争用时反复写缓存行
            while self.locked.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
        }
        RawSpinLockGuard {
            lock: self,
            _intr_guard: intr_guard,
        }
    }

    /// 尝试取锁一次，失败时立即恢复中断状态
    pub fn try_lock(&self) -> Option<RawSpinLockGuard<'_>> {
        let intr_guard = IntrGuard::new();
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| RawSpinLockGuard {
                lock: self,
                _intr_guard: intr_guard,
            })
    }

    /// 锁当前是否被持有（仅供断言和调试）
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl Default for RawSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

/// [`RawSpinLock`] 的守卫
///
/// 字段按声明顺序析构：先在 Drop 中释放锁标志，再由 `_intr_guard` 恢复中断。
pub struct RawSpinLockGuard<'a> {
    lock: &'a RawSpinLock,
    _intr_guard: IntrGuard,
}

impl Drop for RawSpinLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}
