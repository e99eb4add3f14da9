//! 读写自旋锁
//!
//! 原始锁实现 [`lock_api::RawRwLock`]，守卫与毒化无关的外壳都由 `lock_api` 提供。
//! 该锁不关中断，只用于不会在中断上下文中访问的注册表（例如块设备列表）。

use core::hint;
use core::sync::atomic::{AtomicUsize, Ordering};

const WRITER: usize = 1;
const READER: usize = 2;

/// 读写自旋锁的原始实现
///
/// 状态字最低位表示写者，其余位是读者计数（每个读者加 2）。
pub struct RawSpinRwLock {
    state: AtomicUsize,
}

unsafe impl lock_api::RawRwLock for RawSpinRwLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSpinRwLock {
        state: AtomicUsize::new(0),
    };

    type GuardMarker = lock_api::GuardSend;

    fn lock_shared(&self) {
        while !self.try_lock_shared() {
            hint::spin_loop();
        }
    }

    fn try_lock_shared(&self) -> bool {
        let prev = self.state.fetch_add(READER, Ordering::Acquire);
        if prev & WRITER != 0 {
            self.state.fetch_sub(READER, Ordering::Release);
            return false;
        }
        true
    }

    unsafe fn unlock_shared(&self) {
        self.state.fetch_sub(READER, Ordering::Release);
    }

    fn lock_exclusive(&self) {
        while !self.try_lock_exclusive() {
            hint::spin_loop();
        }
    }

    fn try_lock_exclusive(&self) -> bool {
        self.state
            .compare_exchange(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock_exclusive(&self) {
        // 读者可能在写者持锁期间短暂加过计数，只撤掉写位
        self.state.fetch_sub(WRITER, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != 0
    }
}

/// 读写锁
pub type RwLock<T> = lock_api::RwLock<RawSpinRwLock, T>;
/// 读守卫
pub type RwLockReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, RawSpinRwLock, T>;
/// 写守卫
pub type RwLockWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, RawSpinRwLock, T>;
