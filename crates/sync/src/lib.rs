//! 同步原语
//!
//! 为帧表、交换区和补充页表提供锁：
//!
//! - [`SpinLock`]：关中断的互斥自旋锁，保护帧表、交换位图等短临界区
//! - [`RwLock`]：基于 `lock_api` 的读写自旋锁，用于“启动时写、运行时读”的全局注册表
//! - [`IntrGuard`]：RAII 关中断保护器
//!
//! # 架构依赖
//!
//! 关中断/恢复中断由 [`ArchOps`] 提供，使用前必须调用 [`register_arch_ops`]。

#![no_std]

mod intr_guard;
mod raw_spin_lock;
mod rwlock;
mod spin_lock;

pub use intr_guard::IntrGuard;
pub use raw_spin_lock::{RawSpinLock, RawSpinLockGuard};
pub use rwlock::{RawSpinRwLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use spin_lock::{SpinLock, SpinLockGuard};

use core::sync::atomic::{AtomicUsize, Ordering};

/// 架构相关操作
///
/// 由内核实现并注册，只需要提供本地中断的开关。
pub trait ArchOps: Send + Sync {
    /// 读取当前中断状态并关闭本地中断，返回之前的状态
    ///
    /// # Safety
    /// 返回值只能交给 [`ArchOps::restore_interrupts`]
    unsafe fn read_and_disable_interrupts(&self) -> usize;

    /// 恢复由 [`ArchOps::read_and_disable_interrupts`] 保存的中断状态
    ///
    /// # Safety
    /// `flags` 必须来自同一 CPU 上配对的 `read_and_disable_interrupts`
    unsafe fn restore_interrupts(&self, flags: usize);

    /// 中断使能位的掩码
    fn interrupt_enable_mask(&self) -> usize;
}

static ARCH_OPS_DATA: AtomicUsize = AtomicUsize::new(0);
static ARCH_OPS_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册架构操作实现
///
/// # Safety
/// 必须在单线程环境下调用；重复注册会覆盖之前的实现
pub unsafe fn register_arch_ops(ops: &'static dyn ArchOps) {
    let ptr = ops as *const dyn ArchOps;
    // SAFETY: fat pointer 的布局是 (data, vtable)
    let (data, vtable) = unsafe { core::mem::transmute::<*const dyn ArchOps, (usize, usize)>(ptr) };
    ARCH_OPS_VTABLE.store(vtable, Ordering::Release);
    ARCH_OPS_DATA.store(data, Ordering::Release);
}

/// 是否已经注册了架构操作
pub fn arch_ops_registered() -> bool {
    ARCH_OPS_DATA.load(Ordering::Acquire) != 0
}

#[inline]
pub(crate) fn arch_ops() -> &'static dyn ArchOps {
    let data = ARCH_OPS_DATA.load(Ordering::Acquire);
    let vtable = ARCH_OPS_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        panic!("sync: ArchOps not registered, call register_arch_ops first");
    }
    // SAFETY: data 和 vtable 由 register_arch_ops 写入
    unsafe { &*core::mem::transmute::<(usize, usize), *const dyn ArchOps>((data, vtable)) }
}
