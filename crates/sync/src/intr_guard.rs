//! 中断保护器
//!
//! 关中断只排除本地 CPU 上“任务与中断处理程序”的并发，
//! 跨 CPU 的互斥仍由自旋锁负责。

use crate::arch_ops;

/// RAII 中断保护器：创建时关闭本地中断，销毁时恢复原状态
pub struct IntrGuard {
    flags: usize,
}

impl IntrGuard {
    /// 关闭本地中断并记录之前的状态
    pub fn new() -> Self {
        // SAFETY: flags 只会在 Drop 中原样恢复
        let flags = unsafe { arch_ops().read_and_disable_interrupts() };
        IntrGuard { flags }
    }

    /// 进入临界区之前中断是否处于开启状态
    pub fn was_enabled(&self) -> bool {
        self.flags & arch_ops().interrupt_enable_mask() != 0
    }
}

impl Default for IntrGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IntrGuard {
    fn drop(&mut self) {
        // SAFETY: flags 来自 new() 中配对的关中断调用
        unsafe { arch_ops().restore_interrupts(self.flags) };
    }
}
