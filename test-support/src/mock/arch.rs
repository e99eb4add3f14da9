//! 中断开关的 Mock 实现

use core::sync::atomic::{AtomicBool, Ordering};

/// 中断使能位
const INTR_ENABLE: usize = 0x2;

/// Mock 架构操作：用一个原子布尔值模拟本地中断开关
pub struct MockArchOps {
    pub interrupts_enabled: AtomicBool,
}

impl MockArchOps {
    pub const fn new() -> Self {
        Self {
            interrupts_enabled: AtomicBool::new(true),
        }
    }

    /// # Safety
    /// 仅用于测试
    pub unsafe fn read_and_disable_interrupts(&self) -> usize {
        if self.interrupts_enabled.swap(false, Ordering::SeqCst) {
            INTR_ENABLE
        } else {
            0
        }
    }

    /// # Safety
    /// 仅用于测试
    pub unsafe fn restore_interrupts(&self, flags: usize) {
        self.interrupts_enabled
            .store(flags & INTR_ENABLE != 0, Ordering::SeqCst);
    }

    pub fn interrupt_enable_mask(&self) -> usize {
        INTR_ENABLE
    }
}

/// 全局 Mock 实例
pub static MOCK_ARCH_OPS: MockArchOps = MockArchOps::new();
