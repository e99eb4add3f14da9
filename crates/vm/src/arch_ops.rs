//! 架构相关操作 trait 定义和注册

use core::sync::atomic::{AtomicUsize, Ordering};

/// 架构相关的内存操作
///
/// 帧表需要通过内核的直接映射区域读写物理帧的内容。
pub trait ArchVmOps: Send + Sync {
    /// 将虚拟地址转换为物理地址（直接映射区域）
    ///
    /// # Safety
    /// 调用者必须确保虚拟地址位于直接映射区域内
    unsafe fn vaddr_to_paddr(&self, vaddr: usize) -> usize;

    /// 将物理地址转换为内核可访问的虚拟地址（直接映射区域）
    fn paddr_to_vaddr(&self, paddr: usize) -> usize;
}

static ARCH_OPS_DATA: AtomicUsize = AtomicUsize::new(0);
static ARCH_OPS_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册架构操作实现
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_arch_ops(ops: &'static dyn ArchVmOps) {
    let ptr = ops as *const dyn ArchVmOps;
    // SAFETY: fat pointer 由 data 和 vtable 两部分组成
    let (data, vtable) = unsafe { core::mem::transmute::<*const dyn ArchVmOps, (usize, usize)>(ptr) };
    ARCH_OPS_VTABLE.store(vtable, Ordering::Release);
    ARCH_OPS_DATA.store(data, Ordering::Release);
}

/// 获取已注册的架构操作实现
///
/// # Panics
/// 如果尚未调用 [`register_arch_ops`]，则 panic（单元测试中退回到恒等映射的 mock）
#[inline]
pub fn arch_ops() -> &'static dyn ArchVmOps {
    let data = ARCH_OPS_DATA.load(Ordering::Acquire);
    let vtable = ARCH_OPS_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        #[cfg(test)]
        {
            return &test_support::mock::mm::MOCK_MM_OPS;
        }
        #[cfg(not(test))]
        panic!("vm: ArchVmOps not registered");
    }
    // SAFETY: data 和 vtable 由 register_arch_ops 写入
    unsafe { &*core::mem::transmute::<(usize, usize), *const dyn ArchVmOps>((data, vtable)) }
}

#[cfg(test)]
mod test_mock {
    use super::ArchVmOps;
    use test_support::mock::mm::MockMmOps;

    impl ArchVmOps for MockMmOps {
        unsafe fn vaddr_to_paddr(&self, vaddr: usize) -> usize {
            unsafe { MockMmOps::vaddr_to_paddr(self, vaddr) }
        }

        fn paddr_to_vaddr(&self, paddr: usize) -> usize {
            MockMmOps::paddr_to_vaddr(self, paddr)
        }
    }
}
