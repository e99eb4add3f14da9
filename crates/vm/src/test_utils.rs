//! 单元测试共用的环境

use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};
use device::{BLOCK_SECTOR_SIZE, RamDisk};
use sync::ArchOps;
use test_support::mock::arch::{MOCK_ARCH_OPS, MockArchOps};
use test_support::mock::mm::{MOCK_PAGE_SIZE, MockPageTable, leak_frame_region};

use crate::address::Paddr;
use crate::address_space::AddressSpace;
use crate::frame_allocator::FramePool;
use crate::frame_table::FrameTable;
use crate::swap::SwapStore;

pub const PAGE: usize = MOCK_PAGE_SIZE;
/// 测试用的用户地址，远离栈区域
pub const USER_BASE: usize = 0x1000_0000;

struct SyncOps(&'static MockArchOps);

impl ArchOps for SyncOps {
    unsafe fn read_and_disable_interrupts(&self) -> usize {
        unsafe { self.0.read_and_disable_interrupts() }
    }

    unsafe fn restore_interrupts(&self, flags: usize) {
        unsafe { self.0.restore_interrupts(flags) }
    }

    fn interrupt_enable_mask(&self) -> usize {
        self.0.interrupt_enable_mask()
    }
}

static SYNC_OPS: SyncOps = SyncOps(&MOCK_ARCH_OPS);
// 0 = 未注册，1 = 注册中，2 = 就绪
static SYNC_INIT: AtomicUsize = AtomicUsize::new(0);

/// 注册锁需要的架构操作；`VmConfig` 和 `ArchVmOps` 在测试中自动退回到 mock
pub fn init() {
    match SYNC_INIT.compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {
            // Safety: 所有测试共用同一个 mock
            unsafe { sync::register_arch_ops(&SYNC_OPS) };
            SYNC_INIT.store(2, Ordering::Release);
        }
        Err(_) => {
            while SYNC_INIT.load(Ordering::Acquire) != 2 {
                core::hint::spin_loop();
            }
        }
    }
}

pub fn new_pool(frames: usize) -> Arc<FramePool> {
    let (start, end) = leak_frame_region(frames);
    FramePool::new(Paddr(start), Paddr(end))
}

pub fn new_swap(slots: usize) -> Arc<SwapStore> {
    SwapStore::new(RamDisk::new(slots * PAGE, BLOCK_SECTOR_SIZE, 99))
}

pub fn new_frame_table(frames: usize, slots: usize) -> Arc<FrameTable> {
    FrameTable::new(new_pool(frames), new_swap(slots))
}

pub fn new_space(frames: usize, slots: usize) -> (AddressSpace, Arc<MockPageTable>, Arc<FrameTable>) {
    let pt = Arc::new(MockPageTable::new());
    let frames = new_frame_table(frames, slots);
    let space = AddressSpace::new(pt.clone(), frames.clone());
    (space, pt, frames)
}
