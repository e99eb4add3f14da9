//! 集成测试共用的注册和包装类型

#![allow(dead_code)]

use std::sync::{Arc, Once};

use test_support::mock::arch::MOCK_ARCH_OPS;
use test_support::mock::mm::{MOCK_MM_CONFIG, MOCK_MM_OPS, MockFile, MockPageTable, leak_frame_region};
use vm::{
    AddressSpace, ArchVmOps, BackingFile, FramePool, FrameTable, Paddr, PageTable, PagingError, PagingResult, Ppn,
    PteFlags, SwapStore, VmConfig, Vpn,
};

pub const PAGE: usize = 4096;

struct Arch;

impl sync::ArchOps for Arch {
    unsafe fn read_and_disable_interrupts(&self) -> usize {
        unsafe { MOCK_ARCH_OPS.read_and_disable_interrupts() }
    }

    unsafe fn restore_interrupts(&self, flags: usize) {
        unsafe { MOCK_ARCH_OPS.restore_interrupts(flags) }
    }

    fn interrupt_enable_mask(&self) -> usize {
        MOCK_ARCH_OPS.interrupt_enable_mask()
    }
}

struct Config;

impl VmConfig for Config {
    fn page_size(&self) -> usize {
        MOCK_MM_CONFIG.page_size()
    }

    fn user_stack_top(&self) -> usize {
        MOCK_MM_CONFIG.user_stack_top()
    }

    fn max_stack_size(&self) -> usize {
        MOCK_MM_CONFIG.max_stack_size()
    }
}

struct DirectMap;

impl ArchVmOps for DirectMap {
    unsafe fn vaddr_to_paddr(&self, vaddr: usize) -> usize {
        unsafe { MOCK_MM_OPS.vaddr_to_paddr(vaddr) }
    }

    fn paddr_to_vaddr(&self, paddr: usize) -> usize {
        MOCK_MM_OPS.paddr_to_vaddr(paddr)
    }
}

static ARCH: Arch = Arch;
static CONFIG: Config = Config;
static DIRECT_MAP: DirectMap = DirectMap;
static INIT: Once = Once::new();

pub fn setup() {
    INIT.call_once(|| unsafe {
        sync::register_arch_ops(&ARCH);
        vm::register_config(&CONFIG);
        vm::register_arch_ops(&DIRECT_MAP);
    });
}

/// 软件页表
pub struct TestPageTable(pub MockPageTable);

impl PageTable for TestPageTable {
    fn map(&self, vpn: Vpn, ppn: Ppn, flags: PteFlags) -> PagingResult<()> {
        if self.0.map(vpn.0, ppn.0, flags.contains(PteFlags::WRITEABLE)) {
            Ok(())
        } else {
            Err(PagingError::AlreadyMapped)
        }
    }

    fn unmap(&self, vpn: Vpn) -> PagingResult<()> {
        if self.0.unmap(vpn.0) {
            Ok(())
        } else {
            Err(PagingError::NotMapped)
        }
    }

    fn translate(&self, vpn: Vpn) -> Option<Ppn> {
        self.0.entry(vpn.0).map(|pte| Ppn(pte.ppn))
    }

    fn is_accessed(&self, vpn: Vpn) -> bool {
        self.0.entry(vpn.0).is_some_and(|pte| pte.accessed)
    }

    fn clear_accessed(&self, vpn: Vpn) {
        self.0.set_accessed(vpn.0, false);
    }

    fn is_dirty(&self, vpn: Vpn) -> bool {
        self.0.entry(vpn.0).is_some_and(|pte| pte.dirty)
    }
}

/// 内存中的后备文件
pub struct TestFile(pub MockFile);

impl BackingFile for TestFile {
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, isize> {
        self.0.read_at(offset, buf)
    }
}

pub fn frame_table(frames: usize, slots: usize) -> Arc<FrameTable> {
    let (start, end) = leak_frame_region(frames);
    let swap = SwapStore::new(device::RamDisk::new(slots * PAGE, 512, 1));
    FrameTable::new(FramePool::new(Paddr(start), Paddr(end)), swap)
}

pub fn space(frames: &Arc<FrameTable>) -> (AddressSpace, Arc<TestPageTable>) {
    let pt = Arc::new(TestPageTable(MockPageTable::new()));
    (AddressSpace::new(pt.clone(), frames.clone()), pt)
}
