//! 虚拟内存相关的 Mock 实现
//!
//! 注意：这里不直接依赖 `vm` crate（避免循环依赖）。
//! `vm` crate 在 `cfg(test)` 下为这些类型实现其 trait（`ArchVmOps` / `VmConfig` /
//! `PageTable` / `BackingFile`）。

use alloc::alloc::{Layout, alloc_zeroed};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use spin::Mutex;

/// 测试使用的页大小
pub const MOCK_PAGE_SIZE: usize = 4096;

/// Mock 的架构操作
///
/// 采用“恒等映射”（vaddr == paddr）：测试中的“物理帧”就是宿主堆上的一段页对齐内存。
pub struct MockMmOps;

impl MockMmOps {
    pub const fn new() -> Self {
        Self
    }

    /// # Safety
    /// 仅用于测试环境的可控输入。
    pub unsafe fn vaddr_to_paddr(&self, vaddr: usize) -> usize {
        vaddr
    }

    pub fn paddr_to_vaddr(&self, paddr: usize) -> usize {
        paddr
    }
}

/// 全局 Mock 实例
pub static MOCK_MM_OPS: MockMmOps = MockMmOps::new();

/// Mock 的虚拟内存配置
pub struct MockMmConfig;

impl MockMmConfig {
    pub const fn new() -> Self {
        Self
    }

    pub fn page_size(&self) -> usize {
        MOCK_PAGE_SIZE
    }

    pub fn user_stack_top(&self) -> usize {
        0x8000_0000
    }

    pub fn max_stack_size(&self) -> usize {
        // 与 Pintos 的 STACK_MAX 相同
        1024 * 1024
    }

    pub fn stack_access_slop(&self) -> usize {
        32
    }
}

/// 全局 Mock 实例
pub static MOCK_MM_CONFIG: MockMmConfig = MockMmConfig::new();

/// 分配一段页对齐、清零且永不释放的内存，充当测试用的物理内存
///
/// 返回 `[start, end)` 地址区间。
pub fn leak_frame_region(pages: usize) -> (usize, usize) {
    let size = pages.max(1) * MOCK_PAGE_SIZE;
    let layout = Layout::from_size_align(size, MOCK_PAGE_SIZE).expect("bad layout");
    // SAFETY: layout 大小非零
    let start = unsafe { alloc_zeroed(layout) } as usize;
    assert!(start != 0, "test-support: out of host memory");
    (start, start + size)
}

/// Mock 页表项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPte {
    pub ppn: usize,
    pub writable: bool,
    pub accessed: bool,
    pub dirty: bool,
}

/// 软件模拟的硬件页表
///
/// 只记录 vpn → [`MockPte`]；“硬件访问”通过 [`MockPageTable::touch`] 模拟。
pub struct MockPageTable {
    entries: Mutex<BTreeMap<usize, MockPte>>,
    fail_next_map: AtomicBool,
    unmap_count: AtomicUsize,
}

impl MockPageTable {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            fail_next_map: AtomicBool::new(false),
            unmap_count: AtomicUsize::new(0),
        }
    }

    /// 安装映射；已映射或注入了失败时返回 false
    pub fn map(&self, vpn: usize, ppn: usize, writable: bool) -> bool {
        if self.fail_next_map.swap(false, Ordering::SeqCst) {
            return false;
        }
        let mut entries = self.entries.lock();
        if entries.contains_key(&vpn) {
            return false;
        }
        entries.insert(
            vpn,
            MockPte {
                ppn,
                writable,
                accessed: false,
                dirty: false,
            },
        );
        true
    }

    /// 撤销映射；原本未映射时返回 false
    pub fn unmap(&self, vpn: usize) -> bool {
        let removed = self.entries.lock().remove(&vpn).is_some();
        if removed {
            self.unmap_count.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }

    pub fn entry(&self, vpn: usize) -> Option<MockPte> {
        self.entries.lock().get(&vpn).copied()
    }

    /// 设置访问位；未映射时返回 false
    pub fn set_accessed(&self, vpn: usize, accessed: bool) -> bool {
        match self.entries.lock().get_mut(&vpn) {
            Some(pte) => {
                pte.accessed = accessed;
                true
            }
            None => false,
        }
    }

    /// 模拟 MMU 的一次访问：置访问位，写访问再置脏位
    pub fn touch(&self, vpn: usize, write: bool) {
        if let Some(pte) = self.entries.lock().get_mut(&vpn) {
            pte.accessed = true;
            pte.dirty |= write;
        }
    }

    /// 让下一次 `map` 失败
    pub fn fail_next_map(&self) {
        self.fail_next_map.store(true, Ordering::SeqCst);
    }

    pub fn mapped_vpns(&self) -> Vec<usize> {
        self.entries.lock().keys().copied().collect()
    }

    pub fn unmap_count(&self) -> usize {
        self.unmap_count.load(Ordering::SeqCst)
    }
}

impl Default for MockPageTable {
    fn default() -> Self {
        Self::new()
    }
}

/// 内存中的只读文件
pub struct MockFile {
    data: Vec<u8>,
    broken: bool,
}

impl MockFile {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            broken: false,
        }
    }

    /// 每次读取都返回错误码 -5 (EIO)
    pub fn broken() -> Self {
        Self {
            data: Vec::new(),
            broken: true,
        }
    }

    /// 内容为 `len` 个字节，第 i 个字节为 `(i * 7 + seed) as u8`
    pub fn patterned(len: usize, seed: u8) -> Self {
        Self::new(
            (0..len)
                .map(|i| (i.wrapping_mul(7) as u8).wrapping_add(seed))
                .collect(),
        )
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, isize> {
        if self.broken {
            return Err(-5);
        }
        if offset >= self.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.data.len() - offset);
        buf[..n].copy_from_slice(&self.data[offset..offset + n]);
        Ok(n)
    }
}
