//! 内存盘

use super::{BlockDriver, BlockRole};
use crate::driver::{DeviceType, Driver};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ops::Range;
use sync::SpinLock;

/// 以一段堆内存模拟的块设备
///
/// 没有真实磁盘时充当交换盘，也用于测试。
pub struct RamDisk {
    sectors: SpinLock<Vec<u8>>,
    sector_size: usize,
    unit: usize,
    role: BlockRole,
}

impl RamDisk {
    /// 创建 `bytes` 字节、未分配用途的内存盘
    pub fn new(bytes: usize, sector_size: usize, unit: usize) -> Arc<Self> {
        Self::with_role(bytes, sector_size, unit, BlockRole::Raw)
    }

    /// 创建指定用途的内存盘，内容全零
    pub fn with_role(bytes: usize, sector_size: usize, unit: usize, role: BlockRole) -> Arc<Self> {
        Arc::new(RamDisk {
            sectors: SpinLock::new(alloc::vec![0u8; bytes]),
            sector_size,
            unit,
            role,
        })
    }

    /// 整个盘的内容拷贝
    pub fn snapshot(&self) -> Vec<u8> {
        self.sectors.lock().clone()
    }

    /// 扇区 `sector` 在后备内存中的范围；缓冲区长度不是一个扇区或越界时返回 `None`
    fn sector_range(&self, sector: usize, buf_len: usize, disk_len: usize) -> Option<Range<usize>> {
        if buf_len != self.sector_size {
            return None;
        }
        let start = sector.checked_mul(self.sector_size)?;
        let end = start.checked_add(self.sector_size)?;
        (end <= disk_len).then_some(start..end)
    }
}

impl Driver for RamDisk {
    fn device_type(&self) -> DeviceType {
        DeviceType::Block
    }

    fn name(&self) -> String {
        alloc::format!("ramdisk{}", self.unit)
    }

    fn as_block_arc(self: Arc<Self>) -> Option<Arc<dyn BlockDriver>> {
        Some(self)
    }
}

impl BlockDriver for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> bool {
        let disk = self.sectors.lock();
        self.sector_range(block_id, buf.len(), disk.len())
            .map(|range| buf.copy_from_slice(&disk[range]))
            .is_some()
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> bool {
        let mut disk = self.sectors.lock();
        let len = disk.len();
        self.sector_range(block_id, buf.len(), len)
            .map(|range| disk[range].copy_from_slice(buf))
            .is_some()
    }

    fn block_size(&self) -> usize {
        self.sector_size
    }

    fn total_blocks(&self) -> usize {
        self.sectors.lock().len() / self.sector_size
    }

    fn role(&self) -> BlockRole {
        self.role
    }
}
