//! 块设备模块
//!
//! 包含块设备驱动接口、用途标记和内存盘实现

mod ram_disk;

use alloc::{sync::Arc, vec::Vec};
use lazy_static::lazy_static;
use sync::RwLock;

use crate::driver::Driver;

pub use ram_disk::RamDisk;

/// 扇区大小（字节）
pub const BLOCK_SECTOR_SIZE: usize = 512;

lazy_static! {
    /// 全局块设备驱动列表
    pub static ref BLK_DRIVERS: RwLock<Vec<Arc<dyn BlockDriver>>> = RwLock::new(Vec::new());
}

/// 块设备的用途
///
/// 同一系统里可能有多块磁盘，各子系统按用途挑选自己的设备。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRole {
    /// 内核镜像
    Kernel,
    /// 文件系统
    FileSys,
    /// 临时数据
    Scratch,
    /// 交换区
    Swap,
    /// 未分配用途
    Raw,
}

/// 块设备驱动程序接口
pub trait BlockDriver: Driver {
    /// 读取一个块
    ///
    /// `buf` 的长度必须等于 [`BlockDriver::block_size`]，成功返回 true
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> bool;

    /// 写入一个块
    ///
    /// `buf` 的长度必须等于 [`BlockDriver::block_size`]，成功返回 true
    fn write_block(&self, block_id: usize, buf: &[u8]) -> bool;

    /// 刷新到磁盘
    fn flush(&self) -> bool {
        true
    }

    /// 块大小（字节）
    fn block_size(&self) -> usize;

    /// 总块数
    fn total_blocks(&self) -> usize;

    /// 设备用途
    fn role(&self) -> BlockRole {
        BlockRole::Raw
    }
}

/// 在给定列表中查找第一个具有指定用途的块设备
pub fn find_by_role(drivers: &[Arc<dyn BlockDriver>], role: BlockRole) -> Option<Arc<dyn BlockDriver>> {
    drivers.iter().find(|d| d.role() == role).cloned()
}

/// 在全局块设备列表中查找指定用途的设备
pub fn by_role(role: BlockRole) -> Option<Arc<dyn BlockDriver>> {
    find_by_role(&BLK_DRIVERS.read(), role)
}
