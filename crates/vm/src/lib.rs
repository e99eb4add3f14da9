//! 虚拟内存子系统
//!
//! 在一个固定的小物理帧池上按需分页：
//!
//! - [`FrameTable`]：全局帧表，用时钟（二次机会）算法选择牺牲帧
//! - [`SwapStore`]：块设备上的交换区，用位图跟踪槽位
//! - [`AddressSpace`]：每个进程的补充页表，负责缺页处理和栈增长
//!
//! 缺页的处理流程：[`AddressSpace::resolve_fault`] 查找页描述符，向帧表申请帧
//! （可能触发驱逐和交换区写入），填充内容后安装硬件映射。
//!
//! # 架构解耦
//!
//! 通过 trait 抽象与内核的其他部分解耦：
//! - [`ArchVmOps`]: 物理地址与内核虚拟地址的转换
//! - [`VmConfig`]: 页大小和用户栈布局
//! - [`PageTable`]: 硬件页表
//! - [`BackingFile`]: 懒加载页的文件读取
//!
//! 使用前必须调用 [`register_arch_ops`] 和 [`register_config`]，
//! 然后注册交换设备并调用 [`init`]。

#![no_std]

extern crate alloc;

mod address_space;
mod arch_ops;
mod config;
mod error;
mod file;
mod frame_table;
mod page;
mod swap;

pub mod address;
pub mod frame_allocator;
pub mod page_table;
pub mod stack;

#[cfg(test)]
mod test_utils;

pub use address_space::AddressSpace;
pub use arch_ops::{ArchVmOps, arch_ops, register_arch_ops};
pub use config::{VmConfig, register_config, vm_config};
pub use error::{VmError, VmResult};
pub use file::BackingFile;
pub use frame_table::FrameTable;
pub use page::{Backing, FileRegion, FrameId, Page, PageState};
pub use swap::{SwapSlot, SwapStore};

pub use address::{Paddr, PageNum, Ppn, UsizeConvert, Vaddr, Vpn};
pub use frame_allocator::{FramePool, FrameTracker};
pub use page_table::{PageTable, PagingError, PagingResult, PteFlags};

use alloc::sync::Arc;
use lazy_static::lazy_static;
use sync::SpinLock;

lazy_static! {
    /// 全局帧表，由 [`init`] 创建
    static ref FRAME_TABLE: SpinLock<Option<Arc<FrameTable>>> = SpinLock::new(None);
}

/// 初始化虚拟内存子系统
///
/// 用物理内存 `[start, end)` 建立帧池，在用途为 `Swap` 的块设备上建立交换区。
///
/// # Panics
/// 没有交换设备时 panic
pub fn init(start: usize, end: usize) {
    let swap = SwapStore::init();
    let pool = FramePool::new(Paddr(start), Paddr(end));
    let table = FrameTable::new(pool, swap);
    log::info!(
        "vm: initialized with {} frames and {} swap slots",
        table.capacity(),
        table.swap().slot_count()
    );
    *FRAME_TABLE.lock() = Some(table);
}

/// 获取全局帧表
///
/// # Panics
/// 如果尚未调用 [`init`]，则 panic
pub fn frame_table() -> Arc<FrameTable> {
    match FRAME_TABLE.lock().as_ref() {
        Some(table) => table.clone(),
        None => panic!("vm: frame table not initialized, call vm::init first"),
    }
}
