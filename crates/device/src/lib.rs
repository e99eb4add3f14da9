//! 内核设备驱动框架
//!
//! 虚拟内存子系统只需要块设备，因此这里只保留：
//!
//! - [`Driver`] trait - 设备驱动基础接口
//! - [`BlockDriver`] trait - 块设备驱动接口，带有 [`BlockRole`] 用途标记
//! - [`RamDisk`] - 内存模拟的块设备
//!
//! 交换区通过 [`block::by_role`] 查找 [`BlockRole::Swap`] 设备。

#![no_std]
#![allow(clippy::module_inception)]

extern crate alloc;

pub mod block;
pub mod driver;

// Re-export driver
pub use driver::{DRIVERS, DeviceType, Driver, register_driver};

// Re-export block
pub use block::{BLK_DRIVERS, BLOCK_SECTOR_SIZE, BlockDriver, BlockRole, RamDisk};
