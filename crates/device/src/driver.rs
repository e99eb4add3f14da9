//! 驱动注册表
//!
//! 启动代码探测到设备后调用 [`register_driver`]；块设备同时进入
//! [`crate::BLK_DRIVERS`]，之后按 [`crate::BlockRole`] 查找。

use alloc::{string::String, sync::Arc, vec::Vec};
use lazy_static::lazy_static;
use sync::RwLock;

use crate::block::BlockDriver;

/// 设备类别
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DeviceType {
    /// 块设备
    Block,
}

/// 所有驱动的公共接口
pub trait Driver: Send + Sync {
    /// 设备类别
    fn device_type(&self) -> DeviceType;

    /// 设备名，例如 `ramdisk0`
    fn name(&self) -> String;

    /// 块设备驱动返回自身
    fn as_block_arc(self: Arc<Self>) -> Option<Arc<dyn BlockDriver>> {
        None
    }
}

lazy_static! {
    // NOTE: 只在启动阶段写入
    /// 已注册的全部驱动
    pub static ref DRIVERS: RwLock<Vec<Arc<dyn Driver>>> = RwLock::new(Vec::new());
}

/// 注册一个驱动
pub fn register_driver(driver: Arc<dyn Driver>) {
    if let Some(blk) = driver.clone().as_block_arc() {
        log::info!(
            "device: {} registered as {:?} disk, {} sectors",
            driver.name(),
            blk.role(),
            blk.total_blocks()
        );
        crate::block::BLK_DRIVERS.write().push(blk);
    }
    DRIVERS.write().push(driver);
}
