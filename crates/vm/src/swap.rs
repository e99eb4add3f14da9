//! 交换区
//!
//! 交换设备被划分为若干槽位，每个槽位由连续的、恰好一页大小的扇区组成。
//! 位图中每个 bit 对应一个槽位，1 表示槽位里存着某个页的内容。
//!
//! 位图的查找、更新和一个页的整段扇区读写都在交换锁内完成。
//! 交换区写满和启动时找不到交换设备都是不可恢复的错误，直接 panic。

use alloc::sync::Arc;
use alloc::vec::Vec;
use device::block::{self, BlockDriver, BlockRole};
use sync::SpinLock;

use crate::error::{VmError, VmResult};
use crate::vm_config;

/// 交换槽位编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwapSlot(usize);

impl SwapSlot {
    /// 槽位下标
    pub fn index(self) -> usize {
        self.0
    }
}

struct SlotBitmap {
    words: Vec<u64>,
    used: usize,
}

impl SlotBitmap {
    fn is_set(&self, idx: usize) -> bool {
        (self.words[idx / 64] & (1u64 << (idx % 64))) != 0
    }

    fn set(&mut self, idx: usize) {
        self.words[idx / 64] |= 1u64 << (idx % 64);
        self.used += 1;
    }

    fn clear(&mut self, idx: usize) {
        self.words[idx / 64] &= !(1u64 << (idx % 64));
        self.used -= 1;
    }

    /// 第一个空闲位
    fn first_free(&self, slots: usize) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, w)| **w != u64::MAX)
            .map(|(i, w)| i * 64 + (!*w).trailing_zeros() as usize)
            .filter(|&idx| idx < slots)
    }
}

/// 交换区
pub struct SwapStore {
    device: Arc<dyn BlockDriver>,
    sectors_per_page: usize,
    slots: usize,
    bitmap: SpinLock<SlotBitmap>,
}

impl SwapStore {
    /// 在已有的块设备上建立交换区，所有槽位初始为空
    ///
    /// # Panics
    /// 页大小不是扇区大小的整数倍时 panic
    pub fn new(device: Arc<dyn BlockDriver>) -> Arc<Self> {
        let page_size = vm_config().page_size();
        let sector_size = device.block_size();
        assert!(
            sector_size != 0 && page_size % sector_size == 0,
            "swap: page size {} is not a multiple of sector size {}",
            page_size,
            sector_size
        );
        let sectors_per_page = page_size / sector_size;
        let slots = device.total_blocks() / sectors_per_page;
        log::info!(
            "swap: {} slots on {} ({} sectors per page)",
            slots,
            device.name(),
            sectors_per_page
        );
        Arc::new(SwapStore {
            device,
            sectors_per_page,
            slots,
            bitmap: SpinLock::new(SlotBitmap {
                words: alloc::vec![0u64; slots.div_ceil(64)],
                used: 0,
            }),
        })
    }

    /// 在全局块设备列表中查找用途为 [`BlockRole::Swap`] 的设备并建立交换区
    pub fn locate() -> VmResult<Arc<Self>> {
        block::by_role(BlockRole::Swap)
            .map(Self::new)
            .ok_or(VmError::DeviceAbsent)
    }

    /// 启动时初始化交换区
    ///
    /// # Panics
    /// 没有交换设备时 panic
    pub fn init() -> Arc<Self> {
        match Self::locate() {
            Ok(store) => store,
            Err(err) => {
                log::error!("swap: {}", err);
                panic!("swap: no swap device present");
            }
        }
    }

    /// 把一页内容写入第一个空闲槽位
    ///
    /// # Panics
    /// 交换区已满或设备写入失败时 panic
    pub fn swap_out(&self, page: &[u8]) -> SwapSlot {
        debug_assert_eq!(page.len(), self.sectors_per_page * self.device.block_size());
        let mut bitmap = self.bitmap.lock();
        let Some(idx) = bitmap.first_free(self.slots) else {
            log::error!("swap: {} ({} slots in use)", VmError::SwapExhausted, bitmap.used);
            panic!("swap: swap space is full");
        };
        bitmap.set(idx);
        self.write_slot(idx, page);
        log::debug!("swap: page out to slot {}", idx);
        SwapSlot(idx)
    }

    /// 把槽位内容读回 `page` 并释放槽位
    ///
    /// # Panics
    /// 槽位没有被占用或设备读取失败时 panic
    pub fn swap_in(&self, slot: SwapSlot, page: &mut [u8]) {
        let mut bitmap = self.bitmap.lock();
        self.read_locked(&bitmap, slot, page);
        bitmap.clear(slot.0);
        log::debug!("swap: page in from slot {}", slot.0);
    }

    /// 读取槽位内容但保留槽位
    ///
    /// 缺页处理在页表映射成功之后才调用 [`SwapStore::release`]，
    /// 映射失败时页仍然可以从这个槽位恢复。
    pub(crate) fn read(&self, slot: SwapSlot, page: &mut [u8]) {
        let bitmap = self.bitmap.lock();
        self.read_locked(&bitmap, slot, page);
    }

    /// 丢弃一个已占用槽位的内容
    ///
    /// # Panics
    /// 槽位没有被占用时 panic
    pub fn release(&self, slot: SwapSlot) {
        let mut bitmap = self.bitmap.lock();
        if slot.0 >= self.slots || !bitmap.is_set(slot.0) {
            panic!("swap: release of free slot {}", slot.0);
        }
        bitmap.clear(slot.0);
    }

    /// 槽位总数
    pub fn slot_count(&self) -> usize {
        self.slots
    }

    /// 已占用的槽位数
    pub fn used_slots(&self) -> usize {
        self.bitmap.lock().used
    }

    /// 槽位是否被占用
    pub fn is_occupied(&self, slot: SwapSlot) -> bool {
        slot.0 < self.slots && self.bitmap.lock().is_set(slot.0)
    }

    fn read_locked(&self, bitmap: &SlotBitmap, slot: SwapSlot, page: &mut [u8]) {
        if slot.0 >= self.slots || !bitmap.is_set(slot.0) {
            panic!("swap: slot {} is not in use", slot.0);
        }
        let sector_size = self.device.block_size();
        let first = slot.0 * self.sectors_per_page;
        for (i, chunk) in page.chunks_exact_mut(sector_size).enumerate() {
            if !self.device.read_block(first + i, chunk) {
                panic!("swap: read of sector {} failed", first + i);
            }
        }
    }

    fn write_slot(&self, idx: usize, page: &[u8]) {
        let sector_size = self.device.block_size();
        let first = idx * self.sectors_per_page;
        for (i, chunk) in page.chunks_exact(sector_size).enumerate() {
            if !self.device.write_block(first + i, chunk) {
                panic!("swap: write of sector {} failed", first + i);
            }
        }
    }
}
