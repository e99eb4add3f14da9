//! 物理帧池
//!
//! [`FramePool`] 管理一段连续的物理内存 `[start, end)`，用位图跟踪每个帧：
//!
//! - **bitmap**：每个 bit 表示一个物理帧（0=空闲，1=已分配）
//! - **last_alloc_hint**：上次分配位置，下一次从这里开始循环查找
//!
//! 帧池只负责“有没有空闲帧”，帧和页之间的关联由 [`crate::FrameTable`] 维护。
//! 池满时由帧表驱逐一个帧再重试。
//!
//! [`FrameTracker`] 是单帧的 RAII 包装器，`Drop` 时把帧还给它所属的池。

use alloc::sync::Arc;
use alloc::vec::Vec;
use sync::SpinLock;

use crate::address::{Paddr, PageNum, Ppn, UsizeConvert};
use crate::vm_config;

/// 物理帧跟踪器
///
/// 持有期间帧归持有者独占，drop 时自动回收。
#[derive(Debug)]
pub struct FrameTracker {
    ppn: Ppn,
    pool: Arc<FramePool>,
}

impl FrameTracker {
    /// 物理页码
    pub fn ppn(&self) -> Ppn {
        self.ppn
    }

    /// 帧在所属池中的下标
    pub fn index(&self) -> usize {
        self.pool.index_of(self.ppn)
    }
}

impl Drop for FrameTracker {
    fn drop(&mut self) {
        self.pool.dealloc(self.ppn);
    }
}

/// 通过直接映射区域访问一个物理帧的内容
///
/// # Safety
/// 返回的切片存活期间，调用者必须独占该帧：
/// 帧没有用户映射，也没有其他线程在读写它。
pub(crate) unsafe fn frame_bytes(ppn: Ppn) -> &'static mut [u8] {
    let va = ppn.start_addr().to_vaddr().as_usize();
    // SAFETY: 直接映射区域覆盖整个帧，独占性由调用者保证
    unsafe { core::slice::from_raw_parts_mut(va as *mut u8, vm_config().page_size()) }
}

/// 物理帧池
#[derive(Debug)]
pub struct FramePool {
    /// 起始 Ppn
    start: Ppn,
    /// 帧数
    total_frames: usize,
    inner: SpinLock<Bitmap>,
}

#[derive(Debug)]
struct Bitmap {
    words: Vec<u64>,
    allocated_count: usize,
    last_alloc_hint: usize,
}

impl Bitmap {
    #[inline]
    fn is_free(&self, idx: usize) -> bool {
        (self.words[idx / 64] & (1u64 << (idx % 64))) == 0
    }

    #[inline]
    fn mark_allocated(&mut self, idx: usize) {
        self.words[idx / 64] |= 1u64 << (idx % 64);
    }

    #[inline]
    fn mark_free(&mut self, idx: usize) {
        self.words[idx / 64] &= !(1u64 << (idx % 64));
    }
}

impl FramePool {
    /// 用物理地址区间 `[start, end)` 创建帧池
    ///
    /// 起点向上、终点向下对齐到页边界，不足一页的部分被丢弃。
    pub fn new(start: Paddr, end: Paddr) -> Arc<Self> {
        let start_ppn = start.align_up_to_page().map(Ppn::floor);
        let end_ppn = Ppn::floor(end);
        let (start, total_frames) = match start_ppn {
            Some(s) if s < end_ppn => (s, end_ppn.0 - s.0),
            Some(s) => (s, 0),
            None => (end_ppn, 0),
        };
        log::info!(
            "vm: frame pool [{:#x}, {:#x}) with {} frames",
            start.start_addr().as_usize(),
            start.start_addr().as_usize() + total_frames * vm_config().page_size(),
            total_frames
        );
        Arc::new(FramePool {
            start,
            total_frames,
            inner: SpinLock::new(Bitmap {
                words: alloc::vec![0u64; total_frames.div_ceil(64)],
                allocated_count: 0,
                last_alloc_hint: 0,
            }),
        })
    }

    /// 分配一个帧并清零，池满时返回 `None`
    ///
    /// 从 last_alloc_hint 开始循环查找第一个空闲位：[hint, end) + [0, hint)
    pub fn alloc(self: &Arc<Self>) -> Option<FrameTracker> {
        let ppn = {
            let mut bitmap = self.inner.lock();
            if bitmap.allocated_count == self.total_frames {
                return None;
            }
            let hint = bitmap.last_alloc_hint;
            let idx = (hint..self.total_frames)
                .chain(0..hint)
                .find(|&i| bitmap.is_free(i))?;
            bitmap.mark_allocated(idx);
            bitmap.allocated_count += 1;
            bitmap.last_alloc_hint = (idx + 1) % self.total_frames;
            Ppn(self.start.0 + idx)
        };

        // SAFETY: 帧刚从池中取出，只有我们持有
        unsafe { frame_bytes(ppn) }.fill(0);
        Some(FrameTracker {
            ppn,
            pool: self.clone(),
        })
    }

    fn dealloc(&self, ppn: Ppn) {
        let idx = self.index_of(ppn);
        let mut bitmap = self.inner.lock();
        debug_assert!(!bitmap.is_free(idx), "dealloc_frame: double free detected");
        bitmap.mark_free(idx);
        bitmap.allocated_count -= 1;
    }

    /// 帧在池中的下标
    pub fn index_of(&self, ppn: Ppn) -> usize {
        debug_assert!(
            ppn >= self.start && ppn.0 < self.start.0 + self.total_frames,
            "dealloc_frame: frame out of range"
        );
        ppn.0 - self.start.0
    }

    /// 池中第 `idx` 个帧的物理页码
    pub fn ppn_at(&self, idx: usize) -> Ppn {
        debug_assert!(idx < self.total_frames);
        Ppn(self.start.0 + idx)
    }

    /// 帧池中的帧数
    pub fn capacity(&self) -> usize {
        self.total_frames
    }

    /// 已分配的帧数
    pub fn allocated(&self) -> usize {
        self.inner.lock().allocated_count
    }

    /// 空闲帧数
    pub fn free_frames(&self) -> usize {
        self.total_frames - self.allocated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init, new_pool};
    use alloc::vec::Vec;

    #[test]
    fn test_alloc_until_exhausted_then_reuse() {
        init();
        let pool = new_pool(3);
        assert_eq!(pool.capacity(), 3);

        let frames: Vec<_> = (0..3).map(|_| pool.alloc().expect("frame")).collect();
        assert!(pool.alloc().is_none());
        assert_eq!(pool.allocated(), 3);

        drop(frames);
        assert_eq!(pool.free_frames(), 3);

        // 提示位置在最后一个帧之后回绕到 0
        let again = pool.alloc().expect("frame");
        assert_eq!(again.index(), 0);
    }

    #[test]
    fn test_alloc_zeroes_frame() {
        init();
        let pool = new_pool(1);
        let frame = pool.alloc().expect("frame");
        let ppn = frame.ppn();
        unsafe { frame_bytes(ppn) }.fill(0xAB);
        drop(frame);

        let frame = pool.alloc().expect("frame");
        assert_eq!(frame.ppn(), ppn);
        assert!(unsafe { frame_bytes(ppn) }.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_unaligned_bounds_are_trimmed() {
        init();
        let pool = FramePool::new(Paddr(0x1001), Paddr(0x4fff));
        // [0x2000, 0x4000)
        assert_eq!(pool.capacity(), 2);

        let empty = FramePool::new(Paddr(0x3000), Paddr(0x3000));
        assert_eq!(empty.capacity(), 0);
        assert!(empty.alloc().is_none());
    }
}
