//! 帧表与时钟置换
//!
//! 帧表记录每个正在承载驻留页的物理帧。它是一个按 [`FrameId`] 下标的定长数组，
//! 每个物理帧一个槽位，另有一根显式的时钟指针。
//!
//! ## 置换
//!
//! 帧池没有空闲帧时，[`FrameTable::evict`] 从时钟指针处开始循环扫描：
//!
//! 1. 跳过空槽位、被钉住的帧和正在写往交换区的帧
//! 2. 页的访问位为 1：清零，指针前进
//! 3. 访问位为 0：选为牺牲帧
//!
//! 扫描最多两圈。第一圈可能清掉所有访问位，第二圈照理一定能找到牺牲帧；
//! 如果在两次访问之间页又被访问，就直接选第一个遇到的未钉住帧。
//!
//! 选中后在帧表锁内撤销硬件映射并标记为“传输中”，然后**释放帧表锁**写交换区，
//! 写完再取锁把槽位清空。传输中的槽位不会被复用。
//!
//! ## 锁顺序
//!
//! 帧表锁 → 页状态锁 → 硬件页表锁；帧池锁和交换锁是叶子锁。

use alloc::sync::Arc;
use alloc::vec::Vec;
use sync::SpinLock;

use crate::address::Ppn;
use crate::error::{VmError, VmResult};
use crate::frame_allocator::{FramePool, FrameTracker, frame_bytes};
use crate::page::{Backing, FrameId, Page, PageState};
use crate::swap::SwapStore;

struct FrameEntry {
    frame: FrameTracker,
    page: Arc<Page>,
    /// 钉住的帧不参与置换
    pinned: bool,
    /// 正在写往交换区
    evicting: bool,
    /// 传输期间页已被释放，写完后丢弃交换槽位
    orphaned: bool,
}

struct FrameTableInner {
    slots: Vec<Option<FrameEntry>>,
    hand: usize,
    resident: usize,
}

enum Victim {
    Found(usize),
    /// 只剩传输中的帧，稍后会有帧被释放
    InTransit,
    None,
}

enum Eviction {
    Evicted,
    Busy,
    Exhausted,
}

enum Freed {
    Removed(FrameEntry),
    Orphaned,
    Mismatch,
}

impl FrameTableInner {
    fn select_victim(&mut self) -> Victim {
        let capacity = self.slots.len();
        let mut fallback = None;
        let mut in_transit = false;

        for _ in 0..2 * capacity {
            let idx = self.hand;
            self.hand = (self.hand + 1) % capacity;
            let Some(entry) = &self.slots[idx] else {
                continue;
            };
            if entry.evicting {
                in_transit = true;
                continue;
            }
            if entry.pinned {
                continue;
            }
            fallback.get_or_insert(idx);

            let page = &entry.page;
            if page.page_table().is_accessed(page.vpn()) {
                page.page_table().clear_accessed(page.vpn());
            } else {
                return Victim::Found(idx);
            }
        }

        match fallback {
            Some(idx) => {
                log::warn!("vm: clock found no idle frame in two sweeps, evicting frame {}", idx);
                self.hand = (idx + 1) % capacity;
                Victim::Found(idx)
            }
            None if in_transit => Victim::InTransit,
            None => Victim::None,
        }
    }
}

/// 全局帧表
pub struct FrameTable {
    pool: Arc<FramePool>,
    swap: Arc<SwapStore>,
    inner: SpinLock<FrameTableInner>,
}

impl FrameTable {
    /// 为帧池中的每个帧建立一个空槽位，时钟指针指向 0
    pub fn new(pool: Arc<FramePool>, swap: Arc<SwapStore>) -> Arc<Self> {
        let slots = (0..pool.capacity()).map(|_| None).collect();
        Arc::new(FrameTable {
            pool,
            swap,
            inner: SpinLock::new(FrameTableInner {
                slots,
                hand: 0,
                resident: 0,
            }),
        })
    }

    /// 为 `page` 取得一个钉住的帧
    ///
    /// 帧池为空时驱逐一个帧后重试，直到成功；
    /// 没有任何可驱逐的帧时返回 [`VmError::ResourceExhausted`]。
    /// 返回的帧内容全零，调用者填充并安装映射后调用 [`FrameTable::unlock`]。
    pub fn acquire_and_lock(&self, page: &Arc<Page>) -> VmResult<FrameId> {
        loop {
            if let Some(frame) = self.pool.alloc() {
                let idx = frame.index();
                let mut inner = self.inner.lock();
                debug_assert!(inner.slots[idx].is_none(), "vm: frame {} reused while occupied", idx);
                inner.slots[idx] = Some(FrameEntry {
                    frame,
                    page: page.clone(),
                    pinned: true,
                    evicting: false,
                    orphaned: false,
                });
                inner.resident += 1;
                return Ok(FrameId(idx));
            }

            match self.try_evict() {
                Eviction::Evicted => {}
                Eviction::Busy => core::hint::spin_loop(),
                Eviction::Exhausted => {
                    log::warn!("vm: {} for page {:#x}", VmError::ResourceExhausted, page.vpn().0);
                    return Err(VmError::ResourceExhausted);
                }
            }
        }
    }

    /// 解除 `page` 所在帧的钉住，帧重新成为置换候选
    ///
    /// 帧已经换了主人时不做任何事并返回 false。
    pub fn unlock(&self, id: FrameId, page: &Arc<Page>) -> bool {
        match self.inner.lock().slots.get_mut(id.0) {
            Some(Some(entry)) if Arc::ptr_eq(&entry.page, page) => {
                entry.pinned = false;
                true
            }
            _ => {
                log::warn!("vm: unlock of frame {} not held by page {:#x}", id.0, page.vpn().0);
                false
            }
        }
    }

    /// 钉住 `page` 所在的帧
    ///
    /// 帧已经不属于 `page`（例如刚被驱逐）或正在传输时返回 false。
    pub fn pin(&self, id: FrameId, page: &Arc<Page>) -> bool {
        match self.inner.lock().slots.get_mut(id.0) {
            Some(Some(entry)) if Arc::ptr_eq(&entry.page, page) && !entry.evicting => {
                entry.pinned = true;
                true
            }
            _ => false,
        }
    }

    /// 驱逐一个帧，把它的内容写入交换区
    ///
    /// 没有未钉住的帧时返回 [`VmError::ResourceExhausted`]。
    pub fn evict(&self) -> VmResult<()> {
        match self.try_evict() {
            Eviction::Evicted => Ok(()),
            Eviction::Busy | Eviction::Exhausted => Err(VmError::ResourceExhausted),
        }
    }

    fn try_evict(&self) -> Eviction {
        let (idx, page, ppn) = {
            let mut inner = self.inner.lock();
            let idx = match inner.select_victim() {
                Victim::Found(idx) => idx,
                Victim::InTransit => return Eviction::Busy,
                Victim::None => return Eviction::Exhausted,
            };
            let Some(entry) = inner.slots[idx].as_mut() else {
                return Eviction::Busy;
            };
            entry.evicting = true;
            let page = entry.page.clone();
            let ppn = entry.frame.ppn();

            let mut state = page.state.lock();
            *state = PageState::Evicting(FrameId(idx));
            let dirty = page.page_table().is_dirty(page.vpn());
            if page.page_table().unmap(page.vpn()).is_err() {
                log::warn!("vm: evicted page {:#x} had no mapping", page.vpn().0);
            }
            drop(state);
            log::debug!("vm: evicting page {:#x} from frame {} (dirty: {})", page.vpn().0, idx, dirty);
            (idx, page, ppn)
        };

        // SAFETY: 映射已撤销，帧处于传输中，不会被复用或写入
        let slot = self.swap.swap_out(unsafe { frame_bytes(ppn) });

        let entry = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.slots[idx].take() else {
                panic!("vm: frame {} vanished during eviction", idx);
            };
            debug_assert!(Arc::ptr_eq(&entry.page, &page));
            inner.resident -= 1;
            if entry.orphaned {
                self.swap.release(slot);
                let mut state = page.state.lock();
                if matches!(*state, PageState::Evicting(cur) if cur.0 == idx) {
                    *state = PageState::Absent(Backing::Zero);
                }
            } else {
                *page.state.lock() = PageState::Absent(Backing::Swapped(slot));
            }
            entry
        };
        drop(entry);
        Eviction::Evicted
    }

    /// 释放 `page` 驻留的帧：先从帧表摘除并撤销映射，再还给帧池
    ///
    /// 帧正在写往交换区时只做标记，交换完成后丢弃槽位。
    /// 页原先处于 [`PageState::Resident`] 时内容被丢弃，之后按零页处理。
    /// 帧不属于 `page` 时返回 false。
    pub fn free(&self, id: FrameId, page: &Arc<Page>) -> bool {
        let freed = {
            let mut inner = self.inner.lock();
            self.free_locked(&mut inner, id, page)
        };
        match freed {
            Freed::Removed(entry) => {
                drop(entry);
                true
            }
            Freed::Orphaned => true,
            Freed::Mismatch => false,
        }
    }

    fn free_locked(&self, inner: &mut FrameTableInner, id: FrameId, page: &Arc<Page>) -> Freed {
        match inner.slots.get_mut(id.0) {
            Some(Some(entry)) if Arc::ptr_eq(&entry.page, page) => {
                if entry.evicting {
                    entry.orphaned = true;
                    return Freed::Orphaned;
                }
            }
            _ => return Freed::Mismatch,
        }
        let Some(entry) = inner.slots[id.0].take() else {
            return Freed::Mismatch;
        };
        inner.resident -= 1;

        let mut state = page.state.lock();
        if matches!(*state, PageState::Resident(cur) if cur == id) {
            *state = PageState::Absent(Backing::Zero);
        }
        let (pt, vpn) = (page.page_table(), page.vpn());
        if pt.translate(vpn) == Some(entry.frame.ppn()) && pt.unmap(vpn).is_err() {
            log::warn!("vm: failed to unmap page {:#x}", vpn.0);
        }
        drop(state);
        Freed::Removed(entry)
    }

    /// 页被销毁时释放它占用的帧或交换槽位
    pub(crate) fn release_page(&self, page: &Arc<Page>) {
        let freed = {
            let mut inner = self.inner.lock();
            let mut state = page.state.lock();
            let current = state.clone();
            match current {
                PageState::Resident(id) | PageState::Evicting(id) => {
                    drop(state);
                    self.free_locked(&mut inner, id, page)
                }
                PageState::Absent(Backing::Swapped(slot)) => {
                    self.swap.release(slot);
                    *state = PageState::Absent(Backing::Zero);
                    Freed::Mismatch
                }
                PageState::Absent(_) => Freed::Mismatch,
            }
        };
        drop(freed);
    }

    /// 帧表容量（帧池中的帧数）
    pub fn capacity(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// 当前驻留的帧数
    pub fn resident(&self) -> usize {
        self.inner.lock().resident
    }

    /// 帧是否被钉住
    pub fn is_pinned(&self, id: FrameId) -> bool {
        matches!(self.inner.lock().slots.get(id.0), Some(Some(entry)) if entry.pinned)
    }

    /// 帧当前承载的页
    pub fn owner(&self, id: FrameId) -> Option<Arc<Page>> {
        match self.inner.lock().slots.get(id.0) {
            Some(Some(entry)) => Some(entry.page.clone()),
            _ => None,
        }
    }

    /// 帧对应的物理页码
    pub fn ppn(&self, id: FrameId) -> Ppn {
        self.pool.ppn_at(id.0)
    }

    /// 交换区
    pub fn swap(&self) -> &Arc<SwapStore> {
        &self.swap
    }

    /// 帧池
    pub fn pool(&self) -> &Arc<FramePool> {
        &self.pool
    }
}
