//! 地址空间与缺页处理
//!
//! [`AddressSpace`] 持有一个进程的补充页表（`Vpn` → [`Page`]）和它的硬件页表。
//! 页描述符由 [`AddressSpace::allocate`] 等方法创建，内容在第一次缺页时才加载。
//!
//! 同一地址空间的修改由调用者保证单写者；不同地址空间共享同一个 [`FrameTable`]。

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use sync::SpinLock;

use crate::address::{PageNum, UsizeConvert, Vaddr, Vpn};
use crate::error::{VmError, VmResult};
use crate::file::BackingFile;
use crate::frame_allocator::frame_bytes;
use crate::frame_table::FrameTable;
use crate::page::{Backing, FileRegion, FrameId, Page, PageState};
use crate::page_table::{PageTable, PteFlags};
use crate::vm_config;

/// 一个进程的虚拟地址空间
pub struct AddressSpace {
    page_table: Arc<dyn PageTable>,
    frames: Arc<FrameTable>,
    pages: SpinLock<BTreeMap<Vpn, Arc<Page>>>,
}

impl AddressSpace {
    /// 创建空的地址空间
    pub fn new(page_table: Arc<dyn PageTable>, frames: Arc<FrameTable>) -> Self {
        AddressSpace {
            page_table,
            frames,
            pages: SpinLock::new(BTreeMap::new()),
        }
    }

    /// 硬件页表
    pub fn page_table(&self) -> &Arc<dyn PageTable> {
        &self.page_table
    }

    /// 共享的帧表
    pub fn frames(&self) -> &Arc<FrameTable> {
        &self.frames
    }

    /// 登记一个从文件懒加载的页
    ///
    /// 缺页时从 `offset` 读取 `length` 字节，页的其余部分填零。
    ///
    /// # Errors
    /// - `vaddr` 未按页对齐或 `length` 超过一页：[`VmError::InvalidAddress`]
    /// - `vaddr` 已有页描述符：[`VmError::DuplicateMapping`]
    pub fn allocate(
        &self,
        file: Arc<dyn BackingFile>,
        offset: usize,
        length: usize,
        vaddr: usize,
        writable: bool,
    ) -> VmResult<Arc<Page>> {
        if length > vm_config().page_size() {
            return Err(VmError::InvalidAddress);
        }
        let region = FileRegion { file, offset, length };
        self.insert_page(vaddr, writable, Backing::File(region))
    }

    /// 登记一个懒加载的全零页（例如 BSS）
    pub fn allocate_zero(&self, vaddr: usize, writable: bool) -> VmResult<Arc<Page>> {
        self.insert_page(vaddr, writable, Backing::Zero)
    }

    pub(crate) fn insert_page(&self, vaddr: usize, writable: bool, backing: Backing) -> VmResult<Arc<Page>> {
        let va = Vaddr(vaddr);
        if !va.is_page_aligned() {
            return Err(VmError::InvalidAddress);
        }
        let vpn = Vpn::floor(va);
        let mut pages = self.pages.lock();
        if pages.contains_key(&vpn) {
            return Err(VmError::DuplicateMapping);
        }
        let page = Arc::new(Page::new(vpn, writable, self.page_table.clone(), backing));
        pages.insert(vpn, page.clone());
        Ok(page)
    }

    pub(crate) fn remove_page(&self, vpn: Vpn) -> Option<Arc<Page>> {
        self.pages.lock().remove(&vpn)
    }

    /// 处理一次缺页
    ///
    /// 页已经驻留时视为伪缺页直接成功；页正在写往交换区时等待其完成。
    /// 否则取得一个帧，从交换区、文件或零填充，然后安装映射。
    /// 任何失败都会释放帧，页保留原来的后备内容。
    pub fn resolve_fault(&self, fault_addr: usize) -> VmResult<()> {
        let page = self.lookup(fault_addr).ok_or(VmError::NotMapped)?;
        self.fault_in(&page, false).map(|_| ())
    }

    /// 缺页异常入口
    ///
    /// `stack_growth_plausible` 由异常层根据用户栈指针判断（见 [`crate::stack::is_stack_access`]）。
    pub fn handle_page_fault(&self, fault_addr: usize, stack_growth_plausible: bool) -> VmResult<()> {
        match self.resolve_fault(fault_addr) {
            Err(VmError::NotMapped) if stack_growth_plausible => self.stack_grow(fault_addr),
            result => result,
        }
    }

    pub(crate) fn fault_in(&self, page: &Arc<Page>, keep_pinned: bool) -> VmResult<FrameId> {
        loop {
            match page.state() {
                PageState::Resident(id) => {
                    if !keep_pinned || self.frames.pin(id, page) {
                        return Ok(id);
                    }
                }
                PageState::Evicting(_) => core::hint::spin_loop(),
                PageState::Absent(backing) => return self.load(page, backing, keep_pinned),
            }
        }
    }

    fn load(&self, page: &Arc<Page>, backing: Backing, keep_pinned: bool) -> VmResult<FrameId> {
        let id = self.frames.acquire_and_lock(page)?;
        let ppn = self.frames.ppn(id);

        // SAFETY: 帧被钉住且尚未映射，只有当前线程访问
        if let Err(err) = self.fill(&backing, unsafe { frame_bytes(ppn) }) {
            self.frames.free(id, page);
            return Err(err);
        }

        {
            let mut state = page.state.lock();
            if let Err(err) = self.page_table.map(page.vpn(), ppn, PteFlags::user(page.writable())) {
                drop(state);
                log::warn!("vm: failed to map page {:#x}: {:?}", page.vpn().0, err);
                self.frames.free(id, page);
                return Err(err.into());
            }
            *state = PageState::Resident(id);
        }
        if let Backing::Swapped(slot) = backing {
            self.frames.swap().release(slot);
        }
        if !keep_pinned {
            self.frames.unlock(id, page);
        }
        log::debug!("vm: page {:#x} resident in frame {}", page.vpn().0, id.0);
        Ok(id)
    }

    fn fill(&self, backing: &Backing, buf: &mut [u8]) -> VmResult<()> {
        match backing {
            // 帧池分配时已经清零
            Backing::Zero => {}
            Backing::File(region) => {
                let (head, tail) = buf.split_at_mut(region.length);
                let read = region.file.read_at(region.offset, head).map_err(|errno| {
                    log::warn!("vm: read at offset {:#x} failed ({})", region.offset, errno);
                    VmError::LoadFailure
                })?;
                if read != region.length {
                    log::warn!("vm: short read at offset {:#x}: {} of {} bytes", region.offset, read, region.length);
                    return Err(VmError::LoadFailure);
                }
                tail.fill(0);
            }
            Backing::Swapped(slot) => self.frames.swap().read(*slot, buf),
        }
        Ok(())
    }

    /// 删除 `vaddr` 所在页的描述符并释放它占用的帧或交换槽位
    ///
    /// `vaddr` 没有页描述符时什么也不做。
    pub fn deallocate(&self, vaddr: usize) {
        if let Some(page) = self.remove_page(Vpn::floor(Vaddr(vaddr))) {
            self.frames.release_page(&page);
        }
    }

    /// 释放所有页，用于进程退出
    pub fn deallocate_all(&self) {
        let pages = core::mem::take(&mut *self.pages.lock());
        if !pages.is_empty() {
            log::debug!("vm: tearing down {} pages", pages.len());
        }
        for page in pages.values() {
            self.frames.release_page(page);
        }
    }

    /// 让 `vaddr` 所在页驻留并钉住它的帧，供内核直接访问
    ///
    /// 以写方式钉住只读页返回 [`VmError::ReadOnly`]。
    pub fn pin(&self, vaddr: usize, will_write: bool) -> VmResult<()> {
        let page = self.lookup(vaddr).ok_or(VmError::NotMapped)?;
        if will_write && !page.writable() {
            return Err(VmError::ReadOnly);
        }
        self.fault_in(&page, true).map(|_| ())
    }

    /// 解除 [`AddressSpace::pin`]
    pub fn unpin(&self, vaddr: usize) {
        if let Some(page) = self.lookup(vaddr) {
            if let PageState::Resident(id) = page.state() {
                self.frames.unlock(id, &page);
            }
        }
    }

    /// 通过硬件页表读取用户内存
    ///
    /// 页不在内存中时返回 [`VmError::NotMapped`]；调用者应先 [`AddressSpace::pin`]。
    pub fn read_bytes_at(&self, va: usize, out: &mut [u8]) -> VmResult<()> {
        let mut done = 0usize;
        while done < out.len() {
            let cur = Vaddr(va.checked_add(done).ok_or(VmError::InvalidAddress)?);
            let (src, take) = self.kernel_window(cur, out.len() - done)?;
            // SAFETY: src 指向已映射帧的直接映射区域，长度不跨页
            unsafe { core::ptr::copy_nonoverlapping(src as *const u8, out[done..].as_mut_ptr(), take) };
            done += take;
        }
        Ok(())
    }

    /// 通过硬件页表写入用户内存
    ///
    /// 目标页只读时返回 [`VmError::ReadOnly`]。
    pub fn write_bytes_at(&self, va: usize, data: &[u8]) -> VmResult<()> {
        let mut done = 0usize;
        while done < data.len() {
            let cur = Vaddr(va.checked_add(done).ok_or(VmError::InvalidAddress)?);
            let page = self.lookup(cur.0).ok_or(VmError::NotMapped)?;
            if !page.writable() {
                return Err(VmError::ReadOnly);
            }
            let (dst, take) = self.kernel_window(cur, data.len() - done)?;
            // SAFETY: dst 指向已映射帧的直接映射区域，长度不跨页
            unsafe { core::ptr::copy_nonoverlapping(data[done..].as_ptr(), dst as *mut u8, take) };
            done += take;
        }
        Ok(())
    }

    /// `va` 所在帧的内核地址，以及从 `va` 到页尾和 `remaining` 中较小的长度
    fn kernel_window(&self, va: Vaddr, remaining: usize) -> VmResult<(usize, usize)> {
        let ppn = self.page_table.translate(Vpn::floor(va)).ok_or(VmError::NotMapped)?;
        let offset = va.page_offset();
        let take = remaining.min(vm_config().page_size() - offset);
        Ok((ppn.start_addr().to_vaddr().as_usize() + offset, take))
    }

    /// 查找 `vaddr` 所在页的描述符
    pub fn lookup(&self, vaddr: usize) -> Option<Arc<Page>> {
        self.pages.lock().get(&Vpn::floor(Vaddr(vaddr))).cloned()
    }

    /// `vaddr` 所在页是否有描述符
    pub fn contains(&self, vaddr: usize) -> bool {
        self.pages.lock().contains_key(&Vpn::floor(Vaddr(vaddr)))
    }

    /// 页描述符数量
    pub fn len(&self) -> usize {
        self.pages.lock().len()
    }

    /// 是否没有任何页描述符
    pub fn is_empty(&self) -> bool {
        self.pages.lock().is_empty()
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        self.deallocate_all();
    }
}
