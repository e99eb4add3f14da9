//! 页描述符
//!
//! 每个 [`Page`] 描述地址空间中的一个虚拟页：它现在在哪里（某个帧、交换区，
//! 或者还没加载），以及第一次加载时从哪里取内容。

use alloc::sync::Arc;
use core::fmt;
use sync::SpinLock;

use crate::address::Vpn;
use crate::file::BackingFile;
use crate::page_table::PageTable;
use crate::swap::SwapSlot;

/// 帧在帧表中的编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub(crate) usize);

impl FrameId {
    /// 帧表中的下标
    pub fn index(self) -> usize {
        self.0
    }
}

/// 文件中的一段内容，最多一页
#[derive(Clone)]
pub struct FileRegion {
    /// 后备文件
    pub file: Arc<dyn BackingFile>,
    /// 文件内偏移
    pub offset: usize,
    /// 要读取的字节数，页的其余部分填零
    pub length: usize,
}

impl fmt::Debug for FileRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRegion")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .finish()
    }
}

/// 不在内存中的页的内容来源
#[derive(Debug, Clone)]
pub enum Backing {
    /// 尚未加载，从文件读取
    File(FileRegion),
    /// 尚未加载，全零
    Zero,
    /// 内容只存在于交换区
    Swapped(SwapSlot),
}

/// 页的驻留状态
#[derive(Debug, Clone)]
pub enum PageState {
    /// 不在内存中
    Absent(Backing),
    /// 驻留在帧中，硬件映射有效
    Resident(FrameId),
    /// 正在被写往交换区，硬件映射已撤销
    Evicting(FrameId),
}

/// 虚拟页描述符
pub struct Page {
    vpn: Vpn,
    writable: bool,
    page_table: Arc<dyn PageTable>,
    pub(crate) state: SpinLock<PageState>,
}

impl Page {
    pub(crate) fn new(vpn: Vpn, writable: bool, page_table: Arc<dyn PageTable>, backing: Backing) -> Self {
        Page {
            vpn,
            writable,
            page_table,
            state: SpinLock::new(PageState::Absent(backing)),
        }
    }

    /// 虚拟页码
    pub fn vpn(&self) -> Vpn {
        self.vpn
    }

    /// 是否可写
    pub fn writable(&self) -> bool {
        self.writable
    }

    /// 所属地址空间的硬件页表
    pub fn page_table(&self) -> &Arc<dyn PageTable> {
        &self.page_table
    }

    /// 当前状态的快照
    pub fn state(&self) -> PageState {
        self.state.lock().clone()
    }

    /// 是否驻留在内存中
    pub fn is_resident(&self) -> bool {
        matches!(*self.state.lock(), PageState::Resident(_))
    }

    /// 自上次清除以来是否被访问过
    pub fn accessed_recently(&self) -> bool {
        self.page_table.is_accessed(self.vpn)
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("vpn", &self.vpn)
            .field("writable", &self.writable)
            .finish_non_exhaustive()
    }
}
