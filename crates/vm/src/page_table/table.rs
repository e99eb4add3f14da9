//! 硬件页表接口
//!
//! 每个地址空间持有一个 `Arc<dyn PageTable>`。所有方法都只取 `&self`：
//! 硬件页表由实现自己加锁，帧表在驱逐时需要修改其他地址空间的页表。
//!
//! 锁顺序上，页表的锁总是最内层（帧表锁 → 页状态锁 → 页表锁）。

use super::{PagingResult, PteFlags};
use crate::address::{Ppn, Vpn};

/// 硬件页表接口
pub trait PageTable: Send + Sync {
    /// 安装一个 vpn → ppn 映射
    ///
    /// 已映射时返回 [`super::PagingError::AlreadyMapped`]
    fn map(&self, vpn: Vpn, ppn: Ppn, flags: PteFlags) -> PagingResult<()>;

    /// 撤销一个映射并刷新对应的 TLB 条目
    fn unmap(&self, vpn: Vpn) -> PagingResult<()>;

    /// 查询 vpn 当前映射到的物理页
    fn translate(&self, vpn: Vpn) -> Option<Ppn>;

    /// 读取访问位，未映射时返回 false
    fn is_accessed(&self, vpn: Vpn) -> bool;

    /// 清除访问位
    fn clear_accessed(&self, vpn: Vpn);

    /// 读取脏位，未映射时返回 false
    fn is_dirty(&self, vpn: Vpn) -> bool;
}

#[cfg(test)]
mod test_mock {
    use super::*;
    use crate::page_table::PagingError;
    use test_support::mock::mm::MockPageTable;

    impl PageTable for MockPageTable {
        fn map(&self, vpn: Vpn, ppn: Ppn, flags: PteFlags) -> PagingResult<()> {
            if MockPageTable::map(self, vpn.0, ppn.0, flags.contains(PteFlags::WRITEABLE)) {
                Ok(())
            } else {
                Err(PagingError::AlreadyMapped)
            }
        }

        fn unmap(&self, vpn: Vpn) -> PagingResult<()> {
            if MockPageTable::unmap(self, vpn.0) {
                Ok(())
            } else {
                Err(PagingError::NotMapped)
            }
        }

        fn translate(&self, vpn: Vpn) -> Option<Ppn> {
            self.entry(vpn.0).map(|pte| Ppn(pte.ppn))
        }

        fn is_accessed(&self, vpn: Vpn) -> bool {
            self.entry(vpn.0).is_some_and(|pte| pte.accessed)
        }

        fn clear_accessed(&self, vpn: Vpn) {
            self.set_accessed(vpn.0, false);
        }

        fn is_dirty(&self, vpn: Vpn) -> bool {
            self.entry(vpn.0).is_some_and(|pte| pte.dirty)
        }
    }
}
