//! 页表模块
//!
//! 硬件页表由内核按架构实现，这里只定义虚拟内存子系统依赖的最小接口。
mod page_table_entry;
mod table;

pub use page_table_entry::PteFlags;
pub use table::PageTable;

/// 分页操作中可能发生的错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingError {
    /// 虚拟地址未被映射
    NotMapped,
    /// 虚拟地址已被映射
    AlreadyMapped,
    /// 提供了无效的地址
    InvalidAddress,
    /// 页表自身的内存耗尽
    OutOfMemory,
}

/// 分页操作的结果类型
pub type PagingResult<T> = Result<T, PagingError>;
