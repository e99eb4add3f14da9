//! 虚拟内存错误类型
//!
//! 运行时的分配、加载和映射失败都以 [`VmError`] 返回给直接调用者；
//! 交换区耗尽和启动时缺少交换设备属于不可恢复的错误，直接 panic。

use core::fmt;

use crate::page_table::PagingError;

/// 虚拟内存错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// 没有空闲帧，也没有可驱逐的帧 (-ENOMEM)
    ResourceExhausted,
    /// 交换区没有空闲槽位 (-ENOMEM)
    ///
    /// 交换区耗尽时直接 panic，此变体只用于日志和 errno 映射。
    SwapExhausted,
    /// 找不到交换设备 (-ENODEV)
    DeviceAbsent,
    /// 地址已经有页描述符 (-EEXIST)
    DuplicateMapping,
    /// 从后备文件加载失败或读到的字节数不足 (-EIO)
    LoadFailure,
    /// 地址没有页描述符或页不在内存中 (-EFAULT)
    NotMapped,
    /// 地址未对齐、长度超过一页或地址高于栈顶 (-EINVAL)
    InvalidAddress,
    /// 栈增长超过最大栈大小 (-EFAULT)
    StackOverflow,
    /// 硬件页表拒绝了映射 (-EFAULT)
    Paging(PagingError),
    /// 以写方式访问只读页 (-EACCES)
    ReadOnly,
}

/// 虚拟内存操作的结果类型
pub type VmResult<T> = Result<T, VmError>;

impl VmError {
    /// 转换为系统调用错误码（负数）
    pub fn to_errno(&self) -> isize {
        match self {
            VmError::LoadFailure => -5,
            VmError::ResourceExhausted | VmError::SwapExhausted => -12,
            VmError::ReadOnly => -13,
            VmError::NotMapped | VmError::StackOverflow | VmError::Paging(_) => -14,
            VmError::DuplicateMapping => -17,
            VmError::DeviceAbsent => -19,
            VmError::InvalidAddress => -22,
        }
    }
}

impl From<PagingError> for VmError {
    fn from(err: PagingError) -> Self {
        VmError::Paging(err)
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::ResourceExhausted => write!(f, "no free or evictable frame"),
            VmError::SwapExhausted => write!(f, "swap space is full"),
            VmError::DeviceAbsent => write!(f, "no swap device present"),
            VmError::DuplicateMapping => write!(f, "address already has a page"),
            VmError::LoadFailure => write!(f, "failed to load page from backing file"),
            VmError::NotMapped => write!(f, "address is not mapped"),
            VmError::InvalidAddress => write!(f, "invalid address"),
            VmError::StackOverflow => write!(f, "stack growth exceeds maximum stack size"),
            VmError::Paging(e) => write!(f, "page table error: {:?}", e),
            VmError::ReadOnly => write!(f, "write to read-only page"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(VmError::NotMapped.to_errno(), -14);
        assert_eq!(VmError::DuplicateMapping.to_errno(), -17);
        assert_eq!(VmError::LoadFailure.to_errno(), -5);
        assert_eq!(VmError::from(PagingError::AlreadyMapped).to_errno(), -14);
    }

    #[test]
    fn test_paging_error_converts() {
        let err: VmError = PagingError::NotMapped.into();
        assert_eq!(err, VmError::Paging(PagingError::NotMapped));
        assert_eq!(err.to_string(), "page table error: NotMapped");
    }
}
