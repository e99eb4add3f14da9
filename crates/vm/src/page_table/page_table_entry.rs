//! 架构无关的页表项标志

use bitflags::bitflags;

bitflags! {
    /// 页表项标志
    ///
    /// 由各架构的页表实现翻译成自己的位布局。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: usize {
        /// 有效
        const VALID = 1 << 0;
        /// 可读
        const READABLE = 1 << 1;
        /// 可写
        const WRITEABLE = 1 << 2;
        /// 可执行
        const EXECUTABLE = 1 << 3;
        /// 用户态可访问
        const USER = 1 << 4;
        /// 访问位，硬件在读写时设置
        const ACCESSED = 1 << 6;
        /// 脏位，硬件在写入时设置
        const DIRTY = 1 << 7;
    }
}

impl PteFlags {
    /// 用户页的标志
    pub fn user(writable: bool) -> Self {
        let mut flags = PteFlags::VALID | PteFlags::READABLE | PteFlags::USER;
        if writable {
            flags |= PteFlags::WRITEABLE;
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_flags() {
        assert!(!PteFlags::user(false).contains(PteFlags::WRITEABLE));
        assert!(PteFlags::user(true).contains(PteFlags::WRITEABLE | PteFlags::USER | PteFlags::VALID));
    }
}
