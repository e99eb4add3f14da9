//! 地址与页码
//!
//! - [`Paddr`] / [`Vaddr`]：物理地址和虚拟地址
//! - [`Ppn`] / [`Vpn`]：物理页码和虚拟页码
//!
//! 页大小来自 [`crate::vm_config`]。

use crate::{arch_ops, vm_config};

#[inline]
fn page_size() -> usize {
    vm_config().page_size()
}

/// 在类型和 usize 之间进行转换
pub trait UsizeConvert: Copy {
    /// 转换为 usize
    fn as_usize(&self) -> usize;
    /// 从 usize 构造
    fn from_usize(value: usize) -> Self;
}

macro_rules! impl_usize_convert {
    ($($type:ty),*) => {
        $(
            impl UsizeConvert for $type {
                #[inline]
                fn as_usize(&self) -> usize {
                    self.0
                }

                #[inline]
                fn from_usize(value: usize) -> Self {
                    Self(value)
                }
            }
        )*
    };
}

/// 物理地址
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Paddr(pub usize);

/// 虚拟地址
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Vaddr(pub usize);

/// 物理页码
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Ppn(pub usize);

/// 虚拟页码
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Vpn(pub usize);

impl_usize_convert!(Paddr, Vaddr, Ppn, Vpn);

macro_rules! impl_address {
    ($type:ty) => {
        impl $type {
            /// 页内偏移
            #[inline]
            pub fn page_offset(self) -> usize {
                self.0 & (page_size() - 1)
            }

            /// 是否按页对齐
            #[inline]
            pub fn is_page_aligned(self) -> bool {
                self.page_offset() == 0
            }

            /// 向下对齐到页边界
            #[inline]
            pub fn align_down_to_page(self) -> Self {
                Self(self.0 & !(page_size() - 1))
            }

            /// 向上对齐到页边界，溢出时返回 `None`
            #[inline]
            pub fn align_up_to_page(self) -> Option<Self> {
                let mask = page_size() - 1;
                self.0.checked_add(mask).map(|v| Self(v & !mask))
            }
        }
    };
}

impl_address!(Paddr);
impl_address!(Vaddr);

impl Paddr {
    /// 通过直接映射区域转换为内核虚拟地址
    #[inline]
    pub fn to_vaddr(self) -> Vaddr {
        Vaddr(arch_ops().paddr_to_vaddr(self.0))
    }
}

/// 页码
pub trait PageNum: UsizeConvert + Ord {
    /// 页码对应的地址类型
    type TAddress: UsizeConvert;

    /// 包含 `addr` 的页（向下取整）
    fn floor(addr: Self::TAddress) -> Self {
        Self::from_usize(addr.as_usize() / page_size())
    }

    /// 向上取整的页码，`addr` 已对齐时等于 [`PageNum::floor`]
    fn ceil(addr: Self::TAddress) -> Self {
        Self::from_usize(addr.as_usize().div_ceil(page_size()))
    }

    /// 页的起始地址
    fn start_addr(self) -> Self::TAddress {
        Self::TAddress::from_usize(self.as_usize() * page_size())
    }

    /// 页的结束地址（下一页的起始地址）
    fn end_addr(self) -> Self::TAddress {
        Self::TAddress::from_usize((self.as_usize() + 1) * page_size())
    }
}

impl PageNum for Ppn {
    type TAddress = Paddr;
}

impl PageNum for Vpn {
    type TAddress = Vaddr;
}
