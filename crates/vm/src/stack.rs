//! 栈增长
//!
//! 用户栈从 [`crate::VmConfig::user_stack_top`] 向下增长，最多
//! [`crate::VmConfig::max_stack_size`] 字节。落在栈区域内且“看起来像栈访问”的缺页
//! 会就地创建一个全零页。

use crate::address::Vaddr;
use crate::address_space::AddressSpace;
use crate::error::{VmError, VmResult};
use crate::page::Backing;
use crate::vm_config;

/// 栈能增长到的最低地址
pub fn stack_limit() -> usize {
    let cfg = vm_config();
    cfg.user_stack_top().saturating_sub(cfg.max_stack_size())
}

/// 缺页地址是否像一次栈访问
///
/// 地址必须位于栈区域内，且不低于用户栈指针减去
/// [`crate::VmConfig::stack_access_slop`]（`push` 类指令会先写后移栈指针）。
pub fn is_stack_access(fault_addr: usize, user_sp: usize) -> bool {
    let cfg = vm_config();
    fault_addr < cfg.user_stack_top()
        && fault_addr >= stack_limit()
        && fault_addr >= user_sp.saturating_sub(cfg.stack_access_slop())
}

impl AddressSpace {
    /// 为 `fault_addr` 所在页创建一个驻留的全零栈页
    ///
    /// # Errors
    /// - 地址不低于栈顶：[`VmError::InvalidAddress`]
    /// - 超出最大栈大小：[`VmError::StackOverflow`]，不会创建页
    /// - 地址已有页描述符：[`VmError::DuplicateMapping`]
    pub fn stack_grow(&self, fault_addr: usize) -> VmResult<()> {
        if fault_addr >= vm_config().user_stack_top() {
            return Err(VmError::InvalidAddress);
        }
        let base = Vaddr(fault_addr).align_down_to_page();
        if base.0 < stack_limit() {
            log::warn!("vm: stack growth to {:#x} exceeds limit {:#x}", fault_addr, stack_limit());
            return Err(VmError::StackOverflow);
        }

        let page = self.insert_page(base.0, true, Backing::Zero)?;
        if let Err(err) = self.fault_in(&page, false) {
            self.remove_page(page.vpn());
            return Err(err);
        }
        log::debug!("vm: stack grown to {:#x}", base.0);
        Ok(())
    }
}
