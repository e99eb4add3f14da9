//! 虚拟内存配置 trait 定义和注册

use core::sync::atomic::{AtomicUsize, Ordering};

/// 虚拟内存配置常量
///
/// 内核需要实现此 trait 并通过 [`register_config`] 注册。
pub trait VmConfig: Send + Sync {
    /// 页大小（通常为 4096）
    fn page_size(&self) -> usize;

    /// 用户栈顶地址（不包含）
    fn user_stack_top(&self) -> usize;

    /// 用户栈的最大大小，从栈顶向下计算
    fn max_stack_size(&self) -> usize;

    /// 判断栈访问时允许低于用户栈指针的字节数
    ///
    /// x86 的 `pusha` 会在调整栈指针之前写入栈指针下方 32 字节。
    fn stack_access_slop(&self) -> usize {
        32
    }
}

static CONFIG_DATA: AtomicUsize = AtomicUsize::new(0);
static CONFIG_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册配置实现
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_config(config: &'static dyn VmConfig) {
    let ptr = config as *const dyn VmConfig;
    // SAFETY: fat pointer 由 data 和 vtable 两部分组成
    let (data, vtable) = unsafe { core::mem::transmute::<*const dyn VmConfig, (usize, usize)>(ptr) };
    CONFIG_VTABLE.store(vtable, Ordering::Release);
    CONFIG_DATA.store(data, Ordering::Release);
}

/// 获取已注册的配置实现
///
/// # Panics
/// 如果尚未调用 [`register_config`]，则 panic（单元测试中退回到 mock 配置）
#[inline]
pub fn vm_config() -> &'static dyn VmConfig {
    let data = CONFIG_DATA.load(Ordering::Acquire);
    let vtable = CONFIG_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        #[cfg(test)]
        {
            return &test_support::mock::mm::MOCK_MM_CONFIG;
        }
        #[cfg(not(test))]
        panic!("vm: VmConfig not registered");
    }
    // SAFETY: data 和 vtable 由 register_config 写入
    unsafe { &*core::mem::transmute::<(usize, usize), *const dyn VmConfig>((data, vtable)) }
}
