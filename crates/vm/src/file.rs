//! 后备文件接口

/// 懒加载页的后备文件
///
/// 只需要定位读取；文件系统的实现在本 crate 之外。
pub trait BackingFile: Send + Sync {
    /// 从 `offset` 开始读取最多 `buf.len()` 字节，返回实际读取的字节数
    ///
    /// 出错时返回负的 errno。
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, isize>;
}
