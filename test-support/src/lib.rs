//! 测试支持 crate
//!
//! 提供 Mock 实现和测试工具。这里不依赖任何被测 crate（避免循环依赖），
//! 被测 crate 在 `cfg(test)` 下为这些类型实现自己的 trait。

#![no_std]

extern crate alloc;

pub mod mock;
