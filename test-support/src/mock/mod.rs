//! Mock 实现模块

pub mod arch;
pub mod mm;
