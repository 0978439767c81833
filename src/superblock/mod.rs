//! Superblock 操作模块
//!
//! 这个模块提供 superblock 的读取、特性解析与验证功能。

mod read;
mod features;
pub mod checksum;

pub use features::*;
pub use read::*;
