//! Inode 模块
//!
//! 根据 inode 号定位所在块组和 inode 表中的位置，读取原始记录并解码
//! 基础字段和扩展字段。

mod flags;
mod read;
pub mod checksum;

pub use flags::*;
pub use read::*;
