//! 块组操作模块
//!
//! 这个模块提供块组描述符表的定位、解码与校验功能。

mod read;
pub mod checksum;

pub use read::*;
