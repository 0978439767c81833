//! 间接块寻址（ext2/ext3 传统块映射）
//!
//! i_block 的前 12 项是直接块，之后依次是一级、二级、三级间接块指针。

mod mapper;

pub use mapper::IndirectBlockMapper;
