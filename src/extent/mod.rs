//! Extent 树模块
//!
//! ext4 用 extent 树描述文件的逻辑块到物理块映射。根节点位于 inode 的
//! i_block 中，索引节点和叶子节点各占一个块。
//!
//! - `node` - 节点解析与验证
//! - `tree` - 映射查找与 extent 枚举
//! - `checksum` - 节点 tail 校验和

mod node;
mod tree;
pub mod checksum;

pub use node::*;
pub use tree::ExtentTree;
