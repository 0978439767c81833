//! 目录模块
//!
//! ## 模块结构
//!
//! - `entry` - 目录项记录解析
//! - `reader` - 目录块读取与叶子块校验
//! - `iterator` - 惰性目录迭代器（含 inline-data 目录）
//! - `hash` - HTree 哈希算法
//! - `htree` - HTree 索引查找
//! - `lookup` - 名字查找策略（索引优先，失败退回线性扫描）
//! - `checksum` - 叶子块与索引块校验和

pub mod checksum;
pub mod entry;
pub mod hash;
pub mod htree;
pub mod iterator;
pub mod lookup;
pub mod reader;

pub use entry::{rec_len_from_disk, DirBlockParser, DirEntry, RecordBase};
pub use hash::{htree_hash, DirHash};
pub use htree::{DxEntry, DxNode, DxRoot, DxRootInfo, HtreeLookup};
pub use iterator::{read_dir, DirIterator};
pub use lookup::{lookup, FallbackLookup, IndexedLookup, LinearLookup, NameLookup};
pub use reader::{DirBlock, DirReader};
