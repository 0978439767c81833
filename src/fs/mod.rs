//! 卷和文件条目的高级 API
//!
//! [`Volume`] 在打开时解析 superblock 和块组描述符表，[`FileEntry`] 借用
//! 卷，按路径或 inode 号访问文件内容、目录和扩展属性。

mod file_entry;
mod options;
mod volume;

pub use file_entry::FileEntry;
pub use options::{SuperblockLocation, VolumeOptions};
pub use volume::Volume;
