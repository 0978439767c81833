//! extfs_core: 只读的 ext2/ext3/ext4 磁盘结构解析库
//!
//! 面向取证工具：从任意实现了 [`BlockReader`] 的镜像源读取，不写回任何
//! 字节，也不回放日志。损坏的结构返回带磁盘偏移的错误，校验和失败按
//! [`ChecksumPolicy`] 处理。
//!
//! # 示例
//!
//! ```rust,ignore
//! use extfs_core::{FileReader, Volume, VolumeOptions, ChecksumPolicy};
//!
//! let options = VolumeOptions::default().with_checksum_policy(ChecksumPolicy::Strict);
//! let volume = Volume::open_with_options(FileReader::open("disk.img")?, options)?;
//!
//! let root = volume.root_directory()?;
//! for entry in root.list_children()? {
//!     let entry = entry?;
//!     println!("{} -> {}", entry.name_lossy(), entry.inode);
//! }
//!
//! let passwd = volume.get_file_entry_by_path("/etc/passwd")?;
//! let data = passwd.read_to_end()?;
//! ```
//!
//! # 模块结构
//!
//! - [`block`] - 读取器抽象和块设备包装
//! - [`superblock`] - Superblock 解析与特性位
//! - [`block_group`] - 块组描述符表
//! - [`inode`] - inode 定位与解码
//! - [`extent`] / [`indirect`] - 两种块映射方式，由 [`mapping`] 统一
//! - [`dir`] - 目录遍历与 HTree 查找
//! - [`xattr`] - 扩展属性
//! - [`fs`] - `Volume` / `FileEntry` 门面
//! - [`cache`] - 可选的读取缓存

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// ===== 基础 =====

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// 跨模块共享的值类型
pub mod types;

/// 元数据校验和
pub mod checksum;

/// CRC32C / CRC16 计算
pub(crate) mod crc;

/// 块读取抽象
pub mod block;

/// 块缓存
pub mod cache;

// ===== 磁盘结构 =====

/// Superblock 解析
pub mod superblock;

/// 块组描述符
pub mod block_group;

/// Inode 解析
pub mod inode;

/// 逻辑块映射
pub mod mapping;

/// Extent 树
pub mod extent;

/// 间接块寻址（ext2/ext3）
pub mod indirect;

/// 目录
pub mod dir;

/// 扩展属性
pub mod xattr;

// ===== 门面 =====

/// 卷和文件条目
pub mod fs;

#[cfg(test)]
mod testing;

// ===== 公共导出 =====

pub use error::{Error, ErrorKind, Result};

pub use checksum::{ChecksumPolicy, ChecksumStatus};

pub use block::{BlockDev, BlockReader};
#[cfg(feature = "std")]
pub use block::FileReader;

#[cfg(feature = "std")]
pub use cache::CachedReader;
pub use cache::{BlockCache, CacheStats};

pub use superblock::{FormatVersion, Superblock};

pub use block_group::{GroupDescriptor, GroupTable};

pub use inode::{Inode, InodeFlags};

pub use mapping::{BlockMap, BlockMapping, DataMapper};

pub use extent::{Extent, ExtentTree};

pub use indirect::IndirectBlockMapper;

pub use dir::{DirEntry, DirIterator};

pub use xattr::{XattrEntry, XattrNamespace, XattrValueLocation};

pub use types::{DeviceNumber, FileType, Timestamp};

pub use fs::{FileEntry, SuperblockLocation, Volume, VolumeOptions};
