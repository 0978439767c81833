//! ext4 扩展属性 (Extended Attributes) 只读解析
//!
//! 扩展属性以 name-value 对的形式存储在两个位置：
//! 1. **Inode 内部**：128 + extra_isize 之后的剩余空间
//! 2. **独立块**：inode 的 file_acl 指向的块
//!
//! 枚举顺序固定为先 inode 内、后独立块。这里只定位值，不解释值的语义
//! （ACL、SELinux 标签等交给调用方）。`system.data` 是 inline-data
//! 特性存放文件尾部数据的地方。

mod block;
mod entry;
mod hash;
mod ibody;
mod prefix;

pub use block::{block_entries, checksum_pair, XattrBlockHeader};
pub use entry::{XattrEntry, XattrValueLocation};
pub use hash::{entry_hash, hash_matches};
pub use ibody::ibody_entries;
pub use prefix::XattrNamespace;

use crate::block::{BlockDev, BlockReader};
use crate::checksum::ChecksumPolicy;
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use crate::inode::Inode;
use crate::superblock::{IncompatFeatures, Superblock};
use alloc::vec::Vec;

/// 列出 inode 的全部扩展属性
pub fn list_attributes<R: BlockReader>(
    bdev: &BlockDev<R>,
    sb: &Superblock,
    inode: &Inode,
    policy: ChecksumPolicy,
) -> Result<Vec<XattrEntry>> {
    let ea_inode = sb.incompat_features().contains(IncompatFeatures::EA_INODE);
    let mut entries = ibody_entries(inode, ea_inode)?;
    entries.extend(block_entries(bdev, sb, inode.file_acl(), policy)?);
    Ok(entries)
}

/// 按完整名字（如 `user.comment`）查找属性
pub fn find_attribute<'e>(entries: &'e [XattrEntry], full_name: &[u8]) -> Option<&'e XattrEntry> {
    let (namespace, name) = XattrNamespace::split_name(full_name)?;
    entries
        .iter()
        .find(|e| e.namespace == namespace && e.name == name)
}

/// 读取 inode 内或 xattr 块内的属性值
///
/// 存放在 EA inode 中的值需要走文件数据读取路径，这里返回 `InvalidInput`。
pub fn read_value<R: BlockReader>(
    bdev: &BlockDev<R>,
    inode: &Inode,
    entry: &XattrEntry,
) -> Result<Vec<u8>> {
    match entry.value {
        XattrValueLocation::Inline { offset, size } => {
            Ok(value_slice(inode.raw(), offset, size)?.to_vec())
        }
        XattrValueLocation::Block {
            block,
            offset,
            size,
        } => {
            let raw = bdev.read_block(block)?;
            Ok(value_slice(&raw, offset, size)?.to_vec())
        }
        XattrValueLocation::Inode { .. } => Err(Error::new(
            ErrorKind::InvalidInput,
            "Xattr value is stored in an EA inode",
        )),
    }
}

fn value_slice(data: &[u8], offset: usize, size: u32) -> Result<&[u8]> {
    offset
        .checked_add(size as usize)
        .and_then(|end| data.get(offset..end))
        .ok_or(Error::new(ErrorKind::CorruptStructure, "Xattr value out of bounds"))
}

/// inline-data 在 i_block 之外的部分（`system.data` 的值）
///
/// 属性不存在时返回空切片。
pub fn inline_data_value(inode: &Inode) -> Result<&[u8]> {
    let entries = ibody_entries(inode, true)?;
    let found = entries
        .iter()
        .find(|e| e.namespace == XattrNamespace::System && e.name == EXT4_INLINE_DATA_XATTR_NAME);
    match found.map(|e| e.value) {
        None => Ok(&[]),
        Some(XattrValueLocation::Inline { offset, size }) => value_slice(inode.raw(), offset, size),
        Some(_) => Err(Error::new(
            ErrorKind::CorruptStructure,
            "Inline data attribute is not stored in the inode",
        )),
    }
}
