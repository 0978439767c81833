//! inode 内部 xattr
//!
//! 位于 128 + extra_isize 之后：4 字节魔数，随后是条目表。值偏移相对
//! 第一个条目计算。

use super::entry::{EntryTable, ValueOrigin, XattrEntry};
use crate::consts::*;
use crate::error::Result;
use crate::inode::Inode;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// 解析 inode 内部的扩展属性
///
/// 没有扩展空间或魔数不符时返回空列表：大多数 inode 的这块区域
/// 只是零。`ea_inode` 表示文件系统是否允许值存放在独立 inode 中。
pub fn ibody_entries(inode: &Inode, ea_inode: bool) -> Result<Vec<XattrEntry>> {
    let Some(region) = inode.inline_xattr_region() else {
        return Ok(Vec::new());
    };
    let magic = LittleEndian::read_u32(region);
    if magic != EXT4_XATTR_MAGIC {
        if magic != 0 {
            log::debug!(
                "[XATTR] ino={} unexpected in-inode xattr magic {:#x}",
                inode.number(),
                magic
            );
        }
        return Ok(Vec::new());
    }

    let raw = inode.raw();
    let first = raw.len() - region.len() + EXT4_XATTR_IBODY_HEADER_SIZE;
    let entries = EntryTable {
        data: raw,
        entries_start: first,
        value_base: first,
        origin: ValueOrigin::Inode,
        ea_inode,
        disk_offset: None,
    }
    .parse()?;

    log::debug!("[XATTR] ino={} {} in-inode attributes", inode.number(), entries.len());
    Ok(entries)
}
