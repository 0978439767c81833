//! xattr 条目表解析
//!
//! inode 内区域和独立块使用相同的条目格式：
//!
//! ```text
//! 0x00 name_len   u8
//! 0x01 name_index u8
//! 0x02 value_offs u16
//! 0x04 value_inum u32   (EA_INODE: 值存放在该 inode 中)
//! 0x08 value_size u32
//! 0x0C hash       u32
//! 0x10 name       [u8; name_len]，整体按 4 字节对齐
//! ```
//!
//! 条目表以 4 个零字节结束，值区域位于结束标记之后。

use super::prefix::XattrNamespace;
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// 属性值的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XattrValueLocation {
    /// inode 记录内，`offset` 为相对 inode 记录起点的字节偏移
    Inline {
        /// 字节偏移
        offset: usize,
        /// 值长度
        size: u32,
    },
    /// 独立 xattr 块内
    Block {
        /// 物理块号
        block: u64,
        /// 块内字节偏移
        offset: usize,
        /// 值长度
        size: u32,
    },
    /// 独立的 EA inode
    Inode {
        /// 存放值的 inode 号
        inode: u32,
        /// 值长度
        size: u32,
    },
}

impl XattrValueLocation {
    /// 值长度
    pub fn size(&self) -> u32 {
        match *self {
            XattrValueLocation::Inline { size, .. }
            | XattrValueLocation::Block { size, .. }
            | XattrValueLocation::Inode { size, .. } => size,
        }
    }
}

/// 扩展属性条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XattrEntry {
    /// 命名空间
    pub namespace: XattrNamespace,
    /// 去掉命名空间前缀的名字
    pub name: Vec<u8>,
    /// 值的位置
    pub value: XattrValueLocation,
    /// 磁盘上保存的条目哈希
    pub hash: u32,
}

impl XattrEntry {
    /// 带命名空间前缀的完整名字
    pub fn full_name(&self) -> Vec<u8> {
        let prefix = self.namespace.prefix().as_bytes();
        let mut full = Vec::with_capacity(prefix.len() + self.name.len());
        full.extend_from_slice(prefix);
        full.extend_from_slice(&self.name);
        full
    }

    /// 名字（有损 UTF-8）
    pub fn full_name_lossy(&self) -> alloc::string::String {
        alloc::string::String::from_utf8_lossy(&self.full_name()).into_owned()
    }
}

/// 条目对齐后的长度
pub(crate) fn entry_len(name_len: u8) -> usize {
    (EXT4_XATTR_ENTRY_SIZE + name_len as usize + EXT4_XATTR_PAD - 1) & !(EXT4_XATTR_PAD - 1)
}

/// 值所在的容器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueOrigin {
    /// inode 记录
    Inode,
    /// 独立块
    Block(u64),
}

/// 条目表的描述
///
/// `data` 是整个容器（inode 记录或块），条目从 `entries_start` 开始，
/// `value_offs` 相对 `value_base`。
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntryTable<'d> {
    pub data: &'d [u8],
    pub entries_start: usize,
    pub value_base: usize,
    pub origin: ValueOrigin,
    /// 是否允许 value_inum 非零
    pub ea_inode: bool,
    /// 容器在镜像中的字节偏移（错误上下文）
    pub disk_offset: Option<u64>,
}

impl EntryTable<'_> {
    fn corrupt(&self, message: &'static str, pos: usize) -> Error {
        let err = Error::new(ErrorKind::CorruptStructure, message);
        match self.disk_offset {
            Some(base) => err.with_offset(base + pos as u64),
            None => err,
        }
    }

    /// 解析全部条目
    ///
    /// 条目越界、没有结束标记、值落在条目表内或超出容器都视为损坏。
    pub fn parse(&self) -> Result<Vec<XattrEntry>> {
        let data = self.data;
        let mut entries = Vec::new();
        // (条目位置, 值起点, 值长度)
        let mut spans = Vec::new();
        let mut pos = self.entries_start;

        loop {
            if pos + 4 > data.len() {
                return Err(self.corrupt("Xattr entry table is not terminated", pos));
            }
            if LittleEndian::read_u32(&data[pos..]) == 0 {
                break;
            }
            if pos + EXT4_XATTR_ENTRY_SIZE > data.len() {
                return Err(self.corrupt("Xattr entry header out of bounds", pos));
            }

            let raw = &data[pos..];
            let name_len = raw[0];
            let name_index = raw[1];
            let value_offs = LittleEndian::read_u16(&raw[2..]) as usize;
            let value_inum = LittleEndian::read_u32(&raw[4..]);
            let value_size = LittleEndian::read_u32(&raw[8..]);
            let hash = LittleEndian::read_u32(&raw[12..]);

            let len = entry_len(name_len);
            if pos + len > data.len() {
                return Err(self.corrupt("Xattr entry name out of bounds", pos));
            }
            let name_start = pos + EXT4_XATTR_ENTRY_SIZE;
            let name = data[name_start..name_start + name_len as usize].to_vec();

            let value = if value_inum != 0 {
                if !self.ea_inode {
                    return Err(self.corrupt("Xattr value inode without EA_INODE feature", pos));
                }
                XattrValueLocation::Inode {
                    inode: value_inum,
                    size: value_size,
                }
            } else {
                let start = self.value_base + value_offs;
                spans.push((pos, start, value_size as usize));
                match self.origin {
                    ValueOrigin::Inode => XattrValueLocation::Inline {
                        offset: start,
                        size: value_size,
                    },
                    ValueOrigin::Block(block) => XattrValueLocation::Block {
                        block,
                        offset: start,
                        size: value_size,
                    },
                }
            };

            entries.push(XattrEntry {
                namespace: XattrNamespace::from_index(name_index),
                name,
                value,
                hash,
            });
            pos += len;
        }

        // 值区域从结束标记之后开始
        let values_start = pos + 4;
        for (entry_pos, start, size) in spans {
            // 空值的偏移通常为 0，只要求不越过缓冲区
            let misplaced = size != 0 && start < values_start;
            if misplaced || start.checked_add(size).map_or(true, |end| end > data.len()) {
                return Err(self.corrupt("Xattr value out of bounds", entry_pos));
            }
        }

        log::trace!("[XATTR] parsed {} entries from {:?}", entries.len(), self.origin);
        Ok(entries)
    }
}
