//! 独立 xattr 块
//!
//! inode 的 file_acl 指向的块，32 字节头部之后是条目表，值偏移相对块起点。

use super::entry::{EntryTable, ValueOrigin, XattrEntry, XattrValueLocation};
use super::hash;
use crate::block::{BlockDev, BlockReader};
use crate::checksum::{self, ChecksumKind, ChecksumPolicy, ChecksumStatus};
use crate::consts::*;
use crate::crc::crc32c_append;
use crate::error::{Error, ErrorKind, Result};
use crate::superblock::{IncompatFeatures, Superblock};
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

const XATTR_BLOCK_CHECKSUM_OFFSET: usize = 0x10;

/// xattr 块头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XattrBlockHeader {
    /// 引用计数（共享块）
    pub refcount: u32,
    /// 块数，只支持 1
    pub blocks: u32,
    /// 块哈希
    pub hash: u32,
    /// 校验和
    pub checksum: u32,
}

impl XattrBlockHeader {
    /// 解析并验证头部
    ///
    /// 魔数不符为 `InvalidFormat`，块数不为 1 为 `CorruptStructure`。
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < EXT4_XATTR_BLOCK_HEADER_SIZE {
            return Err(Error::new(ErrorKind::CorruptStructure, "Xattr block too short"));
        }
        let magic = LittleEndian::read_u32(raw);
        if magic != EXT4_XATTR_MAGIC {
            return Err(Error::new(ErrorKind::InvalidFormat, "Invalid xattr block magic")
                .with_mismatch(EXT4_XATTR_MAGIC as u64, magic as u64));
        }
        let header = Self {
            refcount: LittleEndian::read_u32(&raw[4..]),
            blocks: LittleEndian::read_u32(&raw[8..]),
            hash: LittleEndian::read_u32(&raw[12..]),
            checksum: LittleEndian::read_u32(&raw[XATTR_BLOCK_CHECKSUM_OFFSET..]),
        };
        if header.blocks != 1 {
            return Err(Error::new(ErrorKind::CorruptStructure, "Xattr block count is not 1")
                .with_mismatch(1, header.blocks as u64));
        }
        Ok(header)
    }
}

/// 计算 xattr 块校验和，返回 (保存值, 计算值)
///
/// crc32c(seed, le64 块号 ‖ 校验和字段置零的整块)。
pub fn checksum_pair(fs_seed: u32, block: u64, raw: &[u8]) -> Option<(u32, u32)> {
    if raw.len() < EXT4_XATTR_BLOCK_HEADER_SIZE {
        return None;
    }
    let stored = LittleEndian::read_u32(&raw[XATTR_BLOCK_CHECKSUM_OFFSET..]);
    let mut crc = crc32c_append(fs_seed, &block.to_le_bytes());
    crc = crc32c_append(crc, &raw[..XATTR_BLOCK_CHECKSUM_OFFSET]);
    crc = crc32c_append(crc, &[0u8; 4]);
    crc = crc32c_append(crc, &raw[XATTR_BLOCK_CHECKSUM_OFFSET + 4..]);
    Some((stored, crc))
}

/// 读取 inode 的 xattr 块中的条目
///
/// `block` 为 0 时没有独立块，返回空列表。
pub fn block_entries<R: BlockReader>(
    bdev: &BlockDev<R>,
    sb: &Superblock,
    block: u64,
    policy: ChecksumPolicy,
) -> Result<Vec<XattrEntry>> {
    if block == 0 {
        return Ok(Vec::new());
    }
    let raw = bdev.read_block(block)?;
    let disk_offset = bdev.block_offset(block)?;
    let header = XattrBlockHeader::parse(&raw).map_err(|e| e.with_offset(disk_offset))?;

    if sb.has_metadata_csum() && policy.computes() {
        let status = checksum::evaluate(ChecksumKind::XattrBlock { block }, &raw, sb.checksum_seed());
        policy.enforce(status, "Xattr block checksum mismatch", disk_offset)?;
        if status == ChecksumStatus::Valid {
            log::trace!("[XATTR] block {} checksum ok", block);
        }
    }

    let entries = EntryTable {
        data: &raw,
        entries_start: EXT4_XATTR_BLOCK_HEADER_SIZE,
        value_base: 0,
        origin: ValueOrigin::Block(block),
        ea_inode: sb.incompat_features().contains(IncompatFeatures::EA_INODE),
        disk_offset: Some(disk_offset),
    }
    .parse()?;

    for entry in &entries {
        if let XattrValueLocation::Block { offset, size, .. } = entry.value {
            let value = offset
                .checked_add(size as usize)
                .and_then(|end| raw.get(offset..end))
                .ok_or(
                    Error::new(ErrorKind::CorruptStructure, "Xattr value out of bounds")
                        .with_offset(disk_offset + offset as u64),
                )?;
            if !hash::hash_matches(entry.hash, &entry.name, value) {
                log::debug!(
                    "[XATTR] block {} entry {:?} hash mismatch (stored {:#x})",
                    block,
                    entry.full_name_lossy(),
                    entry.hash
                );
            }
        }
    }

    log::debug!(
        "[XATTR] block {} refcount={} {} attributes",
        block,
        header.refcount,
        entries.len()
    );
    Ok(entries)
}
