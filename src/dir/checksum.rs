//! 目录块校验和
//!
//! 叶子块末尾是 12 字节的伪目录项（inode 0、rec_len 12、file_type 0xDE），
//! 校验和覆盖它之前的全部字节；HTree 索引块在 limit 个条目之后放一个
//! 8 字节的 dx_tail。两者都使用 inode 级种子。

use crate::consts::*;
use crate::crc::crc32c_append;
use byteorder::{ByteOrder, LittleEndian};

/// 定位叶子块的校验和尾部，返回尾部在块内的偏移
///
/// 尾部必须精确匹配 `{inode 0, rec_len 12, name_len 0, file_type 0xDE}`。
pub fn leaf_tail_offset(raw: &[u8]) -> Option<usize> {
    let offset = raw.len().checked_sub(EXT4_DIR_TAIL_SIZE)?;
    let tail = &raw[offset..];
    let is_tail = LittleEndian::read_u32(&tail[0..]) == 0
        && LittleEndian::read_u16(&tail[4..]) as usize == EXT4_DIR_TAIL_SIZE
        && tail[6] == 0
        && tail[7] == EXT4_DIRENTRY_DIR_CSUM;
    is_tail.then_some(offset)
}

/// 叶子块的 (保存值, 计算值)，没有尾部时返回 `None`
pub fn leaf_checksum_pair(inode_seed: u32, raw: &[u8]) -> Option<(u32, u32)> {
    let offset = leaf_tail_offset(raw)?;
    let stored = LittleEndian::read_u32(&raw[offset + 8..]);
    let computed = crc32c_append(inode_seed, &raw[..offset]);
    Some((stored, computed))
}

/// HTree 索引块的 (保存值, 计算值)
///
/// `count_offset` 是 count/limit 头在块内的偏移（根节点 0x20，内部节点 8）。
/// 覆盖范围是块头到第 count 个条目末尾，然后是 dx_tail 的保留字和一个
/// 置零的校验和字段。limit 个条目之后放不下 dx_tail 时返回 `None`。
pub fn dx_checksum_pair(inode_seed: u32, raw: &[u8], count_offset: usize) -> Option<(u32, u32)> {
    let header = raw.get(count_offset..count_offset + 4)?;
    let limit = LittleEndian::read_u16(&header[0..]) as usize;
    let count = LittleEndian::read_u16(&header[2..]) as usize;

    let tail_offset = count_offset + limit * EXT4_DX_ENTRY_SIZE;
    if tail_offset + EXT4_DX_TAIL_SIZE > raw.len() || count > limit {
        return None;
    }

    let covered = count_offset + count * EXT4_DX_ENTRY_SIZE;
    let stored = LittleEndian::read_u32(&raw[tail_offset + 4..]);
    let mut crc = crc32c_append(inode_seed, &raw[..covered]);
    crc = crc32c_append(crc, &raw[tail_offset..tail_offset + 4]);
    crc = crc32c_append(crc, &[0u8; 4]);
    Some((stored, crc))
}

/// 为测试镜像写入叶子块尾部和校验和
#[cfg(test)]
pub(crate) fn set_leaf_checksum(inode_seed: u32, raw: &mut [u8]) {
    let offset = raw.len() - EXT4_DIR_TAIL_SIZE;
    raw[offset..].fill(0);
    LittleEndian::write_u16(&mut raw[offset + 4..], EXT4_DIR_TAIL_SIZE as u16);
    raw[offset + 7] = EXT4_DIRENTRY_DIR_CSUM;
    let csum = crc32c_append(inode_seed, &raw[..offset]);
    LittleEndian::write_u32(&mut raw[offset + 8..], csum);
}

/// 为测试镜像写入 dx_tail 校验和
#[cfg(test)]
pub(crate) fn set_dx_checksum(inode_seed: u32, raw: &mut [u8], count_offset: usize) {
    let limit = LittleEndian::read_u16(&raw[count_offset..]) as usize;
    let tail_offset = count_offset + limit * EXT4_DX_ENTRY_SIZE;
    LittleEndian::write_u32(&mut raw[tail_offset + 4..], 0);
    if let Some((_, computed)) = dx_checksum_pair(inode_seed, raw, count_offset) {
        LittleEndian::write_u32(&mut raw[tail_offset + 4..], computed);
    }
}
