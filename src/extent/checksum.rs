//! Extent 块校验和计算
//!
//! 非根节点块在最后一个可用条目（按 header.max 计）之后有 4 字节的 tail，
//! 保存对 tail 之前全部字节的 CRC32C，种子为 inode 种子。

use crate::consts::EXT4_EXTENT_ENTRY_SIZE;
use crate::crc::crc32c_append;
use byteorder::{ByteOrder, LittleEndian};

/// 计算 extent tail 的偏移量
///
/// Tail 位于所有 extent/index 条目之后（按 header.max 计）
#[inline]
pub fn extent_tail_offset(raw: &[u8]) -> Option<usize> {
    if raw.len() < EXT4_EXTENT_ENTRY_SIZE {
        return None;
    }
    let max = LittleEndian::read_u16(&raw[4..]) as usize;
    Some(EXT4_EXTENT_ENTRY_SIZE + EXT4_EXTENT_ENTRY_SIZE * max)
}

/// 计算 extent 块的校验和
pub fn compute_checksum(inode_seed: u32, raw: &[u8]) -> Option<u32> {
    let tail = extent_tail_offset(raw)?;
    if tail + 4 > raw.len() {
        return None;
    }
    Some(crc32c_append(inode_seed, &raw[..tail]))
}

/// (保存值, 计算值)；tail 不在块内时返回 `None`
pub fn checksum_pair(inode_seed: u32, raw: &[u8]) -> Option<(u32, u32)> {
    let computed = compute_checksum(inode_seed, raw)?;
    let tail = extent_tail_offset(raw)?;
    Some((LittleEndian::read_u32(&raw[tail..]), computed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_tail_after_max_entries() {
        let mut raw = vec![0u8; 1024];
        LittleEndian::write_u16(&mut raw[0..], 0xF30A);
        LittleEndian::write_u16(&mut raw[4..], 84);
        assert_eq!(extent_tail_offset(&raw), Some(12 + 84 * 12));

        let csum = compute_checksum(0xAA55, &raw).unwrap();
        LittleEndian::write_u32(&mut raw[12 + 84 * 12..], csum);
        let (stored, computed) = checksum_pair(0xAA55, &raw).unwrap();
        assert_eq!(stored, computed);

        // tail 本身不参与计算
        raw[1020] ^= 0xFF;
        assert_eq!(compute_checksum(0xAA55, &raw), Some(csum));
    }

    #[test]
    fn test_max_too_large_for_block() {
        let mut raw = vec![0u8; 1024];
        LittleEndian::write_u16(&mut raw[4..], 200);
        assert!(checksum_pair(1, &raw).is_none());
    }
}
