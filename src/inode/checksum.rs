//! Inode 校验和计算
//!
//! 校验和覆盖整个 inode 记录（inode_size 字节），计算时 checksum_lo 和
//! checksum_hi 两个字段视为 0。checksum_hi 只有在 extra_isize 足够覆盖它
//! 时才存在，否则只比较低 16 位。

use crate::consts::EXT4_GOOD_OLD_INODE_SIZE;
use crate::crc::crc32c_append;
use byteorder::{ByteOrder, LittleEndian};

/// checksum_lo 字段偏移
pub const INODE_CSUM_LO_OFFSET: usize = 0x7C;

/// extra_isize 字段偏移
pub const INODE_EXTRA_ISIZE_OFFSET: usize = 0x80;

/// checksum_hi 字段偏移
pub const INODE_CSUM_HI_OFFSET: usize = 0x82;

/// 判断 checksum_hi 是否落在 inode 的扩展区域内
fn has_checksum_hi(raw: &[u8]) -> bool {
    if raw.len() <= EXT4_GOOD_OLD_INODE_SIZE {
        return false;
    }
    let extra_isize = LittleEndian::read_u16(&raw[INODE_EXTRA_ISIZE_OFFSET..]) as usize;
    EXT4_GOOD_OLD_INODE_SIZE + extra_isize <= raw.len()
        && extra_isize >= INODE_CSUM_HI_OFFSET + 2 - EXT4_GOOD_OLD_INODE_SIZE
}

/// 计算 inode 校验和
///
/// # 参数
///
/// * `inode_seed` - 由文件系统种子、inode 号和 generation 链式推导出的种子
/// * `raw` - 完整的 inode 记录
///
/// # 返回
///
/// 记录短于 128 字节时返回 `None`；没有 checksum_hi 时只返回低 16 位
pub fn compute_checksum(inode_seed: u32, raw: &[u8]) -> Option<u32> {
    if raw.len() < EXT4_GOOD_OLD_INODE_SIZE {
        return None;
    }
    let zero = [0u8; 2];

    let mut crc = crc32c_append(inode_seed, &raw[..INODE_CSUM_LO_OFFSET]);
    crc = crc32c_append(crc, &zero);
    crc = crc32c_append(crc, &raw[INODE_CSUM_LO_OFFSET + 2..EXT4_GOOD_OLD_INODE_SIZE]);

    if raw.len() > EXT4_GOOD_OLD_INODE_SIZE {
        crc = crc32c_append(crc, &raw[EXT4_GOOD_OLD_INODE_SIZE..INODE_CSUM_HI_OFFSET]);
        let mut rest = INODE_CSUM_HI_OFFSET;
        if has_checksum_hi(raw) {
            crc = crc32c_append(crc, &zero);
            rest += 2;
        }
        crc = crc32c_append(crc, &raw[rest..]);
    }

    if has_checksum_hi(raw) {
        Some(crc)
    } else {
        Some(crc & 0xFFFF)
    }
}

/// 读取保存在 inode 中的校验和
pub fn stored_checksum(raw: &[u8]) -> Option<u32> {
    if raw.len() < EXT4_GOOD_OLD_INODE_SIZE {
        return None;
    }
    let mut csum = LittleEndian::read_u16(&raw[INODE_CSUM_LO_OFFSET..]) as u32;
    if has_checksum_hi(raw) {
        csum |= (LittleEndian::read_u16(&raw[INODE_CSUM_HI_OFFSET..]) as u32) << 16;
    }
    Some(csum)
}

/// (保存值, 计算值)
pub fn checksum_pair(inode_seed: u32, raw: &[u8]) -> Option<(u32, u32)> {
    Some((stored_checksum(raw)?, compute_checksum(inode_seed, raw)?))
}

/// 把计算出的校验和写回记录（测试镜像构造使用）
#[cfg(test)]
pub(crate) fn set_checksum(inode_seed: u32, raw: &mut [u8]) {
    if let Some(csum) = compute_checksum(inode_seed, raw) {
        LittleEndian::write_u16(&mut raw[INODE_CSUM_LO_OFFSET..], csum as u16);
        if has_checksum_hi(raw) {
            LittleEndian::write_u16(&mut raw[INODE_CSUM_HI_OFFSET..], (csum >> 16) as u16);
        }
    }
}
