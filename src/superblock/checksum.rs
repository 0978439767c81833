//! Superblock 校验和计算
//!
//! metadata_csum 下，superblock 最后 4 字节保存对前 0x3FC 字节的 CRC32C
//! （种子 !0，不做最终取反）。

use crate::consts::EXT4_SUPERBLOCK_CSUM_OFFSET;
use crate::crc::{crc32c_append, EXT4_CRC32_INIT};
use byteorder::{ByteOrder, LittleEndian};

/// 计算 superblock 的 CRC32C 校验和
///
/// # 参数
///
/// * `raw` - 至少 1024 字节的原始 superblock
///
/// # 返回
///
/// 长度不足时返回 `None`
pub fn compute_checksum(raw: &[u8]) -> Option<u32> {
    let data = raw.get(..EXT4_SUPERBLOCK_CSUM_OFFSET)?;
    Some(crc32c_append(EXT4_CRC32_INIT, data))
}

/// 读取磁盘上保存的校验和
pub fn stored_checksum(raw: &[u8]) -> Option<u32> {
    raw.get(EXT4_SUPERBLOCK_CSUM_OFFSET..EXT4_SUPERBLOCK_CSUM_OFFSET + 4)
        .map(LittleEndian::read_u32)
}
