//! 块组描述符校验和
//!
//! 两种互斥的算法，由特性位选择：
//! - metadata_csum：crc32c(seed, le32 group ‖ 描述符[校验和字段置零]) 的低 16 位
//! - GDT_CSUM：crc16(!0, uuid ‖ le32 group ‖ 描述符[跳过校验和字段])

use crate::crc::{crc16_append, crc32c_append, EXT4_CRC16_INIT};
use byteorder::{ByteOrder, LittleEndian};

/// 校验和字段在描述符中的偏移
pub const GROUP_DESC_CSUM_OFFSET: usize = 0x1E;

/// 读取描述符中保存的校验和
pub fn stored_checksum(desc: &[u8]) -> Option<u16> {
    desc.get(GROUP_DESC_CSUM_OFFSET..GROUP_DESC_CSUM_OFFSET + 2)
        .map(LittleEndian::read_u16)
}

/// metadata_csum 校验和
///
/// # 参数
///
/// * `seed` - 文件系统校验和种子
/// * `group` - 块组号
/// * `desc` - 完整描述符（长度为 desc_size）
pub fn compute_crc32c(seed: u32, group: u32, desc: &[u8]) -> Option<u16> {
    if desc.len() < GROUP_DESC_CSUM_OFFSET + 2 {
        return None;
    }
    let mut crc = crc32c_append(seed, &group.to_le_bytes());
    crc = crc32c_append(crc, &desc[..GROUP_DESC_CSUM_OFFSET]);
    crc = crc32c_append(crc, &[0, 0]);
    crc = crc32c_append(crc, &desc[GROUP_DESC_CSUM_OFFSET + 2..]);
    Some((crc & 0xFFFF) as u16)
}

/// GDT_CSUM 校验和（CRC16）
pub fn compute_crc16(uuid: &[u8; 16], group: u32, desc: &[u8]) -> Option<u16> {
    if desc.len() < GROUP_DESC_CSUM_OFFSET + 2 {
        return None;
    }
    let mut crc = crc16_append(EXT4_CRC16_INIT, uuid);
    crc = crc16_append(crc, &group.to_le_bytes());
    crc = crc16_append(crc, &desc[..GROUP_DESC_CSUM_OFFSET]);
    crc = crc16_append(crc, &desc[GROUP_DESC_CSUM_OFFSET + 2..]);
    Some(crc)
}
