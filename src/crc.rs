//! CRC32C / CRC16 校验和计算
//!
//! ext4 元数据使用"裸" CRC32C：不做首尾取反，种子直接作为寄存器初值，
//! 结果可以继续作为下一段数据的种子链式计算。`crc32c` crate 的
//! `crc32c_append` 在入口和出口各取反一次，这里把它还原为裸寄存器语义。
//!
//! 旧式 `GDT_CSUM` 使用 CRC16（多项式 0x8005，反射形式 0xA001），同样不取反。

/// CRC32 初始值（ext4 使用 0xFFFFFFFF 作为种子链的起点）
pub const EXT4_CRC32_INIT: u32 = !0u32;

/// CRC16 初始值（GDT_CSUM）
pub const EXT4_CRC16_INIT: u16 = !0u16;

/// 以 `crc` 为寄存器初值继续计算 CRC32C
///
/// # 参数
/// * `crc` - 初始 CRC 值（上一段的结果或种子）
/// * `data` - 要计算校验和的数据
///
/// # 返回
/// 更新后的 CRC32C 寄存器值
#[inline]
pub fn crc32c_append(crc: u32, data: &[u8]) -> u32 {
    !crc32c::crc32c_append(!crc, data)
}

const fn make_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xA001 } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC16_TABLE: [u16; 256] = make_crc16_table();

/// 以 `crc` 为初值继续计算 CRC16
#[inline]
pub fn crc16_append(mut crc: u16, data: &[u8]) -> u16 {
    for &byte in data {
        crc = (crc >> 8) ^ CRC16_TABLE[((crc ^ byte as u16) & 0xFF) as usize];
    }
    crc
}
