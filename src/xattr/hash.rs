//! xattr 条目哈希
//!
//! 独立块中每个条目保存名字和值的滚动哈希。读取时只用来发现可疑条目，
//! 不匹配不影响解析结果。

use crate::consts::*;
use byteorder::{ByteOrder, LittleEndian};

const NAME_HASH_SHIFT: u32 = 5;
const VALUE_HASH_SHIFT: u32 = 16;

/// 计算条目哈希
///
/// 名字逐字节、值按 4 字节小端字（末尾补零）滚动异或。早期内核把名字
/// 字节当作有符号 char 处理，`signed` 选择该变体。
pub fn entry_hash(name: &[u8], value: &[u8], signed: bool) -> u32 {
    let mut hash: u32 = 0;

    for &byte in name {
        let c = if signed { byte as i8 as i32 as u32 } else { byte as u32 };
        hash = (hash << NAME_HASH_SHIFT) ^ (hash >> (32 - NAME_HASH_SHIFT)) ^ c;
    }

    for chunk in value.chunks(EXT4_XATTR_PAD) {
        let mut word = [0u8; EXT4_XATTR_PAD];
        word[..chunk.len()].copy_from_slice(chunk);
        let v = LittleEndian::read_u32(&word);
        hash = (hash << VALUE_HASH_SHIFT) ^ (hash >> (32 - VALUE_HASH_SHIFT)) ^ v;
    }

    hash
}

/// 保存的哈希是否与名字和值一致（接受两种变体）
///
/// 哈希为 0 表示未计算，视为一致。
pub fn hash_matches(stored: u32, name: &[u8], value: &[u8]) -> bool {
    stored == 0 || entry_hash(name, value, false) == stored || entry_hash(name, value, true) == stored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_only_hash() {
        assert_eq!(entry_hash(b"", b"", false), 0);
        // 'a' = 0x61；(0x61 << 5) ^ 0x62
        assert_eq!(entry_hash(b"ab", b"", false), (0x61 << 5) ^ 0x62);
    }

    #[test]
    fn test_value_is_zero_padded() {
        let short = entry_hash(b"k", b"xyz", false);
        let padded = entry_hash(b"k", b"xyz\0", false);
        assert_eq!(short, padded);
        assert_ne!(short, entry_hash(b"k", b"xyw", false));
    }

    #[test]
    fn test_signed_variant() {
        let name = [0xE9u8, b'x'];
        assert_ne!(entry_hash(&name, b"", false), entry_hash(&name, b"", true));
        let stored = entry_hash(&name, b"v", true);
        assert!(hash_matches(stored, &name, b"v"));
        assert!(hash_matches(0, &name, b"v"));
        assert!(!hash_matches(stored ^ 1, &name, b"v"));
    }
}
