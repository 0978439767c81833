//! 跨模块共享的值类型
//!
//! 文件类型、时间戳和设备号在 inode、目录项和门面层之间传递，
//! 放在这里避免模块之间相互依赖。

use crate::consts::*;

/// 文件类型
///
/// 既可以从 inode 的 mode 推导，也可以从目录项的 file_type 字节推导；
/// 两者在损坏的镜像上可能不一致，调用方自行比较。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileType {
    /// 未知类型（目录项未记录类型，或 mode 类型位非法）
    #[default]
    Unknown,
    /// 普通文件
    RegularFile,
    /// 目录
    Directory,
    /// 字符设备
    CharacterDevice,
    /// 块设备
    BlockDevice,
    /// FIFO（命名管道）
    Fifo,
    /// Socket
    Socket,
    /// 符号链接
    Symlink,
}

impl FileType {
    /// 从 mode 中提取文件类型
    pub fn from_mode(mode: u16) -> Self {
        match mode & EXT4_INODE_MODE_TYPE_MASK {
            EXT4_INODE_MODE_FIFO => FileType::Fifo,
            EXT4_INODE_MODE_CHARDEV => FileType::CharacterDevice,
            EXT4_INODE_MODE_DIRECTORY => FileType::Directory,
            EXT4_INODE_MODE_BLOCKDEV => FileType::BlockDevice,
            EXT4_INODE_MODE_FILE => FileType::RegularFile,
            EXT4_INODE_MODE_SOFTLINK => FileType::Symlink,
            EXT4_INODE_MODE_SOCKET => FileType::Socket,
            _ => FileType::Unknown,
        }
    }

    /// 从目录项的 file_type 字节转换
    pub fn from_dir_entry(de_type: u8) -> Self {
        match de_type {
            EXT4_DE_REG_FILE => FileType::RegularFile,
            EXT4_DE_DIR => FileType::Directory,
            EXT4_DE_CHRDEV => FileType::CharacterDevice,
            EXT4_DE_BLKDEV => FileType::BlockDevice,
            EXT4_DE_FIFO => FileType::Fifo,
            EXT4_DE_SOCK => FileType::Socket,
            EXT4_DE_SYMLINK => FileType::Symlink,
            _ => FileType::Unknown,
        }
    }

    /// 转换为目录项的 file_type 字节
    pub fn to_dir_entry(self) -> u8 {
        match self {
            FileType::RegularFile => EXT4_DE_REG_FILE,
            FileType::Directory => EXT4_DE_DIR,
            FileType::CharacterDevice => EXT4_DE_CHRDEV,
            FileType::BlockDevice => EXT4_DE_BLKDEV,
            FileType::Fifo => EXT4_DE_FIFO,
            FileType::Socket => EXT4_DE_SOCK,
            FileType::Symlink => EXT4_DE_SYMLINK,
            FileType::Unknown => EXT4_DE_UNKNOWN,
        }
    }

    /// 检查是否为目录
    pub fn is_dir(self) -> bool {
        self == FileType::Directory
    }

    /// 检查是否为普通文件
    pub fn is_file(self) -> bool {
        self == FileType::RegularFile
    }

    /// 检查是否为符号链接
    pub fn is_symlink(self) -> bool {
        self == FileType::Symlink
    }

    /// 检查是否为字符设备或块设备
    pub fn is_device(self) -> bool {
        matches!(self, FileType::CharacterDevice | FileType::BlockDevice)
    }
}

/// inode 时间戳
///
/// 秒数为有符号 32 位基数加上扩展字段低 2 位提供的 epoch 位，
/// 纳秒来自扩展字段的高 30 位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    /// 自 UNIX 纪元起的秒数
    pub seconds: i64,
    /// 纳秒部分
    pub nanoseconds: u32,
}

impl Timestamp {
    /// 由基础字段和（可选的）扩展字段组合
    pub fn decode(base: u32, extra: Option<u32>) -> Self {
        let mut seconds = base as i32 as i64;
        let mut nanoseconds = 0;
        if let Some(extra) = extra {
            seconds += ((extra & 0x3) as i64) << 32;
            nanoseconds = extra >> 2;
        }
        Self {
            seconds,
            nanoseconds,
        }
    }
}

/// 设备号（字符设备和块设备 inode）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceNumber {
    /// 主设备号
    pub major: u32,
    /// 次设备号
    pub minor: u32,
}

impl DeviceNumber {
    /// 从 i_block 的前两个字解码
    ///
    /// 旧编码（8 位主/次设备号）放在第 0 个字；第 0 个字为零时使用
    /// 第 1 个字中的新编码（12 位主设备号、20 位次设备号）。
    pub fn decode(old: u32, new: u32) -> Self {
        if old != 0 {
            Self {
                major: (old >> 8) & 0xFF,
                minor: old & 0xFF,
            }
        } else {
            Self {
                major: (new & 0xF_FF00) >> 8,
                minor: (new & 0xFF) | ((new >> 12) & 0xF_FF00),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_mode() {
        assert_eq!(FileType::from_mode(EXT4_INODE_MODE_FILE | 0o644), FileType::RegularFile);
        assert_eq!(FileType::from_mode(EXT4_INODE_MODE_DIRECTORY | 0o755), FileType::Directory);
        assert_eq!(FileType::from_mode(EXT4_INODE_MODE_SOFTLINK), FileType::Symlink);
        assert_eq!(FileType::from_mode(0x3000), FileType::Unknown);
    }

    #[test]
    fn test_file_type_dir_entry_conversion() {
        for de in 0u8..=7 {
            assert_eq!(FileType::from_dir_entry(de).to_dir_entry(), de);
        }
        assert_eq!(FileType::from_dir_entry(0xDE), FileType::Unknown);
        assert!(FileType::CharacterDevice.is_device());
        assert!(!FileType::Directory.is_device());
    }

    #[test]
    fn test_timestamp_epoch_bits() {
        let ts = Timestamp::decode(0x8000_0000, None);
        assert_eq!(ts.seconds, -(1i64 << 31));

        // epoch 位 1 把 1901 年之前的负值推到 2038 年之后
        let ts = Timestamp::decode(0x8000_0000, Some(1 | (123 << 2)));
        assert_eq!(ts.seconds, (1i64 << 32) - (1i64 << 31));
        assert_eq!(ts.nanoseconds, 123);
    }

    #[test]
    fn test_device_number_encodings() {
        let old = DeviceNumber::decode(0x0801, 0);
        assert_eq!(old, DeviceNumber { major: 8, minor: 1 });

        // major 259, minor 0x12345
        let new = 0x12345 & 0xFF | (259 << 8) | ((0x12345 & !0xFF) << 12);
        let dev = DeviceNumber::decode(0, new);
        assert_eq!(dev.major, 259);
        assert_eq!(dev.minor, 0x12345);
    }
}
