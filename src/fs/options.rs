//! 打开卷时的配置

use crate::checksum::ChecksumPolicy;
use crate::consts::EXT4_SUPERBLOCK_OFFSET;

/// superblock 的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuperblockLocation {
    /// 文件系统起点后 1024 字节
    #[default]
    Primary,
    /// 备份 superblock（类似 `e2fsck -b`），块描述符表从其后一块开始
    Backup {
        /// 备份所在块号
        block: u64,
        /// 计算块号所用的块大小
        block_size: u32,
    },
}

impl SuperblockLocation {
    /// 相对文件系统起点的字节偏移
    pub fn byte_offset(self) -> u64 {
        match self {
            SuperblockLocation::Primary => EXT4_SUPERBLOCK_OFFSET,
            SuperblockLocation::Backup { block, block_size } => block.saturating_mul(block_size as u64),
        }
    }
}

/// 卷配置
///
/// # 示例
///
/// ```rust,ignore
/// let options = VolumeOptions::default()
///     .with_checksum_policy(ChecksumPolicy::Strict)
///     .with_partition_offset(1 << 20);
/// let volume = Volume::open_with_options(image, options)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VolumeOptions {
    /// 校验和策略
    pub checksum_policy: ChecksumPolicy,
    /// 文件系统在读取器中的字节偏移
    pub partition_offset: u64,
    /// superblock 位置
    pub superblock: SuperblockLocation,
}

impl VolumeOptions {
    /// 设置校验和策略
    pub fn with_checksum_policy(mut self, policy: ChecksumPolicy) -> Self {
        self.checksum_policy = policy;
        self
    }

    /// 设置分区偏移
    pub fn with_partition_offset(mut self, offset: u64) -> Self {
        self.partition_offset = offset;
        self
    }

    /// 改用备份 superblock
    pub fn with_backup_superblock(mut self, block: u64, block_size: u32) -> Self {
        self.superblock = SuperblockLocation::Backup { block, block_size };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_setters() {
        let options = VolumeOptions::default();
        assert_eq!(options.checksum_policy, ChecksumPolicy::Report);
        assert_eq!(options.superblock.byte_offset(), 1024);

        let options = options
            .with_checksum_policy(ChecksumPolicy::Ignore)
            .with_partition_offset(512)
            .with_backup_superblock(8193, 1024);
        assert_eq!(options.checksum_policy, ChecksumPolicy::Ignore);
        assert_eq!(options.partition_offset, 512);
        assert_eq!(options.superblock.byte_offset(), 8193 * 1024);
    }
}
