//! 特性标志集合
//!
//! 三组特性位的语义不同：
//! - compat：不理解也可以安全读写
//! - incompat：不理解就不能正确解释磁盘数据，必须拒绝
//! - ro_compat：不理解时只能只读挂载；本库本来就是只读的，全部忽略

use crate::consts::*;
use bitflags::bitflags;

bitflags! {
    /// Compatible 特性
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CompatFeatures: u32 {
        /// 目录预分配
        const DIR_PREALLOC = EXT4_FEATURE_COMPAT_DIR_PREALLOC;
        /// AFS 服务器 inode
        const IMAGIC_INODES = EXT4_FEATURE_COMPAT_IMAGIC_INODES;
        /// 日志
        const HAS_JOURNAL = EXT4_FEATURE_COMPAT_HAS_JOURNAL;
        /// 扩展属性
        const EXT_ATTR = EXT4_FEATURE_COMPAT_EXT_ATTR;
        /// 预留 GDT 块
        const RESIZE_INODE = EXT4_FEATURE_COMPAT_RESIZE_INODE;
        /// HTree 目录索引
        const DIR_INDEX = EXT4_FEATURE_COMPAT_DIR_INDEX;
        /// sparse_super2
        const SPARSE_SUPER2 = EXT4_FEATURE_COMPAT_SPARSE_SUPER2;
    }
}

bitflags! {
    /// Incompatible 特性
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IncompatFeatures: u32 {
        /// 压缩
        const COMPRESSION = EXT4_FEATURE_INCOMPAT_COMPRESSION;
        /// 目录项带文件类型
        const FILETYPE = EXT4_FEATURE_INCOMPAT_FILETYPE;
        /// 需要日志恢复
        const RECOVER = EXT4_FEATURE_INCOMPAT_RECOVER;
        /// 独立日志设备
        const JOURNAL_DEV = EXT4_FEATURE_INCOMPAT_JOURNAL_DEV;
        /// META_BG
        const META_BG = EXT4_FEATURE_INCOMPAT_META_BG;
        /// extent 树
        const EXTENTS = EXT4_FEATURE_INCOMPAT_EXTENTS;
        /// 64 位
        const BIT64 = EXT4_FEATURE_INCOMPAT_64BIT;
        /// 多重挂载保护
        const MMP = EXT4_FEATURE_INCOMPAT_MMP;
        /// 灵活块组
        const FLEX_BG = EXT4_FEATURE_INCOMPAT_FLEX_BG;
        /// 扩展属性值 inode
        const EA_INODE = EXT4_FEATURE_INCOMPAT_EA_INODE;
        /// 目录项额外数据
        const DIRDATA = EXT4_FEATURE_INCOMPAT_DIRDATA;
        /// 校验和种子
        const CSUM_SEED = EXT4_FEATURE_INCOMPAT_CSUM_SEED;
        /// 大目录
        const LARGEDIR = EXT4_FEATURE_INCOMPAT_LARGEDIR;
        /// inline data
        const INLINE_DATA = EXT4_FEATURE_INCOMPAT_INLINE_DATA;
        /// 加密
        const ENCRYPT = EXT4_FEATURE_INCOMPAT_ENCRYPT;
        /// 大小写不敏感
        const CASEFOLD = EXT4_FEATURE_INCOMPAT_CASEFOLD;
    }
}

bitflags! {
    /// Read-only compatible 特性
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RoCompatFeatures: u32 {
        /// 稀疏 superblock
        const SPARSE_SUPER = EXT4_FEATURE_RO_COMPAT_SPARSE_SUPER;
        /// 大文件
        const LARGE_FILE = EXT4_FEATURE_RO_COMPAT_LARGE_FILE;
        /// 巨型文件
        const HUGE_FILE = EXT4_FEATURE_RO_COMPAT_HUGE_FILE;
        /// GDT CRC16
        const GDT_CSUM = EXT4_FEATURE_RO_COMPAT_GDT_CSUM;
        /// 目录链接数无上限
        const DIR_NLINK = EXT4_FEATURE_RO_COMPAT_DIR_NLINK;
        /// 扩展 inode 字段
        const EXTRA_ISIZE = EXT4_FEATURE_RO_COMPAT_EXTRA_ISIZE;
        /// 元数据校验和
        const METADATA_CSUM = EXT4_FEATURE_RO_COMPAT_METADATA_CSUM;
    }
}

impl IncompatFeatures {
    /// 本库能够正确解释的 incompat 特性
    ///
    /// RECOVER 表示日志未回放，元数据可能落后于日志，但磁盘结构仍可解释；
    /// ENCRYPT 下文件名与数据按密文原样返回。
    pub const SUPPORTED: Self = Self::FILETYPE
        .union(Self::RECOVER)
        .union(Self::META_BG)
        .union(Self::EXTENTS)
        .union(Self::BIT64)
        .union(Self::MMP)
        .union(Self::FLEX_BG)
        .union(Self::EA_INODE)
        .union(Self::CSUM_SEED)
        .union(Self::LARGEDIR)
        .union(Self::INLINE_DATA)
        .union(Self::ENCRYPT);

    /// 不受支持的位（包括未知位）
    pub fn unsupported(self) -> u32 {
        self.bits() & !Self::SUPPORTED.bits()
    }

    /// 只有 ext4 才会设置的位
    pub const EXT4_ONLY: Self = Self::EXTENTS
        .union(Self::BIT64)
        .union(Self::FLEX_BG)
        .union(Self::MMP)
        .union(Self::EA_INODE)
        .union(Self::CSUM_SEED)
        .union(Self::LARGEDIR)
        .union(Self::INLINE_DATA)
        .union(Self::ENCRYPT)
        .union(Self::CASEFOLD);
}

impl RoCompatFeatures {
    /// 只有 ext4 才会设置的位
    pub const EXT4_ONLY: Self = Self::HUGE_FILE
        .union(Self::GDT_CSUM)
        .union(Self::DIR_NLINK)
        .union(Self::EXTRA_ISIZE)
        .union(Self::METADATA_CSUM);
}

/// 文件系统格式版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FormatVersion {
    /// ext2
    Ext2,
    /// ext3（带日志）
    Ext3,
    /// ext4
    Ext4,
}

impl FormatVersion {
    /// 根据特性位推断格式版本
    pub fn detect(
        compat: CompatFeatures,
        incompat: IncompatFeatures,
        ro_compat: RoCompatFeatures,
    ) -> Self {
        if incompat.intersects(IncompatFeatures::EXT4_ONLY)
            || ro_compat.intersects(RoCompatFeatures::EXT4_ONLY)
        {
            FormatVersion::Ext4
        } else if compat.contains(CompatFeatures::HAS_JOURNAL) {
            FormatVersion::Ext3
        } else {
            FormatVersion::Ext2
        }
    }

    /// 版本号（2、3、4）
    pub fn number(self) -> u8 {
        match self {
            FormatVersion::Ext2 => 2,
            FormatVersion::Ext3 => 3,
            FormatVersion::Ext4 => 4,
        }
    }
}
