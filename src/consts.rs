//! ext2/3/4 磁盘格式常量定义
//!
//! 这个模块包含了解析所需的常量，包括：
//! - 磁盘布局相关常量
//! - 文件类型位
//! - 特性标志
//! - extent、目录、扩展属性的魔数与布局

//=============================================================================
// 基础常量
//=============================================================================

/// 最小块大小（1024 字节）
pub const EXT4_MIN_BLOCK_SIZE: u32 = 1024;

/// 最大块大小（65536 字节）
pub const EXT4_MAX_BLOCK_SIZE: u32 = 65536;

/// log_block_size 允许的最大值（1024 << 6 = 65536）
pub const EXT4_MAX_BLOCK_LOG_SIZE: u32 = 6;

//=============================================================================
// Superblock 相关
//=============================================================================

/// Superblock 在设备上的字节偏移
pub const EXT4_SUPERBLOCK_OFFSET: u64 = 1024;

/// Superblock 大小（字节）
pub const EXT4_SUPERBLOCK_SIZE: usize = 1024;

/// ext2/3/4 魔数 (0xEF53)
pub const EXT4_SUPERBLOCK_MAGIC: u16 = 0xEF53;

/// Superblock 校验和字段偏移
pub const EXT4_SUPERBLOCK_CSUM_OFFSET: usize = 0x3FC;

/// Root inode 编号
pub const EXT4_ROOT_INODE: u32 = 2;

/// 修订版 0 的第一个非保留 inode
pub const EXT4_GOOD_OLD_FIRST_INO: u32 = 11;

/// 修订版 0（固定 inode 大小）
pub const EXT4_GOOD_OLD_REV: u32 = 0;

/// 块组描述符大小（传统）
pub const EXT4_GROUP_DESC_SIZE: usize = 32;

/// 块组描述符大小（64位）
pub const EXT4_GROUP_DESC_SIZE_64: usize = 64;

/// 块组描述符最大大小
pub const EXT4_MAX_BLOCK_GROUP_DESCRIPTOR_SIZE: usize = 1024;

/// 校验和类型：CRC32C
pub const EXT4_CRC32C_CHKSUM: u8 = 1;

/// Superblock flags: Signed directory hash in use
pub const EXT2_FLAGS_SIGNED_HASH: u32 = 0x0001;

/// Superblock flags: Unsigned directory hash in use
pub const EXT2_FLAGS_UNSIGNED_HASH: u32 = 0x0002;

//=============================================================================
// 特性标志
//=============================================================================

/// Compat: 目录预分配
pub const EXT4_FEATURE_COMPAT_DIR_PREALLOC: u32 = 0x0001;
/// Compat: AFS 服务器 inode
pub const EXT4_FEATURE_COMPAT_IMAGIC_INODES: u32 = 0x0002;
/// Compat: 有日志（ext3）
pub const EXT4_FEATURE_COMPAT_HAS_JOURNAL: u32 = 0x0004;
/// Compat: 扩展属性
pub const EXT4_FEATURE_COMPAT_EXT_ATTR: u32 = 0x0008;
/// Compat: 预留 GDT 块
pub const EXT4_FEATURE_COMPAT_RESIZE_INODE: u32 = 0x0010;
/// Compat: 目录索引（HTree）
pub const EXT4_FEATURE_COMPAT_DIR_INDEX: u32 = 0x0020;
/// Compat: sparse_super2
pub const EXT4_FEATURE_COMPAT_SPARSE_SUPER2: u32 = 0x0200;

/// Incompat: 压缩
pub const EXT4_FEATURE_INCOMPAT_COMPRESSION: u32 = 0x0001;
/// Incompat: 目录项带文件类型
pub const EXT4_FEATURE_INCOMPAT_FILETYPE: u32 = 0x0002;
/// Incompat: 需要日志恢复
pub const EXT4_FEATURE_INCOMPAT_RECOVER: u32 = 0x0004;
/// Incompat: 独立日志设备
pub const EXT4_FEATURE_INCOMPAT_JOURNAL_DEV: u32 = 0x0008;
/// Incompat: META_BG
pub const EXT4_FEATURE_INCOMPAT_META_BG: u32 = 0x0010;
/// Incompat: extent 树
pub const EXT4_FEATURE_INCOMPAT_EXTENTS: u32 = 0x0040;
/// Incompat: 64 位块号
pub const EXT4_FEATURE_INCOMPAT_64BIT: u32 = 0x0080;
/// Incompat: 多重挂载保护
pub const EXT4_FEATURE_INCOMPAT_MMP: u32 = 0x0100;
/// Incompat: 灵活块组
pub const EXT4_FEATURE_INCOMPAT_FLEX_BG: u32 = 0x0200;
/// Incompat: 扩展属性值存放在独立 inode 中
pub const EXT4_FEATURE_INCOMPAT_EA_INODE: u32 = 0x0400;
/// Incompat: 目录项携带额外数据（Lustre）
pub const EXT4_FEATURE_INCOMPAT_DIRDATA: u32 = 0x1000;
/// Incompat: superblock 中保存校验和种子
pub const EXT4_FEATURE_INCOMPAT_CSUM_SEED: u32 = 0x2000;
/// Incompat: 大目录（三级 HTree）
pub const EXT4_FEATURE_INCOMPAT_LARGEDIR: u32 = 0x4000;
/// Incompat: inline data
pub const EXT4_FEATURE_INCOMPAT_INLINE_DATA: u32 = 0x8000;
/// Incompat: 加密
pub const EXT4_FEATURE_INCOMPAT_ENCRYPT: u32 = 0x10000;
/// Incompat: 大小写不敏感目录
pub const EXT4_FEATURE_INCOMPAT_CASEFOLD: u32 = 0x20000;

/// RO compat: 稀疏 superblock 备份
pub const EXT4_FEATURE_RO_COMPAT_SPARSE_SUPER: u32 = 0x0001;
/// RO compat: 大文件
pub const EXT4_FEATURE_RO_COMPAT_LARGE_FILE: u32 = 0x0002;
/// RO compat: 巨型文件（i_blocks 以块为单位）
pub const EXT4_FEATURE_RO_COMPAT_HUGE_FILE: u32 = 0x0008;
/// RO compat: 块组描述符 CRC16 校验
pub const EXT4_FEATURE_RO_COMPAT_GDT_CSUM: u32 = 0x0010;
/// RO compat: 子目录数不受 32000 限制
pub const EXT4_FEATURE_RO_COMPAT_DIR_NLINK: u32 = 0x0020;
/// RO compat: 扩展 inode 字段
pub const EXT4_FEATURE_RO_COMPAT_EXTRA_ISIZE: u32 = 0x0040;
/// RO compat: 元数据校验和（CRC32C）
pub const EXT4_FEATURE_RO_COMPAT_METADATA_CSUM: u32 = 0x0400;

//=============================================================================
// Inode 相关
//=============================================================================

/// Inode 中的块指针总数（15个）
pub const EXT4_INODE_BLOCKS: usize = 15;

/// i_block 区域大小（字节）
pub const EXT4_INODE_BLOCK_BYTES: usize = 60;

/// 直接块指针数量
pub const EXT4_INODE_DIRECT_BLOCKS: usize = 12;

/// 一级间接块索引
pub const EXT4_INODE_INDIRECT_BLOCK: usize = 12;

/// 二级间接块索引
pub const EXT4_INODE_DOUBLE_INDIRECT_BLOCK: usize = 13;

/// 三级间接块索引
pub const EXT4_INODE_TRIPLE_INDIRECT_BLOCK: usize = 14;

/// 旧的 inode 大小（不含扩展字段）
pub const EXT4_GOOD_OLD_INODE_SIZE: usize = 128;

/// 文件类型掩码
pub const EXT4_INODE_MODE_TYPE_MASK: u16 = 0xF000;
/// FIFO
pub const EXT4_INODE_MODE_FIFO: u16 = 0x1000;
/// 字符设备
pub const EXT4_INODE_MODE_CHARDEV: u16 = 0x2000;
/// 目录
pub const EXT4_INODE_MODE_DIRECTORY: u16 = 0x4000;
/// 块设备
pub const EXT4_INODE_MODE_BLOCKDEV: u16 = 0x6000;
/// 普通文件
pub const EXT4_INODE_MODE_FILE: u16 = 0x8000;
/// 符号链接
pub const EXT4_INODE_MODE_SOFTLINK: u16 = 0xA000;
/// Socket
pub const EXT4_INODE_MODE_SOCKET: u16 = 0xC000;

/// 快速符号链接的最大长度（存放在 i_block 中）
pub const EXT4_FAST_SYMLINK_MAX: u64 = 60;

//=============================================================================
// Extent 相关
//=============================================================================

/// Extent 树魔数 (0xF30A)
pub const EXT4_EXTENT_MAGIC: u16 = 0xF30A;

/// Extent 头 / 条目大小（字节）
pub const EXT4_EXTENT_ENTRY_SIZE: usize = 12;

/// Extent 树最大深度
pub const EXT4_EXTENT_MAX_DEPTH: u16 = 5;

/// 已初始化 extent 的最大长度
pub const EXT4_EXT_INIT_MAX_LEN: u16 = 1 << 15;

//=============================================================================
// 目录相关
//=============================================================================

/// 目录项头部大小（inode + rec_len + name_len + file_type）
pub const EXT4_DIR_ENTRY_HEADER_SIZE: usize = 8;

/// 文件名最大长度
pub const EXT4_NAME_MAX: usize = 255;

/// 目录块校验尾部大小
pub const EXT4_DIR_TAIL_SIZE: usize = 12;

/// 目录块校验尾部的伪文件类型
pub const EXT4_DIRENTRY_DIR_CSUM: u8 = 0xDE;

/// dx_root_info 的固定长度
pub const EXT4_DX_ROOT_INFO_LEN: u8 = 8;

/// HTree 索引条目大小（hash + block）
pub const EXT4_DX_ENTRY_SIZE: usize = 8;

/// dx_tail 大小
pub const EXT4_DX_TAIL_SIZE: usize = 8;

/// HTree 块号的有效位
pub const EXT4_DX_BLOCK_MASK: u32 = 0x0FFF_FFFF;

/// 不带 LARGEDIR 时的最大间接层数
pub const EXT4_HTREE_LEVEL_COMPAT: u8 = 2;

/// 带 LARGEDIR 时的最大间接层数
pub const EXT4_HTREE_LEVEL: u8 = 3;

/// 目录项文件类型：未知
pub const EXT4_DE_UNKNOWN: u8 = 0;
/// 目录项文件类型：普通文件
pub const EXT4_DE_REG_FILE: u8 = 1;
/// 目录项文件类型：目录
pub const EXT4_DE_DIR: u8 = 2;
/// 目录项文件类型：字符设备
pub const EXT4_DE_CHRDEV: u8 = 3;
/// 目录项文件类型：块设备
pub const EXT4_DE_BLKDEV: u8 = 4;
/// 目录项文件类型：FIFO
pub const EXT4_DE_FIFO: u8 = 5;
/// 目录项文件类型：Socket
pub const EXT4_DE_SOCK: u8 = 6;
/// 目录项文件类型：符号链接
pub const EXT4_DE_SYMLINK: u8 = 7;

//=============================================================================
// 扩展属性相关
//=============================================================================

/// 扩展属性魔数
pub const EXT4_XATTR_MAGIC: u32 = 0xEA02_0000;

/// 扩展属性块头部大小
pub const EXT4_XATTR_BLOCK_HEADER_SIZE: usize = 32;

/// inode 内扩展属性头部大小（仅魔数）
pub const EXT4_XATTR_IBODY_HEADER_SIZE: usize = 4;

/// 扩展属性条目固定部分大小
pub const EXT4_XATTR_ENTRY_SIZE: usize = 16;

/// 扩展属性对齐（4 字节）
pub const EXT4_XATTR_PAD: usize = 4;

/// xattr 名字索引：user.
pub const EXT4_XATTR_INDEX_USER: u8 = 1;
/// xattr 名字索引：system.posix_acl_access
pub const EXT4_XATTR_INDEX_POSIX_ACL_ACCESS: u8 = 2;
/// xattr 名字索引：system.posix_acl_default
pub const EXT4_XATTR_INDEX_POSIX_ACL_DEFAULT: u8 = 3;
/// xattr 名字索引：trusted.
pub const EXT4_XATTR_INDEX_TRUSTED: u8 = 4;
/// xattr 名字索引：lustre（未使用）
pub const EXT4_XATTR_INDEX_LUSTRE: u8 = 5;
/// xattr 名字索引：security.
pub const EXT4_XATTR_INDEX_SECURITY: u8 = 6;
/// xattr 名字索引：system.
pub const EXT4_XATTR_INDEX_SYSTEM: u8 = 7;
/// xattr 名字索引：system.richacl
pub const EXT4_XATTR_INDEX_RICHACL: u8 = 8;

/// inline data 的扩展属性名（system. 命名空间下）
pub const EXT4_INLINE_DATA_XATTR_NAME: &[u8] = b"data";
