//! Superblock 读取与验证

use super::checksum;
use super::features::{CompatFeatures, FormatVersion, IncompatFeatures, RoCompatFeatures};
use crate::block::{BlockDev, BlockReader};
use crate::checksum::{fs_seed, ChecksumPolicy, ChecksumStatus};
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use alloc::vec;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// HTree 默认哈希种子（superblock 中种子全零时使用）
pub const EXT4_DEFAULT_HASH_SEED: [u32; 4] = [0x6745_2301, 0xEFCD_AB89, 0x98BA_DCFE, 0x1032_5476];

/// 读取并解析 superblock
///
/// # 参数
///
/// * `bdev` - 块设备（几何信息尚未设置也可以）
/// * `offset` - superblock 相对于文件系统起点的字节偏移（主 superblock 为 1024）
/// * `policy` - 校验和策略
pub fn read_superblock<R: BlockReader>(
    bdev: &BlockDev<R>,
    offset: u64,
    policy: ChecksumPolicy,
) -> Result<Superblock> {
    let mut raw = vec![0u8; EXT4_SUPERBLOCK_SIZE];
    bdev.read_bytes(offset, &mut raw)?;
    let sb = Superblock::parse(raw, policy).map_err(|e| match e.offset() {
        Some(_) => e,
        None => e.with_offset(offset),
    })?;
    policy.enforce(sb.checksum_status(), "Superblock checksum mismatch", offset)?;
    Ok(sb)
}

/// 解析后的 superblock
///
/// 解析时完成全部几何校验，之后不可变。原始 1024 字节保留在 `raw` 中，
/// 便于校验和计算与取证展示。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    raw: Vec<u8>,
    inodes_count: u32,
    blocks_count: u64,
    reserved_blocks_count: u64,
    free_blocks_count: u64,
    free_inodes_count: u32,
    first_data_block: u32,
    log_block_size: u32,
    blocks_per_group: u32,
    inodes_per_group: u32,
    mount_time: u64,
    write_time: u64,
    mkfs_time: u64,
    mount_count: u16,
    state: u16,
    errors: u16,
    creator_os: u32,
    rev_level: u32,
    first_ino: u32,
    inode_size: u16,
    block_group_nr: u16,
    compat: CompatFeatures,
    incompat: IncompatFeatures,
    ro_compat: RoCompatFeatures,
    uuid: [u8; 16],
    volume_name: [u8; 16],
    last_mounted: [u8; 64],
    hash_seed: [u32; 4],
    default_hash_version: u8,
    desc_size: u16,
    min_extra_isize: u16,
    flags: u32,
    first_meta_bg: u32,
    backup_bgs: [u32; 2],
    checksum_type: u8,
    checksum_seed: u32,
    checksum_status: ChecksumStatus,
}

impl Superblock {
    /// 从原始 1024 字节解析
    ///
    /// 失败时返回：
    /// - `InvalidFormat`：魔数、块大小、inode 大小等几何字段非法
    /// - `UnsupportedFeature`：设置了无法理解的 incompat 特性
    pub fn parse(raw: Vec<u8>, policy: ChecksumPolicy) -> Result<Self> {
        if raw.len() < EXT4_SUPERBLOCK_SIZE {
            return Err(Error::new(ErrorKind::InvalidFormat, "Superblock buffer too short"));
        }
        let r = &raw[..];

        let magic = LittleEndian::read_u16(&r[0x38..]);
        if magic != EXT4_SUPERBLOCK_MAGIC {
            return Err(Error::new(ErrorKind::InvalidFormat, "Invalid superblock magic")
                .with_mismatch(EXT4_SUPERBLOCK_MAGIC as u64, magic as u64));
        }

        let log_block_size = LittleEndian::read_u32(&r[0x18..]);
        // 块大小只允许 1K/2K/4K/64K
        if !matches!(log_block_size, 0 | 1 | 2 | EXT4_MAX_BLOCK_LOG_SIZE) {
            return Err(Error::new(ErrorKind::InvalidFormat, "Invalid log block size")
                .with_offset(0x18)
                .with_mismatch(EXT4_MAX_BLOCK_LOG_SIZE as u64, log_block_size as u64));
        }
        let block_size = EXT4_MIN_BLOCK_SIZE << log_block_size;

        let compat = CompatFeatures::from_bits_retain(LittleEndian::read_u32(&r[0x5C..]));
        let incompat = IncompatFeatures::from_bits_retain(LittleEndian::read_u32(&r[0x60..]));
        let ro_compat = RoCompatFeatures::from_bits_retain(LittleEndian::read_u32(&r[0x64..]));

        let unsupported = incompat.unsupported();
        if unsupported != 0 {
            log::debug!("[SUPERBLOCK] Unsupported incompat features {:#x}", unsupported);
            return Err(Error::new(
                ErrorKind::UnsupportedFeature,
                "Unsupported incompatible feature",
            )
            .with_offset(0x60)
            .with_mismatch(IncompatFeatures::SUPPORTED.bits() as u64, unsupported as u64));
        }
        let unknown_compat = compat.bits() & !CompatFeatures::all().bits();
        if unknown_compat != 0 {
            log::warn!("[SUPERBLOCK] Ignoring unknown compat features {:#x}", unknown_compat);
        }
        let unknown_ro = ro_compat.bits() & !RoCompatFeatures::all().bits();
        if unknown_ro != 0 {
            log::warn!("[SUPERBLOCK] Ignoring unknown ro_compat features {:#x}", unknown_ro);
        }
        if incompat.contains(IncompatFeatures::RECOVER) {
            log::warn!("[SUPERBLOCK] Journal needs recovery; metadata may be stale");
        }

        let is_64bit = incompat.contains(IncompatFeatures::BIT64);
        let hi = |off: usize| if is_64bit { LittleEndian::read_u32(&r[off..]) as u64 } else { 0 };

        let rev_level = LittleEndian::read_u32(&r[0x4C..]);
        let (inode_size, first_ino) = if rev_level == EXT4_GOOD_OLD_REV {
            (EXT4_GOOD_OLD_INODE_SIZE as u16, EXT4_GOOD_OLD_FIRST_INO)
        } else {
            (LittleEndian::read_u16(&r[0x58..]), LittleEndian::read_u32(&r[0x54..]))
        };

        let mut hash_seed = [0u32; 4];
        for (i, word) in hash_seed.iter_mut().enumerate() {
            *word = LittleEndian::read_u32(&r[0xEC + i * 4..]);
        }

        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&r[0x68..0x78]);
        let mut volume_name = [0u8; 16];
        volume_name.copy_from_slice(&r[0x78..0x88]);
        let mut last_mounted = [0u8; 64];
        last_mounted.copy_from_slice(&r[0x88..0xC8]);

        let time = |lo: usize, hi: usize| LittleEndian::read_u32(&r[lo..]) as u64 | (r[hi] as u64) << 32;

        let mut sb = Self {
            inodes_count: LittleEndian::read_u32(&r[0x00..]),
            blocks_count: LittleEndian::read_u32(&r[0x04..]) as u64 | hi(0x150) << 32,
            reserved_blocks_count: LittleEndian::read_u32(&r[0x08..]) as u64 | hi(0x154) << 32,
            free_blocks_count: LittleEndian::read_u32(&r[0x0C..]) as u64 | hi(0x158) << 32,
            free_inodes_count: LittleEndian::read_u32(&r[0x10..]),
            first_data_block: LittleEndian::read_u32(&r[0x14..]),
            log_block_size,
            blocks_per_group: LittleEndian::read_u32(&r[0x20..]),
            inodes_per_group: LittleEndian::read_u32(&r[0x28..]),
            mount_time: time(0x2C, 0x275),
            write_time: time(0x30, 0x274),
            mkfs_time: time(0x108, 0x276),
            mount_count: LittleEndian::read_u16(&r[0x34..]),
            state: LittleEndian::read_u16(&r[0x3A..]),
            errors: LittleEndian::read_u16(&r[0x3C..]),
            creator_os: LittleEndian::read_u32(&r[0x48..]),
            rev_level,
            first_ino,
            inode_size,
            block_group_nr: LittleEndian::read_u16(&r[0x5A..]),
            compat,
            incompat,
            ro_compat,
            uuid,
            volume_name,
            last_mounted,
            hash_seed,
            default_hash_version: r[0xFC],
            desc_size: LittleEndian::read_u16(&r[0xFE..]),
            min_extra_isize: LittleEndian::read_u16(&r[0x15C..]),
            flags: LittleEndian::read_u32(&r[0x160..]),
            first_meta_bg: LittleEndian::read_u32(&r[0x104..]),
            backup_bgs: [
                LittleEndian::read_u32(&r[0x24C..]),
                LittleEndian::read_u32(&r[0x250..]),
            ],
            checksum_type: r[0x175],
            checksum_seed: LittleEndian::read_u32(&r[0x270..]),
            checksum_status: ChecksumStatus::NotChecked,
            raw,
        };

        sb.check(block_size)?;

        if sb.has_metadata_csum() && policy.computes() {
            sb.checksum_status = match (
                checksum::stored_checksum(&sb.raw),
                checksum::compute_checksum(&sb.raw),
            ) {
                (Some(stored), Some(computed)) => ChecksumStatus::compare(stored, computed),
                _ => ChecksumStatus::NotChecked,
            };
        }

        log::debug!(
            "[SUPERBLOCK] block_size={} blocks={} inodes={} groups={} inode_size={} desc_size={}",
            sb.block_size(),
            sb.blocks_count,
            sb.inodes_count,
            sb.block_group_count(),
            sb.inode_size,
            sb.group_desc_size()
        );

        Ok(sb)
    }

    /// 几何字段验证
    fn check(&self, block_size: u32) -> Result<()> {
        let invalid = |msg: &'static str| Error::new(ErrorKind::InvalidFormat, msg);

        if self.inodes_count == 0 {
            return Err(invalid("Superblock inodes_count is zero"));
        }
        if self.blocks_count == 0 {
            return Err(invalid("Superblock blocks_count is zero"));
        }
        if self.blocks_per_group == 0 {
            return Err(invalid("Superblock blocks_per_group is zero"));
        }
        if self.inodes_per_group == 0 {
            return Err(invalid("Superblock inodes_per_group is zero"));
        }
        // 块位图和 inode 位图都只占一个块
        let bits_per_block = block_size as u64 * 8;
        if self.blocks_per_group as u64 > bits_per_block {
            return Err(invalid("blocks_per_group exceeds bitmap capacity")
                .with_mismatch(bits_per_block, self.blocks_per_group as u64));
        }
        if self.inodes_per_group as u64 > bits_per_block {
            return Err(invalid("inodes_per_group exceeds bitmap capacity")
                .with_mismatch(bits_per_block, self.inodes_per_group as u64));
        }
        if self.first_data_block as u64 >= self.blocks_count {
            return Err(invalid("first_data_block beyond end of filesystem"));
        }

        let inode_size = self.inode_size as u32;
        if inode_size < EXT4_GOOD_OLD_INODE_SIZE as u32
            || !inode_size.is_power_of_two()
            || inode_size > block_size
        {
            return Err(invalid("Invalid inode size")
                .with_offset(0x58)
                .with_mismatch(EXT4_GOOD_OLD_INODE_SIZE as u64, inode_size as u64));
        }
        if self.first_ino < EXT4_GOOD_OLD_FIRST_INO {
            return Err(invalid("Superblock first_ino is less than 11"));
        }

        if self.is_64bit() {
            let desc_size = self.desc_size as usize;
            if desc_size < EXT4_GROUP_DESC_SIZE_64
                || desc_size > EXT4_MAX_BLOCK_GROUP_DESCRIPTOR_SIZE
                || !desc_size.is_power_of_two()
            {
                return Err(invalid("Invalid group descriptor size")
                    .with_offset(0xFE)
                    .with_mismatch(EXT4_GROUP_DESC_SIZE_64 as u64, desc_size as u64));
            }
        }

        if self.has_metadata_csum() && self.checksum_type != EXT4_CRC32C_CHKSUM {
            return Err(invalid("Unknown metadata checksum type")
                .with_offset(0x175)
                .with_mismatch(EXT4_CRC32C_CHKSUM as u64, self.checksum_type as u64));
        }

        // 块号乘以块大小必须仍是合法的字节偏移
        if self.blocks_count > u64::MAX / block_size as u64 {
            return Err(invalid("blocks_count overflows byte offsets")
                .with_offset(0x04)
                .with_mismatch(u64::MAX / block_size as u64, self.blocks_count));
        }

        // 由块数和 inode 数分别推出的组数必须一致
        let groups = (self.blocks_count - self.first_data_block as u64)
            .div_ceil(self.blocks_per_group as u64);
        if groups > u32::MAX as u64 {
            return Err(invalid("Block group count exceeds 32 bits")
                .with_mismatch(u32::MAX as u64, groups));
        }
        let inode_groups = (self.inodes_count as u64).div_ceil(self.inodes_per_group as u64);
        if groups != inode_groups {
            return Err(invalid("Block group count disagrees with inode count")
                .with_offset(0x00)
                .with_mismatch(inode_groups, groups));
        }

        // superblock 所在块之后紧跟描述符表
        let table_blocks = (groups * self.group_desc_size() as u64).div_ceil(block_size as u64);
        let table_end = self.first_data_block as u64 + 1 + table_blocks;
        if table_end > self.blocks_count {
            return Err(invalid("Group descriptor table beyond end of filesystem")
                .with_mismatch(self.blocks_count, table_end));
        }

        let expected_inodes = groups * self.inodes_per_group as u64;
        if expected_inodes != self.inodes_count as u64 {
            log::warn!(
                "[SUPERBLOCK] inodes_count {} != groups * inodes_per_group {}",
                self.inodes_count,
                expected_inodes
            );
        }

        Ok(())
    }

    /// 原始 superblock 字节
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// 块大小（字节）
    pub fn block_size(&self) -> u32 {
        EXT4_MIN_BLOCK_SIZE << self.log_block_size
    }

    /// inode 大小（字节）
    pub fn inode_size(&self) -> u16 {
        self.inode_size
    }

    /// 块总数
    pub fn blocks_count(&self) -> u64 {
        self.blocks_count
    }

    /// 保留块数
    pub fn reserved_blocks_count(&self) -> u64 {
        self.reserved_blocks_count
    }

    /// 空闲块数
    pub fn free_blocks_count(&self) -> u64 {
        self.free_blocks_count
    }

    /// inode 总数
    pub fn inodes_count(&self) -> u32 {
        self.inodes_count
    }

    /// 空闲 inode 数
    pub fn free_inodes_count(&self) -> u32 {
        self.free_inodes_count
    }

    /// 每组块数
    pub fn blocks_per_group(&self) -> u32 {
        self.blocks_per_group
    }

    /// 每组 inode 数
    pub fn inodes_per_group(&self) -> u32 {
        self.inodes_per_group
    }

    /// 第一个数据块（1K 块大小时为 1，否则为 0）
    pub fn first_data_block(&self) -> u32 {
        self.first_data_block
    }

    /// 块组数量
    ///
    /// 从 first_data_block 开始划分，最后一个组可能不完整
    pub fn block_group_count(&self) -> u32 {
        // 打开时已验证不超过 u32
        let data_blocks = self.blocks_count - self.first_data_block as u64;
        data_blocks.div_ceil(self.blocks_per_group as u64) as u32
    }

    /// 第一个非保留 inode
    pub fn first_inode(&self) -> u32 {
        self.first_ino
    }

    /// 修订版本
    pub fn rev_level(&self) -> u32 {
        self.rev_level
    }

    /// 创建者操作系统
    pub fn creator_os(&self) -> u32 {
        self.creator_os
    }

    /// 文件系统状态位
    pub fn state(&self) -> u16 {
        self.state
    }

    /// 出错时的处理策略
    pub fn errors(&self) -> u16 {
        self.errors
    }

    /// 挂载次数
    pub fn mount_count(&self) -> u16 {
        self.mount_count
    }

    /// 最后挂载时间（秒）
    pub fn mount_time(&self) -> u64 {
        self.mount_time
    }

    /// 最后写入时间（秒）
    pub fn write_time(&self) -> u64 {
        self.write_time
    }

    /// 创建时间（秒）
    pub fn mkfs_time(&self) -> u64 {
        self.mkfs_time
    }

    /// 此 superblock 所在的块组（备份 superblock 中非零）
    pub fn block_group_nr(&self) -> u16 {
        self.block_group_nr
    }

    /// Compatible 特性
    pub fn compat_features(&self) -> CompatFeatures {
        self.compat
    }

    /// Incompatible 特性
    pub fn incompat_features(&self) -> IncompatFeatures {
        self.incompat
    }

    /// Read-only compatible 特性
    pub fn ro_compat_features(&self) -> RoCompatFeatures {
        self.ro_compat
    }

    /// 格式版本（ext2/ext3/ext4）
    pub fn format_version(&self) -> FormatVersion {
        FormatVersion::detect(self.compat, self.incompat, self.ro_compat)
    }

    /// 是否启用 64 位块号
    pub fn is_64bit(&self) -> bool {
        self.incompat.contains(IncompatFeatures::BIT64)
    }

    /// 是否启用 metadata_csum
    pub fn has_metadata_csum(&self) -> bool {
        self.ro_compat.contains(RoCompatFeatures::METADATA_CSUM)
    }

    /// 是否启用 GDT_CSUM（仅在未启用 metadata_csum 时生效）
    pub fn has_gdt_csum(&self) -> bool {
        self.ro_compat.contains(RoCompatFeatures::GDT_CSUM) && !self.has_metadata_csum()
    }

    /// 块组描述符大小
    pub fn group_desc_size(&self) -> usize {
        if self.is_64bit() {
            self.desc_size as usize
        } else {
            EXT4_GROUP_DESC_SIZE
        }
    }

    /// 文件系统 UUID
    pub fn uuid(&self) -> &[u8; 16] {
        &self.uuid
    }

    /// 卷标（去掉结尾的 NUL）
    pub fn volume_name(&self) -> &[u8] {
        trim_nul(&self.volume_name)
    }

    /// 最后挂载路径（去掉结尾的 NUL）
    pub fn last_mounted(&self) -> &[u8] {
        trim_nul(&self.last_mounted)
    }

    /// 元数据校验和种子
    pub fn checksum_seed(&self) -> u32 {
        if self.incompat.contains(IncompatFeatures::CSUM_SEED) {
            self.checksum_seed
        } else {
            fs_seed(&self.uuid)
        }
    }

    /// superblock 自身的校验结果
    pub fn checksum_status(&self) -> ChecksumStatus {
        self.checksum_status
    }

    /// HTree 哈希种子，全零时返回 `None`（使用默认种子）
    pub fn hash_seed(&self) -> Option<[u32; 4]> {
        if self.hash_seed.iter().all(|&w| w == 0) {
            None
        } else {
            Some(self.hash_seed)
        }
    }

    /// 默认哈希版本
    pub fn default_hash_version(&self) -> u8 {
        self.default_hash_version
    }

    /// 目录哈希是否按无符号字符计算
    pub fn has_unsigned_hash(&self) -> bool {
        self.flags & EXT2_FLAGS_UNSIGNED_HASH != 0
    }

    /// superblock flags
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// 期望的最小 extra_isize
    pub fn min_extra_isize(&self) -> u16 {
        self.min_extra_isize
    }

    /// 第一个 META_BG 元组
    pub fn first_meta_bg(&self) -> u32 {
        self.first_meta_bg
    }

    /// 块组的第一个块
    pub fn group_first_block(&self, group: u32) -> u64 {
        self.first_data_block as u64 + group as u64 * self.blocks_per_group as u64
    }

    /// 判断块组是否为稀疏超级块组
    ///
    /// 稀疏超级块特性：只在块组 0、1 和 3/5/7 的幂次上存储超级块备份
    pub fn is_sparse_group(group: u32) -> bool {
        if group <= 1 {
            return true;
        }
        if group & 1 == 0 {
            return false;
        }
        is_power_of(group, 7) || is_power_of(group, 5) || is_power_of(group, 3)
    }

    /// 判断超级块（及其后的 GDT 备份）是否存在于指定的块组中
    pub fn has_super_in_group(&self, group: u32) -> bool {
        if group == 0 {
            return true;
        }
        if self.compat.contains(CompatFeatures::SPARSE_SUPER2) {
            return self.backup_bgs.contains(&group);
        }
        if self.ro_compat.contains(RoCompatFeatures::SPARSE_SUPER) {
            Self::is_sparse_group(group)
        } else {
            true
        }
    }
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

fn is_power_of(mut a: u32, b: u32) -> bool {
    loop {
        if a < b {
            return a == 1;
        }
        if a % b != 0 {
            return false;
        }
        a /= b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SuperblockBuilder;

    #[test]
    fn test_parse_minimal() {
        let raw = SuperblockBuilder::new(1024, 64).build();
        let sb = Superblock::parse(raw, ChecksumPolicy::Report).unwrap();

        assert_eq!(sb.block_size(), 1024);
        assert_eq!(sb.blocks_count(), 64);
        assert_eq!(sb.block_group_count(), 1);
        assert_eq!(sb.first_data_block(), 1);
        assert_eq!(sb.group_desc_size(), 32);
        assert_eq!(sb.volume_name(), b"forensic");
        assert_eq!(sb.format_version(), FormatVersion::Ext2);
        assert_eq!(sb.checksum_status(), ChecksumStatus::NotChecked);
    }

    #[test]
    fn test_block_size_encoding() {
        for (log, size) in [(0u32, 1024u32), (1, 2048), (2, 4096), (6, 65536)] {
            let raw = SuperblockBuilder::new(size, 64).log_block_size(log).build();
            let sb = Superblock::parse(raw, ChecksumPolicy::Report).unwrap();
            assert_eq!(sb.block_size(), size);
        }

        for log in [3u32, 5, 7, 31] {
            let raw = SuperblockBuilder::new(4096, 64).log_block_size(log).build();
            let err = Superblock::parse(raw, ChecksumPolicy::Report).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidFormat);
        }
    }

    #[test]
    fn test_bad_magic() {
        let mut raw = SuperblockBuilder::new(1024, 64).build();
        raw[0x38] = 0;
        let err = Superblock::parse(raw, ChecksumPolicy::Report).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
        assert_eq!(err.found(), Some(0xEF00));
    }

    #[test]
    fn test_unknown_incompat_rejected_unknown_compat_ignored() {
        let raw = SuperblockBuilder::new(1024, 64).incompat(0x0002 | 0x4000_0000).build();
        let err = Superblock::parse(raw, ChecksumPolicy::Report).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);

        let raw = SuperblockBuilder::new(1024, 64)
            .compat(0x8000_0000)
            .ro_compat(0x4000_0000)
            .build();
        assert!(Superblock::parse(raw, ChecksumPolicy::Report).is_ok());
    }

    #[test]
    fn test_inode_size_validation() {
        for bad in [64u16, 192, 2048] {
            let raw = SuperblockBuilder::new(1024, 64).inode_size(bad).build();
            let err = Superblock::parse(raw, ChecksumPolicy::Report).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidFormat, "inode size {}", bad);
        }
        let raw = SuperblockBuilder::new(1024, 64).inode_size(256).build();
        assert_eq!(Superblock::parse(raw, ChecksumPolicy::Report).unwrap().inode_size(), 256);
    }

    #[test]
    fn test_metadata_csum_status() {
        let raw = SuperblockBuilder::new(1024, 64).metadata_csum().build();
        let sb = Superblock::parse(raw.clone(), ChecksumPolicy::Report).unwrap();
        assert_eq!(sb.checksum_status(), ChecksumStatus::Valid);
        assert_eq!(sb.format_version(), FormatVersion::Ext4);

        let mut corrupted = raw;
        corrupted[0x78] ^= 0xFF;
        let sb = Superblock::parse(corrupted, ChecksumPolicy::Report).unwrap();
        assert!(sb.checksum_status().is_mismatch());
    }

    #[test]
    fn test_sparse_groups() {
        let expected = [0u32, 1, 3, 5, 7, 9, 25, 27, 49, 81, 125];
        for group in 0..130 {
            assert_eq!(
                Superblock::is_sparse_group(group),
                expected.contains(&group),
                "group {}",
                group
            );
        }
    }

    #[test]
    fn test_group_count_from_first_data_block() {
        let raw = SuperblockBuilder::new(1024, 8193)
            .blocks_per_group(8192)
            .inodes_per_group(16)
            .inodes_count(16)
            .build();
        let sb = Superblock::parse(raw, ChecksumPolicy::Report).unwrap();
        assert_eq!(sb.block_group_count(), 1);

        let raw = SuperblockBuilder::new(4096, 1000)
            .blocks_per_group(100)
            .inodes_per_group(16)
            .inodes_count(160)
            .build();
        let sb = Superblock::parse(raw, ChecksumPolicy::Report).unwrap();
        assert_eq!(sb.block_group_count(), 10);
    }

    #[test]
    fn test_rejects_hostile_group_geometry() {
        // 每组 1 块、约 2^32 个组，而 inode 只够一个组
        let raw = SuperblockBuilder::new(1024, 0xFFFF_FFFF)
            .blocks_per_group(1)
            .inodes_count(32)
            .build();
        let err = Superblock::parse(raw, ChecksumPolicy::Report).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
        assert_eq!(err.expected(), Some(1));

        // 只有两个块，放不下 superblock 之后的描述符表
        let raw = SuperblockBuilder::new(1024, 2).build();
        let err = Superblock::parse(raw, ChecksumPolicy::Report).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
        assert_eq!(err.found(), Some(3));
    }

    #[test]
    fn test_rejects_blocks_count_overflowing_offsets() {
        let mut raw = SuperblockBuilder::new(4096, 64)
            .incompat(EXT4_FEATURE_INCOMPAT_64BIT)
            .build();
        LittleEndian::write_u16(&mut raw[0xFE..], 64);
        let sb = Superblock::parse(raw.clone(), ChecksumPolicy::Report).unwrap();
        assert_eq!(sb.blocks_count(), 64);

        // blocks_count_hi 使 blocks_count * 4096 超出 u64
        LittleEndian::write_u32(&mut raw[0x150..], 0x00FF_FFFF);
        let err = Superblock::parse(raw, ChecksumPolicy::Report).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
        assert_eq!(err.offset(), Some(0x04));
    }
}
