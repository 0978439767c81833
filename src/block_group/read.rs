//! 块组描述符读取和查询操作

use super::checksum as gd_checksum;
use crate::block::{BlockDev, BlockReader};
use crate::checksum::{self, ChecksumKind, ChecksumPolicy, ChecksumStatus};
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use crate::superblock::{IncompatFeatures, Superblock};
use alloc::vec::Vec;
use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};

bitflags! {
    /// 块组标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GroupFlags: u16 {
        /// inode 表和位图未初始化
        const INODE_UNINIT = 0x0001;
        /// 块位图未初始化
        const BLOCK_UNINIT = 0x0002;
        /// inode 表已清零
        const INODE_ZEROED = 0x0004;
    }
}

/// 计算块组描述符的存储位置
///
/// # 参数
///
/// * `sb` - superblock 引用
/// * `group` - 块组编号
/// * `sb_block` - 描述符表所跟随的 superblock 所在块号（主表为 first_data_block）
///
/// # 返回
///
/// (块地址, 块内偏移) 元组
///
/// # 实现说明
///
/// - 传统模式：所有描述符连续存放在 superblock 之后的块中
/// - META_BG 模式：从 `first_meta_bg` 开始，每个元组（一块描述符覆盖的块组）
///   的描述符放在该元组第一个块组的开头（有 superblock 备份时跳过它）
pub fn group_desc_location(sb: &Superblock, group: u32, sb_block: u64) -> (u64, usize) {
    let block_size = sb.block_size() as u64;
    let desc_size = sb.group_desc_size() as u64;
    let desc_per_block = block_size / desc_size;

    if sb.incompat_features().contains(IncompatFeatures::META_BG) {
        let metagroup = group as u64 / desc_per_block;
        if metagroup >= sb.first_meta_bg() as u64 {
            let first_group = (metagroup * desc_per_block) as u32;
            let has_super = sb.has_super_in_group(first_group) as u64;
            let block = sb.group_first_block(first_group) + has_super;
            let offset = (group as u64 % desc_per_block) * desc_size;
            return (block, offset as usize);
        }
    }

    let byte_offset = group as u64 * desc_size;
    (
        sb_block + 1 + byte_offset / block_size,
        (byte_offset % block_size) as usize,
    )
}

/// 块组描述符
///
/// 32 字节格式只有低 32 位块号；64 位格式（desc_size ≥ 64）的高半部分
/// 放在 0x20 之后。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDescriptor {
    group: u32,
    raw: Vec<u8>,
    block_bitmap: u64,
    inode_bitmap: u64,
    inode_table: u64,
    free_blocks_count: u32,
    free_inodes_count: u32,
    used_dirs_count: u32,
    itable_unused: u32,
    flags: GroupFlags,
    checksum: u16,
    checksum_status: ChecksumStatus,
}

impl GroupDescriptor {
    /// 从原始字节解码（长度为 desc_size）
    pub fn parse(group: u32, raw: &[u8]) -> Result<Self> {
        if raw.len() < EXT4_GROUP_DESC_SIZE {
            return Err(Error::new(
                ErrorKind::CorruptStructure,
                "Group descriptor shorter than 32 bytes",
            ));
        }
        let wide = raw.len() >= EXT4_GROUP_DESC_SIZE_64;
        let lo32 = |off: usize| LittleEndian::read_u32(&raw[off..]) as u64;
        let hi32 = |off: usize| if wide { LittleEndian::read_u32(&raw[off..]) as u64 } else { 0 };
        let lo16 = |off: usize| LittleEndian::read_u16(&raw[off..]) as u32;
        let hi16 = |off: usize| if wide { LittleEndian::read_u16(&raw[off..]) as u32 } else { 0 };

        Ok(Self {
            group,
            block_bitmap: lo32(0x00) | hi32(0x20) << 32,
            inode_bitmap: lo32(0x04) | hi32(0x24) << 32,
            inode_table: lo32(0x08) | hi32(0x28) << 32,
            free_blocks_count: lo16(0x0C) | hi16(0x2C) << 16,
            free_inodes_count: lo16(0x0E) | hi16(0x2E) << 16,
            used_dirs_count: lo16(0x10) | hi16(0x30) << 16,
            flags: GroupFlags::from_bits_retain(LittleEndian::read_u16(&raw[0x12..])),
            itable_unused: lo16(0x1C) | hi16(0x32) << 16,
            checksum: LittleEndian::read_u16(&raw[0x1E..]),
            checksum_status: ChecksumStatus::NotChecked,
            raw: raw.to_vec(),
        })
    }

    /// 块组编号
    pub fn group(&self) -> u32 {
        self.group
    }

    /// 原始描述符字节
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// 块位图所在块
    pub fn block_bitmap(&self) -> u64 {
        self.block_bitmap
    }

    /// inode 位图所在块
    pub fn inode_bitmap(&self) -> u64 {
        self.inode_bitmap
    }

    /// inode 表起始块
    pub fn inode_table(&self) -> u64 {
        self.inode_table
    }

    /// 空闲块数
    pub fn free_blocks_count(&self) -> u32 {
        self.free_blocks_count
    }

    /// 空闲 inode 数
    pub fn free_inodes_count(&self) -> u32 {
        self.free_inodes_count
    }

    /// 目录数
    pub fn used_dirs_count(&self) -> u32 {
        self.used_dirs_count
    }

    /// inode 表尾部未使用的 inode 数
    pub fn itable_unused(&self) -> u32 {
        self.itable_unused
    }

    /// 块组标志
    pub fn flags(&self) -> GroupFlags {
        self.flags
    }

    /// 磁盘上保存的校验和
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// 校验结果
    pub fn checksum_status(&self) -> ChecksumStatus {
        self.checksum_status
    }

    /// 校验失败时返回 `ChecksumMismatch`（描述符本身仍然可用）
    pub fn verify_checksum(&self) -> Result<()> {
        self.checksum_status
            .into_result("Group descriptor checksum mismatch", 0)
            .map_err(|e| e.with_offset(self.group as u64))
    }

    /// 检查位图和 inode 表是否落在文件系统范围内
    fn check_locations(&self, sb: &Superblock, desc_offset: u64) -> Result<()> {
        let blocks_count = sb.blocks_count();
        let itable_bytes = sb.inodes_per_group() as u64 * sb.inode_size() as u64;
        let itable_blocks = itable_bytes.div_ceil(sb.block_size() as u64);

        let out_of_range = |msg: &'static str, block: u64| {
            Error::new(ErrorKind::CorruptStructure, msg)
                .with_offset(desc_offset)
                .with_mismatch(blocks_count, block)
        };

        if self.block_bitmap >= blocks_count {
            return Err(out_of_range("Block bitmap beyond end of filesystem", self.block_bitmap));
        }
        if self.inode_bitmap >= blocks_count {
            return Err(out_of_range("Inode bitmap beyond end of filesystem", self.inode_bitmap));
        }
        let itable_end = self.inode_table.saturating_add(itable_blocks);
        if self.inode_table >= blocks_count || itable_end > blocks_count {
            return Err(out_of_range("Inode table beyond end of filesystem", itable_end));
        }
        Ok(())
    }
}

/// 块组描述符表
///
/// 在打开卷时一次性读取并校验，之后随 `Volume` 一起存在。
#[derive(Debug, Clone)]
pub struct GroupTable {
    descriptors: Vec<GroupDescriptor>,
}

impl GroupTable {
    /// 读取全部块组描述符
    ///
    /// # 参数
    ///
    /// * `bdev` - 块设备（几何信息已设置）
    /// * `sb` - superblock
    /// * `sb_block` - 描述符表跟随的 superblock 所在块号
    /// * `policy` - 校验和策略
    pub fn load<R: BlockReader>(
        bdev: &BlockDev<R>,
        sb: &Superblock,
        sb_block: u64,
        policy: ChecksumPolicy,
    ) -> Result<Self> {
        let group_count = sb.block_group_count();
        let desc_size = sb.group_desc_size();
        let block_size = sb.block_size() as u64;
        let seed = sb.checksum_seed();

        // 描述符表必须装得进镜像；读取器大小未知时不预分配，越过末尾的读取会失败
        let table_bytes = group_count as u64 * desc_size as u64;
        let capacity = match bdev.reader().size() {
            Some(size) => {
                let available = size.saturating_sub(bdev.partition_offset());
                if table_bytes > available {
                    return Err(Error::new(
                        ErrorKind::CorruptStructure,
                        "Group descriptor table larger than image",
                    )
                    .with_offset(sb_block.saturating_mul(block_size))
                    .with_mismatch(available, table_bytes));
                }
                group_count as usize
            }
            None => 0,
        };
        let mut descriptors = Vec::with_capacity(capacity);
        let mut cached: Option<(u64, Vec<u8>)> = None;

        for group in 0..group_count {
            let (block, offset) = group_desc_location(sb, group, sb_block);
            let data = match cached.take() {
                Some((cached_block, data)) if cached_block == block => data,
                _ => bdev.read_block(block)?,
            };

            let desc_offset = bdev.block_offset(block)? + offset as u64;
            let raw = data.get(offset..offset + desc_size).ok_or(
                Error::new(ErrorKind::CorruptStructure, "Group descriptor crosses block boundary")
                    .with_offset(desc_offset),
            )?;
            let mut desc = GroupDescriptor::parse(group, raw)?;

            if policy.computes() {
                if sb.has_metadata_csum() {
                    desc.checksum_status =
                        checksum::evaluate(ChecksumKind::GroupDescriptor { group }, raw, seed);
                    policy.enforce(
                        desc.checksum_status,
                        "Group descriptor checksum mismatch",
                        desc_offset,
                    )?;
                } else if sb.has_gdt_csum() {
                    // GDT_CSUM 只是参考性的：记录结果，从不中止
                    desc.checksum_status = checksum::evaluate(
                        ChecksumKind::GroupDescriptorCrc16 {
                            group,
                            uuid: *sb.uuid(),
                        },
                        raw,
                        seed,
                    );
                    if let ChecksumStatus::Mismatch { stored, computed } = desc.checksum_status {
                        log::warn!(
                            "[GDT] group {} crc16 mismatch: stored={:#06x} computed={:#06x}",
                            group,
                            stored,
                            computed
                        );
                    }
                }
            }

            desc.check_locations(sb, desc_offset)?;

            log::trace!(
                "[GDT] group {} bitmap={} ibitmap={} itable={} flags={:?}",
                group,
                desc.block_bitmap,
                desc.inode_bitmap,
                desc.inode_table,
                desc.flags
            );
            descriptors.push(desc);
            cached = Some((block, data));
        }

        log::debug!("[GDT] loaded {} group descriptors", descriptors.len());
        Ok(Self { descriptors })
    }

    /// 获取指定块组的描述符
    pub fn get(&self, group: u32) -> Result<&GroupDescriptor> {
        self.descriptors.get(group as usize).ok_or(
            Error::new(ErrorKind::CorruptStructure, "Block group index out of range")
                .with_mismatch(self.descriptors.len() as u64, group as u64),
        )
    }

    /// 块组数量
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// 遍历所有描述符
    pub fn iter(&self) -> impl Iterator<Item = &GroupDescriptor> {
        self.descriptors.iter()
    }

    /// 校验失败的块组编号
    pub fn checksum_failures(&self) -> impl Iterator<Item = u32> + '_ {
        self.descriptors
            .iter()
            .filter(|d| d.checksum_status.is_mismatch())
            .map(|d| d.group)
    }

    /// 块组描述符校验和的计算入口，供测试和外部工具重算使用
    pub fn compute_checksum(sb: &Superblock, group: u32, raw: &[u8]) -> Option<u16> {
        if sb.has_metadata_csum() {
            gd_checksum::compute_crc32c(sb.checksum_seed(), group, raw)
        } else if sb.has_gdt_csum() {
            gd_checksum::compute_crc16(sb.uuid(), group, raw)
        } else {
            None
        }
    }
}
