//! Inode 读取和解码

use super::checksum::INODE_EXTRA_ISIZE_OFFSET;
use super::flags::InodeFlags;
use crate::block::{BlockDev, BlockReader};
use crate::block_group::GroupTable;
use crate::checksum::{self, ChecksumKind, ChecksumPolicy, ChecksumStatus};
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use crate::superblock::{RoCompatFeatures, Superblock};
use crate::types::{DeviceNumber, FileType, Timestamp};
use alloc::vec;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// 计算 inode 记录在文件系统中的字节偏移
///
/// # 返回
///
/// (块组号, 字节偏移)
pub fn inode_location(sb: &Superblock, groups: &GroupTable, number: u32) -> Result<(u32, u64)> {
    if number == 0 || number > sb.inodes_count() {
        return Err(Error::new(ErrorKind::InvalidInode, "Inode number out of range")
            .with_mismatch(sb.inodes_count() as u64, number as u64));
    }

    let inodes_per_group = sb.inodes_per_group();
    let group = (number - 1) / inodes_per_group;
    let index = (number - 1) % inodes_per_group;

    let desc = groups.get(group)?;
    let offset = desc
        .inode_table()
        .checked_mul(sb.block_size() as u64)
        .and_then(|table| table.checked_add(index as u64 * sb.inode_size() as u64))
        .ok_or(
            Error::new(ErrorKind::CorruptStructure, "Inode table offset overflows")
                .with_mismatch(group as u64, desc.inode_table()),
        )?;
    Ok((group, offset))
}

/// 从块设备读取 inode
///
/// # 参数
///
/// * `bdev` - 块设备引用
/// * `sb` - superblock 引用
/// * `groups` - 块组描述符表
/// * `number` - inode 编号（从 1 开始）
/// * `policy` - 校验和策略
///
/// # 说明
///
/// inode 号为 0 或超过 superblock 中的 inode 总数时返回 `InvalidInode`。
/// metadata_csum 下校验失败时，`Report` 策略仍返回解码后的 inode，
/// 结果记录在 [`Inode::checksum_status`] 中。
pub fn read_inode<R: BlockReader>(
    bdev: &BlockDev<R>,
    sb: &Superblock,
    groups: &GroupTable,
    number: u32,
    policy: ChecksumPolicy,
) -> Result<Inode> {
    let (group, offset) = inode_location(sb, groups, number)?;

    let mut raw = vec![0u8; sb.inode_size() as usize];
    bdev.read_bytes(offset, &mut raw)?;

    let mut inode = Inode::parse(number, raw, sb).map_err(|e| e.with_offset(offset))?;

    if sb.has_metadata_csum() && policy.computes() {
        inode.checksum_status = checksum::evaluate(
            ChecksumKind::Inode {
                number,
                generation: inode.generation,
            },
            &inode.raw,
            sb.checksum_seed(),
        );
        policy.enforce(inode.checksum_status, "Inode checksum mismatch", offset)?;
    }

    log::trace!(
        "[INODE] ino={} group={} offset={:#x} mode={:#o} size={} flags={:?}",
        number,
        group,
        offset,
        inode.mode,
        inode.size,
        inode.flags
    );

    Ok(inode)
}

/// 解码后的 inode
///
/// 原始记录保存在 `raw` 中，扩展属性（inode 内）区域和校验和都从这里读取。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    number: u32,
    raw: Vec<u8>,
    mode: u16,
    uid: u32,
    gid: u32,
    size: u64,
    links_count: u16,
    blocks: u64,
    flags: InodeFlags,
    generation: u32,
    file_acl: u64,
    extra_isize: u16,
    atime: Timestamp,
    ctime: Timestamp,
    mtime: Timestamp,
    crtime: Option<Timestamp>,
    dtime: u32,
    checksum_status: ChecksumStatus,
}

impl Inode {
    /// 从原始记录解码
    ///
    /// `raw` 的长度应等于 superblock 中的 inode_size。
    pub fn parse(number: u32, raw: Vec<u8>, sb: &Superblock) -> Result<Self> {
        if raw.len() < EXT4_GOOD_OLD_INODE_SIZE {
            return Err(Error::new(ErrorKind::CorruptStructure, "Inode record too short")
                .with_mismatch(EXT4_GOOD_OLD_INODE_SIZE as u64, raw.len() as u64));
        }
        let r = &raw[..];
        let u16_at = |off: usize| LittleEndian::read_u16(&r[off..]);
        let u32_at = |off: usize| LittleEndian::read_u32(&r[off..]);

        let extra_isize = if r.len() > EXT4_GOOD_OLD_INODE_SIZE {
            let extra = u16_at(INODE_EXTRA_ISIZE_OFFSET);
            if EXT4_GOOD_OLD_INODE_SIZE + extra as usize > r.len() || extra & 3 != 0 {
                log::warn!(
                    "[INODE] ino={} invalid extra_isize {}; ignoring extended fields",
                    number,
                    extra
                );
                0
            } else {
                extra
            }
        } else {
            0
        };
        // 扩展字段只有完全落在 128 + extra_isize 之内才有效
        let fits = |off: usize| off + 4 <= EXT4_GOOD_OLD_INODE_SIZE + extra_isize as usize;
        let extra_at = |off: usize| if fits(off) { Some(u32_at(off)) } else { None };

        let flags = InodeFlags::from_bits_retain(u32_at(0x20));

        let mut blocks = u32_at(0x1C) as u64;
        if sb.ro_compat_features().contains(RoCompatFeatures::HUGE_FILE) {
            blocks |= (u16_at(0x74) as u64) << 32;
            if flags.contains(InodeFlags::HUGE_FILE) {
                // 以文件系统块为单位，换算成 512 字节扇区
                blocks <<= sb.block_size().trailing_zeros() - 9;
            }
        }

        let crtime = if fits(0x90) {
            Some(Timestamp::decode(u32_at(0x90), extra_at(0x94)))
        } else {
            None
        };

        Ok(Self {
            number,
            mode: u16_at(0x00),
            uid: u16_at(0x02) as u32 | (u16_at(0x78) as u32) << 16,
            size: u32_at(0x04) as u64 | (u32_at(0x6C) as u64) << 32,
            atime: Timestamp::decode(u32_at(0x08), extra_at(0x8C)),
            ctime: Timestamp::decode(u32_at(0x0C), extra_at(0x84)),
            mtime: Timestamp::decode(u32_at(0x10), extra_at(0x88)),
            crtime,
            dtime: u32_at(0x14),
            gid: u16_at(0x18) as u32 | (u16_at(0x7A) as u32) << 16,
            links_count: u16_at(0x1A),
            blocks,
            flags,
            generation: u32_at(0x64),
            file_acl: u32_at(0x68) as u64 | (u16_at(0x76) as u64) << 32,
            extra_isize,
            checksum_status: ChecksumStatus::NotChecked,
            raw,
        })
    }

    /// inode 编号
    pub fn number(&self) -> u32 {
        self.number
    }

    /// 原始 inode 记录
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// 文件模式（类型 + 权限）
    pub fn mode(&self) -> u16 {
        self.mode
    }

    /// 权限位
    pub fn permissions(&self) -> u16 {
        self.mode & !EXT4_INODE_MODE_TYPE_MASK
    }

    /// 文件类型
    pub fn file_type(&self) -> FileType {
        FileType::from_mode(self.mode)
    }

    /// 用户 ID（含高 16 位）
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// 组 ID（含高 16 位）
    pub fn gid(&self) -> u32 {
        self.gid
    }

    /// 文件大小（字节）
    pub fn size(&self) -> u64 {
        self.size
    }

    /// 链接计数
    pub fn links_count(&self) -> u16 {
        self.links_count
    }

    /// 占用的块数（512 字节为单位）
    pub fn blocks_count(&self) -> u64 {
        self.blocks
    }

    /// 标志
    pub fn flags(&self) -> InodeFlags {
        self.flags
    }

    /// generation（NFS 句柄和校验和种子使用）
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// 扩展属性块（0 表示没有）
    pub fn file_acl(&self) -> u64 {
        self.file_acl
    }

    /// 扩展字段长度（无效时为 0）
    pub fn extra_isize(&self) -> u16 {
        self.extra_isize
    }

    /// 访问时间
    pub fn access_time(&self) -> Timestamp {
        self.atime
    }

    /// 内容修改时间
    pub fn modification_time(&self) -> Timestamp {
        self.mtime
    }

    /// 状态改变时间
    pub fn change_time(&self) -> Timestamp {
        self.ctime
    }

    /// 创建时间（需要扩展字段）
    pub fn creation_time(&self) -> Option<Timestamp> {
        self.crtime
    }

    /// 删除时间（秒，0 表示未删除）
    pub fn deletion_time(&self) -> u32 {
        self.dtime
    }

    /// 校验结果
    pub fn checksum_status(&self) -> ChecksumStatus {
        self.checksum_status
    }

    /// i_block 区域（60 字节）
    ///
    /// 根据标志解释为块指针、extent 树根、inline data 或快速符号链接目标。
    pub fn block_data(&self) -> &[u8] {
        &self.raw[0x28..0x28 + EXT4_INODE_BLOCK_BYTES]
    }

    /// i_block 中的第 `index` 个 32 位字
    pub fn block_word(&self, index: usize) -> u32 {
        LittleEndian::read_u32(&self.block_data()[index * 4..])
    }

    /// 检查是否是目录
    pub fn is_dir(&self) -> bool {
        self.file_type().is_dir()
    }

    /// 检查是否是普通文件
    pub fn is_file(&self) -> bool {
        self.file_type().is_file()
    }

    /// 检查是否是符号链接
    pub fn is_symlink(&self) -> bool {
        self.file_type().is_symlink()
    }

    /// 检查是否使用 extent
    pub fn has_extents(&self) -> bool {
        self.flags.contains(InodeFlags::EXTENTS)
    }

    /// 检查是否使用 HTree 索引（对目录）
    pub fn has_index(&self) -> bool {
        self.flags.contains(InodeFlags::INDEX)
    }

    /// 检查数据是否存放在 inode 内
    pub fn has_inline_data(&self) -> bool {
        self.flags.contains(InodeFlags::INLINE_DATA)
    }

    /// inode 内扩展属性区域（128 + extra_isize 之后）
    pub fn inline_xattr_region(&self) -> Option<&[u8]> {
        let start = EXT4_GOOD_OLD_INODE_SIZE + self.extra_isize as usize;
        if self.extra_isize == 0 || start + EXT4_XATTR_IBODY_HEADER_SIZE > self.raw.len() {
            return None;
        }
        Some(&self.raw[start..])
    }

    /// 判断符号链接目标是否直接存放在 i_block 中
    ///
    /// 快速符号链接不占用数据块（扩展属性块除外）。
    pub fn is_fast_symlink(&self, block_size: u32) -> bool {
        if !self.is_symlink() {
            return false;
        }
        if self.flags.contains(InodeFlags::EA_INODE) {
            return self.size != 0 && self.size < EXT4_FAST_SYMLINK_MAX;
        }
        if self.has_inline_data() {
            return false;
        }
        let ea_blocks = if self.file_acl != 0 { (block_size >> 9) as u64 } else { 0 };
        self.blocks.saturating_sub(ea_blocks) == 0 && self.size < EXT4_FAST_SYMLINK_MAX
    }

    /// 字符设备和块设备的设备号
    pub fn device_number(&self) -> Option<DeviceNumber> {
        if !self.file_type().is_device() {
            return None;
        }
        Some(DeviceNumber::decode(self.block_word(0), self.block_word(1)))
    }
}
