//! 测试用镜像构造
//!
//! 只在 `cfg(test)` 下编译。`ImageBuilder` 生成单块组、1K 块的小镜像：
//!
//! ```text
//! 块 1  superblock
//! 块 2  块组描述符表
//! 块 3  块位图
//! 块 4  inode 位图
//! 块 5  inode 表
//! 块 20 起 按需分配的数据块
//! ```
//!
//! 目录块、校验和等依赖最终特性位的内容都推迟到 `finish` 时生成，
//! 调用 `metadata_csum()` 的先后顺序不影响结果。

use crate::block::BlockDev;
use crate::block_group::checksum::{compute_crc16, compute_crc32c, GROUP_DESC_CSUM_OFFSET};
use crate::block_group::GroupTable;
use crate::checksum::{fs_seed, inode_seed, ChecksumPolicy};
use crate::consts::*;
use crate::dir::checksum::{set_dx_checksum, set_leaf_checksum};
use crate::dir::hash::{htree_hash, EXT2_HTREE_HALF_MD4};
use crate::dir::htree::{dx_root_limit, DX_ROOT_COUNT_OFFSET};
use crate::inode::InodeFlags;
use crate::superblock::{read_superblock, Superblock};
use crate::xattr::{checksum_pair as xattr_checksum_pair, entry_hash};
use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

const TEST_UUID: [u8; 16] = [
    0x5a, 0x1c, 0x3e, 0x77, 0x08, 0x42, 0x4d, 0x1f, 0x9b, 0x61, 0xc2, 0x0e, 0x3a, 0xd4, 0x55, 0x90,
];

const TEST_EXTRA_ISIZE: u16 = 32;

fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

// ===== Superblock =====

/// 构造 1024 字节的 superblock
#[derive(Debug, Clone)]
pub(crate) struct SuperblockBuilder {
    block_size: u32,
    blocks_count: u64,
    log_block_size: Option<u32>,
    compat: u32,
    incompat: u32,
    ro_compat: u32,
    inode_size: u16,
    metadata_csum: bool,
    blocks_per_group: Option<u32>,
    inodes_per_group: u32,
    inodes_count: Option<u32>,
    first_meta_bg: u32,
}

impl SuperblockBuilder {
    pub(crate) fn new(block_size: u32, blocks_count: u64) -> Self {
        Self {
            block_size,
            blocks_count,
            log_block_size: None,
            compat: 0,
            incompat: 0,
            ro_compat: 0,
            inode_size: EXT4_GOOD_OLD_INODE_SIZE as u16,
            metadata_csum: false,
            blocks_per_group: None,
            inodes_per_group: 32,
            inodes_count: None,
            first_meta_bg: 0,
        }
    }

    /// 覆盖由块大小推导的 log 值
    pub(crate) fn log_block_size(mut self, log: u32) -> Self {
        self.log_block_size = Some(log);
        self
    }

    pub(crate) fn compat(mut self, bits: u32) -> Self {
        self.compat = bits;
        self
    }

    pub(crate) fn incompat(mut self, bits: u32) -> Self {
        self.incompat = bits;
        self
    }

    pub(crate) fn ro_compat(mut self, bits: u32) -> Self {
        self.ro_compat = bits;
        self
    }

    pub(crate) fn inode_size(mut self, size: u16) -> Self {
        self.inode_size = size;
        self
    }

    /// 打开 metadata_csum 并在 build 时写入 superblock 校验和
    pub(crate) fn metadata_csum(mut self) -> Self {
        self.metadata_csum = true;
        self
    }

    pub(crate) fn blocks_per_group(mut self, count: u32) -> Self {
        self.blocks_per_group = Some(count);
        self
    }

    pub(crate) fn inodes_per_group(mut self, count: u32) -> Self {
        self.inodes_per_group = count;
        self
    }

    pub(crate) fn inodes_count(mut self, count: u32) -> Self {
        self.inodes_count = Some(count);
        self
    }

    pub(crate) fn first_meta_bg(mut self, group: u32) -> Self {
        self.first_meta_bg = group;
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let mut raw = vec![0u8; EXT4_SUPERBLOCK_SIZE];
        let log = self
            .log_block_size
            .unwrap_or((self.block_size / EXT4_MIN_BLOCK_SIZE).trailing_zeros());
        let first_data_block: u32 = if self.block_size == EXT4_MIN_BLOCK_SIZE { 1 } else { 0 };
        let blocks_per_group = self.blocks_per_group.unwrap_or(self.block_size * 8);
        let groups = (self.blocks_count - first_data_block as u64).div_ceil(blocks_per_group as u64);
        let inodes_count = self
            .inodes_count
            .unwrap_or_else(|| groups as u32 * self.inodes_per_group);

        let mut ro_compat = self.ro_compat;
        if self.metadata_csum {
            ro_compat |= EXT4_FEATURE_RO_COMPAT_METADATA_CSUM;
        }

        LittleEndian::write_u32(&mut raw[0x00..], inodes_count);
        LittleEndian::write_u32(&mut raw[0x04..], self.blocks_count as u32);
        LittleEndian::write_u32(&mut raw[0x14..], first_data_block);
        LittleEndian::write_u32(&mut raw[0x18..], log);
        LittleEndian::write_u32(&mut raw[0x1C..], log);
        LittleEndian::write_u32(&mut raw[0x20..], blocks_per_group);
        LittleEndian::write_u32(&mut raw[0x24..], blocks_per_group);
        LittleEndian::write_u32(&mut raw[0x28..], self.inodes_per_group);
        LittleEndian::write_u16(&mut raw[0x38..], EXT4_SUPERBLOCK_MAGIC);
        LittleEndian::write_u16(&mut raw[0x3A..], 1);
        LittleEndian::write_u16(&mut raw[0x3C..], 1);
        LittleEndian::write_u32(&mut raw[0x4C..], 1);
        LittleEndian::write_u32(&mut raw[0x54..], EXT4_GOOD_OLD_FIRST_INO);
        LittleEndian::write_u16(&mut raw[0x58..], self.inode_size);
        LittleEndian::write_u32(&mut raw[0x5C..], self.compat);
        LittleEndian::write_u32(&mut raw[0x60..], self.incompat);
        LittleEndian::write_u32(&mut raw[0x64..], ro_compat);
        raw[0x68..0x78].copy_from_slice(&TEST_UUID);
        raw[0x78..0x78 + 8].copy_from_slice(b"forensic");
        raw[0xFC] = EXT2_HTREE_HALF_MD4;
        LittleEndian::write_u32(&mut raw[0x104..], self.first_meta_bg);
        if self.inode_size as usize > EXT4_GOOD_OLD_INODE_SIZE {
            LittleEndian::write_u16(&mut raw[0x15C..], TEST_EXTRA_ISIZE);
            LittleEndian::write_u16(&mut raw[0x15E..], TEST_EXTRA_ISIZE);
        }

        if self.metadata_csum {
            raw[0x175] = EXT4_CRC32C_CHKSUM;
            if let Some(csum) = crate::superblock::checksum::compute_checksum(&raw) {
                LittleEndian::write_u32(&mut raw[EXT4_SUPERBLOCK_CSUM_OFFSET..], csum);
            }
        }
        raw
    }
}

// ===== Inode =====

/// 构造单条 inode 记录
#[derive(Debug, Clone)]
pub(crate) struct InodeBuilder {
    raw: Vec<u8>,
}

impl InodeBuilder {
    pub(crate) fn new(size: usize) -> Self {
        Self { raw: vec![0u8; size] }
    }

    pub(crate) fn mode(mut self, mode: u16) -> Self {
        LittleEndian::write_u16(&mut self.raw[0x00..], mode);
        self
    }

    pub(crate) fn size(mut self, size: u64) -> Self {
        LittleEndian::write_u32(&mut self.raw[0x04..], size as u32);
        LittleEndian::write_u32(&mut self.raw[0x6C..], (size >> 32) as u32);
        self
    }

    pub(crate) fn uid(mut self, uid: u32) -> Self {
        LittleEndian::write_u16(&mut self.raw[0x02..], uid as u16);
        LittleEndian::write_u16(&mut self.raw[0x78..], (uid >> 16) as u16);
        self
    }

    pub(crate) fn links(mut self, links: u16) -> Self {
        LittleEndian::write_u16(&mut self.raw[0x1A..], links);
        self
    }

    /// i_blocks，单位 512 字节扇区
    pub(crate) fn sectors(mut self, sectors: u64) -> Self {
        LittleEndian::write_u32(&mut self.raw[0x1C..], sectors as u32);
        self
    }

    pub(crate) fn flags(mut self, flags: u32) -> Self {
        LittleEndian::write_u32(&mut self.raw[0x20..], flags);
        self
    }

    /// i_block 的 60 字节，多余部分截断
    pub(crate) fn block_data(mut self, data: &[u8]) -> Self {
        let len = data.len().min(EXT4_INODE_BLOCK_BYTES);
        self.raw[0x28..0x28 + len].copy_from_slice(&data[..len]);
        self
    }

    pub(crate) fn generation(mut self, generation: u32) -> Self {
        LittleEndian::write_u32(&mut self.raw[0x64..], generation);
        self
    }

    pub(crate) fn extra_isize(mut self, extra: u16) -> Self {
        if self.raw.len() > EXT4_GOOD_OLD_INODE_SIZE {
            LittleEndian::write_u16(&mut self.raw[0x80..], extra);
        }
        self
    }

    /// atime/ctime/mtime/crtime 设为同一秒数，`extra` 写入各自的扩展字段
    pub(crate) fn times(mut self, seconds: u32, extra: Option<u32>) -> Self {
        for off in [0x08, 0x0C, 0x10] {
            LittleEndian::write_u32(&mut self.raw[off..], seconds);
        }
        if self.raw.len() >= 0x98 {
            LittleEndian::write_u32(&mut self.raw[0x90..], seconds);
            if let Some(extra) = extra {
                for off in [0x84, 0x88, 0x8C, 0x94] {
                    LittleEndian::write_u32(&mut self.raw[off..], extra);
                }
            }
        }
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        self.raw
    }
}

// ===== Extent 节点 =====

/// 构造 extent 根节点（60 字节）或独立节点块
#[derive(Debug, Clone)]
pub(crate) struct ExtentNodeBuilder {
    raw: Vec<u8>,
    depth: u16,
    max: u16,
    entries: u16,
}

impl ExtentNodeBuilder {
    /// i_block 中的根节点，容量 4
    pub(crate) fn root(depth: u16) -> Self {
        Self {
            raw: vec![0u8; EXT4_INODE_BLOCK_BYTES],
            depth,
            max: 4,
            entries: 0,
        }
    }

    /// 占一整块的节点，末尾留出 tail
    pub(crate) fn block(block_size: usize, depth: u16) -> Self {
        Self {
            raw: vec![0u8; block_size],
            depth,
            max: ((block_size - EXT4_EXTENT_ENTRY_SIZE) / EXT4_EXTENT_ENTRY_SIZE) as u16,
            entries: 0,
        }
    }

    fn next_slot(&mut self) -> usize {
        let off = EXT4_EXTENT_ENTRY_SIZE * (self.entries as usize + 1);
        self.entries += 1;
        off
    }

    /// 叶子条目；`len` 是磁盘上的原始长度（大于 32768 表示未初始化）
    pub(crate) fn extent(mut self, logical: u32, len: u16, physical: u64) -> Self {
        let off = self.next_slot();
        let e = &mut self.raw[off..off + EXT4_EXTENT_ENTRY_SIZE];
        LittleEndian::write_u32(&mut e[0..], logical);
        LittleEndian::write_u16(&mut e[4..], len);
        LittleEndian::write_u16(&mut e[6..], (physical >> 32) as u16);
        LittleEndian::write_u32(&mut e[8..], physical as u32);
        self
    }

    /// 索引条目
    pub(crate) fn index(mut self, logical: u32, child: u64) -> Self {
        let off = self.next_slot();
        let e = &mut self.raw[off..off + EXT4_EXTENT_ENTRY_SIZE];
        LittleEndian::write_u32(&mut e[0..], logical);
        LittleEndian::write_u32(&mut e[4..], child as u32);
        LittleEndian::write_u16(&mut e[8..], (child >> 32) as u16);
        self
    }

    pub(crate) fn build(mut self) -> Vec<u8> {
        LittleEndian::write_u16(&mut self.raw[0..], EXT4_EXTENT_MAGIC);
        LittleEndian::write_u16(&mut self.raw[2..], self.entries);
        LittleEndian::write_u16(&mut self.raw[4..], self.max);
        LittleEndian::write_u16(&mut self.raw[6..], self.depth);
        self.raw
    }
}

// ===== 镜像 =====

/// 打开好的镜像各部分
pub(crate) struct TestFs {
    pub(crate) bdev: BlockDev<Vec<u8>>,
    pub(crate) sb: Superblock,
    pub(crate) groups: GroupTable,
}

#[derive(Debug, Clone)]
enum PendingDir {
    Linear {
        ino: u32,
        parent: u32,
        block: u64,
        entries: Vec<(Vec<u8>, u32)>,
    },
    Indexed {
        ino: u32,
        parent: u32,
        blocks: [u64; 3],
        names: Vec<Vec<u8>>,
        first_ino: u32,
    },
}

/// 单块组测试镜像
#[derive(Debug, Clone)]
pub(crate) struct ImageBuilder {
    block_size: u32,
    blocks_count: u64,
    image: Vec<u8>,
    inode_size: u16,
    inode_table: u64,
    compat: u32,
    incompat: u32,
    ro_compat: u32,
    metadata_csum: bool,
    next_block: u64,
    inodes: BTreeMap<u32, Vec<u8>>,
    ibody_xattrs: BTreeMap<u32, Vec<(u8, Vec<u8>, Vec<u8>)>>,
    dirs: Vec<PendingDir>,
    extent_blocks: Vec<(u32, u64)>,
    xattr_blocks: Vec<u64>,
    backup_superblock: Option<u64>,
}

impl ImageBuilder {
    /// inode 表默认所在块
    pub(crate) const INODE_TABLE_BLOCK: u64 = 5;

    const INODES: u32 = 32;
    const FIRST_DATA_ALLOC: u64 = 20;

    pub(crate) fn new(block_size: u32, blocks_count: u64) -> Self {
        Self {
            block_size,
            blocks_count,
            image: vec![0u8; block_size as usize * blocks_count as usize],
            inode_size: EXT4_GOOD_OLD_INODE_SIZE as u16,
            inode_table: Self::INODE_TABLE_BLOCK,
            compat: 0,
            incompat: EXT4_FEATURE_INCOMPAT_FILETYPE,
            ro_compat: 0,
            metadata_csum: false,
            next_block: Self::FIRST_DATA_ALLOC,
            inodes: BTreeMap::new(),
            ibody_xattrs: BTreeMap::new(),
            dirs: Vec::new(),
            extent_blocks: Vec::new(),
            xattr_blocks: Vec::new(),
            backup_superblock: None,
        }
    }

    /// 默认布局下 inode 记录的字节偏移
    pub(crate) fn inode_offset(block_size: u32, inode_size: u16, ino: u32) -> u64 {
        Self::INODE_TABLE_BLOCK * block_size as u64 + (ino as u64 - 1) * inode_size as u64
    }

    // ----- 特性与布局 -----

    pub(crate) fn metadata_csum(&mut self) {
        self.metadata_csum = true;
    }

    pub(crate) fn gdt_csum(&mut self) {
        self.ro_compat |= EXT4_FEATURE_RO_COMPAT_GDT_CSUM;
    }

    pub(crate) fn inode_size(&mut self, size: u16) {
        self.inode_size = size;
    }

    pub(crate) fn set_inode_table(&mut self, block: u64) {
        self.inode_table = block;
    }

    /// 在 `block` 放一份 superblock 备份，下一块放描述符表副本
    pub(crate) fn with_backup_superblock(&mut self, block: u64) {
        self.backup_superblock = Some(block);
    }

    // ----- 原始块 -----

    fn alloc_block(&mut self) -> u64 {
        let block = self.next_block;
        self.next_block += 1;
        assert!(block < self.blocks_count, "test image out of blocks");
        block
    }

    fn sectors(&self, blocks: usize) -> u64 {
        blocks as u64 * (self.block_size as u64 / 512)
    }

    pub(crate) fn write_block(&mut self, block: u64, data: &[u8]) {
        let start = block as usize * self.block_size as usize;
        self.image[start..start + data.len()].copy_from_slice(data);
    }

    /// 写块内第 `index` 个 u32（间接块指针）
    pub(crate) fn write_u32(&mut self, block: u64, index: usize, value: u32) {
        let start = block as usize * self.block_size as usize + index * 4;
        LittleEndian::write_u32(&mut self.image[start..], value);
    }

    /// 写 extent 节点块，`finish` 时用 `ino` 的种子补 tail 校验和
    pub(crate) fn write_extent_block(&mut self, ino: u32, block: u64, data: Vec<u8>) {
        self.write_block(block, &data);
        self.extent_blocks.push((ino, block));
    }

    fn inode_mut(&mut self, ino: u32) -> &mut Vec<u8> {
        self.inodes
            .entry(ino)
            .or_insert_with(|| vec![0u8; EXT4_GOOD_OLD_INODE_SIZE])
    }

    // ----- 普通文件 -----

    /// 间接块寻址的普通文件，数据块按需分配
    pub(crate) fn add_file(&mut self, ino: u32, data: &[u8]) {
        let bs = self.block_size as usize;
        let count = data.len().div_ceil(bs);
        let per_block = bs / 4;
        assert!(count <= EXT4_INODE_DIRECT_BLOCKS + per_block);

        let mut pointers = [0u32; EXT4_INODE_BLOCKS];
        let mut indirect = None;
        let mut used = count;
        for (i, chunk) in data.chunks(bs).enumerate() {
            let block = self.alloc_block();
            self.write_block(block, chunk);
            if i < EXT4_INODE_DIRECT_BLOCKS {
                pointers[i] = block as u32;
            } else {
                let table = match indirect {
                    Some(table) => table,
                    None => {
                        let table = self.alloc_block();
                        pointers[EXT4_INODE_INDIRECT_BLOCK] = table as u32;
                        indirect = Some(table);
                        used += 1;
                        table
                    }
                };
                self.write_u32(table, i - EXT4_INODE_DIRECT_BLOCKS, block as u32);
            }
        }

        let raw = InodeBuilder::new(EXT4_GOOD_OLD_INODE_SIZE)
            .mode(EXT4_INODE_MODE_FILE | 0o644)
            .size(data.len() as u64)
            .links(1)
            .sectors(self.sectors(used))
            .block_data(&pointer_bytes(&pointers))
            .build();
        self.inodes.insert(ino, raw);
    }

    /// extent 寻址的普通文件，`root` 放进 i_block，数据块由调用方写入
    pub(crate) fn add_extent_file(&mut self, ino: u32, root: impl AsRef<[u8]>, size: u64) {
        self.incompat |= EXT4_FEATURE_INCOMPAT_EXTENTS;
        let raw = InodeBuilder::new(EXT4_GOOD_OLD_INODE_SIZE)
            .mode(EXT4_INODE_MODE_FILE | 0o644)
            .size(size)
            .links(1)
            .flags(InodeFlags::EXTENTS.bits())
            .block_data(root.as_ref())
            .build();
        self.inodes.insert(ino, raw);
    }

    /// inline-data 文件：前 60 字节在 i_block，其余放进 `system.data`
    pub(crate) fn add_inline_file(&mut self, ino: u32, data: &[u8]) {
        self.incompat |= EXT4_FEATURE_INCOMPAT_INLINE_DATA;
        let split = data.len().min(EXT4_INODE_BLOCK_BYTES);
        let raw = InodeBuilder::new(EXT4_GOOD_OLD_INODE_SIZE)
            .mode(EXT4_INODE_MODE_FILE | 0o644)
            .size(data.len() as u64)
            .links(1)
            .flags(InodeFlags::INLINE_DATA.bits())
            .block_data(&data[..split])
            .build();
        self.inodes.insert(ino, raw);
        self.add_ibody_xattr(ino, EXT4_XATTR_INDEX_SYSTEM, EXT4_INLINE_DATA_XATTR_NAME, &data[split..]);
    }

    pub(crate) fn add_fast_symlink(&mut self, ino: u32, target: &[u8]) {
        assert!(target.len() < EXT4_FAST_SYMLINK_MAX as usize);
        let raw = InodeBuilder::new(EXT4_GOOD_OLD_INODE_SIZE)
            .mode(EXT4_INODE_MODE_SOFTLINK | 0o777)
            .size(target.len() as u64)
            .links(1)
            .block_data(target)
            .build();
        self.inodes.insert(ino, raw);
    }

    /// 目标存放在数据块中的符号链接
    pub(crate) fn add_slow_symlink(&mut self, ino: u32, target: &[u8]) {
        assert!(target.len() <= self.block_size as usize);
        let block = self.alloc_block();
        self.write_block(block, target);
        let raw = InodeBuilder::new(EXT4_GOOD_OLD_INODE_SIZE)
            .mode(EXT4_INODE_MODE_SOFTLINK | 0o777)
            .size(target.len() as u64)
            .links(1)
            .sectors(self.sectors(1))
            .block_data(&(block as u32).to_le_bytes())
            .build();
        self.inodes.insert(ino, raw);
    }

    /// 设备文件，设备号按旧格式写入 i_block 第 0 个字
    pub(crate) fn add_device(&mut self, ino: u32, mode_type: u16, old_encoding: u32) {
        let raw = InodeBuilder::new(EXT4_GOOD_OLD_INODE_SIZE)
            .mode(mode_type | 0o600)
            .links(1)
            .block_data(&old_encoding.to_le_bytes())
            .build();
        self.inodes.insert(ino, raw);
    }

    /// 在已有 flags 上追加标志位
    pub(crate) fn set_inode_flags(&mut self, ino: u32, flags: u32) {
        let raw = self.inode_mut(ino);
        let old = LittleEndian::read_u32(&raw[0x20..]);
        LittleEndian::write_u32(&mut raw[0x20..], old | flags);
    }

    // ----- 扩展属性 -----

    /// inode 内扩展属性，需要 inode_size 大于 128
    pub(crate) fn add_ibody_xattr(&mut self, ino: u32, index: u8, name: &[u8], value: &[u8]) {
        self.compat |= EXT4_FEATURE_COMPAT_EXT_ATTR;
        self.ibody_xattrs
            .entry(ino)
            .or_default()
            .push((index, name.to_vec(), value.to_vec()));
    }

    /// 独立 xattr 块，只含一个 `user.<name>` 属性，值放在块尾
    pub(crate) fn add_xattr_block(&mut self, ino: u32, block: u64, name: &[u8], value: &[u8]) {
        self.compat |= EXT4_FEATURE_COMPAT_EXT_ATTR;
        let bs = self.block_size as usize;
        let mut raw = vec![0u8; bs];
        LittleEndian::write_u32(&mut raw[0x00..], EXT4_XATTR_MAGIC);
        LittleEndian::write_u32(&mut raw[0x04..], 1);
        LittleEndian::write_u32(&mut raw[0x08..], 1);

        let value_offs = bs - pad4(value.len());
        raw[value_offs..value_offs + value.len()].copy_from_slice(value);
        put_xattr_entry(
            &mut raw,
            EXT4_XATTR_BLOCK_HEADER_SIZE,
            EXT4_XATTR_INDEX_USER,
            name,
            value_offs as u16,
            value,
        );
        self.write_block(block, &raw);
        self.xattr_blocks.push(block);

        let sectors = self.sectors(1);
        let inode = self.inode_mut(ino);
        LittleEndian::write_u32(&mut inode[0x68..], block as u32);
        let old = LittleEndian::read_u32(&inode[0x1C..]) as u64;
        LittleEndian::write_u32(&mut inode[0x1C..], (old + sectors) as u32);
    }

    // ----- 目录 -----

    fn dir_inode(&self, pointers: &[u64], flags: u32) -> Vec<u8> {
        assert!(pointers.len() <= EXT4_INODE_DIRECT_BLOCKS);
        let mut words = [0u32; EXT4_INODE_BLOCKS];
        for (word, &block) in words.iter_mut().zip(pointers) {
            *word = block as u32;
        }
        let used = pointers.iter().filter(|&&b| b != 0).count();
        InodeBuilder::new(EXT4_GOOD_OLD_INODE_SIZE)
            .mode(EXT4_INODE_MODE_DIRECTORY | 0o755)
            .size(pointers.len() as u64 * self.block_size as u64)
            .links(2)
            .flags(flags)
            .sectors(self.sectors(used))
            .block_data(&pointer_bytes(&words))
            .build()
    }

    /// 根目录（inode 2），单个线性目录块，含 "." 和 ".."
    pub(crate) fn add_root_dir(&mut self, entries: &[(&str, u32)]) {
        let block = self.alloc_block();
        let raw = self.dir_inode(&[block], 0);
        self.inodes.insert(EXT4_ROOT_INODE, raw);
        self.dirs.push(PendingDir::Linear {
            ino: EXT4_ROOT_INODE,
            parent: EXT4_ROOT_INODE,
            block,
            entries: entries
                .iter()
                .map(|(name, ino)| (name.as_bytes().to_vec(), *ino))
                .collect(),
        });
    }

    /// half-MD4 HTree 目录：一个 dx_root 和两个叶子块
    ///
    /// 第 i 个名字指向 inode 12 + i。返回 dx_root 的物理块号。
    pub(crate) fn add_htree_dir(&mut self, ino: u32, names: &[&str]) -> u64 {
        self.compat |= EXT4_FEATURE_COMPAT_DIR_INDEX;
        let blocks = [self.alloc_block(), self.alloc_block(), self.alloc_block()];
        let raw = self.dir_inode(&blocks, InodeFlags::INDEX.bits());
        self.inodes.insert(ino, raw);
        self.dirs.push(PendingDir::Indexed {
            ino,
            parent: EXT4_ROOT_INODE,
            blocks,
            names: names.iter().map(|n| n.as_bytes().to_vec()).collect(),
            first_ino: EXT4_GOOD_OLD_FIRST_INO + 1,
        });
        blocks[0]
    }

    /// 用调用方给出的原始块内容组成目录
    pub(crate) fn add_dir_blocks(&mut self, ino: u32, blocks: &[Vec<u8>]) {
        let sparse: Vec<Option<Vec<u8>>> = blocks.iter().cloned().map(Some).collect();
        self.add_dir_blocks_sparse(ino, &sparse);
    }

    /// 同上，`None` 的位置留作空洞
    pub(crate) fn add_dir_blocks_sparse(&mut self, ino: u32, blocks: &[Option<Vec<u8>>]) {
        let mut pointers = Vec::with_capacity(blocks.len());
        for data in blocks {
            match data {
                Some(data) => {
                    let block = self.alloc_block();
                    self.write_block(block, data);
                    pointers.push(block);
                }
                None => pointers.push(0),
            }
        }
        let raw = self.dir_inode(&pointers, 0);
        self.inodes.insert(ino, raw);
    }

    /// inline-data 目录：`i_block` 以父目录 inode 号开头，`extra` 是 `system.data`
    pub(crate) fn add_inline_dir(&mut self, ino: u32, i_block: &[u8], extra: &[u8]) {
        self.incompat |= EXT4_FEATURE_INCOMPAT_INLINE_DATA;
        let raw = InodeBuilder::new(EXT4_GOOD_OLD_INODE_SIZE)
            .mode(EXT4_INODE_MODE_DIRECTORY | 0o755)
            .size((EXT4_INODE_BLOCK_BYTES + extra.len()) as u64)
            .links(2)
            .flags(InodeFlags::INLINE_DATA.bits())
            .block_data(i_block)
            .build();
        self.inodes.insert(ino, raw);
        self.add_ibody_xattr(ino, EXT4_XATTR_INDEX_SYSTEM, EXT4_INLINE_DATA_XATTR_NAME, extra);
    }

    // ----- 生成 -----

    fn superblock(&self) -> Vec<u8> {
        let mut builder = SuperblockBuilder::new(self.block_size, self.blocks_count)
            .inodes_per_group(Self::INODES)
            .inode_size(self.inode_size)
            .compat(self.compat)
            .incompat(self.incompat)
            .ro_compat(self.ro_compat);
        if self.metadata_csum {
            builder = builder.metadata_csum();
        }
        builder.build()
    }

    fn de_type(&self, ino: u32) -> u8 {
        let mode = self
            .inodes
            .get(&ino)
            .map_or(0, |raw| LittleEndian::read_u16(&raw[0x00..]));
        match mode & EXT4_INODE_MODE_TYPE_MASK {
            EXT4_INODE_MODE_DIRECTORY => EXT4_DE_DIR,
            EXT4_INODE_MODE_CHARDEV => EXT4_DE_CHRDEV,
            EXT4_INODE_MODE_BLOCKDEV => EXT4_DE_BLKDEV,
            EXT4_INODE_MODE_FIFO => EXT4_DE_FIFO,
            EXT4_INODE_MODE_SOCKET => EXT4_DE_SOCK,
            EXT4_INODE_MODE_SOFTLINK => EXT4_DE_SYMLINK,
            _ => EXT4_DE_REG_FILE,
        }
    }

    fn seed_of(&self, ino: u32) -> u32 {
        let generation = self
            .inodes
            .get(&ino)
            .map_or(0, |raw| LittleEndian::read_u32(&raw[0x64..]));
        inode_seed(fs_seed(&TEST_UUID), ino, generation)
    }

    fn leaf(&self, ino: u32, entries: &[(Vec<u8>, u32, u8)]) -> Vec<u8> {
        let bs = self.block_size as usize;
        let mut raw = vec![0u8; bs];
        let end = if self.metadata_csum { bs - EXT4_DIR_TAIL_SIZE } else { bs };

        if entries.is_empty() {
            LittleEndian::write_u16(&mut raw[4..], end as u16);
        }
        let mut pos = 0;
        for (i, (name, child, file_type)) in entries.iter().enumerate() {
            let len = pad4(EXT4_DIR_ENTRY_HEADER_SIZE + name.len());
            let rec_len = if i + 1 == entries.len() { end - pos } else { len };
            put_dir_record(&mut raw, pos, *child, rec_len as u16, name, *file_type);
            pos += len;
        }

        if self.metadata_csum {
            set_leaf_checksum(self.seed_of(ino), &mut raw);
        }
        raw
    }

    fn dx_root(&self, ino: u32, parent: u32, hash_split: u32) -> Vec<u8> {
        let bs = self.block_size as usize;
        let mut raw = vec![0u8; bs];
        put_dir_record(&mut raw, 0, ino, 12, b".", EXT4_DE_DIR);
        put_dir_record(&mut raw, 12, parent, (bs - 12) as u16, b"..", EXT4_DE_DIR);
        raw[0x1C] = EXT2_HTREE_HALF_MD4;
        raw[0x1D] = EXT4_DX_ROOT_INFO_LEN;

        let c = DX_ROOT_COUNT_OFFSET;
        LittleEndian::write_u16(&mut raw[c..], dx_root_limit(self.block_size, self.metadata_csum));
        LittleEndian::write_u16(&mut raw[c + 2..], 2);
        LittleEndian::write_u32(&mut raw[c + 4..], 1);
        LittleEndian::write_u32(&mut raw[c + 8..], hash_split);
        LittleEndian::write_u32(&mut raw[c + 12..], 2);

        if self.metadata_csum {
            set_dx_checksum(self.seed_of(ino), &mut raw, c);
        }
        raw
    }

    fn render_dirs(&mut self) {
        let dirs = core::mem::take(&mut self.dirs);
        for dir in &dirs {
            match dir {
                PendingDir::Linear {
                    ino,
                    parent,
                    block,
                    entries,
                } => {
                    let mut records = vec![
                        (b".".to_vec(), *ino, EXT4_DE_DIR),
                        (b"..".to_vec(), *parent, EXT4_DE_DIR),
                    ];
                    records.extend(
                        entries
                            .iter()
                            .map(|(name, child)| (name.clone(), *child, self.de_type(*child))),
                    );
                    let raw = self.leaf(*ino, &records);
                    self.write_block(*block, &raw);
                }
                PendingDir::Indexed {
                    ino,
                    parent,
                    blocks,
                    names,
                    first_ino,
                } => {
                    let mut hashed: Vec<(u32, Vec<u8>, u32, u8)> = names
                        .iter()
                        .enumerate()
                        .map(|(i, name)| {
                            let hash = htree_hash(name, None, EXT2_HTREE_HALF_MD4)
                                .map(|h| h.major)
                                .unwrap_or(0);
                            let child = first_ino + i as u32;
                            (hash, name.clone(), child, self.de_type(child))
                        })
                        .collect();
                    hashed.sort();

                    // 同一哈希值不能跨越两个叶子
                    let mut split = hashed.len() / 2;
                    while split > 0 && split < hashed.len() && hashed[split].0 == hashed[split - 1].0 {
                        split += 1;
                    }
                    if hashed.len() < 2 {
                        split = hashed.len();
                    }
                    let hash_split = hashed.get(split).map_or(0xFFFF_FFFE, |e| e.0);

                    let records = |part: &[(u32, Vec<u8>, u32, u8)]| -> Vec<(Vec<u8>, u32, u8)> {
                        part.iter().map(|(_, n, c, t)| (n.clone(), *c, *t)).collect()
                    };
                    let root = self.dx_root(*ino, *parent, hash_split);
                    let first = self.leaf(*ino, &records(&hashed[..split]));
                    let second = self.leaf(*ino, &records(&hashed[split..]));
                    self.write_block(blocks[0], &root);
                    self.write_block(blocks[1], &first);
                    self.write_block(blocks[2], &second);
                }
            }
        }
        self.dirs = dirs;
    }

    fn block_range(&self, block: u64) -> core::ops::Range<usize> {
        let start = block as usize * self.block_size as usize;
        start..start + self.block_size as usize
    }

    fn seal_metadata_blocks(&mut self) {
        if !self.metadata_csum {
            return;
        }
        for (ino, block) in self.extent_blocks.clone() {
            let seed = self.seed_of(ino);
            let range = self.block_range(block);
            let raw = &mut self.image[range];
            if let (Some(csum), Some(tail)) = (
                crate::extent::checksum::compute_checksum(seed, raw),
                crate::extent::checksum::extent_tail_offset(raw),
            ) {
                LittleEndian::write_u32(&mut raw[tail..], csum);
            }
        }

        let seed = fs_seed(&TEST_UUID);
        for block in self.xattr_blocks.clone() {
            let range = self.block_range(block);
            let raw = &mut self.image[range];
            if let Some((_, computed)) = xattr_checksum_pair(seed, block, raw) {
                LittleEndian::write_u32(&mut raw[0x10..], computed);
            }
        }
    }

    /// 扩展 inode 记录到 inode_size，写入 inode 内属性
    fn full_inode(&self, ino: u32, core: &[u8]) -> Vec<u8> {
        let size = self.inode_size as usize;
        let mut raw = vec![0u8; size];
        raw[..EXT4_GOOD_OLD_INODE_SIZE].copy_from_slice(&core[..EXT4_GOOD_OLD_INODE_SIZE]);

        let attrs = self.ibody_xattrs.get(&ino);
        if size <= EXT4_GOOD_OLD_INODE_SIZE {
            assert!(attrs.is_none(), "in-inode xattrs need inode_size > 128");
            return raw;
        }
        LittleEndian::write_u16(&mut raw[0x80..], TEST_EXTRA_ISIZE);

        let Some(attrs) = attrs else {
            return raw;
        };
        let header = EXT4_GOOD_OLD_INODE_SIZE + TEST_EXTRA_ISIZE as usize;
        let first = header + EXT4_XATTR_IBODY_HEADER_SIZE;
        LittleEndian::write_u32(&mut raw[header..], EXT4_XATTR_MAGIC);

        let mut pos = first;
        let mut value_end = size;
        for (index, name, value) in attrs {
            let offs = if value.is_empty() {
                0
            } else {
                value_end -= pad4(value.len());
                raw[value_end..value_end + value.len()].copy_from_slice(value);
                value_end - first
            };
            pos = put_xattr_entry(&mut raw, pos, *index, name, offs as u16, value);
            assert!(pos + 4 <= value_end, "in-inode xattrs overflow");
        }
        raw
    }

    fn group_descriptor(&self) -> Vec<u8> {
        let mut desc = vec![0u8; EXT4_GROUP_DESC_SIZE];
        LittleEndian::write_u32(&mut desc[0x00..], 3);
        LittleEndian::write_u32(&mut desc[0x04..], 4);
        LittleEndian::write_u32(&mut desc[0x08..], self.inode_table as u32);
        LittleEndian::write_u16(&mut desc[0x0C..], (self.blocks_count - self.next_block) as u16);
        LittleEndian::write_u16(&mut desc[0x0E..], (Self::INODES as usize - self.inodes.len()) as u16);
        let dirs = self
            .inodes
            .keys()
            .filter(|&&ino| self.de_type(ino) == EXT4_DE_DIR)
            .count();
        LittleEndian::write_u16(&mut desc[0x10..], dirs as u16);

        let csum = if self.metadata_csum {
            compute_crc32c(fs_seed(&TEST_UUID), 0, &desc)
        } else if self.ro_compat & EXT4_FEATURE_RO_COMPAT_GDT_CSUM != 0 {
            compute_crc16(&TEST_UUID, 0, &desc)
        } else {
            None
        };
        if let Some(csum) = csum {
            LittleEndian::write_u16(&mut desc[GROUP_DESC_CSUM_OFFSET..], csum);
        }
        desc
    }

    /// 生成完整镜像
    pub(crate) fn finish(mut self) -> Vec<u8> {
        self.render_dirs();
        self.seal_metadata_blocks();

        let table = self.inode_table as usize * self.block_size as usize;
        let inodes: Vec<(u32, Vec<u8>)> = self
            .inodes
            .iter()
            .map(|(&ino, core)| (ino, self.full_inode(ino, core)))
            .collect();
        for (ino, mut raw) in inodes {
            if self.metadata_csum {
                crate::inode::checksum::set_checksum(self.seed_of(ino), &mut raw);
            }
            let start = table + (ino as usize - 1) * self.inode_size as usize;
            self.image[start..start + raw.len()].copy_from_slice(&raw);
        }

        let sb = self.superblock();
        let gdt_block = EXT4_SUPERBLOCK_OFFSET / self.block_size as u64 + 1;
        let desc = self.group_descriptor();
        let sb_start = EXT4_SUPERBLOCK_OFFSET as usize;
        self.image[sb_start..sb_start + sb.len()].copy_from_slice(&sb);
        self.write_block(gdt_block, &desc);

        if let Some(block) = self.backup_superblock {
            self.write_block(block, &sb);
            self.write_block(block + 1, &desc);
        }
        self.image
    }

    /// 生成镜像并读出 superblock 和描述符表
    pub(crate) fn open_parts(self) -> TestFs {
        Self::open_bytes(self.finish())
    }

    pub(crate) fn open_bytes(bytes: Vec<u8>) -> TestFs {
        let mut bdev = BlockDev::new(bytes, 0);
        let sb = read_superblock(&bdev, EXT4_SUPERBLOCK_OFFSET, ChecksumPolicy::Report)
            .expect("test superblock");
        bdev.set_geometry(sb.block_size(), sb.blocks_count());
        let sb_block = EXT4_SUPERBLOCK_OFFSET / sb.block_size() as u64;
        let groups = GroupTable::load(&bdev, &sb, sb_block, ChecksumPolicy::Report)
            .expect("test group descriptors");
        TestFs { bdev, sb, groups }
    }
}

fn pointer_bytes(words: &[u32; EXT4_INODE_BLOCKS]) -> [u8; EXT4_INODE_BLOCK_BYTES] {
    let mut out = [0u8; EXT4_INODE_BLOCK_BYTES];
    for (i, word) in words.iter().enumerate() {
        LittleEndian::write_u32(&mut out[i * 4..], *word);
    }
    out
}

fn put_dir_record(block: &mut [u8], pos: usize, inode: u32, rec_len: u16, name: &[u8], file_type: u8) {
    LittleEndian::write_u32(&mut block[pos..], inode);
    LittleEndian::write_u16(&mut block[pos + 4..], rec_len);
    block[pos + 6] = name.len() as u8;
    block[pos + 7] = file_type;
    block[pos + 8..pos + 8 + name.len()].copy_from_slice(name);
}

/// 写一个 xattr 条目，返回下一个条目的位置
fn put_xattr_entry(buf: &mut [u8], pos: usize, index: u8, name: &[u8], value_offs: u16, value: &[u8]) -> usize {
    buf[pos] = name.len() as u8;
    buf[pos + 1] = index;
    LittleEndian::write_u16(&mut buf[pos + 2..], value_offs);
    LittleEndian::write_u32(&mut buf[pos + 4..], 0);
    LittleEndian::write_u32(&mut buf[pos + 8..], value.len() as u32);
    LittleEndian::write_u32(&mut buf[pos + 12..], entry_hash(name, value, false));
    buf[pos + 16..pos + 16 + name.len()].copy_from_slice(name);
    pos + pad4(EXT4_XATTR_ENTRY_SIZE + name.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_layout() {
        let mut image = ImageBuilder::new(1024, 64);
        image.metadata_csum();
        image.add_root_dir(&[("a", 12)]);
        image.add_file(12, b"abc");
        let fs = image.open_parts();

        assert_eq!(fs.sb.inodes_count(), 32);
        assert_eq!(fs.sb.checksum_status(), crate::checksum::ChecksumStatus::Valid);
        let desc = fs.groups.get(0).unwrap();
        assert_eq!(desc.inode_table(), ImageBuilder::INODE_TABLE_BLOCK);
        assert!(!desc.checksum_status().is_mismatch());
    }
}
