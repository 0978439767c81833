//! 卷：打开一次，之后只读访问

use super::file_entry::FileEntry;
use super::options::{SuperblockLocation, VolumeOptions};
use crate::block::{BlockDev, BlockReader};
use crate::block_group::{GroupDescriptor, GroupTable};
use crate::consts::EXT4_ROOT_INODE;
use crate::dir::DirEntry;
use crate::error::{Error, ErrorKind, Result};
use crate::inode::{read_inode, Inode};
use crate::superblock::{read_superblock, FormatVersion, Superblock};

/// 已打开的 ext2/3/4 卷
///
/// superblock 和块组描述符表在 [`Volume::open`] 时读取一次，之后不可变；
/// 所有方法只需要 `&self`，读取器本身支持并发读取时卷也可以在线程间共享。
///
/// # 示例
///
/// ```rust,ignore
/// use extfs_core::{Volume, FileReader};
///
/// let volume = Volume::open(FileReader::open("disk.img")?)?;
/// let entry = volume.get_file_entry_by_path("/etc/hostname")?;
/// let data = entry.read(0, entry.size() as usize)?;
/// ```
pub struct Volume<R> {
    bdev: BlockDev<R>,
    sb: Superblock,
    groups: GroupTable,
    options: VolumeOptions,
}

impl<R> core::fmt::Debug for Volume<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Volume")
            .field("block_size", &self.sb.block_size())
            .field("blocks_count", &self.sb.blocks_count())
            .field("groups", &self.groups.len())
            .field("options", &self.options)
            .finish()
    }
}

impl<R: BlockReader> Volume<R> {
    /// 使用默认配置打开卷
    pub fn open(reader: R) -> Result<Self> {
        Self::open_with_options(reader, VolumeOptions::default())
    }

    /// 打开卷
    ///
    /// 依次解析 superblock 和块组描述符表，任何一步失败都直接返回。
    pub fn open_with_options(reader: R, options: VolumeOptions) -> Result<Self> {
        let policy = options.checksum_policy;
        let mut bdev = BlockDev::new(reader, options.partition_offset);

        let sb_offset = options.superblock.byte_offset();
        let sb = read_superblock(&bdev, sb_offset, policy)?;

        if let SuperblockLocation::Backup { block_size, .. } = options.superblock {
            if block_size != sb.block_size() {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "Backup superblock block size does not match",
                )
                .with_mismatch(sb.block_size() as u64, block_size as u64));
            }
        }

        bdev.set_geometry(sb.block_size(), sb.blocks_count());
        let sb_block = sb_offset / sb.block_size() as u64;
        let groups = GroupTable::load(&bdev, &sb, sb_block, policy)?;

        log::debug!(
            "[VOLUME] opened: block_size={} blocks={} inodes={} groups={} version={:?}",
            sb.block_size(),
            sb.blocks_count(),
            sb.inodes_count(),
            groups.len(),
            sb.format_version()
        );

        Ok(Self {
            bdev,
            sb,
            groups,
            options,
        })
    }

    /// superblock
    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    /// 打开时使用的配置
    pub fn options(&self) -> &VolumeOptions {
        &self.options
    }

    /// 块组数
    pub fn group_count(&self) -> u32 {
        self.groups.len() as u32
    }

    /// 块组描述符
    pub fn group_descriptor(&self, group: u32) -> Result<&GroupDescriptor> {
        self.groups.get(group)
    }

    /// 块组描述符表
    pub fn groups(&self) -> &GroupTable {
        &self.groups
    }

    /// 块大小
    pub fn block_size(&self) -> u32 {
        self.sb.block_size()
    }

    /// 文件系统 UUID
    pub fn uuid(&self) -> &[u8; 16] {
        self.sb.uuid()
    }

    /// 卷标
    pub fn label(&self) -> &[u8] {
        self.sb.volume_name()
    }

    /// 格式版本
    pub fn format_version(&self) -> FormatVersion {
        self.sb.format_version()
    }

    /// 块设备
    pub fn block_dev(&self) -> &BlockDev<R> {
        &self.bdev
    }

    /// 读取 inode
    pub fn read_inode(&self, number: u32) -> Result<Inode> {
        read_inode(
            &self.bdev,
            &self.sb,
            &self.groups,
            number,
            self.options.checksum_policy,
        )
    }

    /// 根目录
    pub fn root_directory(&self) -> Result<FileEntry<'_, R>> {
        self.get_file_entry_by_inode_number(EXT4_ROOT_INODE)
    }

    /// 按 inode 号打开文件条目
    pub fn get_file_entry_by_inode_number(&self, number: u32) -> Result<FileEntry<'_, R>> {
        let inode = self.read_inode(number)?;
        Ok(FileEntry::new(self, inode, None))
    }

    /// 由目录项打开文件条目，保留目录项中的名字
    pub fn get_file_entry_by_dir_entry(&self, entry: &DirEntry) -> Result<FileEntry<'_, R>> {
        let inode = self.read_inode(entry.inode)?;
        Ok(FileEntry::new(self, inode, Some(entry.name.clone())))
    }

    /// 按路径打开文件条目
    ///
    /// 路径以 `/` 分隔，空分量被忽略，不跟随符号链接。中间分量不存在或
    /// 不是目录时返回 `NotFound`。
    pub fn get_file_entry_by_path(&self, path: impl AsRef<[u8]>) -> Result<FileEntry<'_, R>> {
        let mut current = self.root_directory()?;

        for component in path.as_ref().split(|&b| b == b'/') {
            if component.is_empty() {
                continue;
            }
            if !current.is_dir() {
                return Err(Error::new(ErrorKind::NotFound, "Path component is not a directory")
                    .with_mismatch(0, current.number() as u64));
            }
            current = match current.get_sub_file_entry_by_name(component)? {
                Some(child) => child,
                None => {
                    log::debug!(
                        "[VOLUME] {:?} not found in inode {}",
                        alloc::string::String::from_utf8_lossy(component),
                        current.number()
                    );
                    return Err(Error::new(ErrorKind::NotFound, "Path component not found"));
                }
            };
        }

        Ok(current)
    }

    /// 发往读取器的请求数
    pub fn read_count(&self) -> u64 {
        self.bdev.read_count()
    }

    /// 关闭卷并取回读取器
    pub fn into_reader(self) -> R {
        self.bdev.into_reader()
    }
}
