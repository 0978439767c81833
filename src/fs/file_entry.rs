//! 文件条目
//!
//! `FileEntry` 持有解码后的 inode 和它的块映射器，借用所属的 [`Volume`]。
//! 读取按逻辑块拆分，空洞和未初始化 extent 读出全零。

use super::volume::Volume;
use crate::block::BlockReader;
use crate::checksum::ChecksumStatus;
use crate::dir::{self, DirIterator, DirReader};
use crate::error::{Error, ErrorKind, Result};
use crate::extent::Extent;
use crate::inode::{Inode, InodeFlags};
use crate::mapping::{BlockMap, BlockMapping, DataMapper};
use crate::types::{DeviceNumber, FileType, Timestamp};
use crate::xattr::{self, XattrEntry, XattrValueLocation};
use alloc::vec;
use alloc::vec::Vec;

/// 文件条目
pub struct FileEntry<'a, R> {
    volume: &'a Volume<R>,
    inode: Inode,
    mapper: DataMapper,
    name: Option<Vec<u8>>,
}

impl<R> Clone for FileEntry<'_, R> {
    fn clone(&self) -> Self {
        Self {
            volume: self.volume,
            inode: self.inode.clone(),
            mapper: self.mapper.clone(),
            name: self.name.clone(),
        }
    }
}

impl<R> core::fmt::Debug for FileEntry<'_, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FileEntry")
            .field("inode", &self.inode.number())
            .field("name", &self.name.as_deref().map(alloc::string::String::from_utf8_lossy))
            .field("size", &self.inode.size())
            .finish()
    }
}

impl<'a, R: BlockReader> FileEntry<'a, R> {
    pub(super) fn new(volume: &'a Volume<R>, inode: Inode, name: Option<Vec<u8>>) -> Self {
        let mapper = DataMapper::for_inode(&inode, volume.superblock(), volume.options().checksum_policy);
        Self {
            volume,
            inode,
            mapper,
            name,
        }
    }

    /// 所属的卷
    pub fn volume(&self) -> &'a Volume<R> {
        self.volume
    }

    /// 解码后的 inode
    pub fn inode(&self) -> &Inode {
        &self.inode
    }

    /// inode 号
    pub fn number(&self) -> u32 {
        self.inode.number()
    }

    /// 到达该条目所经过的目录项名字（按 inode 号打开时为 `None`）
    pub fn name(&self) -> Option<&[u8]> {
        self.name.as_deref()
    }

    /// 文件类型
    pub fn file_type(&self) -> FileType {
        self.inode.file_type()
    }

    /// 文件模式
    pub fn mode(&self) -> u16 {
        self.inode.mode()
    }

    /// 权限位
    pub fn permissions(&self) -> u16 {
        self.inode.permissions()
    }

    /// 用户 ID
    pub fn uid(&self) -> u32 {
        self.inode.uid()
    }

    /// 组 ID
    pub fn gid(&self) -> u32 {
        self.inode.gid()
    }

    /// 文件大小（字节）
    pub fn size(&self) -> u64 {
        self.inode.size()
    }

    /// 链接计数
    pub fn links_count(&self) -> u16 {
        self.inode.links_count()
    }

    /// 占用的 512 字节扇区数
    pub fn blocks_count(&self) -> u64 {
        self.inode.blocks_count()
    }

    /// inode 标志
    pub fn flags(&self) -> InodeFlags {
        self.inode.flags()
    }

    /// generation
    pub fn generation(&self) -> u32 {
        self.inode.generation()
    }

    /// 访问时间
    pub fn access_time(&self) -> Timestamp {
        self.inode.access_time()
    }

    /// 修改时间
    pub fn modification_time(&self) -> Timestamp {
        self.inode.modification_time()
    }

    /// 状态改变时间
    pub fn change_time(&self) -> Timestamp {
        self.inode.change_time()
    }

    /// 创建时间
    pub fn creation_time(&self) -> Option<Timestamp> {
        self.inode.creation_time()
    }

    /// 删除时间
    pub fn deletion_time(&self) -> u32 {
        self.inode.deletion_time()
    }

    /// inode 校验结果
    pub fn checksum_status(&self) -> ChecksumStatus {
        self.inode.checksum_status()
    }

    /// 设备号（仅字符/块设备）
    pub fn device_number(&self) -> Option<DeviceNumber> {
        self.inode.device_number()
    }

    /// 是否是目录
    pub fn is_dir(&self) -> bool {
        self.inode.is_dir()
    }

    /// 是否是普通文件
    pub fn is_file(&self) -> bool {
        self.inode.is_file()
    }

    /// 是否是符号链接
    pub fn is_symlink(&self) -> bool {
        self.inode.is_symlink()
    }

    /// 文件占用的逻辑块数
    pub fn block_count(&self) -> u64 {
        self.size().div_ceil(self.volume.block_size() as u64)
    }

    /// 数据是否完全存放在 inode 内（inline-data 或快速符号链接）
    fn data_in_inode(&self) -> bool {
        self.inode.has_inline_data() || self.inode.is_fast_symlink(self.volume.block_size())
    }

    /// inode 内的数据：i_block 之后接 `system.data` 的值
    fn inode_data(&self) -> Result<Vec<u8>> {
        let mut data = self.inode.block_data().to_vec();
        if self.inode.has_inline_data() {
            data.extend_from_slice(xattr::inline_data_value(&self.inode)?);
        }
        let size = self.size().min(data.len() as u64) as usize;
        if (size as u64) < self.size() {
            log::warn!(
                "[VOLUME] ino={} inline data shorter than i_size ({} < {})",
                self.number(),
                size,
                self.size()
            );
        }
        data.truncate(size);
        Ok(data)
    }

    /// 映射逻辑块
    ///
    /// 数据存放在 inode 内的文件没有块映射，返回 `InvalidInput`。
    pub fn map_logical_block(&self, logical: u64) -> Result<BlockMapping> {
        if self.data_in_inode() {
            return Err(Error::new(ErrorKind::InvalidInput, "File data is stored in the inode"));
        }
        self.mapper.map_logical_block(self.volume.block_dev(), logical)
    }

    /// 按逻辑顺序列出数据区间
    pub fn extents(&self) -> Result<Vec<Extent>> {
        if self.data_in_inode() {
            return Ok(Vec::new());
        }
        self.mapper.extents(self.volume.block_dev(), self.block_count())
    }

    /// 从 `offset` 读取到 `buf`，返回读到的字节数
    ///
    /// 只有到达文件末尾时返回值才小于 `buf.len()`。
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let size = self.size();
        if offset >= size || buf.is_empty() {
            return Ok(0);
        }
        let to_read = buf.len().min((size - offset) as usize);

        if self.data_in_inode() {
            let data = self.inode_data()?;
            let start = (offset as usize).min(data.len());
            let n = to_read.min(data.len() - start);
            buf[..n].copy_from_slice(&data[start..start + n]);
            // 声明长度超过实际内容的部分按零处理
            buf[n..to_read].fill(0);
            return Ok(to_read);
        }

        let bdev = self.volume.block_dev();
        let block_size = self.volume.block_size() as u64;
        let mut done = 0usize;

        while done < to_read {
            let pos = offset + done as u64;
            let logical = pos / block_size;
            let within = pos % block_size;
            let n = ((block_size - within) as usize).min(to_read - done);
            let out = &mut buf[done..done + n];

            match self.mapper.map_logical_block(bdev, logical)? {
                mapping if mapping.reads_as_zero() => {
                    log::trace!(
                        "[VOLUME] ino={} logical={} reads as zero ({:?})",
                        self.number(),
                        logical,
                        mapping
                    );
                    out.fill(0);
                }
                BlockMapping::Mapped { physical, .. } => {
                    bdev.read_bytes(bdev.block_offset(physical)? + within, out)?;
                }
                BlockMapping::Hole => out.fill(0),
            }
            done += n;
        }

        Ok(to_read)
    }

    /// 读取 `[offset, offset + length)`，到达文件末尾时截断
    pub fn read(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let available = self.size().saturating_sub(offset);
        let mut buf = vec![0u8; (length as u64).min(available) as usize];
        let n = self.read_at(offset, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// 读取完整内容
    pub fn read_to_end(&self) -> Result<Vec<u8>> {
        let size = usize::try_from(self.size()).map_err(|_| {
            Error::new(ErrorKind::InvalidInput, "File too large to read into memory")
        })?;
        self.read(0, size)
    }

    fn dir_reader(&self) -> Result<DirReader<'a, R>> {
        DirReader::new(
            self.volume.block_dev(),
            self.volume.superblock(),
            self.inode.clone(),
            self.volume.options().checksum_policy,
        )
    }

    /// 列出子条目（惰性，可通过 [`DirIterator::rewind`] 重启）
    ///
    /// 非目录返回 `InvalidInput`。
    pub fn list_children(&self) -> Result<DirIterator<'a, R>> {
        Ok(DirIterator::new(self.dir_reader()?))
    }

    /// 按名字打开子条目
    pub fn get_sub_file_entry_by_name(&self, name: impl AsRef<[u8]>) -> Result<Option<FileEntry<'a, R>>> {
        let reader = self.dir_reader()?;
        match dir::lookup(&reader, name.as_ref())? {
            Some(entry) => self.volume.get_file_entry_by_dir_entry(&entry).map(Some),
            None => Ok(None),
        }
    }

    /// 列出扩展属性（先 inode 内，后独立块）
    pub fn list_extended_attributes(&self) -> Result<Vec<XattrEntry>> {
        xattr::list_attributes(
            self.volume.block_dev(),
            self.volume.superblock(),
            &self.inode,
            self.volume.options().checksum_policy,
        )
    }

    /// 按完整名字查找扩展属性
    pub fn get_extended_attribute_by_name(&self, full_name: impl AsRef<[u8]>) -> Result<Option<XattrEntry>> {
        let entries = self.list_extended_attributes()?;
        Ok(xattr::find_attribute(&entries, full_name.as_ref()).cloned())
    }

    /// 读取扩展属性的原始值
    pub fn read_extended_attribute_value(&self, entry: &XattrEntry) -> Result<Vec<u8>> {
        match entry.value {
            XattrValueLocation::Inode { inode, size } => {
                let holder = self.volume.get_file_entry_by_inode_number(inode)?;
                if !holder.flags().contains(InodeFlags::EA_INODE) {
                    return Err(Error::new(
                        ErrorKind::CorruptStructure,
                        "Xattr value inode lacks EA_INODE flag",
                    )
                    .with_mismatch(inode as u64, self.number() as u64));
                }
                let value = holder.read(0, size as usize)?;
                if value.len() != size as usize {
                    return Err(Error::new(ErrorKind::CorruptStructure, "Xattr value inode too short")
                        .with_mismatch(size as u64, value.len() as u64));
                }
                Ok(value)
            }
            _ => xattr::read_value(self.volume.block_dev(), &self.inode, entry),
        }
    }

    /// 符号链接目标
    ///
    /// 短目标直接存放在 i_block 中，长目标存放在数据块或 inline-data 中。
    pub fn symlink_target(&self) -> Result<Vec<u8>> {
        if !self.is_symlink() {
            return Err(Error::new(ErrorKind::InvalidInput, "Not a symlink"));
        }
        if self.size() > self.volume.block_size() as u64 {
            return Err(Error::new(ErrorKind::CorruptStructure, "Symlink target too long")
                .with_mismatch(self.volume.block_size() as u64, self.size()));
        }
        if self.inode.is_fast_symlink(self.volume.block_size()) {
            let size = self.size() as usize;
            return Ok(self.inode.block_data()[..size].to_vec());
        }
        self.read_to_end()
    }
}
