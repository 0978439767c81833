//! 目录块读取
//!
//! `DirReader` 把目录 inode、它的块映射器和卷上下文绑在一起，按逻辑块号
//! 读出目录块并按策略校验叶子块尾部。线性遍历、HTree 查找都建立在它之上。

use super::entry::{DirBlockParser, RecordBase};
use crate::block::{BlockDev, BlockReader};
use crate::checksum::{self, ChecksumKind, ChecksumPolicy};
use crate::error::{Error, ErrorKind, Result};
use crate::extent::Extent;
use crate::inode::Inode;
use crate::mapping::{BlockMap, BlockMapping, DataMapper};
use crate::superblock::Superblock;
use alloc::vec::Vec;

/// 读出的目录块
#[derive(Debug, Clone)]
pub struct DirBlock {
    /// 逻辑块号
    pub logical: u64,
    /// 物理块号
    pub physical: u64,
    /// 块内容
    pub data: Vec<u8>,
}

impl DirBlock {
    /// 块内记录的定位信息
    pub fn base(&self) -> RecordBase {
        let block_size = self.data.len() as u64;
        RecordBase {
            file_offset: self.logical.saturating_mul(block_size),
            disk_offset: Some(self.physical.saturating_mul(block_size)),
        }
    }

    /// 块在镜像中的字节偏移
    pub fn disk_offset(&self) -> u64 {
        self.physical * self.data.len() as u64
    }
}

/// 目录读取上下文
pub struct DirReader<'a, R> {
    bdev: &'a BlockDev<R>,
    sb: &'a Superblock,
    inode: Inode,
    mapper: DataMapper,
    policy: ChecksumPolicy,
    parser: DirBlockParser,
}

impl<R> Clone for DirReader<'_, R> {
    fn clone(&self) -> Self {
        Self {
            bdev: self.bdev,
            sb: self.sb,
            inode: self.inode.clone(),
            mapper: self.mapper.clone(),
            policy: self.policy,
            parser: self.parser,
        }
    }
}

impl<R> core::fmt::Debug for DirReader<'_, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DirReader")
            .field("inode", &self.inode.number())
            .field("extent_tree", &self.mapper.is_extent_tree())
            .field("policy", &self.policy)
            .finish()
    }
}

impl<'a, R: BlockReader> DirReader<'a, R> {
    /// 为目录 inode 创建读取上下文
    ///
    /// 非目录 inode 返回 `InvalidInput`。
    pub fn new(
        bdev: &'a BlockDev<R>,
        sb: &'a Superblock,
        inode: Inode,
        policy: ChecksumPolicy,
    ) -> Result<Self> {
        if !inode.is_dir() {
            return Err(Error::new(ErrorKind::InvalidInput, "Not a directory")
                .with_mismatch(crate::consts::EXT4_INODE_MODE_DIRECTORY as u64, inode.mode() as u64));
        }
        let mapper = DataMapper::for_inode(&inode, sb, policy);
        Ok(Self {
            bdev,
            sb,
            inode,
            mapper,
            policy,
            parser: DirBlockParser::new(sb),
        })
    }

    /// 块设备
    pub fn bdev(&self) -> &'a BlockDev<R> {
        self.bdev
    }

    /// superblock
    pub fn superblock(&self) -> &'a Superblock {
        self.sb
    }

    /// 目录 inode
    pub fn inode(&self) -> &Inode {
        &self.inode
    }

    /// 校验和策略
    pub fn policy(&self) -> ChecksumPolicy {
        self.policy
    }

    /// 目录记录解析器
    pub fn parser(&self) -> &DirBlockParser {
        &self.parser
    }

    /// 目录占用的逻辑块数
    pub fn block_count(&self) -> u64 {
        let block_size = self.sb.block_size() as u64;
        self.inode.size().div_ceil(block_size)
    }

    /// 按逻辑顺序列出目录已映射的区间
    pub fn mapped_runs(&self) -> Result<Vec<Extent>> {
        self.mapper.extents(self.bdev, self.block_count())
    }

    /// 是否需要计算目录相关的校验和
    pub fn checks_metadata_csum(&self) -> bool {
        self.sb.has_metadata_csum() && self.policy.computes()
    }

    /// 读取逻辑块的原始内容，空洞返回 `None`
    pub fn read_raw_block(&self, logical: u64) -> Result<Option<DirBlock>> {
        let physical = match self.mapper.map_logical_block(self.bdev, logical)? {
            BlockMapping::Hole => return Ok(None),
            BlockMapping::Mapped { physical, .. } => physical,
        };
        let data = self.bdev.read_block(physical)?;
        log::trace!(
            "[DIR] ino={} logical={} -> physical={}",
            self.inode.number(),
            logical,
            physical
        );
        Ok(Some(DirBlock {
            logical,
            physical,
            data,
        }))
    }

    /// 读取目录叶子块并校验尾部
    ///
    /// 没有校验和尾部的块（HTree 根/内部节点、未启用 metadata_csum）不做校验。
    pub fn read_block(&self, logical: u64) -> Result<Option<DirBlock>> {
        let Some(block) = self.read_raw_block(logical)? else {
            return Ok(None);
        };

        if self.checks_metadata_csum() {
            let status = checksum::evaluate(
                ChecksumKind::DirectoryBlock {
                    inode: self.inode.number(),
                    generation: self.inode.generation(),
                },
                &block.data,
                self.sb.checksum_seed(),
            );
            self.policy.enforce(
                status,
                "Directory block checksum mismatch",
                block.disk_offset(),
            )?;
        }
        Ok(Some(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ImageBuilder;

    #[test]
    fn test_rejects_regular_file() {
        let mut image = ImageBuilder::new(1024, 128);
        image.add_file(12, b"data");
        let fs = image.open_parts();
        let inode =
            crate::inode::read_inode(&fs.bdev, &fs.sb, &fs.groups, 12, ChecksumPolicy::Report)
                .unwrap();
        let err = DirReader::new(&fs.bdev, &fs.sb, inode, ChecksumPolicy::Report).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_leaf_checksum_policy() {
        let mut image = ImageBuilder::new(1024, 128);
        image.metadata_csum();
        image.add_root_dir(&[("a.txt", 12)]);
        image.add_file(12, b"x");
        let mut bytes = image.finish();
        let fs = ImageBuilder::open_bytes(bytes.clone());
        let root = crate::inode::read_inode(&fs.bdev, &fs.sb, &fs.groups, 2, ChecksumPolicy::Report)
            .unwrap();
        let reader = DirReader::new(&fs.bdev, &fs.sb, root.clone(), ChecksumPolicy::Strict).unwrap();
        assert_eq!(reader.block_count(), 1);
        let block = reader.read_block(0).unwrap().unwrap();

        // 破坏目录块中 "a.txt" 的一个字节
        let offset = block.disk_offset() as usize + 24 + 8;
        bytes[offset] ^= 0x20;
        let fs = ImageBuilder::open_bytes(bytes);
        let strict = DirReader::new(&fs.bdev, &fs.sb, root.clone(), ChecksumPolicy::Strict).unwrap();
        assert_eq!(
            strict.read_block(0).unwrap_err().kind(),
            ErrorKind::ChecksumMismatch
        );
        let report = DirReader::new(&fs.bdev, &fs.sb, root, ChecksumPolicy::Report).unwrap();
        assert!(report.read_block(0).unwrap().is_some());
    }
}
