//! 逻辑块到物理块的映射
//!
//! 间接块和 extent 树是互斥的两种布局，由 inode 的 EXTENTS 标志在构造时
//! 一次性选定，之后统一通过 [`BlockMap`] 访问。

use crate::block::{BlockDev, BlockReader};
use crate::checksum::ChecksumPolicy;
use crate::error::Result;
use crate::extent::{Extent, ExtentTree};
use crate::indirect::IndirectBlockMapper;
use crate::inode::Inode;
use crate::superblock::Superblock;
use alloc::vec::Vec;

/// 单个逻辑块的映射结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMapping {
    /// 空洞：没有物理块，按全零读取
    Hole,
    /// 映射到物理块
    Mapped {
        /// 物理块号
        physical: u64,
        /// 是否属于未初始化 extent（数据逻辑上为零）
        uninitialized: bool,
    },
}

impl BlockMapping {
    /// 是否为空洞
    pub fn is_hole(&self) -> bool {
        matches!(self, BlockMapping::Hole)
    }

    /// 物理块号（空洞时为 `None`）
    pub fn physical(&self) -> Option<u64> {
        match self {
            BlockMapping::Hole => None,
            BlockMapping::Mapped { physical, .. } => Some(*physical),
        }
    }

    /// 读取时是否应返回全零
    pub fn reads_as_zero(&self) -> bool {
        matches!(
            self,
            BlockMapping::Hole
                | BlockMapping::Mapped {
                    uninitialized: true,
                    ..
                }
        )
    }
}

/// 块映射能力
pub trait BlockMap {
    /// 将逻辑块号映射到物理块号
    ///
    /// 相同输入在镜像不变的前提下总是得到相同结果。
    fn map_logical_block<R: BlockReader>(
        &self,
        bdev: &BlockDev<R>,
        logical_block: u64,
    ) -> Result<BlockMapping>;

    /// 按逻辑顺序列出已映射的区间
    ///
    /// `block_count` 为文件的逻辑块数，extent 树忽略它并返回全部叶子 extent。
    fn extents<R: BlockReader>(&self, bdev: &BlockDev<R>, block_count: u64) -> Result<Vec<Extent>>;
}

/// 按 inode 布局选定的映射器
#[derive(Debug, Clone)]
pub enum DataMapper {
    /// 传统间接块
    Indirect(IndirectBlockMapper),
    /// extent 树
    Extent(ExtentTree),
}

impl DataMapper {
    /// 根据 inode 的 EXTENTS 标志选择映射器
    pub fn for_inode(inode: &Inode, sb: &Superblock, policy: ChecksumPolicy) -> Self {
        if inode.has_extents() {
            DataMapper::Extent(ExtentTree::new(inode, sb, policy))
        } else {
            DataMapper::Indirect(IndirectBlockMapper::for_inode(inode, sb.block_size()))
        }
    }

    /// 是否为 extent 树
    pub fn is_extent_tree(&self) -> bool {
        matches!(self, DataMapper::Extent(_))
    }
}

impl BlockMap for DataMapper {
    fn map_logical_block<R: BlockReader>(
        &self,
        bdev: &BlockDev<R>,
        logical_block: u64,
    ) -> Result<BlockMapping> {
        match self {
            DataMapper::Indirect(mapper) => mapper.map_logical_block(bdev, logical_block),
            DataMapper::Extent(tree) => tree.map_logical_block(bdev, logical_block),
        }
    }

    fn extents<R: BlockReader>(&self, bdev: &BlockDev<R>, block_count: u64) -> Result<Vec<Extent>> {
        match self {
            DataMapper::Indirect(mapper) => mapper.extents(bdev, block_count),
            DataMapper::Extent(tree) => BlockMap::extents(tree, bdev, block_count),
        }
    }
}
