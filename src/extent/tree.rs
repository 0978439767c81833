//! Extent 树解析和块映射

use super::node::{Extent, ExtentEntries, ExtentNode};
use crate::block::{BlockDev, BlockReader};
use crate::checksum::{self, ChecksumKind, ChecksumPolicy};
use crate::consts::EXT4_INODE_BLOCK_BYTES;
use crate::error::{Error, ErrorKind, Result};
use crate::inode::Inode;
use crate::mapping::{BlockMap, BlockMapping};
use crate::superblock::Superblock;
use alloc::collections::BTreeSet;
use alloc::vec::Vec;

/// Extent 树
///
/// 根节点是 inode 的 i_block（60 字节，最多 4 个条目），其余节点各占一个块。
/// 遍历是显式循环：每下降一层记录访问过的物理块，再次访问同一个块即视为
/// 环路；深度由 [`ExtentNode::parse`] 强制逐层减一。
#[derive(Debug, Clone)]
pub struct ExtentTree {
    root: [u8; EXT4_INODE_BLOCK_BYTES],
    inode: u32,
    generation: u32,
    checksum_seed: Option<u32>,
    policy: ChecksumPolicy,
}

impl ExtentTree {
    /// 为 inode 创建 extent 树遍历器
    ///
    /// metadata_csum 启用且策略要求计算时，才会校验非根节点的 tail。
    pub fn new(inode: &Inode, sb: &Superblock, policy: ChecksumPolicy) -> Self {
        let mut root = [0u8; EXT4_INODE_BLOCK_BYTES];
        root.copy_from_slice(inode.block_data());
        Self {
            root,
            inode: inode.number(),
            generation: inode.generation(),
            checksum_seed: (sb.has_metadata_csum() && policy.computes())
                .then(|| sb.checksum_seed()),
            policy,
        }
    }

    /// 解析根节点
    pub fn root_node(&self, bdev_blocks: u64) -> Result<ExtentNode> {
        ExtentNode::parse(&self.root, None, bdev_blocks)
    }

    /// 读取并验证非根节点
    fn read_node<R: BlockReader>(
        &self,
        bdev: &BlockDev<R>,
        block: u64,
        expected_depth: u16,
    ) -> Result<ExtentNode> {
        let offset = bdev.block_offset(block)?;
        let data = bdev.read_block(block)?;
        let node = ExtentNode::parse(&data, Some(expected_depth), bdev.blocks_count())
            .map_err(|e| e.with_offset(offset))?;

        if let Some(seed) = self.checksum_seed {
            let status = checksum::evaluate(
                ChecksumKind::ExtentBlock {
                    inode: self.inode,
                    generation: self.generation,
                },
                &data,
                seed,
            );
            self.policy
                .enforce(status, "Extent block checksum mismatch", offset)?;
        }

        log::trace!(
            "[EXTENT] ino={} node block={} depth={} entries={}",
            self.inode,
            block,
            node.header.depth,
            node.header.entries
        );
        Ok(node)
    }

    /// 查找覆盖逻辑块的 extent
    ///
    /// 每一层二分查找逻辑起点不大于目标的最后一个条目。没有 extent 覆盖目标
    /// 时返回 `None`（空洞）。
    pub fn find_extent<R: BlockReader>(
        &self,
        bdev: &BlockDev<R>,
        logical: u64,
    ) -> Result<Option<Extent>> {
        if logical > u32::MAX as u64 {
            return Ok(None);
        }

        let mut node = self.root_node(bdev.blocks_count())?;
        let mut visited = BTreeSet::new();

        loop {
            let (child, depth) = match &node.entries {
                ExtentEntries::Leaf(extents) => {
                    let pos = extents.partition_point(|e| e.logical as u64 <= logical);
                    let found = pos
                        .checked_sub(1)
                        .map(|i| extents[i])
                        .filter(|e| e.contains(logical));
                    return Ok(found);
                }
                ExtentEntries::Index(indexes) => {
                    // 目标在第一个索引之前时仍然下降到第一个子树
                    let pos = indexes
                        .partition_point(|ix| ix.logical as u64 <= logical)
                        .max(1)
                        - 1;
                    (indexes[pos].child, node.header.depth - 1)
                }
            };

            if !visited.insert(child) {
                return Err(Error::new(ErrorKind::CorruptStructure, "Extent tree cycle detected")
                    .with_offset(child.saturating_mul(bdev.block_size() as u64)));
            }
            node = self.read_node(bdev, child, depth)?;
        }
    }

    /// 按逻辑顺序枚举所有叶子 extent
    ///
    /// 深度优先的显式栈遍历，整棵树共享一个访问集合：任何物理块被引用两次都
    /// 视为损坏。
    pub fn extents<R: BlockReader>(&self, bdev: &BlockDev<R>) -> Result<Vec<Extent>> {
        let root = self.root_node(bdev.blocks_count())?;
        let mut result = Vec::new();
        let mut visited = BTreeSet::new();
        let mut stack: Vec<(ExtentNode, usize)> = Vec::new();
        stack.push((root, 0));

        while let Some((node, next)) = stack.pop() {
            let child = match &node.entries {
                ExtentEntries::Leaf(extents) => {
                    result.extend_from_slice(extents);
                    continue;
                }
                ExtentEntries::Index(indexes) => match indexes.get(next) {
                    Some(index) => index.child,
                    None => continue,
                },
            };

            if !visited.insert(child) {
                return Err(Error::new(ErrorKind::CorruptStructure, "Extent tree cycle detected")
                    .with_offset(child.saturating_mul(bdev.block_size() as u64)));
            }
            let depth = node.header.depth - 1;
            stack.push((node, next + 1));
            let child_node = self.read_node(bdev, child, depth)?;
            stack.push((child_node, 0));
        }

        log::debug!("[EXTENT] ino={} {} extents", self.inode, result.len());
        Ok(result)
    }
}

impl BlockMap for ExtentTree {
    fn map_logical_block<R: BlockReader>(
        &self,
        bdev: &BlockDev<R>,
        logical: u64,
    ) -> Result<BlockMapping> {
        Ok(match self.find_extent(bdev, logical)? {
            Some(extent) => BlockMapping::Mapped {
                physical: extent.physical + (logical - extent.logical as u64),
                uninitialized: extent.uninitialized,
            },
            None => BlockMapping::Hole,
        })
    }

    fn extents<R: BlockReader>(&self, bdev: &BlockDev<R>, _block_count: u64) -> Result<Vec<Extent>> {
        ExtentTree::extents(self, bdev)
    }
}
