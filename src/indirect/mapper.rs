//! 间接块映射器实现
//!
//! 将文件的逻辑块号映射到物理块号，支持直接块和多级间接块。

use crate::block::{BlockDev, BlockReader};
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use crate::extent::Extent;
use crate::inode::Inode;
use crate::mapping::{BlockMap, BlockMapping};
use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// 间接块映射器
///
/// 持有 inode 中的 15 个块指针，按需读取间接块。
#[derive(Debug, Clone)]
pub struct IndirectBlockMapper {
    /// i_block 中的块指针
    pointers: [u32; EXT4_INODE_BLOCKS],

    /// 每个间接块可以容纳的指针数量 (block_size / 4)
    blocks_per_indirect: u32,

    /// 每个间接层级的块数限制
    ///
    /// - limits[0] = 12 (直接块)
    /// - limits[1] = 12 + blocks_per_indirect (一级间接)
    /// - limits[2] = limits[1] + blocks_per_indirect^2 (二级间接)
    /// - limits[3] = limits[2] + blocks_per_indirect^3 (三级间接)
    block_limits: [u64; 4],

    /// 每个层级可以寻址的块数
    ///
    /// - blocks_per_level[0] = 1
    /// - blocks_per_level[1] = blocks_per_indirect
    /// - blocks_per_level[2] = blocks_per_indirect^2
    /// - blocks_per_level[3] = blocks_per_indirect^3
    blocks_per_level: [u64; 4],
}

impl IndirectBlockMapper {
    /// 创建新的间接块映射器
    ///
    /// # 参数
    ///
    /// - `pointers`: inode 中的 15 个块指针
    /// - `block_size`: 文件系统块大小（字节）
    pub fn new(pointers: [u32; EXT4_INODE_BLOCKS], block_size: u32) -> Self {
        let blocks_per_indirect = block_size / 4;

        let mut block_limits = [0u64; 4];
        let mut blocks_per_level = [0u64; 4];
        block_limits[0] = EXT4_INODE_DIRECT_BLOCKS as u64;
        blocks_per_level[0] = 1;
        for i in 1..4 {
            blocks_per_level[i] = blocks_per_level[i - 1] * blocks_per_indirect as u64;
            block_limits[i] = block_limits[i - 1] + blocks_per_level[i];
        }

        Self {
            pointers,
            blocks_per_indirect,
            block_limits,
            blocks_per_level,
        }
    }

    /// 从 inode 的 i_block 创建
    pub fn for_inode(inode: &Inode, block_size: u32) -> Self {
        let mut pointers = [0u32; EXT4_INODE_BLOCKS];
        for (i, ptr) in pointers.iter_mut().enumerate() {
            *ptr = inode.block_word(i);
        }
        Self::new(pointers, block_size)
    }

    /// 可寻址的最大逻辑块数
    pub fn max_blocks(&self) -> u64 {
        self.block_limits[3]
    }

    /// 确定逻辑块号对应的间接层级（0 为直接块），超出三级间接范围时返回 `None`
    fn indirect_level(&self, logical_block: u64) -> Option<usize> {
        (0..4).find(|&level| logical_block < self.block_limits[level])
    }

    /// 从间接块中读取指定位置的块指针
    ///
    /// 块号在读取前由 [`BlockDev::read_block`] 检查，越界返回 `CorruptStructure`。
    fn read_block_pointer<R: BlockReader>(
        &self,
        bdev: &BlockDev<R>,
        indirect_block: u64,
        index: u64,
    ) -> Result<u32> {
        let mut ptr = [0u8; 4];
        let offset = bdev.block_offset(indirect_block)? + index * 4;
        bdev.read_bytes(offset, &mut ptr)?;
        Ok(LittleEndian::read_u32(&ptr))
    }
}

impl BlockMap for IndirectBlockMapper {
    /// 将逻辑块号映射到物理块号
    ///
    /// 任何一级指针为 0 都表示空洞；超出三级间接范围的逻辑块同样按空洞处理。
    fn map_logical_block<R: BlockReader>(
        &self,
        bdev: &BlockDev<R>,
        logical_block: u64,
    ) -> Result<BlockMapping> {
        let Some(level) = self.indirect_level(logical_block) else {
            return Ok(BlockMapping::Hole);
        };

        let mut block = if level == 0 {
            self.pointers[logical_block as usize]
        } else {
            self.pointers[EXT4_INODE_DIRECT_BLOCKS + level - 1]
        };
        let mut remaining = logical_block - if level == 0 { 0 } else { self.block_limits[level - 1] };

        // 逐级下降：第 depth 层的索引 = remaining / blocks_per_level[depth]
        for depth in (0..level).rev() {
            if block == 0 {
                return Ok(BlockMapping::Hole);
            }
            let index = remaining / self.blocks_per_level[depth];
            remaining %= self.blocks_per_level[depth];
            block = self.read_block_pointer(bdev, block as u64, index)?;
        }

        log::trace!(
            "[INDIRECT] logical={} level={} -> physical={}",
            logical_block,
            level,
            block
        );

        if block == 0 {
            return Ok(BlockMapping::Hole);
        }
        bdev.check_block(block as u64)?;
        Ok(BlockMapping::Mapped {
            physical: block as u64,
            uninitialized: false,
        })
    }

    /// 把前 `block_count` 个逻辑块中物理上连续的部分合并成区间
    ///
    /// 按指针树结构遍历：为 0 的指针整棵子树一次跳过，每个间接块只读取一次。
    /// 同一个间接块被引用两次视为损坏。
    fn extents<R: BlockReader>(&self, bdev: &BlockDev<R>, block_count: u64) -> Result<Vec<Extent>> {
        let mut result: Vec<Extent> = Vec::new();
        let end = block_count.min(self.max_blocks());

        for (logical, &ptr) in self.pointers[..EXT4_INODE_DIRECT_BLOCKS].iter().enumerate() {
            if logical as u64 >= end {
                break;
            }
            if ptr != 0 {
                bdev.check_block(ptr as u64)?;
                push_block(&mut result, logical as u64, ptr as u64)?;
            }
        }

        // (间接块, 层级, 子树起始逻辑块)；倒序入栈，一级间接先出栈
        let mut stack: Vec<(u32, usize, u64)> = Vec::new();
        for level in (1..4).rev() {
            let ptr = self.pointers[EXT4_INODE_DIRECT_BLOCKS + level - 1];
            let base = self.block_limits[level - 1];
            if ptr != 0 && base < end {
                stack.push((ptr, level, base));
            }
        }

        let mut visited = BTreeSet::new();
        while let Some((block, level, base)) = stack.pop() {
            if !visited.insert(block) {
                return Err(Error::new(
                    ErrorKind::CorruptStructure,
                    "Indirect block referenced twice",
                )
                .with_offset((block as u64).saturating_mul(bdev.block_size() as u64))
                .with_mismatch(level as u64, block as u64));
            }
            let data = bdev.read_block(block as u64)?;
            let span = self.blocks_per_level[level - 1];

            if level == 1 {
                for (index, raw) in data.chunks_exact(4).enumerate() {
                    let logical = base + index as u64;
                    if logical >= end {
                        break;
                    }
                    let ptr = LittleEndian::read_u32(raw);
                    if ptr != 0 {
                        bdev.check_block(ptr as u64)?;
                        push_block(&mut result, logical, ptr as u64)?;
                    }
                }
            } else {
                // 子树倒序入栈，保证按逻辑顺序出栈
                for (index, raw) in data.chunks_exact(4).enumerate().rev() {
                    let child_base = base + index as u64 * span;
                    let ptr = LittleEndian::read_u32(raw);
                    if ptr != 0 && child_base < end {
                        stack.push((ptr, level - 1, child_base));
                    }
                }
            }
        }

        log::debug!("[INDIRECT] {} runs over {} blocks", result.len(), end);
        Ok(result)
    }
}

/// 追加一个映射块，与上一个区间物理连续时合并
fn push_block(runs: &mut Vec<Extent>, logical: u64, physical: u64) -> Result<()> {
    if let Some(last) = runs.last_mut() {
        if last.logical_end() == logical && last.physical + last.length as u64 == physical {
            last.length += 1;
            return Ok(());
        }
    }
    let start = u32::try_from(logical).map_err(|_| {
        Error::new(ErrorKind::CorruptStructure, "Mapped logical block exceeds 32 bits")
            .with_mismatch(u32::MAX as u64, logical)
    })?;
    runs.push(Extent {
        logical: start,
        length: 1,
        physical,
        uninitialized: false,
    });
    Ok(())
}
