//! 块设备包装器

use super::BlockReader;
use crate::consts::EXT4_MIN_BLOCK_SIZE;
use crate::error::{Error, ErrorKind, Result};
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

/// 块设备包装器
///
/// 在 [`BlockReader`] 之上提供文件系统视角的访问：
/// - 分区偏移：文件系统不一定从读取器的第 0 字节开始
/// - 按块读取：块号在发起 I/O 之前先与块总数比较，越界即视为结构损坏
/// - 读取计数：统计发往底层读取器的请求数
///
/// 所有方法都只需要 `&self`，包装器本身不持有任何可变共享状态
/// （计数器是原子的）。
pub struct BlockDev<R> {
    /// 底层读取器
    reader: R,
    /// 分区偏移（字节）
    partition_offset: u64,
    /// 文件系统块大小
    block_size: u32,
    /// 文件系统块总数
    blocks_count: u64,
    /// 读取次数
    read_count: AtomicU64,
}

impl<R: BlockReader> BlockDev<R> {
    /// 创建新的块设备包装器
    ///
    /// 几何信息在 superblock 解析之前未知，先使用最小块大小并且不限制块号，
    /// 解析完成后通过 [`BlockDev::set_geometry`] 设置。
    pub fn new(reader: R, partition_offset: u64) -> Self {
        Self {
            reader,
            partition_offset,
            block_size: EXT4_MIN_BLOCK_SIZE,
            blocks_count: u64::MAX,
            read_count: AtomicU64::new(0),
        }
    }

    /// 设置文件系统几何信息
    pub fn set_geometry(&mut self, block_size: u32, blocks_count: u64) {
        self.block_size = block_size;
        self.blocks_count = blocks_count;
    }

    /// 获取底层读取器的引用
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// 取回底层读取器
    pub fn into_reader(self) -> R {
        self.reader
    }

    /// 块大小
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// 块总数
    pub fn blocks_count(&self) -> u64 {
        self.blocks_count
    }

    /// 分区偏移
    pub fn partition_offset(&self) -> u64 {
        self.partition_offset
    }

    /// 已发出的读取请求数
    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::Relaxed)
    }

    /// 检查块号是否在文件系统范围内
    pub fn check_block(&self, block: u64) -> Result<()> {
        if block >= self.blocks_count {
            return Err(Error::new(
                ErrorKind::CorruptStructure,
                "Block number beyond end of filesystem",
            )
            .with_offset(block.saturating_mul(self.block_size as u64))
            .with_mismatch(self.blocks_count, block));
        }
        Ok(())
    }

    /// 块号对应的字节偏移（相对于分区起点）
    ///
    /// 块号先与块总数比较；乘积溢出同样视为结构损坏。
    pub fn block_offset(&self, block: u64) -> Result<u64> {
        self.check_block(block)?;
        block.checked_mul(self.block_size as u64).ok_or(
            Error::new(ErrorKind::CorruptStructure, "Block offset overflows")
                .with_mismatch(self.blocks_count, block),
        )
    }

    /// 读取文件系统内的字节（相对于分区起点）
    ///
    /// # 参数
    ///
    /// * `offset` - 字节偏移量
    /// * `buf` - 目标缓冲区
    pub fn read_bytes(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let absolute = self.partition_offset.checked_add(offset).ok_or(
            Error::new(ErrorKind::Io, "Read offset overflows").with_offset(offset),
        )?;
        self.read_count.fetch_add(1, Ordering::Relaxed);
        self.reader.read_at(absolute, buf)
    }

    /// 读取一个完整的块
    pub fn read_block(&self, block: u64) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.block_size as usize];
        self.read_block_into(block, &mut buf)?;
        Ok(buf)
    }

    /// 读取一个块到调用方缓冲区（缓冲区长度必须等于块大小）
    pub fn read_block_into(&self, block: u64, buf: &mut [u8]) -> Result<()> {
        if buf.len() != self.block_size as usize {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Buffer length does not match block size",
            ));
        }
        let offset = self.block_offset(block)?;
        self.read_bytes(offset, buf)
    }
}
