//! 元数据校验和验证
//!
//! 每种带校验和的结构都有自己的字段位置和种子推导方式，具体算法分别放在
//! 对应模块里（`superblock::checksum`、`block_group::checksum` 等），
//! 这里把它们收拢成无状态的 `verify(kind, raw, seed)` 函数族。
//!
//! `seed` 统一为文件系统种子（UUID 的 CRC32C，或 CSUM_SEED 特性下
//! superblock 中保存的值）；需要 inode 号和 generation 的结构由
//! [`ChecksumKind`] 携带这些参数，在内部链式推导 inode 种子。

use crate::crc::{crc32c_append, EXT4_CRC32_INIT};
use crate::error::{Error, ErrorKind, Result};
use crate::{block_group, dir, extent, inode, superblock, xattr};

/// 校验和失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumPolicy {
    /// 不计算校验和
    Ignore,
    /// 计算并记录结果，不匹配时记录警告后继续（取证模式）
    #[default]
    Report,
    /// metadata_csum 下不匹配即中止当前操作
    Strict,
}

impl ChecksumPolicy {
    /// 是否需要计算校验和
    pub fn computes(self) -> bool {
        self != ChecksumPolicy::Ignore
    }

    /// 按策略处理一次校验结果
    ///
    /// `Report` 模式下不匹配只记录警告；`Strict` 模式下转换为
    /// `ChecksumMismatch` 错误。
    pub fn enforce(self, status: ChecksumStatus, message: &'static str, offset: u64) -> Result<()> {
        match (self, status) {
            (ChecksumPolicy::Strict, _) => status.into_result(message, offset),
            (ChecksumPolicy::Report, ChecksumStatus::Mismatch { stored, computed }) => {
                log::warn!(
                    "[CSUM] {} at {:#x}: stored={:#x} computed={:#x}",
                    message,
                    offset,
                    stored,
                    computed
                );
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// 单个结构的校验结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumStatus {
    /// 未校验（特性未启用、策略为 Ignore 或结构中没有校验和字段）
    #[default]
    NotChecked,
    /// 校验通过
    Valid,
    /// 校验失败
    Mismatch {
        /// 磁盘上保存的值
        stored: u32,
        /// 根据数据计算出的值
        computed: u32,
    },
}

impl ChecksumStatus {
    /// 比较保存值与计算值
    pub fn compare(stored: u32, computed: u32) -> Self {
        if stored == computed {
            ChecksumStatus::Valid
        } else {
            ChecksumStatus::Mismatch { stored, computed }
        }
    }

    /// 是否校验失败
    pub fn is_mismatch(&self) -> bool {
        matches!(self, ChecksumStatus::Mismatch { .. })
    }

    /// 转换为 `Result`，失败时带上保存值/计算值
    pub fn into_result(self, message: &'static str, offset: u64) -> Result<()> {
        match self {
            ChecksumStatus::Mismatch { stored, computed } => Err(Error::new(
                ErrorKind::ChecksumMismatch,
                message,
            )
            .with_offset(offset)
            .with_mismatch(stored as u64, computed as u64)),
            _ => Ok(()),
        }
    }
}

/// 带校验和的结构类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    /// Superblock（种子固定为 !0）
    Superblock,
    /// 块组描述符，metadata_csum（CRC32C 低 16 位）
    GroupDescriptor {
        /// 块组号
        group: u32,
    },
    /// 块组描述符，GDT_CSUM（CRC16，直接使用 UUID）
    GroupDescriptorCrc16 {
        /// 块组号
        group: u32,
        /// 文件系统 UUID
        uuid: [u8; 16],
    },
    /// inode 记录（完整 inode_size 字节）
    Inode {
        /// inode 号
        number: u32,
        /// generation
        generation: u32,
    },
    /// extent 树非根节点块
    ExtentBlock {
        /// 所属 inode 号
        inode: u32,
        /// 所属 inode 的 generation
        generation: u32,
    },
    /// 目录叶子块（带 12 字节尾部）
    DirectoryBlock {
        /// 所属 inode 号
        inode: u32,
        /// 所属 inode 的 generation
        generation: u32,
    },
    /// HTree 索引块（带 dx_tail）
    HtreeBlock {
        /// 所属 inode 号
        inode: u32,
        /// 所属 inode 的 generation
        generation: u32,
        /// count/limit 头在块内的偏移
        count_offset: usize,
    },
    /// 扩展属性块
    XattrBlock {
        /// 物理块号
        block: u64,
    },
}

/// 由 UUID 推导文件系统校验和种子
pub fn fs_seed(uuid: &[u8; 16]) -> u32 {
    crc32c_append(EXT4_CRC32_INIT, uuid)
}

/// 由文件系统种子推导 inode 级种子（inode 号 + generation）
pub fn inode_seed(fs_seed: u32, inode: u32, generation: u32) -> u32 {
    let seed = crc32c_append(fs_seed, &inode.to_le_bytes());
    crc32c_append(seed, &generation.to_le_bytes())
}

/// 计算并比较校验和
///
/// 结构中找不到校验和字段（长度不足、目录块没有尾部等）时返回
/// `ChecksumStatus::NotChecked`。
pub fn evaluate(kind: ChecksumKind, raw: &[u8], seed: u32) -> ChecksumStatus {
    let pair = match kind {
        ChecksumKind::Superblock => superblock::checksum::compute_checksum(raw)
            .zip(superblock::checksum::stored_checksum(raw))
            .map(|(computed, stored)| (stored, computed)),
        ChecksumKind::GroupDescriptor { group } => {
            block_group::checksum::compute_crc32c(seed, group, raw)
                .zip(block_group::checksum::stored_checksum(raw))
                .map(|(computed, stored)| (stored as u32, computed as u32))
        }
        ChecksumKind::GroupDescriptorCrc16 { group, uuid } => {
            block_group::checksum::compute_crc16(&uuid, group, raw)
                .zip(block_group::checksum::stored_checksum(raw))
                .map(|(computed, stored)| (stored as u32, computed as u32))
        }
        ChecksumKind::Inode { number, generation } => {
            inode::checksum::checksum_pair(inode_seed(seed, number, generation), raw)
        }
        ChecksumKind::ExtentBlock { inode, generation } => {
            extent::checksum::checksum_pair(inode_seed(seed, inode, generation), raw)
        }
        ChecksumKind::DirectoryBlock { inode, generation } => {
            dir::checksum::leaf_checksum_pair(inode_seed(seed, inode, generation), raw)
        }
        ChecksumKind::HtreeBlock {
            inode,
            generation,
            count_offset,
        } => dir::checksum::dx_checksum_pair(
            inode_seed(seed, inode, generation),
            raw,
            count_offset,
        ),
        ChecksumKind::XattrBlock { block } => xattr::checksum_pair(seed, block, raw),
    };

    match pair {
        Some((stored, computed)) => ChecksumStatus::compare(stored, computed),
        None => ChecksumStatus::NotChecked,
    }
}

/// 校验结构的校验和，只有确认一致时返回 `true`
pub fn verify(kind: ChecksumKind, raw: &[u8], seed: u32) -> bool {
    evaluate(kind, raw, seed) == ChecksumStatus::Valid
}
