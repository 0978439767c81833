//! Extent 树节点解析与验证

use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// Extent 头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtentHeader {
    /// 有效条目数
    pub entries: u16,
    /// 可容纳的最大条目数
    pub max: u16,
    /// 节点深度（0 为叶子）
    pub depth: u16,
    /// 树的 generation（未使用）
    pub generation: u32,
}

/// 叶子节点中的 extent
///
/// 也用作逻辑区间描述：间接块映射枚举出的连续区间使用同一类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    /// 起始逻辑块
    pub logical: u32,
    /// 块数
    pub length: u32,
    /// 起始物理块（48 位）
    pub physical: u64,
    /// 是否为未初始化（预分配、未写入）区间
    pub uninitialized: bool,
}

impl Extent {
    /// 结束逻辑块（不含）
    pub fn logical_end(&self) -> u64 {
        self.logical as u64 + self.length as u64
    }

    /// 逻辑块是否落在区间内
    pub fn contains(&self, logical: u64) -> bool {
        logical >= self.logical as u64 && logical < self.logical_end()
    }
}

/// 索引节点中的条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtentIndex {
    /// 该子树覆盖的起始逻辑块
    pub logical: u32,
    /// 子节点所在物理块
    pub child: u64,
}

/// 节点条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtentEntries {
    /// 叶子节点
    Leaf(Vec<Extent>),
    /// 索引节点
    Index(Vec<ExtentIndex>),
}

/// 解析后的 extent 树节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtentNode {
    /// 节点头
    pub header: ExtentHeader,
    /// 条目
    pub entries: ExtentEntries,
}

fn corrupt(msg: &'static str) -> Error {
    Error::new(ErrorKind::CorruptStructure, msg)
}

/// 解析 extent 头
pub fn parse_header(raw: &[u8]) -> Result<ExtentHeader> {
    if raw.len() < EXT4_EXTENT_ENTRY_SIZE {
        return Err(corrupt("Extent node shorter than header"));
    }
    let magic = LittleEndian::read_u16(&raw[0..]);
    if magic != EXT4_EXTENT_MAGIC {
        return Err(Error::new(ErrorKind::InvalidFormat, "Invalid extent header magic")
            .with_mismatch(EXT4_EXTENT_MAGIC as u64, magic as u64));
    }
    Ok(ExtentHeader {
        entries: LittleEndian::read_u16(&raw[2..]),
        max: LittleEndian::read_u16(&raw[4..]),
        depth: LittleEndian::read_u16(&raw[6..]),
        generation: LittleEndian::read_u32(&raw[8..]),
    })
}

impl ExtentNode {
    /// 解析并验证节点
    ///
    /// # 参数
    ///
    /// * `raw` - 节点字节（根节点为 i_block 的 60 字节，其他为整块）
    /// * `expected_depth` - 由父节点推出的深度，根节点为 `None`
    /// * `blocks_count` - 文件系统块总数，用于检查物理块号
    ///
    /// # 检查项目
    ///
    /// 1. 魔数
    /// 2. max 不超过节点容量，entries 不超过 max
    /// 3. 深度不超过 5，且等于父节点深度减一
    /// 4. 逻辑起点严格递增；叶子 extent 互不重叠且长度非零
    /// 5. 物理块落在文件系统范围内
    pub fn parse(raw: &[u8], expected_depth: Option<u16>, blocks_count: u64) -> Result<Self> {
        let header = parse_header(raw)?;

        let capacity = (raw.len() / EXT4_EXTENT_ENTRY_SIZE).saturating_sub(1);
        if header.max as usize > capacity {
            return Err(corrupt("Extent header max exceeds node capacity")
                .with_mismatch(capacity as u64, header.max as u64));
        }
        if header.entries > header.max {
            return Err(corrupt("Extent header entries exceeds max")
                .with_mismatch(header.max as u64, header.entries as u64));
        }
        if header.depth > EXT4_EXTENT_MAX_DEPTH {
            return Err(corrupt("Extent tree depth exceeds limit")
                .with_mismatch(EXT4_EXTENT_MAX_DEPTH as u64, header.depth as u64));
        }
        if header.depth > 0 && header.entries == 0 {
            return Err(corrupt("Empty extent index node"));
        }
        if let Some(expected) = expected_depth {
            if header.depth != expected {
                return Err(corrupt("Extent node depth mismatch")
                    .with_mismatch(expected as u64, header.depth as u64));
            }
        }

        let records = (0..header.entries as usize).map(|i| {
            let off = EXT4_EXTENT_ENTRY_SIZE * (i + 1);
            &raw[off..off + EXT4_EXTENT_ENTRY_SIZE]
        });

        let entries = if header.depth == 0 {
            let mut extents: Vec<Extent> = Vec::with_capacity(header.entries as usize);
            for rec in records {
                let extent = decode_extent(rec);
                if extent.length == 0 {
                    return Err(corrupt("Zero-length extent"));
                }
                if extent.physical.saturating_add(extent.length as u64) > blocks_count {
                    return Err(corrupt("Extent maps beyond end of filesystem")
                        .with_mismatch(blocks_count, extent.physical + extent.length as u64));
                }
                if let Some(prev) = extents.last() {
                    if extent.logical <= prev.logical {
                        return Err(corrupt("Extent logical starts not ascending")
                            .with_mismatch(prev.logical as u64 + 1, extent.logical as u64));
                    }
                    if (extent.logical as u64) < prev.logical_end() {
                        return Err(corrupt("Overlapping extents")
                            .with_mismatch(prev.logical_end(), extent.logical as u64));
                    }
                }
                extents.push(extent);
            }
            ExtentEntries::Leaf(extents)
        } else {
            let mut indexes: Vec<ExtentIndex> = Vec::with_capacity(header.entries as usize);
            for rec in records {
                let index = ExtentIndex {
                    logical: LittleEndian::read_u32(&rec[0..]),
                    child: LittleEndian::read_u32(&rec[4..]) as u64
                        | (LittleEndian::read_u16(&rec[8..]) as u64) << 32,
                };
                if index.child >= blocks_count {
                    return Err(corrupt("Extent index points beyond end of filesystem")
                        .with_mismatch(blocks_count, index.child));
                }
                if let Some(prev) = indexes.last() {
                    if index.logical <= prev.logical {
                        return Err(corrupt("Extent index starts not ascending")
                            .with_mismatch(prev.logical as u64 + 1, index.logical as u64));
                    }
                }
                indexes.push(index);
            }
            ExtentEntries::Index(indexes)
        };

        Ok(Self { header, entries })
    }

    /// 是否为叶子节点
    pub fn is_leaf(&self) -> bool {
        self.header.depth == 0
    }
}

/// 解码 12 字节的 extent 记录
///
/// ee_len 大于 32768 表示未初始化，实际长度为 ee_len - 32768；
/// 恰好 32768 是已初始化的最大长度。
fn decode_extent(rec: &[u8]) -> Extent {
    let raw_len = LittleEndian::read_u16(&rec[4..]);
    let (length, uninitialized) = if raw_len > EXT4_EXT_INIT_MAX_LEN {
        (raw_len - EXT4_EXT_INIT_MAX_LEN, true)
    } else {
        (raw_len, false)
    };
    Extent {
        logical: LittleEndian::read_u32(&rec[0..]),
        length: length as u32,
        physical: LittleEndian::read_u32(&rec[8..]) as u64
            | (LittleEndian::read_u16(&rec[6..]) as u64) << 32,
        uninitialized,
    }
}
