//! 按名字查找目录项
//!
//! 查找分两级：带索引的目录先走 HTree，索引结构校验失败（格式、损坏、
//! 校验和）时记录警告并退回线性扫描。线性扫描不依赖任何索引，
//! 对任何可解析的目录块都成立。

use super::entry::DirEntry;
use super::htree::HtreeLookup;
use super::iterator::DirIterator;
use super::reader::DirReader;
use crate::block::BlockReader;
use crate::error::Result;
use crate::superblock::CompatFeatures;

/// 名字查找策略
pub trait NameLookup {
    /// 在目录中查找名字，不存在时返回 `Ok(None)`
    fn find<R: BlockReader>(&self, reader: &DirReader<'_, R>, name: &[u8]) -> Result<Option<DirEntry>>;
}

/// HTree 索引查找
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedLookup;

impl NameLookup for IndexedLookup {
    fn find<R: BlockReader>(&self, reader: &DirReader<'_, R>, name: &[u8]) -> Result<Option<DirEntry>> {
        HtreeLookup::new(reader).find(name)
    }
}

/// 逐块线性扫描
///
/// 损坏的块被跳过，继续扫描后续块。
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearLookup;

impl NameLookup for LinearLookup {
    fn find<R: BlockReader>(&self, reader: &DirReader<'_, R>, name: &[u8]) -> Result<Option<DirEntry>> {
        let iter = DirIterator::new(reader.clone());
        for item in iter {
            match item {
                Ok(entry) if entry.name == name => return Ok(Some(entry)),
                Ok(_) => {}
                Err(err) if err.is_structural() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}

/// 先尝试 `primary`，结构性失败时改用 `fallback`
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackLookup<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> FallbackLookup<P, F> {
    /// 组合两个策略
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: NameLookup, F: NameLookup> NameLookup for FallbackLookup<P, F> {
    fn find<R: BlockReader>(&self, reader: &DirReader<'_, R>, name: &[u8]) -> Result<Option<DirEntry>> {
        match self.primary.find(reader, name) {
            Err(err) if err.is_structural() => {
                log::warn!(
                    "[HTREE] ino={} index unusable ({}), falling back to linear scan",
                    reader.inode().number(),
                    err
                );
                self.fallback.find(reader, name)
            }
            result => result,
        }
    }
}

/// 判断目录是否应按索引查找
///
/// 需要 DIR_INDEX 特性和 inode 的 INDEX 标志；inline 目录没有索引。
pub fn is_indexed<R: BlockReader>(reader: &DirReader<'_, R>) -> bool {
    let inode = reader.inode();
    reader
        .superblock()
        .compat_features()
        .contains(CompatFeatures::DIR_INDEX)
        && inode.has_index()
        && !inode.has_inline_data()
}

/// 在目录中查找名字
///
/// "." 和 ".." 总是位于第一个块，直接线性查找。
pub fn lookup<R: BlockReader>(reader: &DirReader<'_, R>, name: &[u8]) -> Result<Option<DirEntry>> {
    let dots = name == b"." || name == b"..";
    if is_indexed(reader) && !dots {
        FallbackLookup::new(IndexedLookup, LinearLookup).find(reader, name)
    } else {
        LinearLookup.find(reader, name)
    }
}
