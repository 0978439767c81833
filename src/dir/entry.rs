//! 目录项解析

use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use crate::superblock::{IncompatFeatures, Superblock};
use crate::types::FileType;
use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// 目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Inode 编号
    pub inode: u32,
    /// 文件名（原始字节，不保证是 UTF-8）
    pub name: Vec<u8>,
    /// 目录项记录的文件类型（无 FILETYPE 特性时为 `Unknown`）
    pub file_type: FileType,
    /// 记录在目录文件中的字节偏移
    pub offset: u64,
}

impl DirEntry {
    /// 文件名的有损 UTF-8 形式
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// 是否为 "." 或 ".."
    pub fn is_dot_or_dotdot(&self) -> bool {
        self.name == b"." || self.name == b".."
    }

    /// 检查是否是目录
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    /// 检查是否是普通文件
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::RegularFile
    }

    /// 检查是否是符号链接
    pub fn is_symlink(&self) -> bool {
        self.file_type == FileType::Symlink
    }
}

/// 解码磁盘上的 rec_len
///
/// 64 KiB 块无法用 16 位表示整块长度：65535 或 0 代表 65536，
/// 更大的块把高两位存放在低两位里。
pub fn rec_len_from_disk(raw: u16, block_size: u32) -> u32 {
    let len = raw as u32;
    if block_size < 65536 {
        return len;
    }
    if len == 65535 || len == 0 {
        return 65536;
    }
    (len & 65532) | ((len & 3) << 16)
}

/// 目录块中记录的位置
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordBase {
    /// 区域起点在目录文件中的偏移
    pub file_offset: u64,
    /// 区域起点在镜像中的字节偏移（未知时为 `None`）
    pub disk_offset: Option<u64>,
}

/// 目录记录解析器
///
/// 持有解析需要的文件系统参数，对块内每条记录做边界检查：
/// rec_len 至少 8 + name_len、4 字节对齐、不越过区域末尾；inode 号不超过
/// inode 总数。
#[derive(Debug, Clone, Copy)]
pub struct DirBlockParser {
    block_size: u32,
    inodes_count: u32,
    has_filetype: bool,
}

impl DirBlockParser {
    /// 从 superblock 创建解析器
    pub fn new(sb: &Superblock) -> Self {
        Self {
            block_size: sb.block_size(),
            inodes_count: sb.inodes_count(),
            has_filetype: sb.incompat_features().contains(IncompatFeatures::FILETYPE),
        }
    }

    /// 解析位于 `*pos` 的下一个有效目录项
    ///
    /// 跳过 inode 为 0 的空槽（包括校验和尾部）。遇到损坏的记录时返回一次
    /// 错误并把 `*pos` 移到区域末尾，调用方随后会得到 `None`。
    pub fn next_entry(
        &self,
        data: &[u8],
        pos: &mut usize,
        base: RecordBase,
    ) -> Option<Result<DirEntry>> {
        while *pos < data.len() {
            let start = *pos;
            match self.parse_record(data, start) {
                Ok((rec_len, entry)) => {
                    *pos = start + rec_len;
                    if let Some((inode, name, file_type)) = entry {
                        return Some(Ok(DirEntry {
                            inode,
                            name: name.to_vec(),
                            file_type,
                            offset: base.file_offset + start as u64,
                        }));
                    }
                }
                Err(err) => {
                    *pos = data.len();
                    let err = match base.disk_offset {
                        Some(disk) => err.with_offset(disk + start as u64),
                        None => err,
                    };
                    log::warn!("[DIR] {} at directory offset {}", err.message(), base.file_offset + start as u64);
                    return Some(Err(err));
                }
            }
        }
        None
    }

    /// 遍历区域内全部目录项
    pub fn entries<'d>(&'d self, data: &'d [u8], base: RecordBase) -> BlockEntries<'d> {
        BlockEntries {
            parser: self,
            data,
            pos: 0,
            base,
        }
    }

    /// 解析一条记录，返回 (rec_len, 有效目录项)
    #[allow(clippy::type_complexity)]
    fn parse_record<'d>(
        &self,
        data: &'d [u8],
        start: usize,
    ) -> Result<(usize, Option<(u32, &'d [u8], FileType)>)> {
        let corrupt = |msg| Error::new(ErrorKind::CorruptStructure, msg);

        let header = data
            .get(start..start + EXT4_DIR_ENTRY_HEADER_SIZE)
            .ok_or_else(|| corrupt("Directory entry header crosses block end"))?;
        let inode = LittleEndian::read_u32(&header[0..]);
        let rec_len = rec_len_from_disk(LittleEndian::read_u16(&header[4..]), self.block_size) as usize;
        let (name_len, file_type) = if self.has_filetype {
            (header[6] as usize, FileType::from_dir_entry(header[7]))
        } else {
            (LittleEndian::read_u16(&header[6..]) as usize, FileType::Unknown)
        };

        if rec_len < EXT4_DIR_ENTRY_HEADER_SIZE {
            return Err(corrupt("Directory entry rec_len too small")
                .with_mismatch(EXT4_DIR_ENTRY_HEADER_SIZE as u64, rec_len as u64));
        }
        if rec_len % 4 != 0 {
            return Err(corrupt("Directory entry rec_len not 4-byte aligned")
                .with_mismatch(rec_len as u64 & !3, rec_len as u64));
        }
        if start + rec_len > data.len() {
            return Err(corrupt("Directory entry crosses block end")
                .with_mismatch((data.len() - start) as u64, rec_len as u64));
        }
        if EXT4_DIR_ENTRY_HEADER_SIZE + name_len > rec_len {
            return Err(corrupt("Directory entry name longer than record")
                .with_mismatch(rec_len as u64, (EXT4_DIR_ENTRY_HEADER_SIZE + name_len) as u64));
        }

        if inode == 0 {
            return Ok((rec_len, None));
        }
        if inode > self.inodes_count {
            return Err(corrupt("Directory entry inode out of range")
                .with_mismatch(self.inodes_count as u64, inode as u64));
        }
        if name_len == 0 || name_len > EXT4_NAME_MAX {
            return Err(corrupt("Directory entry has invalid name length"));
        }

        let name_start = start + EXT4_DIR_ENTRY_HEADER_SIZE;
        let name = &data[name_start..name_start + name_len];
        Ok((rec_len, Some((inode, name, file_type))))
    }
}

/// 一个目录区域内的目录项迭代器
pub struct BlockEntries<'d> {
    parser: &'d DirBlockParser,
    data: &'d [u8],
    pos: usize,
    base: RecordBase,
}

impl Iterator for BlockEntries<'_> {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next_entry(self.data, &mut self.pos, self.base)
    }
}

/// 在一个目录块中按名字查找
///
/// 块中途损坏时返回错误，错误之前的目录项已经比较过。
pub fn find_in_block(
    parser: &DirBlockParser,
    data: &[u8],
    base: RecordBase,
    name: &[u8],
) -> Result<Option<DirEntry>> {
    for entry in parser.entries(data, base) {
        let entry = entry?;
        if entry.name == name {
            return Ok(Some(entry));
        }
    }
    Ok(None)
}
