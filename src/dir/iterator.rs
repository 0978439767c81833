//! 目录迭代器
//!
//! 按逻辑块号升序读取目录块，每次只持有一个块。只访问已映射的区间，
//! 空洞不产生任何读取，i_size 再大也不会空转；损坏的块产生一个错误项，
//! 之后从下一个块继续。inline-data 目录的内容全部在 inode 里，第一次调用
//! 时一次性解析。

use super::entry::{DirEntry, RecordBase};
use super::reader::{DirBlock, DirReader};
use crate::block::BlockReader;
use crate::error::Result;
use crate::extent::Extent;
use crate::types::FileType;
use crate::xattr;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// 目录迭代器
///
/// 惰性、可重启：[`DirIterator::rewind`] 回到第一个目录项。
pub struct DirIterator<'a, R> {
    reader: DirReader<'a, R>,
    /// 已映射的区间，第一次读取块时计算
    runs: Option<Vec<Extent>>,
    /// 当前区间
    run_index: usize,
    /// 下一个要读取的逻辑块
    next_block: u64,
    /// 正在解析的块
    current: Option<DirBlock>,
    /// 当前块内偏移
    pos: usize,
    /// inline 目录的已解析条目
    pending: VecDeque<Result<DirEntry>>,
    inline_loaded: bool,
}

impl<R> core::fmt::Debug for DirIterator<'_, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DirIterator")
            .field("reader", &self.reader)
            .field("next_block", &self.next_block)
            .field("pos", &self.pos)
            .finish()
    }
}

impl<'a, R: BlockReader> DirIterator<'a, R> {
    /// 创建迭代器
    pub fn new(reader: DirReader<'a, R>) -> Self {
        Self {
            reader,
            runs: None,
            run_index: 0,
            next_block: 0,
            current: None,
            pos: 0,
            pending: VecDeque::new(),
            inline_loaded: false,
        }
    }

    /// 回到目录开头
    pub fn rewind(&mut self) {
        self.runs = None;
        self.run_index = 0;
        self.next_block = 0;
        self.current = None;
        self.pos = 0;
        self.pending.clear();
        self.inline_loaded = false;
    }

    /// 底层读取上下文
    pub fn reader(&self) -> &DirReader<'a, R> {
        &self.reader
    }

    /// 下一个已映射且在 i_size 之内的逻辑块
    fn next_mapped_block(&mut self) -> Option<u64> {
        let limit = self.reader.block_count();
        let runs = self.runs.as_ref()?;
        while let Some(run) = runs.get(self.run_index) {
            let logical = self.next_block.max(run.logical as u64);
            if logical >= limit {
                return None;
            }
            if logical < run.logical_end() {
                self.next_block = logical + 1;
                return Some(logical);
            }
            self.run_index += 1;
        }
        None
    }

    /// 解析 inline 目录
    ///
    /// i_block 前 4 字节是父目录 inode 号，其后 56 字节是目录项；
    /// `system.data` 属性的值是后续目录项。"." 和 ".." 在磁盘上不存在，
    /// 这里合成。
    fn load_inline(&mut self) {
        let inode = self.reader.inode();
        let block = inode.block_data();
        let parent = LittleEndian::read_u32(&block[0..4]);

        self.pending.push_back(Ok(DirEntry {
            inode: inode.number(),
            name: b".".to_vec(),
            file_type: FileType::Directory,
            offset: 0,
        }));
        self.pending.push_back(Ok(DirEntry {
            inode: parent,
            name: b"..".to_vec(),
            file_type: FileType::Directory,
            offset: 0,
        }));

        let parser = self.reader.parser();
        let first = RecordBase {
            file_offset: 4,
            disk_offset: None,
        };
        self.pending.extend(parser.entries(&block[4..], first));

        match xattr::inline_data_value(inode) {
            Ok(extra) if !extra.is_empty() => {
                let second = RecordBase {
                    file_offset: block.len() as u64,
                    disk_offset: None,
                };
                self.pending.extend(parser.entries(extra, second));
            }
            Ok(_) => {}
            Err(err) => self.pending.push_back(Err(err)),
        }

        log::debug!(
            "[DIR] ino={} inline directory, {} records",
            inode.number(),
            self.pending.len()
        );
    }
}

impl<R: BlockReader> Iterator for DirIterator<'_, R> {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.inode().has_inline_data() {
            if !self.inline_loaded {
                self.inline_loaded = true;
                self.load_inline();
            }
            return self.pending.pop_front();
        }

        loop {
            if let Some(block) = &self.current {
                if let Some(item) = self.reader.parser().next_entry(&block.data, &mut self.pos, block.base()) {
                    return Some(item);
                }
                self.current = None;
            }

            if self.runs.is_none() {
                match self.reader.mapped_runs() {
                    Ok(runs) => self.runs = Some(runs),
                    Err(err) => {
                        self.runs = Some(Vec::new());
                        return Some(Err(err));
                    }
                }
            }
            let logical = self.next_mapped_block()?;

            match self.reader.read_block(logical) {
                Ok(Some(block)) => {
                    self.current = Some(block);
                    self.pos = 0;
                }
                Ok(None) => {
                    log::trace!("[DIR] skipping hole at logical block {}", logical);
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// 读取目录中的全部有效条目
///
/// 损坏的块被跳过（已记录警告），只有 I/O 等非结构性错误会中止。
pub fn read_dir<R: BlockReader>(reader: DirReader<'_, R>) -> Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    for item in DirIterator::new(reader) {
        match item {
            Ok(entry) => entries.push(entry),
            Err(err) if err.is_structural() => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::ChecksumPolicy;
    use crate::consts::*;
    use crate::dir::entry::tests::put_record;
    use crate::error::ErrorKind;
    use crate::testing::{ImageBuilder, TestFs};

    fn reader(fs: &TestFs, ino: u32) -> DirReader<'_, Vec<u8>> {
        let inode =
            crate::inode::read_inode(&fs.bdev, &fs.sb, &fs.groups, ino, ChecksumPolicy::Report)
                .unwrap();
        DirReader::new(&fs.bdev, &fs.sb, inode, ChecksumPolicy::Report).unwrap()
    }

    fn names(items: &[Result<DirEntry>]) -> Vec<Vec<u8>> {
        items
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|e| e.name.clone())
            .collect()
    }

    #[test]
    fn test_lists_root_and_rewinds() {
        let mut image = ImageBuilder::new(1024, 128);
        image.add_root_dir(&[("hello.txt", 12), ("notes", 13)]);
        image.add_file(12, b"hello world");
        image.add_file(13, b"");
        let fs = image.open_parts();

        let mut iter = DirIterator::new(reader(&fs, 2));
        assert!(alloc::format!("{:?}", iter).starts_with("DirIterator"));
        let first: Vec<Result<DirEntry>> = iter.by_ref().collect();
        assert_eq!(
            names(&first),
            [b".".to_vec(), b"..".to_vec(), b"hello.txt".to_vec(), b"notes".to_vec()]
        );
        assert!(iter.next().is_none());

        iter.rewind();
        let second: Vec<Result<DirEntry>> = iter.collect();
        assert_eq!(names(&first), names(&second));
    }

    #[test]
    fn test_corrupt_block_then_resume() {
        let mut image = ImageBuilder::new(1024, 128);
        let mut good = alloc::vec![0u8; 1024];
        put_record(&mut good, 0, 2, 12, b".", EXT4_DE_DIR);
        put_record(&mut good, 12, 2, 1012, b"..", EXT4_DE_DIR);
        let mut bad = alloc::vec![0u8; 1024];
        put_record(&mut bad, 0, 12, 6, b"x", EXT4_DE_REG_FILE);
        let mut tail = alloc::vec![0u8; 1024];
        put_record(&mut tail, 0, 13, 1024, b"after", EXT4_DE_REG_FILE);
        image.add_dir_blocks(2, &[good, bad, tail]);
        let fs = image.open_parts();

        let items: Vec<Result<DirEntry>> = DirIterator::new(reader(&fs, 2)).collect();
        assert_eq!(items.len(), 4);
        assert_eq!(items[2].as_ref().unwrap_err().kind(), ErrorKind::CorruptStructure);
        assert_eq!(items[3].as_ref().unwrap().name, b"after");

        let entries = read_dir(reader(&fs, 2)).unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_skips_holes() {
        let mut image = ImageBuilder::new(1024, 128);
        let mut first = alloc::vec![0u8; 1024];
        put_record(&mut first, 0, 2, 1024, b".", EXT4_DE_DIR);
        let mut third = alloc::vec![0u8; 1024];
        put_record(&mut third, 0, 12, 1024, b"late", EXT4_DE_REG_FILE);
        // 逻辑块 1 是空洞
        image.add_dir_blocks_sparse(2, &[Some(first), None, Some(third)]);
        let fs = image.open_parts();

        let entries = read_dir(reader(&fs, 2)).unwrap();
        let names: Vec<&[u8]> = entries.iter().map(|e| e.name.as_slice()).collect();
        assert_eq!(names, [&b"."[..], &b"late"[..]]);
        assert_eq!(entries[1].offset, 2048);
    }

    #[test]
    fn test_inline_directory() {
        let mut image = ImageBuilder::new(1024, 128);
        image.inode_size(256);
        let mut i_block = alloc::vec![0u8; 60];
        LittleEndian::write_u32(&mut i_block[0..], 2);
        put_record(&mut i_block, 4, 12, 56, b"inline.txt", EXT4_DE_REG_FILE);
        let mut extra = alloc::vec![0u8; 16];
        put_record(&mut extra, 0, 13, 16, b"more", EXT4_DE_REG_FILE);
        image.add_inline_dir(14, &i_block, &extra);
        let fs = image.open_parts();

        let entries = read_dir(reader(&fs, 14)).unwrap();
        let got: Vec<(&[u8], u32)> = entries.iter().map(|e| (e.name.as_slice(), e.inode)).collect();
        assert_eq!(
            got,
            [
                (&b"."[..], 14),
                (&b".."[..], 2),
                (&b"inline.txt"[..], 12),
                (&b"more"[..], 13)
            ]
        );
        assert_eq!(entries[3].offset, 60);
    }
}
