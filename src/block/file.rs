//! 基于文件的块读取器

use super::BlockReader;
use crate::error::{Error, ErrorKind, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

/// 镜像文件 / 块设备节点读取器
///
/// 每次请求都在锁内完成 seek + read_exact，文件游标不会在请求之间泄漏，
/// 因此可以被多个线程共享。
pub struct FileReader {
    file: Mutex<File>,
    size: u64,
}

impl FileReader {
    /// 打开镜像文件
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)
            .map_err(|_| Error::new(ErrorKind::Io, "Failed to open image file"))?;
        Self::from_file(file)
    }

    /// 从已打开的文件创建
    pub fn from_file(mut file: File) -> Result<Self> {
        // 块设备节点的 metadata().len() 为 0，用 seek 到末尾取得大小
        let size = file
            .seek(SeekFrom::End(0))
            .map_err(|_| Error::new(ErrorKind::Io, "Failed to determine image size"))?;
        Ok(Self {
            file: Mutex::new(file),
            size,
        })
    }
}

impl BlockReader for FileReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let end = offset.checked_add(buf.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            return Err(Error::new(ErrorKind::Io, "Read beyond end of image").with_offset(offset));
        }

        let mut file = self
            .file
            .lock()
            .map_err(|_| Error::new(ErrorKind::Io, "Image file lock poisoned"))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|_| Error::new(ErrorKind::Io, "Seek failed").with_offset(offset))?;
        file.read_exact(buf)
            .map_err(|_| Error::new(ErrorKind::Io, "Read failed").with_offset(offset))
    }

    fn size(&self) -> Option<u64> {
        Some(self.size)
    }
}
