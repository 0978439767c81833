//! 块读取器接口

use crate::error::{Error, ErrorKind, Result};
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

/// 块读取器
///
/// 实现此 trait 以提供底层镜像/设备访问。读取以 `&self` 进行：
/// 读取位置必须是请求级别的状态，而不是共享的可变游标。
/// 只要实现类型是 `Sync`，建立在它之上的 `Volume` 就可以被多个线程同时只读使用。
///
/// # 示例
///
/// ```rust,ignore
/// use extfs_core::{BlockReader, Result};
///
/// struct MyImage {
///     // ...
/// }
///
/// impl BlockReader for MyImage {
///     fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
///         // 从 offset 处恰好读取 buf.len() 字节
///         Ok(())
///     }
/// }
/// ```
pub trait BlockReader {
    /// 从绝对字节偏移读取，恰好填满 `buf`
    ///
    /// 范围超出可寻址空间或底层介质出错时返回 `ErrorKind::Io`。
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// 可寻址的总字节数（未知时为 `None`）
    fn size(&self) -> Option<u64> {
        None
    }

    /// 读取 `length` 字节并返回新缓冲区
    fn read(&self, offset: u64, length: u32) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length as usize];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

impl BlockReader for [u8] {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let out_of_range = || {
            Error::new(ErrorKind::Io, "Read beyond end of image").with_offset(offset)
        };
        let start = usize::try_from(offset).map_err(|_| out_of_range())?;
        let end = start.checked_add(buf.len()).ok_or_else(out_of_range)?;
        let src = self.get(start..end).ok_or_else(out_of_range)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn size(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

impl BlockReader for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.as_slice().read_at(offset, buf)
    }

    fn size(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

impl<T: BlockReader + ?Sized> BlockReader for &T {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> Option<u64> {
        (**self).size()
    }
}

impl<T: BlockReader + ?Sized> BlockReader for Box<T> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> Option<u64> {
        (**self).size()
    }
}

impl<T: BlockReader + ?Sized> BlockReader for Arc<T> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> Option<u64> {
        (**self).size()
    }
}
