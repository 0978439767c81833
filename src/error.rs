//! 错误类型定义
//!
//! 提供只读 ext2/3/4 解析过程中的错误类型。
//!
//! 所有来自镜像的偏移、计数和校验和都视为不可信输入，解析失败一律通过
//! `Result` 返回，从不 panic。错误可以附带出错位置（字节偏移）以及
//! 期望值/实际值，便于取证工具记录或展示。

use core::fmt;

/// 解析错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
    offset: Option<u64>,
    expected: Option<u64>,
    found: Option<u64>,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// 结构必需位置上的魔数缺失或格式非法
    InvalidFormat,
    /// 设置了无法理解的 incompat 特性位
    UnsupportedFeature,
    /// 越界、环路、深度不匹配或排序不变量被破坏
    CorruptStructure,
    /// 元数据校验和不匹配
    ChecksumMismatch,
    /// inode 号为 0 或超出 inode 总数
    InvalidInode,
    /// 路径分量或条目不存在
    NotFound,
    /// 调用方参数错误（例如对普通文件列目录）
    InvalidInput,
    /// 块读取器报告的 I/O 错误
    Io,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self {
            kind,
            message,
            offset: None,
            expected: None,
            found: None,
        }
    }

    /// 附加出错的字节偏移
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// 附加期望值与实际值
    pub const fn with_mismatch(mut self, expected: u64, found: u64) -> Self {
        self.expected = Some(expected);
        self.found = Some(found);
        self
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// 出错位置（字节偏移）
    pub const fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// 期望值
    pub const fn expected(&self) -> Option<u64> {
        self.expected
    }

    /// 实际值
    pub const fn found(&self) -> Option<u64> {
        self.found
    }

    /// 是否为结构性错误
    ///
    /// 结构性错误表示磁盘数据本身有问题（格式、损坏、校验和、未知特性），
    /// 存在降级路径时（例如 HTree 回退到线性扫描）可以据此决定是否降级。
    /// I/O 错误和调用方参数错误不属于此类。
    pub const fn is_structural(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::InvalidFormat
                | ErrorKind::UnsupportedFeature
                | ErrorKind::CorruptStructure
                | ErrorKind::ChecksumMismatch
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(offset) = self.offset {
            write!(f, " (offset {:#x})", offset)?;
        }
        if let (Some(expected), Some(found)) = (self.expected, self.found) {
            write!(f, " (expected {:#x}, found {:#x})", expected, found)?;
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
