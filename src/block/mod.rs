//! 块读取抽象
//!
//! 核心从不直接做 I/O，所有数据都通过 [`BlockReader`] 按"绝对字节偏移 + 长度"
//! 读取。
//!
//! - `block/reader.rs` 定义读取器 trait 以及内存缓冲区等常用实现
//! - `block/device.rs` 提供 `BlockDev` 包装器：分区偏移、按块读取、块号边界检查
//! - `block/file.rs` 提供基于文件的读取器（需要 `std` 特性）

mod device;
mod reader;
#[cfg(feature = "std")]
mod file;

pub use device::BlockDev;
pub use reader::BlockReader;
#[cfg(feature = "std")]
pub use file::FileReader;
