//! 块缓存模块
//!
//! 核心本身不做缓存：重复读取同一元数据块时，由读取器边界上的缓存层消化。
//!
//! # 主要组件
//!
//! - [`BlockCache`] - 按对齐块缓存数据的 LRU 映射，使用 `lru` crate
//! - [`CacheStats`] - 缓存统计信息
//! - [`CachedReader`] - 包在任意 [`BlockReader`](crate::BlockReader) 外面的缓存读取器（需要 `std`）
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use extfs_core::{cache::CachedReader, FileReader, Volume};
//!
//! let reader = CachedReader::new(FileReader::open("disk.img")?, 4096, 256);
//! let volume = Volume::open(reader)?;
//! ```

mod block_cache;

pub use block_cache::{BlockCache, CacheStats, DEFAULT_CACHE_SIZE};
#[cfg(feature = "std")]
pub use block_cache::CachedReader;
