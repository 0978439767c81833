//! 块缓存实现（基于 lru crate）

use alloc::vec::Vec;
use core::num::NonZeroUsize;
use lru::LruCache;

/// 默认缓存块数量
pub const DEFAULT_CACHE_SIZE: usize = 256;

/// 缓存统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 总访问次数
    pub total_accesses: u64,
    /// 缓存命中次数
    pub hits: u64,
    /// 缓存未命中次数
    pub misses: u64,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_accesses as f64
        }
    }
}

/// 块缓存
///
/// 以块号为键保存整块数据，满时由 `LruCache` 自动驱逐最久未使用的块。
/// 只读场景下没有脏块，驱逐总是安全的。
pub struct BlockCache {
    /// LRU缓存核心
    cache: LruCache<u64, Vec<u8>>,
    /// 块大小（字节）
    block_size: usize,
    /// 统计信息
    stats: CacheStats,
}

impl BlockCache {
    /// 创建新的块缓存
    ///
    /// # 参数
    ///
    /// * `capacity` - 缓存容量（块数量，0 按 1 处理）
    /// * `block_size` - 块大小（字节）
    pub fn new(capacity: usize, block_size: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            block_size,
            stats: CacheStats::default(),
        }
    }

    /// 块大小
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 查找块，命中时更新 LRU 顺序
    pub fn get(&mut self, block: u64) -> Option<&[u8]> {
        self.stats.total_accesses += 1;
        match self.cache.get(&block) {
            Some(data) => {
                self.stats.hits += 1;
                log::trace!("[CACHE] block={:#x} HIT", block);
                Some(data.as_slice())
            }
            None => {
                self.stats.misses += 1;
                log::trace!("[CACHE] block={:#x} MISS", block);
                None
            }
        }
    }

    /// 插入块数据
    pub fn insert(&mut self, block: u64, data: Vec<u8>) {
        if let Some((evicted, _)) = self.cache.push(block, data) {
            if evicted != block {
                log::debug!("[CACHE] Evicted block={:#x}", evicted);
            }
        }
    }

    /// 当前缓存的块数
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// 缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// 统计信息
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// 清空缓存（统计信息保留）
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(feature = "std")]
pub use reader::CachedReader;

#[cfg(feature = "std")]
mod reader {
    use super::BlockCache;
    use crate::block::BlockReader;
    use crate::error::{Error, ErrorKind, Result};
    use std::sync::Mutex;

    /// 带 LRU 缓存的读取器
    ///
    /// 把请求拆成按 `chunk_size` 对齐的块，逐块查缓存，未命中时整块读入。
    /// 锁只保护缓存映射本身，属于读取器边界，核心对此一无所知。
    pub struct CachedReader<R> {
        inner: R,
        cache: Mutex<BlockCache>,
    }

    impl<R: BlockReader> CachedReader<R> {
        /// 创建缓存读取器
        ///
        /// # 参数
        ///
        /// * `inner` - 底层读取器
        /// * `chunk_size` - 缓存粒度（字节，通常等于文件系统块大小）
        /// * `capacity` - 缓存块数
        pub fn new(inner: R, chunk_size: usize, capacity: usize) -> Self {
            Self {
                inner,
                cache: Mutex::new(BlockCache::new(capacity, chunk_size.max(512))),
            }
        }

        /// 统计信息
        pub fn stats(&self) -> super::CacheStats {
            self.cache
                .lock()
                .map(|cache| cache.stats())
                .unwrap_or_default()
        }

        /// 取回底层读取器
        pub fn into_inner(self) -> R {
            self.inner
        }
    }

    impl<R: BlockReader> BlockReader for CachedReader<R> {
        fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
            let mut cache = self
                .cache
                .lock()
                .map_err(|_| Error::new(ErrorKind::Io, "Cache lock poisoned"))?;
            let chunk_size = cache.block_size() as u64;

            let mut done = 0usize;
            while done < buf.len() {
                let pos = offset + done as u64;
                let chunk = pos / chunk_size;
                let in_chunk = (pos % chunk_size) as usize;
                let take = (chunk_size as usize - in_chunk).min(buf.len() - done);

                if let Some(data) = cache.get(chunk) {
                    buf[done..done + take].copy_from_slice(&data[in_chunk..in_chunk + take]);
                } else {
                    let mut data = std::vec![0u8; chunk_size as usize];
                    match self.inner.read_at(chunk * chunk_size, &mut data) {
                        Ok(()) => {
                            buf[done..done + take]
                                .copy_from_slice(&data[in_chunk..in_chunk + take]);
                            cache.insert(chunk, data);
                        }
                        // 镜像末尾不足一个缓存块：直接读取请求的部分，不缓存
                        Err(_) => self.inner.read_at(pos, &mut buf[done..done + take])?,
                    }
                }
                done += take;
            }
            Ok(())
        }

        fn size(&self) -> Option<u64> {
            self.inner.size()
        }
    }
}
