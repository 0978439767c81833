//! HTree directory indexing
//!
//! Read-only lookup through ext3/ext4 hashed directory indexes.
//!
//! Block 0 of an indexed directory is the dx_root: the "." and ".." entries,
//! an 8-byte info header (hash version, indirection levels) and a
//! count/limit-prefixed array of `(hash, block)` pairs. Interior nodes carry a
//! fake empty directory entry followed by the same array. Block pointers are
//! logical block numbers inside the directory.

use super::checksum::leaf_tail_offset;
use super::entry::{find_in_block, DirEntry};
use super::hash::{effective_version, htree_hash, EXT2_HTREE_TEA};
use super::reader::{DirBlock, DirReader};
use crate::block::BlockReader;
use crate::checksum::{self, ChecksumKind};
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use crate::superblock::{IncompatFeatures, Superblock};
use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// Offset of the count/limit header inside the root block
pub const DX_ROOT_COUNT_OFFSET: usize = 0x20;

/// Offset of the count/limit header inside an interior node
pub const DX_NODE_COUNT_OFFSET: usize = 8;

/// One `(hash, block)` index entry
///
/// The first entry of every node has no hash on disk (its slot holds the
/// count/limit header) and is reported with hash 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DxEntry {
    /// Lowest hash covered by the child
    pub hash: u32,
    /// Logical block of the child inside the directory
    pub block: u32,
}

/// dx_root info header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DxRootInfo {
    /// On-disk hash version (0..=2)
    pub hash_version: u8,
    /// Number of interior levels below the root
    pub indirect_levels: u8,
    /// Flags byte
    pub unused_flags: u8,
}

/// Parsed index node (root or interior)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxNode {
    /// Declared capacity
    pub limit: u16,
    /// Valid entries
    pub entries: Vec<DxEntry>,
}

fn corrupt(msg: &'static str) -> Error {
    Error::new(ErrorKind::CorruptStructure, msg)
}

/// Entry capacity of the root block
pub fn dx_root_limit(block_size: u32, metadata_csum: bool) -> u16 {
    let mut limit = (block_size as usize - DX_ROOT_COUNT_OFFSET) / EXT4_DX_ENTRY_SIZE;
    if metadata_csum {
        limit -= 1;
    }
    limit as u16
}

/// Entry capacity of an interior node
pub fn dx_node_limit(block_size: u32, metadata_csum: bool) -> u16 {
    let mut limit = (block_size as usize - DX_NODE_COUNT_OFFSET) / EXT4_DX_ENTRY_SIZE;
    if metadata_csum {
        limit -= 1;
    }
    limit as u16
}

/// Maximum number of interior levels
pub fn max_indirect_levels(sb: &Superblock) -> u8 {
    if sb.incompat_features().contains(IncompatFeatures::LARGEDIR) {
        EXT4_HTREE_LEVEL
    } else {
        EXT4_HTREE_LEVEL_COMPAT
    }
}

impl DxNode {
    /// Parse the count/limit header and the entry array at `count_offset`
    ///
    /// The limit must equal the capacity implied by the block size, the
    /// count must be in `1..=limit`, and hashes after the first entry must be
    /// non-decreasing.
    pub fn parse(raw: &[u8], count_offset: usize, expected_limit: u16) -> Result<Self> {
        let header = raw
            .get(count_offset..count_offset + 4)
            .ok_or_else(|| corrupt("HTree node shorter than header"))?;
        let limit = LittleEndian::read_u16(&header[0..]);
        let count = LittleEndian::read_u16(&header[2..]);

        if limit != expected_limit {
            return Err(corrupt("HTree node limit mismatch")
                .with_mismatch(expected_limit as u64, limit as u64));
        }
        if count == 0 || count > limit {
            return Err(corrupt("HTree node count out of range")
                .with_mismatch(limit as u64, count as u64));
        }

        let mut entries: Vec<DxEntry> = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let off = count_offset + i * EXT4_DX_ENTRY_SIZE;
            let rec = raw
                .get(off..off + EXT4_DX_ENTRY_SIZE)
                .ok_or_else(|| corrupt("HTree entries cross block end"))?;
            let hash = if i == 0 { 0 } else { LittleEndian::read_u32(&rec[0..]) };
            let block = LittleEndian::read_u32(&rec[4..]) & EXT4_DX_BLOCK_MASK;
            if let Some(prev) = entries.last() {
                if i > 1 && hash < prev.hash {
                    return Err(corrupt("HTree hashes not in ascending order")
                        .with_mismatch(prev.hash as u64, hash as u64));
                }
            }
            entries.push(DxEntry { hash, block });
        }

        Ok(Self { limit, entries })
    }

    /// Index of the entry whose subtree covers `hash`
    ///
    /// Binary search over entries 1.. for the last hash ≤ target; entry 0
    /// covers everything below the first explicit hash.
    pub fn lookup(&self, hash: u32) -> usize {
        self.entries[1..].partition_point(|e| e.hash <= hash)
    }
}

/// Parsed dx_root block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxRoot {
    /// Info header
    pub info: DxRootInfo,
    /// Root index entries
    pub node: DxNode,
}

impl DxRoot {
    /// Parse and validate the root block
    ///
    /// # Checks
    ///
    /// 1. reserved word is zero and info length is 8
    /// 2. hash version is legacy, half-MD4 or TEA
    /// 3. no unknown flag bits
    /// 4. indirection levels within the LARGEDIR-dependent maximum
    /// 5. limit and count as in [`DxNode::parse`]
    pub fn parse(raw: &[u8], sb: &Superblock) -> Result<Self> {
        if raw.len() < DX_ROOT_COUNT_OFFSET + 4 {
            return Err(corrupt("HTree root shorter than header"));
        }
        let reserved = LittleEndian::read_u32(&raw[0x18..]);
        let info = DxRootInfo {
            hash_version: raw[0x1C],
            indirect_levels: raw[0x1E],
            unused_flags: raw[0x1F],
        };
        let info_length = raw[0x1D];

        if reserved != 0 {
            return Err(Error::new(ErrorKind::InvalidFormat, "HTree root reserved field not zero")
                .with_mismatch(0, reserved as u64));
        }
        if info_length != EXT4_DX_ROOT_INFO_LEN {
            return Err(Error::new(ErrorKind::InvalidFormat, "HTree root info length invalid")
                .with_mismatch(EXT4_DX_ROOT_INFO_LEN as u64, info_length as u64));
        }
        if info.hash_version > EXT2_HTREE_TEA {
            return Err(corrupt("Unrecognised HTree hash version")
                .with_mismatch(EXT2_HTREE_TEA as u64, info.hash_version as u64));
        }
        if info.unused_flags & 1 != 0 {
            return Err(corrupt("Unimplemented HTree hash flags")
                .with_mismatch(0, info.unused_flags as u64));
        }
        let max_levels = max_indirect_levels(sb);
        if info.indirect_levels >= max_levels {
            return Err(corrupt("HTree too deep")
                .with_mismatch(max_levels as u64 - 1, info.indirect_levels as u64));
        }

        let limit = dx_root_limit(sb.block_size(), sb.has_metadata_csum());
        let node = DxNode::parse(raw, DX_ROOT_COUNT_OFFSET, limit)?;
        Ok(Self { info, node })
    }
}

/// Hash-indexed name lookup over one directory
pub struct HtreeLookup<'r, 'a, R> {
    reader: &'r DirReader<'a, R>,
    visited: BTreeSet<u32>,
}

impl<'r, 'a, R: BlockReader> HtreeLookup<'r, 'a, R> {
    /// Create a lookup over an indexed directory
    pub fn new(reader: &'r DirReader<'a, R>) -> Self {
        Self {
            reader,
            visited: BTreeSet::new(),
        }
    }

    /// Read a directory block that the index references
    ///
    /// Every block may be referenced once per lookup; holes and repeats are
    /// corruption.
    fn read_referenced(&mut self, logical: u32) -> Result<DirBlock> {
        if logical as u64 >= self.reader.block_count() {
            return Err(corrupt("HTree block pointer beyond directory size")
                .with_mismatch(self.reader.block_count(), logical as u64));
        }
        if !self.visited.insert(logical) {
            return Err(corrupt("HTree block referenced twice").with_mismatch(0, logical as u64));
        }
        self.reader
            .read_raw_block(logical as u64)?
            .ok_or_else(|| corrupt("Hole in indexed directory").with_mismatch(0, logical as u64))
    }

    /// Verify a dx_tail checksum per policy
    fn check_index_checksum(&self, block: &DirBlock, count_offset: usize) -> Result<()> {
        if !self.reader.checks_metadata_csum() {
            return Ok(());
        }
        let inode = self.reader.inode();
        let status = checksum::evaluate(
            ChecksumKind::HtreeBlock {
                inode: inode.number(),
                generation: inode.generation(),
                count_offset,
            },
            &block.data,
            self.reader.superblock().checksum_seed(),
        );
        self.reader
            .policy()
            .enforce(status, "HTree index checksum mismatch", block.disk_offset())
    }

    /// Verify a leaf block checksum per policy
    fn check_leaf_checksum(&self, block: &DirBlock) -> Result<()> {
        if !self.reader.checks_metadata_csum() || leaf_tail_offset(&block.data).is_none() {
            return Ok(());
        }
        let inode = self.reader.inode();
        let status = checksum::evaluate(
            ChecksumKind::DirectoryBlock {
                inode: inode.number(),
                generation: inode.generation(),
            },
            &block.data,
            self.reader.superblock().checksum_seed(),
        );
        self.reader
            .policy()
            .enforce(status, "Directory block checksum mismatch", block.disk_offset())
    }

    /// Read and validate an interior node
    fn read_node(&mut self, logical: u32) -> Result<DxNode> {
        let block = self.read_referenced(logical)?;
        let sb = self.reader.superblock();
        let limit = dx_node_limit(sb.block_size(), sb.has_metadata_csum());
        let node = DxNode::parse(&block.data, DX_NODE_COUNT_OFFSET, limit)
            .map_err(|e| e.with_offset(block.disk_offset()))?;
        self.check_index_checksum(&block, DX_NODE_COUNT_OFFSET)?;
        log::trace!(
            "[HTREE] interior node block={} entries={}",
            logical,
            node.entries.len()
        );
        Ok(node)
    }

    /// Look up `name`
    ///
    /// Descends root → interior levels → leaf by hash, scans the leaf for an
    /// exact match, and keeps scanning following leaves while their index
    /// hash (collision bit stripped) equals the target hash.
    pub fn find(&mut self, name: &[u8]) -> Result<Option<DirEntry>> {
        self.visited.clear();
        let sb = self.reader.superblock();

        let root_block = self.read_referenced(0)?;
        let root = DxRoot::parse(&root_block.data, sb)
            .map_err(|e| e.with_offset(root_block.disk_offset()))?;
        self.check_index_checksum(&root_block, DX_ROOT_COUNT_OFFSET)?;

        let version = effective_version(root.info.hash_version, sb.has_unsigned_hash());
        let hash = htree_hash(name, sb.hash_seed(), version)?.major;
        log::debug!(
            "[HTREE] ino={} lookup hash={:#010x} version={} levels={}",
            self.reader.inode().number(),
            hash,
            version,
            root.info.indirect_levels
        );

        // (node, position) for root and every interior level
        let mut frames: Vec<(DxNode, usize)> = Vec::with_capacity(root.info.indirect_levels as usize + 1);
        let pos = root.node.lookup(hash);
        frames.push((root.node, pos));
        self.descend(&mut frames, root.info.indirect_levels as usize, Some(hash))?;

        loop {
            let Some((node, pos)) = frames.last() else {
                return Ok(None);
            };
            let leaf = self.read_referenced(node.entries[*pos].block)?;
            self.check_leaf_checksum(&leaf)?;
            if let Some(entry) = find_in_block(self.reader.parser(), &leaf.data, leaf.base(), name)? {
                return Ok(Some(entry));
            }

            if !self.advance(&mut frames, hash, root.info.indirect_levels as usize)? {
                return Ok(None);
            }
        }
    }

    /// Push interior nodes until `frames` reaches `levels + 1` entries
    ///
    /// With a hash the position in each new node is found by binary search;
    /// without one (collision continuation) the first entry is taken.
    fn descend(&mut self, frames: &mut Vec<(DxNode, usize)>, levels: usize, hash: Option<u32>) -> Result<()> {
        while frames.len() <= levels {
            let child = match frames.last() {
                Some((node, pos)) => node.entries[*pos].block,
                None => return Ok(()),
            };
            let node = self.read_node(child)?;
            let pos = hash.map_or(0, |h| node.lookup(h));
            frames.push((node, pos));
        }
        Ok(())
    }

    /// Move to the next leaf if it may still hold entries with `hash`
    fn advance(&mut self, frames: &mut Vec<(DxNode, usize)>, hash: u32, levels: usize) -> Result<bool> {
        loop {
            let Some((node, pos)) = frames.last_mut() else {
                return Ok(false);
            };
            if *pos + 1 < node.entries.len() {
                *pos += 1;
                break;
            }
            frames.pop();
        }

        let next_hash = match frames.last() {
            Some((node, pos)) => node.entries[*pos].hash,
            None => return Ok(false),
        };
        if next_hash & !1 != hash {
            return Ok(false);
        }

        log::trace!("[HTREE] hash collision, continuing to next leaf");
        self.descend(frames, levels, None)?;
        Ok(true)
    }
}
