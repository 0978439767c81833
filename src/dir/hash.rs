//! Directory hash algorithms for HTree indexing
//!
//! Implements the name hashes used by ext3/ext4 indexed directories:
//! - Legacy (`dx_hack_hash`)
//! - Half MD4
//! - TEA (Tiny Encryption Algorithm)
//!
//! Each comes in a signed and an unsigned `char` flavour. Which one a
//! filesystem uses is recorded in the superblock flags; the on-disk dx_root
//! only stores the base version (0..=2).

use crate::error::{Error, ErrorKind, Result};
use crate::superblock::EXT4_DEFAULT_HASH_SEED;

/// Hash version constants
pub const EXT2_HTREE_LEGACY: u8 = 0;
pub const EXT2_HTREE_HALF_MD4: u8 = 1;
pub const EXT2_HTREE_TEA: u8 = 2;
pub const EXT2_HTREE_LEGACY_UNSIGNED: u8 = 3;
pub const EXT2_HTREE_HALF_MD4_UNSIGNED: u8 = 4;
pub const EXT2_HTREE_TEA_UNSIGNED: u8 = 5;

/// End-of-directory marker for 32-bit hashes
pub const EXT2_HTREE_EOF: u32 = 0x7FFF_FFFF;

/// Major/minor hash pair of a file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirHash {
    /// Hash used for index lookups, lowest bit always clear
    pub major: u32,
    /// Secondary hash (unused by lookups)
    pub minor: u32,
}

/// MD4 F function
#[inline(always)]
fn md4_f(x: u32, y: u32, z: u32) -> u32 {
    z ^ (x & (y ^ z))
}

/// MD4 G function (majority)
#[inline(always)]
fn md4_g(x: u32, y: u32, z: u32) -> u32 {
    (x & y) | (x & z) | (y & z)
}

/// MD4 H function
#[inline(always)]
fn md4_h(x: u32, y: u32, z: u32) -> u32 {
    x ^ y ^ z
}

const K2: u32 = 0x5A82_7999;
const K3: u32 = 0x6ED9_EBA1;

macro_rules! round {
    ($f:ident, $a:ident, $b:ident, $c:ident, $d:ident, $x:expr, $s:expr) => {
        $a = $a.wrapping_add($f($b, $c, $d)).wrapping_add($x);
        $a = $a.rotate_left($s);
    };
}

/// Half MD4 transform: three reduced MD4 rounds over 8 input words
fn half_md4_transform(buf: &mut [u32; 4], input: &[u32; 8]) {
    let [mut a, mut b, mut c, mut d] = *buf;

    round!(md4_f, a, b, c, d, input[0], 3);
    round!(md4_f, d, a, b, c, input[1], 7);
    round!(md4_f, c, d, a, b, input[2], 11);
    round!(md4_f, b, c, d, a, input[3], 19);
    round!(md4_f, a, b, c, d, input[4], 3);
    round!(md4_f, d, a, b, c, input[5], 7);
    round!(md4_f, c, d, a, b, input[6], 11);
    round!(md4_f, b, c, d, a, input[7], 19);

    round!(md4_g, a, b, c, d, input[1].wrapping_add(K2), 3);
    round!(md4_g, d, a, b, c, input[3].wrapping_add(K2), 5);
    round!(md4_g, c, d, a, b, input[5].wrapping_add(K2), 9);
    round!(md4_g, b, c, d, a, input[7].wrapping_add(K2), 13);
    round!(md4_g, a, b, c, d, input[0].wrapping_add(K2), 3);
    round!(md4_g, d, a, b, c, input[2].wrapping_add(K2), 5);
    round!(md4_g, c, d, a, b, input[4].wrapping_add(K2), 9);
    round!(md4_g, b, c, d, a, input[6].wrapping_add(K2), 13);

    round!(md4_h, a, b, c, d, input[3].wrapping_add(K3), 3);
    round!(md4_h, d, a, b, c, input[7].wrapping_add(K3), 9);
    round!(md4_h, c, d, a, b, input[2].wrapping_add(K3), 11);
    round!(md4_h, b, c, d, a, input[6].wrapping_add(K3), 15);
    round!(md4_h, a, b, c, d, input[1].wrapping_add(K3), 3);
    round!(md4_h, d, a, b, c, input[5].wrapping_add(K3), 9);
    round!(md4_h, c, d, a, b, input[0].wrapping_add(K3), 11);
    round!(md4_h, b, c, d, a, input[4].wrapping_add(K3), 15);

    buf[0] = buf[0].wrapping_add(a);
    buf[1] = buf[1].wrapping_add(b);
    buf[2] = buf[2].wrapping_add(c);
    buf[3] = buf[3].wrapping_add(d);
}

/// TEA transform: 16 rounds over the first two state words
fn tea_transform(buf: &mut [u32; 4], input: &[u32; 4]) {
    const DELTA: u32 = 0x9E37_79B9;
    let mut sum = 0u32;
    let (mut b0, mut b1) = (buf[0], buf[1]);
    let [a, b, c, d] = *input;

    for _ in 0..16 {
        sum = sum.wrapping_add(DELTA);
        b0 = b0.wrapping_add(
            (b1 << 4).wrapping_add(a) ^ b1.wrapping_add(sum) ^ (b1 >> 5).wrapping_add(b),
        );
        b1 = b1.wrapping_add(
            (b0 << 4).wrapping_add(c) ^ b0.wrapping_add(sum) ^ (b0 >> 5).wrapping_add(d),
        );
    }

    buf[0] = buf[0].wrapping_add(b0);
    buf[1] = buf[1].wrapping_add(b1);
}

/// Widen one name byte the way the C `char` type would
#[inline(always)]
fn char_value(byte: u8, unsigned_char: bool) -> u32 {
    if unsigned_char {
        byte as u32
    } else {
        byte as i8 as i32 as u32
    }
}

/// Legacy `dx_hack_hash`
fn legacy_hash(name: &[u8], unsigned_char: bool) -> u32 {
    let mut hash0: u32 = 0x12A3_FE2D;
    let mut hash1: u32 = 0x37AB_E8F9;

    for &byte in name {
        let mut hash =
            hash1.wrapping_add(hash0 ^ char_value(byte, unsigned_char).wrapping_mul(7_152_373));
        if hash & 0x8000_0000 != 0 {
            hash = hash.wrapping_sub(0x7FFF_FFFF);
        }
        hash1 = hash0;
        hash0 = hash;
    }

    hash0 << 1
}

/// Pack name bytes into big-endian-ish words for the block hashes
///
/// `len` is the number of name bytes remaining from `msg` onwards and seeds
/// the padding pattern.
fn str2hashbuf(msg: &[u8], len: usize, out: &mut [u32], unsigned_char: bool) {
    let num = out.len();
    let len32 = len as u32;
    let mut pad = len32 | (len32 << 8);
    pad |= pad << 16;

    let mut val = pad;
    let take = len.min(num * 4).min(msg.len());
    let mut filled = 0;

    for (i, &byte) in msg[..take].iter().enumerate() {
        val = char_value(byte, unsigned_char).wrapping_add(val << 8);
        if i % 4 == 3 {
            out[filled] = val;
            filled += 1;
            val = pad;
        }
    }

    if filled < num {
        out[filled] = val;
        filled += 1;
    }
    for word in &mut out[filled..] {
        *word = pad;
    }
}

/// Compute the HTree hash of a directory entry name
///
/// # Arguments
///
/// * `name` - entry name, 1..=255 bytes
/// * `seed` - superblock `s_hash_seed`; `None` (or all zero) selects the
///   default MD4 initial state
/// * `version` - effective hash version (0..=5, unsigned variants included)
///
/// # Returns
///
/// The major hash with its lowest bit cleared, and the minor hash. A major
/// hash that would equal the end-of-directory marker is moved one step down.
pub fn htree_hash(name: &[u8], seed: Option<[u32; 4]>, version: u8) -> Result<DirHash> {
    if name.is_empty() || name.len() > crate::consts::EXT4_NAME_MAX {
        return Err(Error::new(ErrorKind::InvalidInput, "Invalid name length for hashing")
            .with_mismatch(crate::consts::EXT4_NAME_MAX as u64, name.len() as u64));
    }

    let mut buf = match seed {
        Some(s) if s.iter().any(|&w| w != 0) => s,
        _ => EXT4_DEFAULT_HASH_SEED,
    };

    let (major, minor) = match version {
        EXT2_HTREE_LEGACY | EXT2_HTREE_LEGACY_UNSIGNED => {
            (legacy_hash(name, version == EXT2_HTREE_LEGACY_UNSIGNED), 0)
        }
        EXT2_HTREE_HALF_MD4 | EXT2_HTREE_HALF_MD4_UNSIGNED => {
            let unsigned_char = version == EXT2_HTREE_HALF_MD4_UNSIGNED;
            let mut input = [0u32; 8];
            for (i, chunk) in name.chunks(32).enumerate() {
                str2hashbuf(chunk, name.len() - i * 32, &mut input, unsigned_char);
                half_md4_transform(&mut buf, &input);
            }
            (buf[1], buf[2])
        }
        EXT2_HTREE_TEA | EXT2_HTREE_TEA_UNSIGNED => {
            let unsigned_char = version == EXT2_HTREE_TEA_UNSIGNED;
            let mut input = [0u32; 4];
            for (i, chunk) in name.chunks(16).enumerate() {
                str2hashbuf(chunk, name.len() - i * 16, &mut input, unsigned_char);
                tea_transform(&mut buf, &input);
            }
            (buf[0], buf[1])
        }
        _ => {
            return Err(Error::new(ErrorKind::CorruptStructure, "Unknown directory hash version")
                .with_mismatch(EXT2_HTREE_TEA_UNSIGNED as u64, version as u64));
        }
    };

    let mut major = major & !1;
    if major == EXT2_HTREE_EOF << 1 {
        major = (EXT2_HTREE_EOF - 1) << 1;
    }

    log::trace!(
        "[HTREE] hash version={} name_len={} -> major={:#010x} minor={:#010x}",
        version,
        name.len(),
        major,
        minor
    );
    Ok(DirHash { major, minor })
}

/// Effective hash version for a directory
///
/// The unsigned flavour is selected by the superblock flag and only applies
/// to the three base algorithms.
pub fn effective_version(root_version: u8, unsigned_hash: bool) -> u8 {
    if unsigned_hash && root_version <= EXT2_HTREE_TEA {
        root_version + 3
    } else {
        root_version
    }
}
