//! Key-to-slot routing.
//!
//! Redis Cluster assigns every key to one of 16384 slots via
//! CRC16(key) mod 16384. If the key carries a hash tag (`{...}`), only
//! the bytes inside the braces are hashed, so related keys can be pinned
//! to the same slot.

use crc::{Crc, CRC_16_XMODEM};

/// Number of hash slots in a Redis Cluster.
pub const SLOT_COUNT: u16 = 16384;

/// CRC-16/XMODEM, the checksum Redis Cluster uses for key routing.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Computes the cluster slot for a key.
///
/// Deterministic and pure: the same key bytes always yield the same slot
/// in `[0, 16383]`.
///
/// # Examples
///
/// ```
/// use shardpipe::key_slot;
///
/// assert_eq!(key_slot(b"foo"), key_slot(b"foo"));
/// assert_eq!(key_slot(b"{user:1}.name"), key_slot(b"{user:1}.age"));
/// ```
pub fn key_slot(key: &[u8]) -> u16 {
    CRC16.checksum(hash_tag(key)) % SLOT_COUNT
}

/// Returns the hashable portion of a key.
///
/// Per the Redis Cluster spec, only the first `{...}` pair counts, and an
/// empty tag (`{}`) is ignored. Without a valid tag the whole key hashes.
fn hash_tag(key: &[u8]) -> &[u8] {
    if let Some(open) = key.iter().position(|&b| b == b'{') {
        if let Some(close) = key[open + 1..].iter().position(|&b| b == b'}') {
            if close > 0 {
                return &key[open + 1..open + 1 + close];
            }
        }
    }
    key
}
