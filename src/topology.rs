//! Cluster topology snapshots.
//!
//! A [`Topology`] is an immutable point-in-time view of which shard owns
//! which slot range, parsed from a `CLUSTER SLOTS` reply. Refreshing
//! never mutates a snapshot in place; the client builds a whole new one
//! and swaps the `Arc`, so concurrent readers observe either the old
//! mapping or the new one, never a mix.

use std::fmt;
use std::str::FromStr;

use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;
use crate::slot::SLOT_COUNT;

/// Identity of a cluster shard: the master's host and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardAddr {
    /// Hostname or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl ShardAddr {
    /// Creates a shard address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ShardAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ShardAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s.rsplit_once(':').ok_or_else(|| Error::InvalidArgument {
            message: format!("address missing port: {:?}", s),
        })?;
        let port = port.parse::<u16>().map_err(|_| Error::InvalidArgument {
            message: format!("invalid port in address: {:?}", s),
        })?;
        if host.is_empty() {
            return Err(Error::InvalidArgument {
                message: format!("address missing host: {:?}", s),
            });
        }
        Ok(Self::new(host, port))
    }
}

/// A contiguous range of slots owned by one shard. Both bounds inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRange {
    /// First slot of the range.
    pub start: u16,
    /// Last slot of the range.
    pub end: u16,
    /// The shard owning every slot in the range.
    pub shard: ShardAddr,
}

impl SlotRange {
    /// Returns true if `slot` falls inside this range.
    pub fn contains(&self, slot: u16) -> bool {
        self.start <= slot && slot <= self.end
    }
}

/// An immutable slot-to-shard mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    ranges: Vec<SlotRange>,
}

impl Topology {
    /// Parses a topology snapshot from a `CLUSTER SLOTS` reply.
    ///
    /// Each element of the outer array is `[start, end, master, replicas...]`
    /// where a node entry is `[host, port, ...]`. Replica entries are
    /// ignored; this crate writes only to masters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the reply is not an array or a slot
    /// range lacks a well-formed master entry.
    pub fn from_cluster_slots(frame: Frame) -> Result<Self> {
        let Frame::Array(outer) = frame else {
            return Err(Error::Protocol {
                message: "CLUSTER SLOTS reply must be an array".to_string(),
            });
        };

        let mut ranges = Vec::with_capacity(outer.len());
        for entry in outer {
            let Frame::Array(parts) = entry else {
                return Err(Error::Protocol {
                    message: "CLUSTER SLOTS range must be an array".to_string(),
                });
            };
            if parts.len() < 3 {
                return Err(Error::Protocol {
                    message: "CLUSTER SLOTS range needs start, end and master".to_string(),
                });
            }
            let start = frame_to_slot(&parts[0])?;
            let end = frame_to_slot(&parts[1])?;
            let shard = parse_node(&parts[2])?;
            ranges.push(SlotRange { start, end, shard });
        }

        // Sorted ranges let lookups binary-search by start slot.
        ranges.sort_by_key(|r| r.start);
        Ok(Self { ranges })
    }

    /// Returns the shard owning `slot`, or `None` if the snapshot does
    /// not cover it.
    pub fn shard_for_slot(&self, slot: u16) -> Option<&ShardAddr> {
        let idx = self.ranges.partition_point(|r| r.start <= slot);
        let range = self.ranges[..idx].last()?;
        range.contains(slot).then_some(&range.shard)
    }

    /// All slot ranges in the snapshot, ordered by start slot.
    pub fn ranges(&self) -> &[SlotRange] {
        &self.ranges
    }

    /// Distinct shards appearing in the snapshot.
    pub fn shards(&self) -> Vec<&ShardAddr> {
        let mut shards: Vec<&ShardAddr> = Vec::new();
        for range in &self.ranges {
            if !shards.contains(&&range.shard) {
                shards.push(&range.shard);
            }
        }
        shards
    }

    /// Returns true if every slot in `[0, 16383]` is owned by some shard.
    pub fn is_fully_covered(&self) -> bool {
        let mut next = 0u32;
        for range in &self.ranges {
            if u32::from(range.start) > next {
                return false;
            }
            next = next.max(u32::from(range.end) + 1);
        }
        next >= u32::from(SLOT_COUNT)
    }

}

fn frame_to_slot(frame: &Frame) -> Result<u16> {
    match frame {
        Frame::Integer(n) if (0..i64::from(SLOT_COUNT)).contains(n) => Ok(*n as u16),
        other => Err(Error::Protocol {
            message: format!("invalid slot bound in CLUSTER SLOTS: {:?}", other),
        }),
    }
}

fn parse_node(frame: &Frame) -> Result<ShardAddr> {
    let Frame::Array(node) = frame else {
        return Err(Error::Protocol {
            message: "CLUSTER SLOTS node entry must be an array".to_string(),
        });
    };
    let host = match node.first() {
        Some(Frame::BulkString(Some(host))) if !host.is_empty() => {
            String::from_utf8_lossy(host).into_owned()
        }
        _ => {
            return Err(Error::Protocol {
                message: "CLUSTER SLOTS node entry missing host".to_string(),
            })
        }
    };
    let port = match node.get(1) {
        Some(Frame::Integer(port)) if (0..=i64::from(u16::MAX)).contains(port) => *port as u16,
        _ => {
            return Err(Error::Protocol {
                message: "CLUSTER SLOTS node entry missing port".to_string(),
            })
        }
    };
    Ok(ShardAddr::new(host, port))
}
