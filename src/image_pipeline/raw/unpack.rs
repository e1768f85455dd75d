//! Bit-level unpacking of packed sensor sample streams.
//!
//! Packed RAW dumps store samples back to back with no padding. 8 and 16-bit streams are
//! byte aligned; 12-bit streams store two samples in every three bytes using one of the
//! [`PackingOrder`] layouts. Unpacked values are the raw sensor codes, never scaled.

use tracing::debug;

use crate::image_pipeline::common::error::{ImageError, Result};
use crate::image_pipeline::raw::types::{BitDepth, PackingOrder};

/// Extracts fixed-width samples from a packed byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitUnpacker {
    depth: BitDepth,
    order: PackingOrder,
}

impl BitUnpacker {
    pub fn new(depth: BitDepth, order: PackingOrder) -> Self {
        Self { depth, order }
    }

    pub fn depth(&self) -> BitDepth {
        self.depth
    }

    pub fn order(&self) -> PackingOrder {
        self.order
    }

    /// Whole samples held by `len` bytes; trailing bits narrower than a sample are dropped.
    pub fn sample_count(&self, len: usize) -> usize {
        len * 8 / self.depth.bits() as usize
    }

    /// Bytes needed to hold `samples` samples.
    pub fn bytes_for(&self, samples: usize) -> usize {
        (samples * self.depth.bits() as usize).div_ceil(8)
    }

    /// Samples available after `offset`.
    pub fn available_samples(&self, data: &[u8], offset: usize) -> Result<usize> {
        Ok(self.sample_count(payload(data, offset)?.len()))
    }

    /// Unpacks every whole sample after `offset`.
    ///
    /// With `frame_samples` set, fails unless at least one frame of that many samples
    /// is present.
    pub fn unpack(&self, data: &[u8], offset: usize, frame_samples: Option<usize>) -> Result<Vec<u16>> {
        let count = self.available_samples(data, offset)?;
        if let Some(frame) = frame_samples {
            if count < frame {
                return Err(ImageError::TruncatedData {
                    needed: offset + self.bytes_for(frame),
                    available: data.len(),
                });
            }
        }
        self.unpack_range(data, offset, 0, count)
    }

    /// Unpacks samples `first..first + count` of the stream that starts at `offset`.
    pub fn unpack_range(&self, data: &[u8], offset: usize, first: usize, count: usize) -> Result<Vec<u16>> {
        let payload = payload(data, offset)?;
        let end = first + count;
        if end > self.sample_count(payload.len()) {
            return Err(ImageError::TruncatedData {
                needed: offset + self.bytes_for(end),
                available: data.len(),
            });
        }
        debug!(
            first,
            count,
            bits = self.depth.bits(),
            order = ?self.order,
            "Unpacking samples"
        );

        let samples = match self.depth {
            BitDepth::Eight => payload[first..end].iter().map(|&b| b as u16).collect(),
            BitDepth::Sixteen => payload[first * 2..end * 2]
                .chunks_exact(2)
                .map(|word| match self.order {
                    PackingOrder::MsbFirst => u16::from_be_bytes([word[0], word[1]]),
                    PackingOrder::Standard | PackingOrder::LegacyV0_2 => {
                        u16::from_le_bytes([word[0], word[1]])
                    }
                })
                .collect(),
            BitDepth::Twelve => self.unpack_12bit(payload, first, count),
        };
        Ok(samples)
    }

    fn unpack_12bit(&self, payload: &[u8], first: usize, count: usize) -> Vec<u16> {
        let first_group = first / 2;
        let skip = first % 2;
        let wanted = skip + count;

        let mut out = Vec::with_capacity(wanted + 1);
        let mut groups = payload[first_group * 3..].chunks_exact(3);
        while out.len() < wanted {
            match groups.next() {
                Some(group) => {
                    let (s0, s1) = unpack_pair(self.order, group[0], group[1], group[2]);
                    out.push(s0);
                    out.push(s1);
                }
                None => {
                    // Two trailing bytes still hold one whole sample.
                    if let [b0, b1] = groups.remainder() {
                        out.push(unpack_pair(self.order, *b0, *b1, 0).0);
                    }
                    break;
                }
            }
        }
        out.drain(..skip);
        out.truncate(count);
        out
    }
}

/// Decodes one 3-byte group into two 12-bit samples.
pub fn unpack_pair(order: PackingOrder, b0: u8, b1: u8, b2: u8) -> (u16, u16) {
    let (b0, b1, b2) = (b0 as u16, b1 as u16, b2 as u16);
    match order {
        PackingOrder::Standard => (b0 | (b1 & 0x0F) << 8, (b1 >> 4) | b2 << 4),
        PackingOrder::LegacyV0_2 => (b0 | (b1 & 0xF0) << 4, (b1 & 0x0F) | b2 << 4),
        PackingOrder::MsbFirst => (b0 << 4 | b1 >> 4, (b1 & 0x0F) << 8 | b2),
    }
}

/// Encodes two 12-bit samples into one 3-byte group; inverse of [`unpack_pair`].
pub fn pack_pair(order: PackingOrder, s0: u16, s1: u16) -> [u8; 3] {
    let (s0, s1) = (s0 & 0x0FFF, s1 & 0x0FFF);
    match order {
        PackingOrder::Standard => [
            (s0 & 0xFF) as u8,
            ((s0 >> 8) | (s1 & 0x0F) << 4) as u8,
            (s1 >> 4) as u8,
        ],
        PackingOrder::LegacyV0_2 => [
            (s0 & 0xFF) as u8,
            ((s0 >> 8) << 4 | (s1 & 0x0F)) as u8,
            (s1 >> 4) as u8,
        ],
        PackingOrder::MsbFirst => [
            (s0 >> 4) as u8,
            ((s0 & 0x0F) << 4 | s1 >> 8) as u8,
            (s1 & 0xFF) as u8,
        ],
    }
}

/// Packs samples into the byte layout [`BitUnpacker`] reads back.
///
/// Values are masked to `depth` bits. An odd 12-bit sample count ends in a two-byte group.
pub fn pack_samples(samples: &[u16], depth: BitDepth, order: PackingOrder) -> Vec<u8> {
    match depth {
        BitDepth::Eight => samples.iter().map(|&s| s as u8).collect(),
        BitDepth::Sixteen => samples
            .iter()
            .flat_map(|&s| match order {
                PackingOrder::MsbFirst => s.to_be_bytes(),
                PackingOrder::Standard | PackingOrder::LegacyV0_2 => s.to_le_bytes(),
            })
            .collect(),
        BitDepth::Twelve => {
            let mut out = Vec::with_capacity(samples.len().div_ceil(2) * 3);
            let mut pairs = samples.chunks_exact(2);
            for pair in &mut pairs {
                out.extend_from_slice(&pack_pair(order, pair[0], pair[1]));
            }
            if let [last] = pairs.remainder() {
                out.extend_from_slice(&pack_pair(order, *last, 0)[..2]);
            }
            out
        }
    }
}

fn payload(data: &[u8], offset: usize) -> Result<&[u8]> {
    if offset >= data.len() {
        return Err(ImageError::TruncatedData {
            needed: offset + 1,
            available: data.len(),
        });
    }
    Ok(&data[offset..])
}
