use super::{DecompressError, Decompressor, Grammar};
use crate::Segment;

/// Block type of a GBA BIOS style LZ77 stream.
pub const LZ77_BLOCK_TYPE: u8 = 0x10;

/// The four bytes in front of every patch stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchHeader {
    pub block_type: u8,
    /// decompressed length, 24-bit little endian
    pub length: usize,
}

impl PatchHeader {
    pub const SIZE: usize = 4;

    pub fn parse(src: &[u8], offset: usize) -> Result<Self, DecompressError> {
        let raw = offset
            .checked_add(Self::SIZE)
            .and_then(|end| src.get(offset..end))
            .ok_or(DecompressError::SourceOutOfBounds {
                offset,
                len: src.len(),
            })?;

        Ok(PatchHeader {
            block_type: raw[0],
            length: u32::from_le_bytes([raw[1], raw[2], raw[3], 0]) as usize,
        })
    }
}

/// Decompress the patch block described by `segment` over `dst[segment.dest_range()]`.
///
/// Every byte the patch writes must still be zero, which catches overlapping
/// segments. Returns the container offset just past the consumed stream.
pub fn apply_patch(src: &[u8], dst: &mut [u8], segment: &Segment) -> Result<usize, DecompressError> {
    let offset = segment.source_offset;
    if offset >= src.len() {
        return Err(DecompressError::SourceOutOfBounds {
            offset,
            len: src.len(),
        });
    }

    let header = PatchHeader::parse(src, offset)?;
    if header.block_type != LZ77_BLOCK_TYPE {
        return Err(DecompressError::UnsupportedBlockType {
            offset,
            block_type: header.block_type,
        });
    }

    log::info!(
        "{:#09x}: LZ77 block of {:#06x} bytes for {:#07x}-{:#07x}",
        offset,
        header.length,
        segment.dest_start,
        segment.dest_end
    );

    // start + length - 1, written so a zero length cannot underflow
    if segment.dest_end.checked_add(1) != segment.dest_start.checked_add(header.length) {
        return Err(DecompressError::LengthMismatch {
            offset,
            declared_start: segment.dest_start,
            declared_end: segment.dest_end,
            computed_end: (segment.dest_start + header.length).wrapping_sub(1),
        });
    }

    if segment.dest_end <= segment.dest_start || segment.dest_end >= dst.len() {
        return Err(DecompressError::DestinationOutOfBounds {
            start: segment.dest_start,
            end: segment.dest_end,
            size: dst.len(),
        });
    }

    let mut decompressor = Decompressor::new(src, offset + PatchHeader::SIZE, Grammar::PATCH);
    decompressor.decompress_into(dst, segment.dest_range())?;

    log::debug!("{:#09x}: LZ77 block ended at {:#09x}", offset, decompressor.read_index());

    Ok(decompressor.read_index())
}

/// A patch block found by [`probe_patch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchProbe {
    pub offset: usize,
    /// decompressed length
    pub length: usize,
    /// compressed length, header included
    pub bytes_read: usize,
}

/// Check whether a complete, self-consistent patch block starts at `offset`.
///
/// The stream must decode into a buffer of its declared length without reading
/// before the start of that buffer or past the end of the container.
pub fn probe_patch(src: &[u8], offset: usize, max_length: usize) -> Option<PatchProbe> {
    let header = PatchHeader::parse(src, offset).ok()?;
    if header.block_type != LZ77_BLOCK_TYPE || header.length == 0 || header.length > max_length {
        return None;
    }

    let mut scratch = vec![0; header.length];
    let mut decompressor = Decompressor::new(src, offset + PatchHeader::SIZE, Grammar::PATCH);
    decompressor
        .decompress_into(&mut scratch, 0..=header.length - 1)
        .ok()?;

    Some(PatchProbe {
        offset,
        length: header.length,
        bytes_read: PatchHeader::SIZE + decompressor.bytes_read(),
    })
}
