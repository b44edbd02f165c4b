use std::{fs, io, path::Path};
use thiserror::Error;

use crate::{
    apply_patch, decompress_primary, DecompressError, HeaderError, ImageHeader, SegmentList,
};

mod map;
pub use map::{RomMap, RomMetadata};

/// The container ROM, read fully into memory.
#[derive(Debug, Clone)]
pub struct Rom {
    data: Vec<u8>,
    crc: u32,
}

impl Rom {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::from_bytes(fs::read(path.as_ref())?))
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        let crc = crc32fast::hash(&data);
        Rom { data, crc }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Invalid image size")]
    Header(#[from] HeaderError),
    #[error("Failed to decompress program image at {offset:#09x}")]
    Primary {
        offset: usize,
        #[source]
        source: DecompressError,
    },
    #[error("Failed to apply patch {index} at {offset:#09x}")]
    Patch {
        index: usize,
        offset: usize,
        #[source]
        source: DecompressError,
    },
}

/// A program image rebuilt from the compressed segments of a container.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub header: ImageHeader,
    pub data: Vec<u8>,
}

impl ExtractedImage {
    /// Decompress the primary segment, then apply every patch in list order.
    pub fn new(rom: &[u8], segments: &SegmentList) -> Result<Self, ExtractError> {
        let primary = segments.primary();
        let header = ImageHeader::for_size(segments.image_size())?;

        let mut data = decompress_primary(rom, primary.source_offset, segments.image_size())
            .map_err(|source| ExtractError::Primary {
                offset: primary.source_offset,
                source,
            })?;

        for (index, patch) in segments.patches().iter().enumerate() {
            apply_patch(rom, &mut data, patch).map_err(|source| ExtractError::Patch {
                index: index + 1,
                offset: patch.source_offset,
                source,
            })?;
        }

        log::info!(
            "Rebuilt {} page program image from {} segments",
            header.pages(),
            segments.segments().len()
        );

        Ok(ExtractedImage { header, data })
    }

    /// Header followed by the program image.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ImageHeader::SIZE + self.data.len());
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.extend_from_slice(&self.data);
        bytes
    }
}
