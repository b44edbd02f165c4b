use thiserror::Error;

/// Program data is counted in 16 KiB pages.
pub const PAGE_SIZE: usize = 16 * 1024;

const MAGIC: [u8; 4] = *b"NES\x1a";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Image size must be non-zero")]
    Empty,
    #[error("Image size {0:#x} is not a multiple of {PAGE_SIZE:#x} bytes")]
    NotPageAligned(usize),
    #[error("Image size {0:#x} needs more than 255 pages")]
    TooManyPages(usize),
}

/// The 16 byte record placed in front of the reconstructed program image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pages: u8,
}

impl ImageHeader {
    pub const SIZE: usize = 16;

    pub fn for_size(size: usize) -> Result<Self, HeaderError> {
        if size == 0 {
            return Err(HeaderError::Empty);
        }
        if size % PAGE_SIZE != 0 {
            return Err(HeaderError::NotPageAligned(size));
        }

        let pages = u8::try_from(size / PAGE_SIZE).map_err(|_| HeaderError::TooManyPages(size))?;

        Ok(ImageHeader { pages })
    }

    pub const fn pages(&self) -> u8 {
        self.pages
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0; Self::SIZE];
        bytes[..4].copy_from_slice(&MAGIC);
        bytes[4] = self.pages;
        bytes[5] = 0x00;
        bytes[6] = 0x10;
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_page_header() {
        let header = ImageHeader::for_size(PAGE_SIZE).unwrap();
        assert_eq!(
            header.to_bytes(),
            [0x4e, 0x45, 0x53, 0x1a, 0x01, 0x00, 0x10, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn counts_pages() {
        assert_eq!(ImageHeader::for_size(0x20000).unwrap().pages(), 8);
        assert_eq!(ImageHeader::for_size(255 * PAGE_SIZE).unwrap().pages(), 255);
    }

    #[test]
    fn rejects_bad_sizes() {
        assert_eq!(ImageHeader::for_size(0), Err(HeaderError::Empty));
        assert_eq!(
            ImageHeader::for_size(PAGE_SIZE + 1),
            Err(HeaderError::NotPageAligned(PAGE_SIZE + 1))
        );
        assert_eq!(
            ImageHeader::for_size(256 * PAGE_SIZE),
            Err(HeaderError::TooManyPages(256 * PAGE_SIZE))
        );
    }
}
