mod compression;
pub use compression::{
    apply_patch, decompress_primary, probe_patch, DecompressError, Decompressor, Grammar,
    PatchHeader, PatchProbe, Token, LZ77_BLOCK_TYPE,
};

mod header;
pub use header::{HeaderError, ImageHeader, PAGE_SIZE};

mod rom;
pub use rom::{ExtractError, ExtractedImage, Rom, RomMap, RomMetadata};

mod segment;
pub use segment::{parse_number, Segment, SegmentList, SegmentParseError};
