mod decompress;
pub use decompress::{decompress_primary, DecompressError, Decompressor};

mod patch;
pub use patch::{apply_patch, probe_patch, PatchHeader, PatchProbe, LZ77_BLOCK_TYPE};

/// Describes how a token stream encodes its back-references.
///
/// Both stream formats share the control mask loop: one mask byte covers the next
/// eight tokens, scanned from bit 0x80 down to 0x01. They differ in the mask
/// polarity, the count formula and whether already written bytes are protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grammar {
    /// Value of a control bit that selects a literal byte.
    pub literal_flag: bool,
    /// Added to the high nibble of the first back-reference byte.
    pub count_bias: usize,
    /// A zero high nibble pulls in a third byte that extends the count.
    pub extended_count: bool,
    /// Refuse to write over output bytes that are already non-zero.
    pub protect_written: bool,
}

impl Grammar {
    /// Headerless stream that fills the program image from offset 0.
    pub const PRIMARY: Grammar = Grammar {
        literal_flag: true,
        count_bias: 2,
        extended_count: true,
        protect_written: false,
    };

    /// Headered LZ77 stream overwriting a sub-range of the program image.
    pub const PATCH: Grammar = Grammar {
        literal_flag: false,
        count_bias: 3,
        extended_count: false,
        protect_written: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Literal(u8),
    /// Copy `count` bytes one at a time from `back` bytes behind the write position.
    Backref { count: usize, back: usize },
}

impl Token {
    pub fn decode(flag: bool, decompressor: &mut Decompressor) -> Result<Self, DecompressError> {
        if flag == decompressor.grammar().literal_flag {
            return Ok(Self::Literal(decompressor.read()?));
        }

        let r1 = decompressor.read()?;
        let r2 = decompressor.read()?;

        let grammar = decompressor.grammar();
        let nibble = usize::from(r1 >> 4);
        let mut count = nibble + grammar.count_bias;
        if grammar.extended_count && nibble == 0 {
            count += 16 + usize::from(decompressor.read()?);
        }

        let back = usize::from(u16::from_be_bytes([r1 & 0x0f, r2])) + 1;

        Ok(Self::Backref { count, back })
    }
}
