use super::{Grammar, Token};
use std::ops::RangeInclusive;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Decompressor<'a> {
    src: &'a [u8],
    grammar: Grammar,

    /// where the stream started, for diagnostics
    start_index: usize,
    /// index to read from
    read_index: usize,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecompressError {
    #[error("Source offset {offset:#09x} is outside the {len:#09x} byte container")]
    SourceOutOfBounds { offset: usize, len: usize },
    #[error("Stream at {offset:#09x} ran out of input at {read:#09x} with output at {written:#07x}")]
    InputExhausted {
        offset: usize,
        read: usize,
        written: usize,
    },
    #[error("Back-reference at output {at:#07x} reaches {back} bytes back, before the start of the output")]
    InvalidBackref { at: usize, back: usize },
    #[error("Output {at:#07x}: refusing to overwrite non-zero byte {value:#04x}")]
    NonZeroOverwrite { at: usize, value: u8 },
    #[error("Output range {start:#07x}-{end:#07x} does not fit in the {size:#07x} byte output")]
    DestinationOutOfBounds {
        start: usize,
        end: usize,
        size: usize,
    },
    #[error("Block at {offset:#09x} has unsupported type {block_type:#04x}")]
    UnsupportedBlockType { offset: usize, block_type: u8 },
    #[error("Block at {offset:#09x} decodes to {declared_start:#07x}-{computed_end:#07x}, not {declared_start:#07x}-{declared_end:#07x}")]
    LengthMismatch {
        offset: usize,
        declared_start: usize,
        declared_end: usize,
        computed_end: usize,
    },
    #[error("Output size must be non-zero")]
    EmptyOutput,
}

impl<'a> Decompressor<'a> {
    pub fn new(src: &'a [u8], offset: usize, grammar: Grammar) -> Self {
        Self {
            src,
            grammar,
            start_index: offset,
            read_index: offset,
        }
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    /// Index of the next container byte the stream would consume.
    pub fn read_index(&self) -> usize {
        self.read_index
    }

    pub fn bytes_read(&self) -> usize {
        self.read_index - self.start_index
    }

    pub(crate) fn read(&mut self) -> Result<u8, DecompressError> {
        let value = *self
            .src
            .get(self.read_index)
            .ok_or(DecompressError::InputExhausted {
                offset: self.start_index,
                read: self.read_index,
                written: 0,
            })?;
        self.read_index += 1;

        Ok(value)
    }

    /// Decode tokens into `dst[range]` until every byte of the range is written.
    ///
    /// Back-references resolve one byte at a time against `dst`, so a short
    /// distance repeats bytes the same reference has just produced. Any byte of
    /// `dst` before the write position is a valid source.
    pub fn decompress_into(
        &mut self,
        dst: &mut [u8],
        range: RangeInclusive<usize>,
    ) -> Result<(), DecompressError> {
        let (start, end) = (*range.start(), *range.end());
        if start > end || end >= dst.len() {
            return Err(DecompressError::DestinationOutOfBounds {
                start,
                end,
                size: dst.len(),
            });
        }

        let mut write_index = start;
        while write_index <= end {
            let mask = self.read().map_err(|e| with_written(e, write_index))?;
            log::trace!("{:#09x}: mask {:#04x}", self.read_index - 1, mask);

            for bit in (0..8u8).rev() {
                if write_index > end {
                    break;
                }

                let flag = mask & (1u8 << bit) != 0;
                let token = Token::decode(flag, self).map_err(|e| with_written(e, write_index))?;
                log::trace!("{:#07x}: {:?}", write_index, token);

                match token {
                    Token::Literal(value) => {
                        self.write(dst, write_index, value)?;
                        write_index += 1;
                    }
                    Token::Backref { count, back } => {
                        if back > write_index {
                            return Err(DecompressError::InvalidBackref {
                                at: write_index,
                                back,
                            });
                        }

                        for _ in 0..count {
                            if write_index > end {
                                break;
                            }

                            let value = dst[write_index - back];
                            self.write(dst, write_index, value)?;
                            write_index += 1;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn write(&self, dst: &mut [u8], at: usize, value: u8) -> Result<(), DecompressError> {
        if self.grammar.protect_written && dst[at] != 0 {
            return Err(DecompressError::NonZeroOverwrite { at, value: dst[at] });
        }

        dst[at] = value;
        Ok(())
    }
}

fn with_written(error: DecompressError, written: usize) -> DecompressError {
    match error {
        DecompressError::InputExhausted { offset, read, .. } => DecompressError::InputExhausted {
            offset,
            read,
            written,
        },
        other => other,
    }
}

/// Decompress the headerless primary stream at `offset` into a fresh `size` byte buffer.
pub fn decompress_primary(src: &[u8], offset: usize, size: usize) -> Result<Vec<u8>, DecompressError> {
    if offset >= src.len() {
        return Err(DecompressError::SourceOutOfBounds {
            offset,
            len: src.len(),
        });
    }
    if size == 0 {
        return Err(DecompressError::EmptyOutput);
    }

    log::info!("Decompressing {:#07x} byte program image from {:#09x}", size, offset);

    let mut dst = vec![0; size];
    let mut decompressor = Decompressor::new(src, offset, Grammar::PRIMARY);
    decompressor.decompress_into(&mut dst, 0..=size - 1)?;

    log::debug!("Program image stream ended at {:#09x}", decompressor.read_index());

    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary(src: &[u8], size: usize) -> Result<Vec<u8>, DecompressError> {
        decompress_primary(src, 0, size)
    }

    #[test]
    fn literals_copy_verbatim() {
        let src = [0xff, 1, 2, 3, 4, 5, 6, 7, 8, 0xff, 9, 10];
        assert_eq!(primary(&src, 10).unwrap(), (1..=10).collect::<Vec<u8>>());
    }

    #[test]
    fn stops_mid_mask_when_output_is_full() {
        let src = [0xff, 0xaa, 0xbb, 0x00, 0x00];
        assert_eq!(primary(&src, 2).unwrap(), vec![0xaa, 0xbb]);
    }

    #[test]
    fn distance_one_backref_repeats_last_byte() {
        for nibble in 1..=15u8 {
            let count = usize::from(nibble) + 2;
            let src = [0x80, 0x42, nibble << 4, 0x00];
            let out = primary(&src, 1 + count).unwrap();
            assert_eq!(out, vec![0x42; 1 + count], "nibble {nibble}");
        }
    }

    #[test]
    fn backref_copies_overlapping_pattern() {
        // "ab" then copy 4 from 2 back
        let src = [0xc0, b'a', b'b', 0x20, 0x01];
        assert_eq!(primary(&src, 6).unwrap(), b"ababab");
    }

    #[test]
    fn extended_count_adds_third_byte() {
        for r3 in [0u8, 1, 255] {
            let count = 18 + usize::from(r3);
            let src = [0x80, 0x07, 0x00, 0x00, r3];
            let out = primary(&src, 1 + count).unwrap();
            assert_eq!(out.len(), 1 + count);
            assert!(out.iter().all(|&b| b == 0x07), "r3 {r3}");

            // one byte more than the reference supplies needs another mask
            let err = primary(&src, 2 + count).unwrap_err();
            assert!(matches!(err, DecompressError::InputExhausted { .. }));
        }
    }

    #[test]
    fn backref_is_clipped_at_output_end() {
        let src = [0x80, 0x11, 0xf0, 0x00];
        assert_eq!(primary(&src, 4).unwrap(), vec![0x11; 4]);
    }

    #[test]
    fn displacement_uses_twelve_bits() {
        let mut out_expected = vec![0u8; 0x1000];
        out_expected[0] = 0x5a;
        let mut src = vec![];
        for chunk in out_expected.chunks(8) {
            src.push(0xff);
            src.extend_from_slice(chunk);
        }
        // back = 0xfff + 1 reaches the first byte
        src.extend_from_slice(&[0x7f, 0x1f, 0xff]);
        out_expected.push(0x5a);

        assert_eq!(primary(&src, 0x1001).unwrap(), out_expected);
    }

    #[test]
    fn backref_before_start_is_rejected() {
        let src = [0x7f, 0x10, 0x00];
        assert_eq!(
            primary(&src, 4).unwrap_err(),
            DecompressError::InvalidBackref { at: 0, back: 1 }
        );
    }

    #[test]
    fn exhausted_input_is_fatal() {
        let src = [0xff, 1, 2];
        assert_eq!(
            primary(&src, 4).unwrap_err(),
            DecompressError::InputExhausted {
                offset: 0,
                read: 3,
                written: 2
            }
        );
    }

    #[test]
    fn truncated_backref_is_fatal() {
        let src = [0xbf, 1, 0x10];
        assert!(matches!(
            primary(&src, 4).unwrap_err(),
            DecompressError::InputExhausted { written: 1, .. }
        ));
    }

    #[test]
    fn rejects_bad_offset_and_size() {
        assert_eq!(
            decompress_primary(&[0xff, 1], 2, 1).unwrap_err(),
            DecompressError::SourceOutOfBounds { offset: 2, len: 2 }
        );
        assert_eq!(
            decompress_primary(&[0xff, 1], 0, 0).unwrap_err(),
            DecompressError::EmptyOutput
        );
    }

    #[test]
    fn protected_grammar_refuses_non_zero_bytes() {
        let mut dst = [0, 0, 9, 0];
        let src = [0xff, 1, 2, 3];
        let mut decompressor = Decompressor::new(
            &src,
            0,
            Grammar {
                protect_written: true,
                ..Grammar::PRIMARY
            },
        );
        assert_eq!(
            decompressor.decompress_into(&mut dst, 0..=3).unwrap_err(),
            DecompressError::NonZeroOverwrite { at: 2, value: 9 }
        );
    }
}
