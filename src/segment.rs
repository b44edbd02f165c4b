use serde::Deserialize;
use std::{ops::RangeInclusive, str::FromStr};
use thiserror::Error;

/// A compressed stream in the container and the output range it reconstructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Segment {
    #[serde(rename = "source")]
    pub source_offset: usize,
    #[serde(rename = "start")]
    pub dest_start: usize,
    /// inclusive
    #[serde(rename = "end")]
    pub dest_end: usize,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SegmentParseError {
    #[error("Segment '{0}' is not of the form SOURCE:START-END")]
    Malformed(String),
    #[error("'{0}' is not a valid number")]
    InvalidNumber(String),
    #[error("Segment list is empty")]
    Empty,
    #[error("Primary segment must start at 0, not {0:#x}")]
    PrimaryNotAtZero(usize),
}

impl Segment {
    pub fn dest_range(&self) -> RangeInclusive<usize> {
        self.dest_start..=self.dest_end
    }
}

impl FromStr for Segment {
    type Err = SegmentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SegmentParseError::Malformed(s.to_string());

        let (source, dest) = s.split_once(':').ok_or_else(malformed)?;
        let (start, end) = dest.split_once('-').ok_or_else(malformed)?;

        Ok(Segment {
            source_offset: parse_number(source)?,
            dest_start: parse_number(start)?,
            dest_end: parse_number(end)?,
        })
    }
}

/// Parse a decimal or `0x`/`0o`/`0b` prefixed integer, allowing `_` separators.
pub fn parse_number(s: &str) -> Result<usize, SegmentParseError> {
    let trimmed = s.trim();
    let invalid = || SegmentParseError::InvalidNumber(trimmed.to_string());

    let lower = trimmed.to_ascii_lowercase();
    let (digits, radix) = if let Some(hex) = lower.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        (oct, 8)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (bin, 2)
    } else {
        (lower.as_str(), 10)
    };

    let digits = digits.replace('_', "");
    if digits.is_empty() || digits.starts_with('+') {
        return Err(invalid());
    }

    usize::from_str_radix(&digits, radix).map_err(|_| invalid())
}

/// Ordered segments: the primary stream first, then the patches in application order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<Segment>")]
pub struct SegmentList(Vec<Segment>);

impl SegmentList {
    pub fn new(segments: Vec<Segment>) -> Result<Self, SegmentParseError> {
        let primary = segments.first().ok_or(SegmentParseError::Empty)?;
        if primary.dest_start != 0 {
            return Err(SegmentParseError::PrimaryNotAtZero(primary.dest_start));
        }

        Ok(SegmentList(segments))
    }

    pub fn primary(&self) -> &Segment {
        &self.0[0]
    }

    pub fn patches(&self) -> &[Segment] {
        &self.0[1..]
    }

    /// Size of the program image the primary segment reconstructs.
    pub fn image_size(&self) -> usize {
        self.primary().dest_end + 1
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }
}

impl TryFrom<Vec<Segment>> for SegmentList {
    type Error = SegmentParseError;

    fn try_from(segments: Vec<Segment>) -> Result<Self, Self::Error> {
        Self::new(segments)
    }
}

impl FromStr for SegmentList {
    type Err = SegmentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments = s
            .split('+')
            .filter(|record| !record.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Segment>, _>>()?;

        Self::new(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_in_any_base() {
        assert_eq!(parse_number("0x1F"), Ok(0x1f));
        assert_eq!(parse_number(" 42 "), Ok(42));
        assert_eq!(parse_number("0o17"), Ok(0o17));
        assert_eq!(parse_number("0b101"), Ok(5));
        assert_eq!(parse_number("0x07_dc_f60"), Ok(0x07dcf60));
        assert!(parse_number("0x").is_err());
        assert!(parse_number("").is_err());
        assert!(parse_number("12ab").is_err());
        assert!(parse_number("-3").is_err());
        assert!(parse_number("+3").is_err());
    }

    #[test]
    fn parses_segment_list() {
        let list: SegmentList = "0x07dcf60:0x00000-0x1ffff+0x07f6d98:0x04d60-0x0515f"
            .parse()
            .unwrap();

        assert_eq!(
            list.primary(),
            &Segment {
                source_offset: 0x07dcf60,
                dest_start: 0,
                dest_end: 0x1ffff,
            }
        );
        assert_eq!(list.image_size(), 0x20000);
        assert_eq!(list.patches().len(), 1);
        assert_eq!(list.patches()[0].dest_range(), 0x04d60..=0x0515f);
    }

    #[test]
    fn rejects_malformed_segments() {
        assert_eq!(
            "0x100".parse::<Segment>(),
            Err(SegmentParseError::Malformed("0x100".into()))
        );
        assert_eq!(
            "0x100:0".parse::<Segment>(),
            Err(SegmentParseError::Malformed("0x100:0".into()))
        );
        assert_eq!(
            "0x100:0-zz".parse::<Segment>(),
            Err(SegmentParseError::InvalidNumber("zz".into()))
        );
    }

    #[test]
    fn primary_must_start_at_zero() {
        assert_eq!(
            "0x100:0x10-0x3fff".parse::<SegmentList>(),
            Err(SegmentParseError::PrimaryNotAtZero(0x10))
        );
        assert_eq!("".parse::<SegmentList>(), Err(SegmentParseError::Empty));
    }
}
