//! Header layouts found in fragment images
//!
//! Nothing in a fragment says which layout wrote it, so the layout is always chosen by the
//! caller: either statically through a [`HeaderCodec`] type, or at runtime through [`Layout`].

use core::fmt;
use std::str::FromStr;

use deku::prelude::*;
use tracing::{debug, trace, warn};

use crate::error::PixelChainError;
use crate::header::{FragmentHeader, LegacyHeader, SimplifiedHeader, padded_len};
use crate::pixels::PixelBytes;

/// Decoding of one header layout, and where its payload lives
pub trait HeaderCodec {
    const LAYOUT: Layout;

    /// Decode the header at the front of `pixels`
    fn decode(pixels: &PixelBytes<'_>) -> Result<FragmentHeader, PixelChainError>;

    /// Offset of the first payload byte
    fn header_len(header: &FragmentHeader) -> usize;

    /// Payload bytes of this fragment
    ///
    /// Never reads past the end of `pixels`; a header that would need to is rejected.
    fn payload<'a>(
        header: &FragmentHeader,
        pixels: &PixelBytes<'a>,
    ) -> Result<&'a [u8], PixelChainError>;

    /// Sequence number the chain walk starts from, given the first fragment read
    fn first_sequence(first: &FragmentHeader) -> u8;

    /// Bound of the chain walk after loading `current`
    fn last_sequence(bound: u8, current: &FragmentHeader) -> u8;
}

fn read_header<'a, T>(pixels: &PixelBytes<'_>) -> Result<T, PixelChainError>
where
    T: DekuReader<'a, ()>,
{
    let mut cursor = pixels.reader();
    let mut reader = Reader::new(&mut cursor);
    let header = T::from_reader_with_ctx(&mut reader, ())?;
    Ok(header)
}

fn check_sequence(header: &FragmentHeader) {
    if header.sequence_number == 0 || header.sequence_number > header.last_sequence_number {
        warn!(
            "sequence number {} outside of 1..={}",
            header.sequence_number, header.last_sequence_number
        );
    }
}

/// Padded layout with explicit body size
pub struct Legacy;

impl HeaderCodec for Legacy {
    const LAYOUT: Layout = Layout::Legacy;

    fn decode(pixels: &PixelBytes<'_>) -> Result<FragmentHeader, PixelChainError> {
        let header: LegacyHeader = read_header(pixels)?;
        trace!("{:02x?}", header);
        let header = FragmentHeader::from(header);
        check_sequence(&header);

        let effective = Self::header_len(&header);
        if header.header_size.map(usize::from) != Some(effective) {
            debug!(
                "declared header size {:?} differs from computed size {}",
                header.header_size, effective
            );
        }
        Ok(header)
    }

    fn header_len(header: &FragmentHeader) -> usize {
        padded_len(header.raw_len())
    }

    fn payload<'a>(
        header: &FragmentHeader,
        pixels: &PixelBytes<'a>,
    ) -> Result<&'a [u8], PixelChainError> {
        let body_size = header.body_size.ok_or_else(|| {
            PixelChainError::MalformedHeader("legacy header without body size".to_string())
        })?;
        let start = Self::header_len(header);
        let out_of_range = || {
            PixelChainError::MalformedHeader(format!(
                "body of {body_size} bytes at offset {start} runs past {} pixel bytes",
                pixels.len()
            ))
        };
        let len = usize::try_from(body_size).map_err(|_| out_of_range())?;
        debug!("payload offset: {start}, len: {len}");
        pixels.slice(start, len).ok_or_else(out_of_range)
    }

    fn first_sequence(_first: &FragmentHeader) -> u8 {
        1
    }

    fn last_sequence(bound: u8, _current: &FragmentHeader) -> u8 {
        bound
    }
}

/// Unpadded layout, payload runs to the end of the image
pub struct Simplified;

impl HeaderCodec for Simplified {
    const LAYOUT: Layout = Layout::Simplified;

    fn decode(pixels: &PixelBytes<'_>) -> Result<FragmentHeader, PixelChainError> {
        let header: SimplifiedHeader = read_header(pixels)?;
        trace!("{:02x?}", header);
        let header = FragmentHeader::from(header);
        check_sequence(&header);
        Ok(header)
    }

    fn header_len(header: &FragmentHeader) -> usize {
        header.raw_len()
    }

    fn payload<'a>(
        header: &FragmentHeader,
        pixels: &PixelBytes<'a>,
    ) -> Result<&'a [u8], PixelChainError> {
        let start = Self::header_len(header);
        let len = pixels.len().checked_sub(start).ok_or_else(|| {
            PixelChainError::MalformedHeader(format!(
                "header of {start} bytes is larger than {} pixel bytes",
                pixels.len()
            ))
        })?;
        debug!("payload offset: {start}, len: {len}");
        pixels.slice(start, len).ok_or_else(|| {
            PixelChainError::MalformedHeader(format!("payload at offset {start} out of range"))
        })
    }

    fn first_sequence(first: &FragmentHeader) -> u8 {
        first.sequence_number
    }

    fn last_sequence(_bound: u8, current: &FragmentHeader) -> u8 {
        current.last_sequence_number
    }
}

/// Runtime choice of [`HeaderCodec`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Layout {
    /// [`Legacy`]
    Legacy,
    /// [`Simplified`]
    Simplified,
}

impl Layout {
    /// Names accepted by [`Layout::from_str`]
    pub const NAMES: &'static [&'static str] = &["legacy", "simplified"];

    pub fn name(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Simplified => "simplified",
        }
    }

    pub fn decode_header(self, pixels: &PixelBytes<'_>) -> Result<FragmentHeader, PixelChainError> {
        match self {
            Self::Legacy => Legacy::decode(pixels),
            Self::Simplified => Simplified::decode(pixels),
        }
    }

    pub fn header_len(self, header: &FragmentHeader) -> usize {
        match self {
            Self::Legacy => Legacy::header_len(header),
            Self::Simplified => Simplified::header_len(header),
        }
    }
}

/// `legacy` unless only the `simplified` feature is enabled
impl Default for Layout {
    #[cfg(any(feature = "legacy", not(feature = "simplified")))]
    fn default() -> Self {
        Self::Legacy
    }

    #[cfg(all(feature = "simplified", not(feature = "legacy")))]
    fn default() -> Self {
        Self::Simplified
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(Self::Legacy),
            "simplified" => Ok(Self::Simplified),
            _ => Err(format!("unknown layout {s:?}, expected one of {:?}", Self::NAMES)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{IDENTITY_SIZE, LEGACY_FIXED_SIZE, SIMPLIFIED_FIXED_SIZE};
    use crate::pixels::{CHANNELS, Pixel};

    /// Lay `bytes` into a grid of `pixels` pixels, zero filled
    fn grid(bytes: &[u8], pixels: usize) -> Vec<Pixel> {
        let mut grid = vec![[0; CHANNELS]; pixels];
        for (i, b) in bytes.iter().enumerate() {
            grid[i / CHANNELS][i % CHANNELS] = *b;
        }
        grid
    }

    fn legacy(name: &[u8], body_size: u64) -> LegacyHeader {
        LegacyHeader {
            identity: [0x11; IDENTITY_SIZE],
            sequence_number: 2,
            last_sequence_number: 3,
            file_size: 0x0102_0304_0506_0708,
            body_size,
            header_size: padded_len(LEGACY_FIXED_SIZE + name.len()) as u8,
            name_len: name.len() as u8,
            output_file_name: name.to_vec(),
        }
    }

    fn simplified(name: &[u8]) -> SimplifiedHeader {
        SimplifiedHeader {
            identity: [0x22; IDENTITY_SIZE],
            sequence_number: 1,
            last_sequence_number: 1,
            file_size: 77,
            name_len: name.len() as u8,
            output_file_name: name.to_vec(),
        }
    }

    #[test]
    fn legacy_field_order() {
        let header = legacy(b"ab", 5);
        let bytes = header.to_bytes().unwrap();
        assert_eq!(bytes.len(), LEGACY_FIXED_SIZE + 2);
        assert_eq!(&bytes[..16], &[0x11; 16]);
        assert_eq!(bytes[16], 2);
        assert_eq!(bytes[17], 3);
        assert_eq!(&bytes[18..26], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(&bytes[26..34], &[5, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(bytes[34], 40);
        assert_eq!(bytes[35], 2);
        assert_eq!(&bytes[36..], b"ab");
    }

    #[test_log::test]
    fn decode_every_name_length() {
        for len in 0..=255_usize {
            let name = vec![b'n'; len];

            let header = legacy(&name, 0);
            let pixels = grid(&header.to_bytes().unwrap(), 80);
            let decoded = Legacy::decode(&PixelBytes::new(&pixels)).unwrap();
            assert_eq!(decoded, FragmentHeader::from(header));
            assert_eq!(Legacy::header_len(&decoded) % CHANNELS, 0);

            let header = simplified(&name);
            let pixels = grid(&header.to_bytes().unwrap(), 80);
            let decoded = Simplified::decode(&PixelBytes::new(&pixels)).unwrap();
            assert_eq!(decoded, FragmentHeader::from(header));
            assert_eq!(Simplified::header_len(&decoded), SIMPLIFIED_FIXED_SIZE + len);
        }
    }

    #[test]
    fn legacy_payload_trims_last_pixel() {
        // 37 raw header bytes, padded to 40
        let header = legacy(b"x", 6);
        let mut bytes = header.to_bytes().unwrap();
        bytes.resize(40, 0xee);
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6, 0xf0, 0xf1]);
        let pixels = grid(&bytes, 12);
        let pixels = PixelBytes::new(&pixels);

        let decoded = Legacy::decode(&pixels).unwrap();
        assert_eq!(Legacy::header_len(&decoded), 40);
        assert_eq!(Legacy::payload(&decoded, &pixels).unwrap(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test_log::test]
    fn legacy_body_past_end_of_image() {
        let header = legacy(b"", 5);
        // 36 header bytes + 5 body bytes need 11 pixels
        let pixels = grid(&header.to_bytes().unwrap(), 10);
        let pixels = PixelBytes::new(&pixels);
        let decoded = Legacy::decode(&pixels).unwrap();
        assert!(matches!(
            Legacy::payload(&decoded, &pixels),
            Err(PixelChainError::MalformedHeader(_))
        ));

        let header = legacy(b"", u64::MAX);
        let pixels = grid(&header.to_bytes().unwrap(), 10);
        let pixels = PixelBytes::new(&pixels);
        let decoded = Legacy::decode(&pixels).unwrap();
        assert!(Legacy::payload(&decoded, &pixels).is_err());
    }

    #[test]
    fn simplified_payload_is_rest_of_image() {
        let header = simplified(b"f");
        let mut bytes = header.to_bytes().unwrap();
        assert_eq!(bytes.len(), 28);
        bytes.extend_from_slice(&[9; 8]);
        let pixels = grid(&bytes, 10);
        let pixels = PixelBytes::new(&pixels);
        let decoded = Simplified::decode(&pixels).unwrap();
        let payload = Simplified::payload(&decoded, &pixels).unwrap();
        assert_eq!(payload.len(), 40 - 28);
        assert_eq!(&payload[..8], &[9; 8]);
        assert_eq!(&payload[8..], &[0; 4]);
    }

    #[test]
    fn name_past_end_of_image() {
        let mut bytes = legacy(b"", 0).to_bytes().unwrap();
        bytes[LEGACY_FIXED_SIZE - 1] = 255;
        let pixels = grid(&bytes, 10);
        assert!(matches!(
            Legacy::decode(&PixelBytes::new(&pixels)),
            Err(PixelChainError::MalformedHeader(_))
        ));

        // 27 fixed bytes + 14 name bytes, one more than 10 pixels hold
        let mut bytes = simplified(b"").to_bytes().unwrap();
        bytes[SIMPLIFIED_FIXED_SIZE - 1] = 14;
        let pixels = grid(&bytes, 10);
        assert!(matches!(
            Simplified::decode(&PixelBytes::new(&pixels)),
            Err(PixelChainError::MalformedHeader(_))
        ));
    }

    #[test]
    fn single_pixel_image() {
        let pixels = [[0, 0, 0, 0xff]];
        let pixels = PixelBytes::new(&pixels);
        assert!(matches!(Legacy::decode(&pixels), Err(PixelChainError::MalformedHeader(_))));
        assert!(matches!(Simplified::decode(&pixels), Err(PixelChainError::MalformedHeader(_))));
    }

    #[test]
    fn sequence_shape() {
        let first = FragmentHeader::from(legacy(b"", 0));
        assert_eq!(Legacy::first_sequence(&first), 1);
        assert_eq!(Legacy::last_sequence(3, &FragmentHeader::from(simplified(b""))), 3);

        let first = FragmentHeader { sequence_number: 4, ..first };
        assert_eq!(Simplified::first_sequence(&first), 4);
        assert_eq!(Simplified::last_sequence(3, &FragmentHeader::from(simplified(b""))), 1);
    }

    #[test]
    fn layout_names() {
        for name in Layout::NAMES {
            assert_eq!(name.parse::<Layout>().unwrap().to_string(), *name);
        }
        assert!("v2".parse::<Layout>().is_err());
        assert_eq!(Legacy::LAYOUT, Layout::Legacy);
        assert_eq!(Simplified::LAYOUT, Layout::Simplified);
    }
}
