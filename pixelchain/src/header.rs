//! Fragment headers, as stored at the front of every fragment image

use std::fmt;
use std::path::{Component, Path};

use deku::prelude::*;

use crate::error::PixelChainError;
use crate::pixels::CHANNELS;

/// Size of the chain identity
pub const IDENTITY_SIZE: usize = 16;

/// Bytes before the output file name in the legacy layout
pub const LEGACY_FIXED_SIZE: usize = IDENTITY_SIZE + 1 + 1 + 8 + 8 + 1 + 1;

/// Bytes before the output file name in the simplified layout
pub const SIMPLIFIED_FIXED_SIZE: usize = IDENTITY_SIZE + 1 + 1 + 8 + 1;

/// Round `raw` up to the next pixel boundary
pub const fn padded_len(raw: usize) -> usize {
    raw + ((CHANNELS - raw % CHANNELS) % CHANNELS)
}

/// 128 bit identifier shared by every fragment of one chain
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Identity(pub [u8; IDENTITY_SIZE]);

impl Identity {
    /// File name of fragment `seq` of this chain, `<hex(identity)>_<seq>.png`
    pub fn fragment_file_name(&self, seq: u8) -> String {
        format!("{self}_{seq}.png")
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}

/// Padded header layout, carrying an explicit body and header size
#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct LegacyHeader {
    pub identity: [u8; IDENTITY_SIZE],
    pub sequence_number: u8,
    pub last_sequence_number: u8,
    pub file_size: u64,
    /// Payload bytes stored in this fragment
    pub body_size: u64,
    /// Header size as written by the encoder, not trusted for offsets
    pub header_size: u8,
    pub name_len: u8,
    #[deku(count = "*name_len")]
    pub output_file_name: Vec<u8>,
}

/// Unpadded header layout, where the payload runs to the end of the image
#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct SimplifiedHeader {
    pub identity: [u8; IDENTITY_SIZE],
    pub sequence_number: u8,
    pub last_sequence_number: u8,
    pub file_size: u64,
    pub name_len: u8,
    #[deku(count = "*name_len")]
    pub output_file_name: Vec<u8>,
}

/// Decoded header of one fragment, independent of its on-disk layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentHeader {
    pub identity: Identity,
    /// 1-based position in the chain
    pub sequence_number: u8,
    /// Sequence number of the final fragment
    pub last_sequence_number: u8,
    /// Size of the fully reassembled file
    pub file_size: u64,
    /// Legacy layout only
    pub body_size: Option<u64>,
    /// Legacy layout only
    pub header_size: Option<u8>,
    pub output_file_name: Vec<u8>,
}

impl FragmentHeader {
    /// Header bytes before padding
    pub fn raw_len(&self) -> usize {
        let fixed = if self.body_size.is_some() { LEGACY_FIXED_SIZE } else { SIMPLIFIED_FIXED_SIZE };
        fixed + self.output_file_name.len()
    }

    /// The output file name as a single path component
    ///
    /// Names that are empty, not utf-8, contain a separator or NUL, or are `.`/`..` can not be
    /// created safely inside the destination directory and are rejected.
    pub fn output_path(&self) -> Result<&Path, PixelChainError> {
        let unusable = || {
            PixelChainError::MalformedHeader(format!(
                "unusable output file name {:?}",
                String::from_utf8_lossy(&self.output_file_name)
            ))
        };
        let name = std::str::from_utf8(&self.output_file_name).map_err(|_| unusable())?;
        if name.is_empty() || name.contains('\0') {
            return Err(unusable());
        }
        let path = Path::new(name);
        let mut components = path.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(c)), None) if c == name => Ok(path),
            _ => Err(unusable()),
        }
    }
}

impl From<LegacyHeader> for FragmentHeader {
    fn from(h: LegacyHeader) -> Self {
        Self {
            identity: Identity(h.identity),
            sequence_number: h.sequence_number,
            last_sequence_number: h.last_sequence_number,
            file_size: h.file_size,
            body_size: Some(h.body_size),
            header_size: Some(h.header_size),
            output_file_name: h.output_file_name,
        }
    }
}

impl From<SimplifiedHeader> for FragmentHeader {
    fn from(h: SimplifiedHeader) -> Self {
        Self {
            identity: Identity(h.identity),
            sequence_number: h.sequence_number,
            last_sequence_number: h.last_sequence_number,
            file_size: h.file_size,
            body_size: None,
            header_size: None,
            output_file_name: h.output_file_name,
        }
    }
}
