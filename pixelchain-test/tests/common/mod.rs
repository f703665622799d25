#![allow(dead_code)]

use std::path::{Path, PathBuf};

use deku::DekuContainerWrite;
use image::RgbaImage;
use pixelchain::{IDENTITY_SIZE, Identity, LegacyHeader, SimplifiedHeader, padded_len};

/// Pixels per row of generated fragments
pub const WIDTH: usize = 4;

/// Identity `00000000-0000-0000-0000-000000000001`
pub fn identity_one() -> [u8; IDENTITY_SIZE] {
    let mut id = [0; IDENTITY_SIZE];
    id[IDENTITY_SIZE - 1] = 1;
    id
}

/// Save `bytes` as a `WIDTH` wide rgba8 png, zero filling the last row
pub fn save_pixels(path: &Path, mut bytes: Vec<u8>) {
    let height = bytes.len().div_ceil(4 * WIDTH).max(1);
    bytes.resize(WIDTH * height * 4, 0);
    RgbaImage::from_raw(WIDTH as u32, height as u32, bytes).unwrap().save(path).unwrap();
    tracing::debug!("wrote {}x{height} fragment {}", WIDTH, path.display());
}

pub fn legacy_header(
    identity: [u8; IDENTITY_SIZE],
    seq: u8,
    last: u8,
    file_size: u64,
    body_size: u64,
    name: &[u8],
) -> LegacyHeader {
    LegacyHeader {
        identity,
        sequence_number: seq,
        last_sequence_number: last,
        file_size,
        body_size,
        header_size: padded_len(pixelchain::header::LEGACY_FIXED_SIZE + name.len()) as u8,
        name_len: name.len() as u8,
        output_file_name: name.to_vec(),
    }
}

pub fn simplified_header(
    identity: [u8; IDENTITY_SIZE],
    seq: u8,
    last: u8,
    file_size: u64,
    name: &[u8],
) -> SimplifiedHeader {
    SimplifiedHeader {
        identity,
        sequence_number: seq,
        last_sequence_number: last,
        file_size,
        name_len: name.len() as u8,
        output_file_name: name.to_vec(),
    }
}

/// Write a legacy fragment under its chain file name in `dir`
///
/// `trailing` bytes are stored after the body, where the codec must never look.
pub fn write_legacy(
    dir: &Path,
    header: &LegacyHeader,
    payload: &[u8],
    trailing: &[u8],
) -> PathBuf {
    let mut bytes = header.to_bytes().unwrap();
    bytes.resize(padded_len(bytes.len()), 0xaa);
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(trailing);

    let path = dir.join(Identity(header.identity).fragment_file_name(header.sequence_number));
    save_pixels(&path, bytes);
    path
}

/// Write a simplified fragment under its chain file name in `dir`
///
/// The payload is followed by zero fill up to the end of the last row, which is part of the
/// fragment's payload as far as the codec is concerned.
pub fn write_simplified(dir: &Path, header: &SimplifiedHeader, payload: &[u8]) -> PathBuf {
    let mut bytes = header.to_bytes().unwrap();
    bytes.extend_from_slice(payload);

    let path = dir.join(Identity(header.identity).fragment_file_name(header.sequence_number));
    save_pixels(&path, bytes);
    path
}

/// Write a legacy chain whose bodies are `payloads`, all sharing `file_size`
pub fn legacy_chain(
    dir: &Path,
    identity: [u8; IDENTITY_SIZE],
    name: &[u8],
    file_size: u64,
    payloads: &[&[u8]],
) -> PathBuf {
    let last = payloads.len() as u8;
    let mut first = None;
    for (i, payload) in payloads.iter().enumerate() {
        let header =
            legacy_header(identity, i as u8 + 1, last, file_size, payload.len() as u64, name);
        let path = write_legacy(dir, &header, payload, &[0xde, 0xad, 0xbe, 0xef]);
        first.get_or_insert(path);
    }
    first.unwrap()
}
