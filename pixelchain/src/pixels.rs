//! Flat byte view over a decoded pixel grid
//!
//! Fragment images carry their header and payload directly in the channel values of each pixel.
//! Byte `i` of the stream lives in pixel `i / 4`, channel `i % 4`.

use std::io::{self, Read, Seek, SeekFrom};

use image::RgbaImage;

/// Channels per pixel, and the natural read granularity of a fragment
pub const CHANNELS: usize = 4;

/// A single pixel, one byte per channel
pub type Pixel = [u8; CHANNELS];

/// Read-only byte addressing over a borrowed pixel grid
#[derive(Debug, Copy, Clone)]
pub struct PixelBytes<'a> {
    pixels: &'a [Pixel],
}

impl<'a> PixelBytes<'a> {
    pub fn new(pixels: &'a [Pixel]) -> Self {
        Self { pixels }
    }

    /// View the raw buffer of an rgba8 image as a pixel grid
    pub fn from_rgba(image: &'a RgbaImage) -> Self {
        // the container may be longer than the image it backs
        let len = image.width() as usize * image.height() as usize * CHANNELS;
        Self::new(bytemuck::cast_slice(&image.as_raw()[..len]))
    }

    pub fn pixels(&self) -> &'a [Pixel] {
        self.pixels
    }

    /// Number of addressable bytes
    pub fn len(&self) -> usize {
        self.pixels.len() * CHANNELS
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Byte at `index`
    ///
    /// # Panics
    /// If `index` is not below [`Self::len`]. Use [`Self::get`] for checked access.
    pub fn byte_at(&self, index: usize) -> u8 {
        self.pixels[index / CHANNELS][index % CHANNELS]
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        (index < self.len()).then(|| self.byte_at(index))
    }

    /// Bytes `start..start + len`, or `None` if the span leaves the grid
    ///
    /// The span is read pixel by pixel; a final partial pixel is cut down to the bytes that
    /// belong to the span.
    pub fn slice(&self, start: usize, len: usize) -> Option<&'a [u8]> {
        let end = start.checked_add(len)?;
        if end > self.len() {
            return None;
        }
        let first_pixel = start / CHANNELS;
        let last_pixel = end.div_ceil(CHANNELS);
        let pixels: &'a [u8] = bytemuck::cast_slice(&self.pixels[first_pixel..last_pixel]);
        let skip = start % CHANNELS;
        Some(&pixels[skip..skip + len])
    }

    /// Cursor over the stream, for use with byte oriented parsers
    pub fn reader(&self) -> PixelReader<'a> {
        PixelReader { bytes: *self, pos: 0 }
    }
}

/// [`Read`] + [`Seek`] cursor that pulls each byte through [`PixelBytes::byte_at`]
#[derive(Debug)]
pub struct PixelReader<'a> {
    bytes: PixelBytes<'a>,
    pos: u64,
}

impl PixelReader<'_> {
    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl Read for PixelReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.bytes.len() as u64;
        let available = len.saturating_sub(self.pos);
        let n = (buf.len() as u64).min(available) as usize;
        for (i, slot) in buf[..n].iter_mut().enumerate() {
            *slot = self.bytes.byte_at(self.pos as usize + i);
        }
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for PixelReader<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(n) => (self.bytes.len() as u64).checked_add_signed(n),
            SeekFrom::Current(n) => self.pos.checked_add_signed(n),
        };
        match new {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}
