//! Walk a fragment chain and write the reassembled file

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageError, ImageReader, RgbaImage};
use tracing::{debug, error, info, warn};

use crate::error::PixelChainError;
use crate::header::{FragmentHeader, Identity};
use crate::layout::{HeaderCodec, Layout, Legacy, Simplified};
use crate::pixels::PixelBytes;

/// Open and decode one fragment image into an rgba8 pixel buffer
pub fn load_fragment(path: &Path) -> Result<RgbaImage, PixelChainError> {
    let file = File::open(path).map_err(|source| PixelChainError::MissingFragment {
        path: path.to_path_buf(),
        source,
    })?;
    let undecodable = |source| PixelChainError::UndecodableImage { path: path.to_path_buf(), source };
    let image = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(|e| undecodable(ImageError::IoError(e)))?
        .decode()
        .map_err(undecodable)?;

    match image {
        DynamicImage::ImageRgba8(image) => Ok(image),
        other => {
            Err(PixelChainError::UnsupportedColor { path: path.to_path_buf(), color: other.color() })
        }
    }
}

/// Loop state of one reassembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassemblyState {
    pub identity: Identity,
    /// Taken from the first fragment read, later fragments are not consulted
    pub output_file_name: Vec<u8>,
    /// Bytes still owed to the output, never below zero
    pub remaining_bytes: u64,
    /// Sequence number of the next fragment to read
    pub current_sequence: u16,
    /// Inclusive bound of the walk
    pub last_sequence: u8,
}

impl ReassemblyState {
    pub fn new(first: &FragmentHeader, start: u8) -> Self {
        Self {
            identity: first.identity,
            output_file_name: first.output_file_name.clone(),
            remaining_bytes: first.file_size,
            current_sequence: u16::from(start),
            last_sequence: first.last_sequence_number,
        }
    }

    pub fn is_done(&self) -> bool {
        self.current_sequence > u16::from(self.last_sequence)
    }

    /// Account for `written` bytes of the current fragment and move to the next one
    pub fn advance(&mut self, written: u64, last_sequence: u8) {
        self.remaining_bytes = self.remaining_bytes.saturating_sub(written);
        self.last_sequence = last_sequence;
        self.current_sequence += 1;
    }
}

/// Outcome of consuming one fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentReport {
    pub sequence_number: u8,
    pub path: PathBuf,
    /// Payload bytes found in the fragment
    pub payload_len: usize,
    /// Payload bytes appended to the output
    pub written: u64,
    pub remaining_bytes: u64,
}

/// A finished reassembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    pub output: PathBuf,
    /// Header of the fragment the walk was started from
    pub header: FragmentHeader,
    pub written: u64,
    pub fragments: usize,
}

/// Step-wise reassembly of one chain
///
/// Fragments are read strictly in ascending sequence order, one decoded image at a time.
/// Once the byte budget is used up later fragments are still opened and decoded, they just
/// add nothing to the output.
pub struct Reassembly<C: HeaderCodec> {
    dir: PathBuf,
    first: FragmentHeader,
    output_path: PathBuf,
    output: BufWriter<File>,
    state: ReassemblyState,
    written: u64,
    fragments: usize,
    failed: bool,
    codec: PhantomData<C>,
}

impl<C: HeaderCodec> Reassembly<C> {
    /// Decode the first fragment and create the output file inside `dest`
    pub fn open(
        first_fragment: impl AsRef<Path>,
        dest: impl AsRef<Path>,
    ) -> Result<Self, PixelChainError> {
        let first_fragment = first_fragment.as_ref();
        let first = {
            let image = load_fragment(first_fragment)?;
            C::decode(&PixelBytes::from_rgba(&image))?
        };
        info!(
            "chain {} ({} layout): {} fragments, {} bytes",
            first.identity,
            C::LAYOUT,
            first.last_sequence_number,
            first.file_size
        );

        let dir = first_fragment.parent().map(Path::to_path_buf).unwrap_or_default();
        let output_path = dest.as_ref().join(first.output_path()?);
        debug!("writing to {}", output_path.display());
        let output = BufWriter::new(File::create(&output_path)?);
        let state = ReassemblyState::new(&first, C::first_sequence(&first));

        Ok(Self {
            dir,
            first,
            output_path,
            output,
            state,
            written: 0,
            fragments: 0,
            failed: false,
            codec: PhantomData,
        })
    }

    /// Header of the fragment the walk was started from
    pub fn header(&self) -> &FragmentHeader {
        &self.first
    }

    pub fn state(&self) -> &ReassemblyState {
        &self.state
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Path the next fragment is expected at, `None` once the walk is over
    pub fn next_path(&self) -> Option<PathBuf> {
        if self.failed || self.state.is_done() {
            return None;
        }
        let seq = u8::try_from(self.state.current_sequence).ok()?;
        Some(self.dir.join(self.state.identity.fragment_file_name(seq)))
    }

    /// Consume the next fragment of the chain
    ///
    /// Returns `None` when the chain is finished, or after an error was returned.
    pub fn next_fragment(&mut self) -> Option<Result<FragmentReport, PixelChainError>> {
        let path = self.next_path()?;
        let report = self.consume(path);
        if let Err(e) = &report {
            error!("reassembly aborted at fragment {}: {e}", self.state.current_sequence);
            self.failed = true;
        }
        Some(report)
    }

    fn consume(&mut self, path: PathBuf) -> Result<FragmentReport, PixelChainError> {
        let image = load_fragment(&path)?;
        let pixels = PixelBytes::from_rgba(&image);
        let header = C::decode(&pixels)?;
        let payload = C::payload(&header, &pixels)?;

        let take = (payload.len() as u64).min(self.state.remaining_bytes);
        // take <= payload.len()
        self.output.write_all(&payload[..take as usize])?;

        let sequence_number = header.sequence_number;
        self.state.advance(take, C::last_sequence(self.state.last_sequence, &header));
        self.written += take;
        self.fragments += 1;
        info!(
            "fragment {} of {}: wrote {} of {} payload bytes",
            sequence_number,
            self.state.last_sequence,
            take,
            payload.len()
        );

        Ok(FragmentReport {
            sequence_number,
            path,
            payload_len: payload.len(),
            written: take,
            remaining_bytes: self.state.remaining_bytes,
        })
    }

    /// Flush and close the output
    pub fn finish(mut self) -> Result<Reassembled, PixelChainError> {
        self.output.flush()?;
        if self.state.remaining_bytes != 0 {
            warn!(
                "chain ended with {} of {} bytes missing",
                self.state.remaining_bytes, self.first.file_size
            );
        }
        Ok(Reassembled {
            output: self.output_path,
            header: self.first,
            written: self.written,
            fragments: self.fragments,
        })
    }
}

/// Reassemble the chain starting at `first_fragment` into `dest`, decoding headers with `C`
///
/// Any missing or undecodable fragment aborts the walk. Output written up to that point is left
/// on disk.
pub fn reassemble<C: HeaderCodec>(
    first_fragment: impl AsRef<Path>,
    dest: impl AsRef<Path>,
) -> Result<Reassembled, PixelChainError> {
    let mut reassembly = Reassembly::<C>::open(first_fragment, dest)?;
    while let Some(report) = reassembly.next_fragment() {
        report?;
    }
    reassembly.finish()
}

/// [`reassemble`] with the codec chosen at runtime
pub fn reassemble_with_layout(
    layout: Layout,
    first_fragment: impl AsRef<Path>,
    dest: impl AsRef<Path>,
) -> Result<Reassembled, PixelChainError> {
    match layout {
        Layout::Legacy => reassemble::<Legacy>(first_fragment, dest),
        Layout::Simplified => reassemble::<Simplified>(first_fragment, dest),
    }
}
