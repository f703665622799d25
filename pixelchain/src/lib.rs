//! Library and binary for reassembling files that were split across chains of PNG fragments,
//! where every fragment stores a small header and a slice of the file directly in its pixel
//! channel bytes.
//!
//! ## Library
//! Add the following to your `Cargo.toml` file:
//! ```toml
//! [dependencies]
//! pixelchain = "0.1.0"
//! ```
//!
//! ### Reassembling
//! Fragments are named `<hex(identity)>_<sequence>.png` and live next to each other. Given the
//! path of the first one, [`reassemble`] finds the rest and writes the file named in the header.
//!
//! The header layout can not be detected from the image, so it is picked by the caller through
//! a [`HeaderCodec`] type or a [`Layout`].
//!
//!### Example
//!```rust,no_run
//! use pixelchain::{Layout, Legacy, reassemble, reassemble_with_layout};
//!
//! // layout known at compile time
//! let done = reassemble::<Legacy>("fragments/0123abcd_1.png", ".").unwrap();
//! println!("wrote {} bytes to {}", done.written, done.output.display());
//!
//! // layout chosen at runtime
//! let layout: Layout = "simplified".parse().unwrap();
//! reassemble_with_layout(layout, "other/4567cdef_1.png", "/tmp").unwrap();
//! ```
//!
//! # Features
#![cfg_attr(feature = "document-features", doc = document_features::document_features!())]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
pub mod header;
pub mod layout;
pub mod pixels;
pub mod reassemble;

pub use crate::error::PixelChainError;
pub use crate::header::{
    FragmentHeader, IDENTITY_SIZE, Identity, LegacyHeader, SimplifiedHeader, padded_len,
};
pub use crate::layout::{HeaderCodec, Layout, Legacy, Simplified};
pub use crate::pixels::{CHANNELS, Pixel, PixelBytes, PixelReader};
pub use crate::reassemble::{
    FragmentReport, Reassembled, Reassembly, ReassemblyState, load_fragment, reassemble,
    reassemble_with_layout,
};
