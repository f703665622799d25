use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PixelChainError {
    #[error("std io error: {0}")]
    StdIo(#[from] io::Error),

    #[error("missing fragment {path:?}: {source}")]
    MissingFragment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("undecodable image {path:?}: {source}")]
    UndecodableImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("undecodable image {path:?}: unsupported color type {color:?}, expected rgba8")]
    UnsupportedColor { path: PathBuf, color: image::ColorType },

    #[error("malformed fragment header: {0}")]
    MalformedHeader(String),
}

impl PixelChainError {
    /// Fragment the error refers to, when it names one
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::MissingFragment { path, .. }
            | Self::UndecodableImage { path, .. }
            | Self::UnsupportedColor { path, .. } => Some(path),
            Self::StdIo(_) | Self::MalformedHeader(_) => None,
        }
    }
}

impl From<deku::DekuError> for PixelChainError {
    fn from(value: deku::DekuError) -> Self {
        match value {
            deku::DekuError::Incomplete(_) => {
                Self::MalformedHeader("header runs past end of pixel data".to_string())
            }
            e => Self::MalformedHeader(e.to_string()),
        }
    }
}

impl From<PixelChainError> for io::Error {
    fn from(value: PixelChainError) -> Self {
        use PixelChainError::*;
        match value {
            StdIo(io) => io,
            MissingFragment { source, .. } => source,
            UndecodableImage { .. } | UnsupportedColor { .. } | MalformedHeader(_) => {
                Self::from(io::ErrorKind::InvalidData)
            }
        }
    }
}
