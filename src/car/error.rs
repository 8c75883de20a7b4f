#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::car::classify::RenditionType;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid catalog: {0}")]
    Invalid(String),

    #[error("compressed payloads need carsmith built with the zstd feature")]
    NoZstd,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Failures that only surface when a payload body is actually unpacked.
///
/// These are cached next to the rendition that hit them, hence `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("payload does not inflate: {0}")]
    Inflate(String),

    #[error("inflated payload is {got} bytes, header says {expected}")]
    RawLength { expected: usize, got: usize },

    #[error("pixel buffer is {got} bytes, a {width}x{height} canvas needs {expected}")]
    PixelLength {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },

    #[error("compressed payloads need carsmith built with the zstd feature")]
    NoZstd,

    #[error("link destination is not in the catalog")]
    MissingLinkTarget,

    #[error("link frame lies outside the destination canvas")]
    LinkFrameOutOfBounds,
}

#[derive(Debug, Error)]
pub enum EditError {
    #[error("unable to read catalog file {}", file_label(.path))]
    UnableToAccessCatalogFile {
        path: PathBuf,
        #[source]
        source: CatalogError,
    },

    #[error("unable to write to catalog file {}", file_label(.path))]
    UnableToWriteToCatalogFile {
        path: PathBuf,
        #[source]
        source: CatalogError,
    },

    /// The rendition key has no raw key-data form in the target file.
    #[error("unable to access data of item")]
    UnableToAccessItemData,

    #[error("failed to edit item at stage `{0}`")]
    FailedToEditItem(&'static str),

    #[error("{0} renditions cannot be edited")]
    NotEditable(RenditionType),

    #[error("editing color renditions is not supported")]
    ColorEditUnsupported,
}

pub type EditResult<T> = Result<T, EditError>;

/// Errors surfaced by the command-line front end.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("failed to extract {} item(s):\n{}", .0.len(), failure_lines(.0))]
    Extract(BTreeMap<String, String>),

    #[error("no rendition named {0:?}")]
    NotFound(String),

    #[error("{name:?} matches several renditions ({candidates}); narrow it with --kind or --scale")]
    Ambiguous { name: String, candidates: String },

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("prompt: {0}")]
    Prompt(String),
}

pub type CommandResult<T> = Result<T, CommandError>;

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn failure_lines(failed: &BTreeMap<String, String>) -> String {
    failed
        .iter()
        .map(|(item, reason)| format!("{item}: {reason}"))
        .collect::<Vec<_>>()
        .join("\n")
}
