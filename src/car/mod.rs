#![forbid(unsafe_code)]

mod build;
mod catalog;
mod classify;
mod csi;
mod edit;
mod error;
mod extract;
mod format;
mod generator;
mod io;
mod key;
mod ops;
mod path;
mod read;
mod rendition;
mod settings;
mod store;

pub use build::{build, BuildSummary, ContainerBuilder};
pub use catalog::{verify, Catalog, RenditionCollection, RenditionGroup, VerifyReport};
pub use classify::{classify, RenditionType};
pub use csi::{Blob, ClassTag, ColorValue, PayloadBody, RenditionFlags, RenditionPayload};
pub use edit::CatalogEditor;
pub use error::{
    CatalogError, CatalogResult, CommandError, CommandResult, DecodeError, EditError, EditResult,
};
pub use extract::{extract_all, extract_one, ExtractReport};
pub use format::{Compression, NamedLookup, Rect, Size, FOOTER_MAGIC, MAGIC};
pub use generator::RenditionGenerator;
pub use key::{
    or_na, Appearance, DisplayGamut, Idiom, KeyAttribute, KeyFormat, RenditionKey,
    MAC_CATALYST_SUBTYPE,
};
pub use rendition::{Rendition, RenditionEntry, RenditionPreview};
pub use settings::{CodecSettings, EditSettings};
pub use store::MutableAssetStore;

pub mod cli {
    //! Printing front ends used by the binary.
    pub use super::ops::{
        build, describe, edit, extract, info, list, parse_color, remove, verify, Replacement,
        Selector,
    };
}
